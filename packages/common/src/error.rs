use thiserror::Error;

/// Error type shared by the bindery crates
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommonError {
    #[error("Unknown permission: {0}")]
    UnknownAction(String),
}
