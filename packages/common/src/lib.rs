pub mod error;
pub mod permissions;

pub use error::*;
pub use permissions::*;
