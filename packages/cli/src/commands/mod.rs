pub mod add;
pub mod init;
pub mod remove;
pub mod set;
pub mod show;

pub use add::{add, AddArgs};
pub use init::{init, InitArgs};
pub use remove::{remove, RemoveArgs};
pub use set::{set, SetArgs};
pub use show::{show, ShowArgs};
