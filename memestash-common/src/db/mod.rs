//! Database models and table creation

pub mod init;
pub mod models;

pub use init::*;
pub use models::*;
