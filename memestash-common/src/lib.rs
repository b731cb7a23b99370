//! # memestash Common Library
//!
//! Shared code for the memestash services:
//! - Common error type
//! - Bootstrap configuration (TOML) loading
//! - Meme record model and table creation

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
