//! # MKB Common Library
//!
//! Shared code for the marketing backend services including:
//! - Error type
//! - Bootstrap configuration and root folder resolution
//! - Database initialization and post models

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
