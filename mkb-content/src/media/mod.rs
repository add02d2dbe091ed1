//! Generated media storage and resolution

pub mod cache;
pub mod resolver;

pub use cache::{CacheError, CachedMedia, MediaCache};
pub use resolver::{LocalMedia, MediaReference, MediaResolver, Resolution};
