//! Database access for mkb-content

pub mod posts;
