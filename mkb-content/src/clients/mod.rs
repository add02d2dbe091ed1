//! HTTP clients for the upstream collaborators
//!
//! - `generative`: text/image generation and generated media download
//! - `social`: social platform publishing

pub mod generative;
pub mod social;

pub use generative::{ClientError, FetchedMedia, GenerativeClient};
pub use social::{PublishMedia, PublishRequest, SocialClient, SocialError};

const USER_AGENT: &str = concat!("mkb-content/", env!("CARGO_PKG_VERSION"));
