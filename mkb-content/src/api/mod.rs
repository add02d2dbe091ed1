//! HTTP API handlers for mkb-content

pub mod generate;
pub mod health;
pub mod media;
pub mod posts;
pub mod publish;

pub use generate::generate_routes;
pub use health::health_routes;
pub use media::media_routes;
pub use posts::post_routes;
pub use publish::publish_routes;
