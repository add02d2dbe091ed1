//! Content pipeline services
//!
//! - `generation`: concurrent draft generation
//! - `publish`: at-most-once publishing to the social platform
//! - `cleanup`: removal of drafts superseded by a publish
//! - `captions`: prompt-based caption variants

pub mod captions;
pub mod cleanup;
pub mod generation;
pub mod publish;

pub use cleanup::DraftCleaner;
pub use generation::{DraftBundle, DraftRequest, GenerationError, GenerationOrchestrator};
pub use publish::{PublishCoordinator, PublishError, PublishOutcome};
