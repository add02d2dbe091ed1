//! mkb-content library interface
//!
//! Content generation and publishing pipeline: draft generation against the
//! generative microservice, a content-addressed media cache, and at-most-once
//! publishing to the social platform. Exposed as a library for integration
//! testing; `main.rs` wires it to the network.

pub mod api;
pub mod clients;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod media;
pub mod services;

pub use crate::config::ServiceConfig;
pub use crate::error::{ApiError, ApiResult};

use anyhow::{Context, Result};
use axum::Router;
use chrono::{DateTime, Utc};
use clients::{GenerativeClient, SocialClient};
use media::{MediaCache, MediaResolver};
use services::{GenerationOrchestrator, PublishCoordinator};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Resolved upstream configuration
    pub config: Arc<ServiceConfig>,
    pub resolver: MediaResolver,
    pub orchestrator: GenerationOrchestrator,
    pub publisher: PublishCoordinator,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Wire clients and services over a database and media directory
    pub fn new(db: SqlitePool, config: ServiceConfig, media_root: PathBuf) -> Result<Self> {
        let generative =
            GenerativeClient::new(&config).context("Failed to build generative client")?;
        let social = SocialClient::new(&config).context("Failed to build social client")?;

        let resolver = MediaResolver::new(
            MediaCache::new(media_root),
            generative.clone(),
            &config.public_base_url,
        );
        let orchestrator = GenerationOrchestrator::new(generative, resolver.clone());
        let publisher = PublishCoordinator::new(db.clone(), social, resolver.clone());

        Ok(Self {
            db,
            config: Arc::new(config),
            resolver,
            orchestrator,
            publisher,
            startup_time: Utc::now(),
        })
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::generate_routes())
        .merge(api::publish_routes())
        .merge(api::post_routes())
        .merge(api::media_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
