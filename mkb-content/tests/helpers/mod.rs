//! Test helper utilities
//!
//! Shared utilities for testing mkb-content

#![allow(dead_code, unused_imports)]

pub mod app;
pub mod stub_upstream;

pub use app::{create_test_context, extract_json, json_request, send, seed_post, TestContext};
pub use stub_upstream::{start_stub, StubBehavior, StubUpstream, PNG_BYTES};
