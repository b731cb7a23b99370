//! Test Helper Utilities
//!
//! Shared utilities for testing memestash-ingest

#![allow(dead_code)]

pub mod fixtures;
pub mod mock_upstream;

pub use fixtures::{
    build_orchestrator, create_test_db, png_bytes, valid_analysis_json, wait_until_idle,
    ScriptedAnalyzer, TestWorkspace,
};
pub use mock_upstream::{CapturedCompletion, ListingRequest, MockUpstream};
