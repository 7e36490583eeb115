//! Integration tests module
//!
//! End-to-end tests for the salary pipeline against mock servers:
//! - Complete fetch → extract → normalize → store flow
//! - Freshness gating across runs
//! - Per-source error handling and job bookkeeping

pub mod error_scenarios;
pub mod pipeline_test;
