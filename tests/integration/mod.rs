//! Integration test suite for calcflow.
//!
//! These tests drive the whole pipeline from submitted text to a resolved
//! expression, both in-process through the dispatcher and over HTTP with
//! real agents.
//!
//! # Test Categories
//!
//! - `pipeline_e2e`: Compile, dispatch and resolve single expressions
//! - `concurrent_workers`: Many workers racing over one store
//! - `http_dispatch`: Orchestrator server plus agent pool over loopback

mod fixtures;

mod concurrent_workers;
mod http_dispatch;
