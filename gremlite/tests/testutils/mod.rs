//! Test utilities for Gremlite integration tests
//!
//! - GraphFixture: a "modern" graph with a traversal source over it
//! - RecordingListener: captures mutation events as readable strings

#![allow(dead_code)]

pub mod graph_fixture;
