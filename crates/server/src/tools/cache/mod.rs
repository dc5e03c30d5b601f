//! Cache-related MCP tools.
//!
//! This module provides the admin tools for inspecting and clearing the
//! content cache.

pub mod clear;
pub mod stats;

pub use clear::{CacheClearTagParams, clear_impl, clear_tag_impl, sweep_impl};
pub use stats::stats_impl;
