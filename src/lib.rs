//! Pitwall CLI Library
//!
//! Exposes the cache, API client and CLI modules for use in integration tests.

pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod export;
pub mod logging;
