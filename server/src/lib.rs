//! Callwarden server library
//!
//! Dashboard backend for LLM function-call security traces. Materializes
//! span trees fetched from the analysis backend, keeps them current via
//! streamed span updates, and serves them over a small HTTP API.

mod app;

pub mod api;
pub mod core;
pub mod data;
pub mod domain;
pub mod upstream;
pub mod utils;

pub use app::CoreApp;
