//! Utility functions for the application

pub mod retry;
pub mod sse;
pub mod terminal;
pub mod time;
