//! Shared infrastructure for FoundationKit services.

pub mod logging;
