//! Rate-aware Twitter API client core: durable credentials, per-endpoint
//! quota accounting, and guarded invocation that waits out exhausted
//! windows instead of failing.

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod error;
pub mod guard;
pub mod http;
pub mod quota;
