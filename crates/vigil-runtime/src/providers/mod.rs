//! Service provider implementations for poll-only sources.

mod http;

pub use http::HttpServiceProvider;
