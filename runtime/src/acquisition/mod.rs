//! HTTP acquisition: resilient transport, CMS credentials, cached fetches.

pub mod auth;
pub mod fetcher;
pub mod http_client;
