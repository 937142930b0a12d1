//! Source adapters and the URL handling shared by them.

pub mod cms_api;
pub mod manual;
pub mod normalize;
pub mod rate_limiter;
pub mod sitemap;
pub mod text;
