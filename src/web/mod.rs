//! HTTP surface: sitemap files, admin listing, robots, and health.

pub mod admin;
pub mod auth;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod sitemap;
pub mod status;

pub use routes::*;
