pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod content;
pub mod logging;
pub mod sitemap;
pub mod state;
pub mod utils;
pub mod web;
