//! HTTP clients for the document store, retrieval, drafting, critique,
//! and upload services.

pub mod client;
pub mod config;

pub use client::ApiClient;
pub use config::HttpConfig;
