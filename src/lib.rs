//! SweetSync Library
//!
//! Blood sugar readings, per-user storage and chart analytics.

pub mod analytics;
pub mod build_info;
pub mod cache;
pub mod config;
pub mod db;
pub mod mcp;
pub mod models;
pub mod repository;
pub mod service;
pub mod tools;
