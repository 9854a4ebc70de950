//! Bootstrap module for initializing the `SourceTV` server
//!
//! This module handles:
//! - Configuration loading
//! - Service initialization and dependency injection
//! - Provider registration (config definitions, plugin directory discovery)

pub mod config;
pub mod services;

pub use config::{load_config, log_config_summary};
pub use services::{init_services, register_providers, Services};
