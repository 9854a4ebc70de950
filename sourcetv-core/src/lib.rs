pub mod models;
pub mod service;
pub mod cache;
pub mod provider;
pub mod proxy;
pub mod metadata;
pub mod config;
pub mod error;
pub mod logging;
pub mod bootstrap;

pub use config::Config;
pub use error::{Error, Result};
pub use cache::KeyBuilder;
