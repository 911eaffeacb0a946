pub mod api;
pub mod app;
pub mod config;
pub mod microservice;
pub mod reconcile;
pub mod registry;

mod error;

pub use self::config::ConfigError;
pub use self::config::OperatorConfig;
pub use self::error::ReconcileError;
pub use self::registry::ControllerRegistry;
