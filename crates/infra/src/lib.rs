//! Infrastructure layer: configuration, storage backends, schema bootstrap.

pub mod config;
pub mod schema;
pub mod store;

pub use config::{AdminAccount, AppConfig, ConfigError};
pub use store::{GroupStore, InMemoryStore, PostgresStore, UserStore};
