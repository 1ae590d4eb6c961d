//! SQLite session persistence, the JSON map catalog, and TOML config for
//! the treasure-hunt engine.

pub mod config;
pub mod error;
pub mod maps;
pub mod schema;
pub mod store;

pub use config::{CONFIG_FILE, DATABASE_FILE, default_base_dir, load_config};
pub use error::{Result, StoreError};
pub use maps::MapCatalog;
pub use store::Store;
