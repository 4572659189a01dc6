//! Engine configuration: types, loading and save-time validation

mod loader;
mod types;

pub use loader::{load_config, parse_toml};
pub use types::{EngineConfig, EngineSettings};
