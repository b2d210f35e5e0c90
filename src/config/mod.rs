mod loader;
mod types;

pub use loader::{default_config_path, load_config, validate_config};
pub use types::*;
