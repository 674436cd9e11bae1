//! Run options and task configuration
//!
//! [`Options`] describes one run. Task configuration maps glob patterns to
//! [`CommandSpec`]s and is read from `.stagegaterc*` / `stagegate.toml`
//! files, possibly several per repository.

pub mod command;
pub mod groups;
pub mod loader;
pub mod options;

pub use command::{CommandMap, CommandSpec, DynamicCommand};
pub use groups::{group_files, ConfigGroup, LoadedConfig};
pub use loader::{
    discover_config_files, load_config_file, parse_config, search_ancestors, search_configs,
    ConfigError, CONFIG_FILE_NAMES,
};
pub use options::{Concurrency, Options};
