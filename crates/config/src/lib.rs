pub mod loader;
pub mod schema;

pub use {
    loader::{CONFIG_DIR_ENV, ConfigStore, config_dir},
    schema::{
        DEFAULT_REDIRECT_PATH, DEFAULT_REDIRECT_PORT, FlowKind, StoryConfig,
        serialize_option_secret,
    },
};
