pub mod access_config;

pub use access_config::{
    default_config_path, AccessConfig, AuditConfig, ConfigSource, CONFIG_ENV_VAR,
    CONFIG_FILE_NAME, CONFIG_VERSION,
};
