//! Runtime configuration: optional TOML file overlaid with environment
//! variables. Environment always wins.

pub mod schema;

pub use schema::{
    BackendKind, CaptureConfig, CaptureMode, Config, Credentials, DiscordConfig, GatewayConfig,
    LlmConfig, StorageConfig,
};
