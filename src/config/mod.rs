//! Configuration module.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each subsystem,
//! `FeatureFlags`, `AppPaths` for cross-platform directories, and TOML
//! persistence via `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AppConfig, AudioConfig, CacheConfig, ConfigError, ConversationConfig, FeatureFlags,
    LlmConfig, SkillsConfig, SpeechConfig, VideoConfig,
};
