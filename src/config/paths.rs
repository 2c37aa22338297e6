//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Windows: %APPDATA%\voice-call-agent\
//!   macOS:   ~/Library/Application Support/voice-call-agent/
//!   Linux:   ~/.config/voice-call-agent/
//!
//! Cache dir (pre-synthesized phrases):
//!   Windows: %LOCALAPPDATA%\voice-call-agent\speech-cache\
//!   macOS:   ~/Library/Caches/voice-call-agent/speech-cache/
//!   Linux:   ~/.cache/voice-call-agent/speech-cache/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Directory holding `<hash>.cache` phrase files.
    pub speech_cache_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "voice-call-agent";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let cache_root = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        Self {
            settings_file: config_dir.join("settings.toml"),
            speech_cache_dir: cache_root.join("speech-cache"),
            config_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
