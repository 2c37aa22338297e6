//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Every section carries `#[serde(default)]`, so a partial `settings.toml`
//! only overrides the keys it names.
//!
//! Configuration values are immutable once a session starts.  Runtime
//! fallbacks (for example disabling video after the renderer failed to
//! start) produce a *new* [`FeatureFlags`] value instead of mutating the
//! shared one.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::AppPaths;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Rejected configuration values, reported by [`AppConfig::validate`].
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("conversation tick must be greater than zero")]
    ZeroTick,

    #[error("audio frame duration must be greater than zero")]
    ZeroAudioFrame,

    #[error("audio format must have a non-zero sample rate and channel count")]
    EmptyAudioFormat,

    #[error("video geometry must be non-zero (got {width}x{height} @ {fps} fps)")]
    EmptyVideoGeometry { width: u32, height: u32, fps: u32 },

    #[error("filler delay range is empty or unbounded: [{min}, {max}) seconds")]
    FillerRange { min: f64, max: f64 },

    #[error("initial filler delay must be a finite, non-negative number of seconds (got {0})")]
    InitialFillerDelay(f64),

    #[error("context budget must be greater than zero")]
    ZeroContextBudget,
}

// ---------------------------------------------------------------------------
// FeatureFlags
// ---------------------------------------------------------------------------

/// Coarse feature switches for a call session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    /// Replaces the default agent name in the prompt and welcome message.
    pub agent_name_override: Option<String>,
    /// Automatic language detection and per-language voices.  Not available
    /// in this build; the session turns it off with a warning.
    pub multi_language_support: bool,
    /// Skip the video renderer and camera pacer entirely.
    pub no_video: bool,
    /// Verbose logging of recognizer and session internals.
    pub debug_logging: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            agent_name_override: None,
            multi_language_support: false,
            no_video: false,
            debug_logging: true,
        }
    }
}

impl FeatureFlags {
    /// Copy of these flags with video disabled.
    pub fn without_video(&self) -> Self {
        Self {
            no_video: true,
            ..self.clone()
        }
    }

    /// Copy of these flags with multi-language support disabled.
    pub fn without_multi_language(&self) -> Self {
        Self {
            multi_language_support: false,
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// LlmConfig
// ---------------------------------------------------------------------------

/// Settings for the generation / embedding backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API (no trailing `/v1`).
    pub base_url: String,
    /// API key — `None` for local providers.
    pub api_key: Option<String>,
    /// Model used for chat completions.
    pub chat_model: String,
    /// Model used for embeddings.
    pub embedding_model: String,
    /// Sampling temperature (0.0 – 1.0).
    pub temperature: f32,
    /// Upper bound on generated tokens per response.
    pub max_tokens: u32,
    /// Maximum seconds to wait for any single backend call.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            api_key: None,
            chat_model: "qwen2.5:3b".into(),
            embedding_model: "nomic-embed-text".into(),
            temperature: 0.7,
            max_tokens: 256,
            timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// SpeechConfig
// ---------------------------------------------------------------------------

/// Settings for the text-to-speech endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Base URL of an OpenAI-compatible speech API.
    pub base_url: String,
    pub api_key: Option<String>,
    /// TTS model identifier (e.g. `"tts-1"`).
    pub model: String,
    /// Voice name sent to the API and embedded in SSML.
    pub voice: String,
    /// BCP-47 language tag used in SSML (e.g. `"en-US"`).
    pub language: String,
    pub timeout_secs: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".into(),
            api_key: None,
            model: "tts-1".into(),
            voice: "onyx".into(),
            language: "en-US".into(),
            timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Outbound audio format.  Synthesized speech is raw signed 16-bit
/// little-endian PCM in exactly this format.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Duration of one frame handed to the audio sink, in milliseconds.
    pub frame_ms: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 24_000,
            channels: 1,
            frame_ms: 20,
        }
    }
}

impl AudioConfig {
    /// Bytes in one sink frame (16-bit samples).
    pub fn frame_bytes(&self) -> usize {
        let samples = self.sample_rate as usize * self.frame_ms as usize / 1_000;
        samples * self.channels as usize * 2
    }

    pub fn frame_duration(&self) -> Duration {
        Duration::from_millis(u64::from(self.frame_ms))
    }

    /// Playback length of `bytes` of PCM in this format, in milliseconds.
    pub fn duration_ms(&self, bytes: usize) -> i32 {
        let bytes_per_sec = self.sample_rate as u64 * self.channels as u64 * 2;
        if bytes_per_sec == 0 {
            return 0;
        }
        let ms = bytes as u64 * 1_000 / bytes_per_sec;
        i32::try_from(ms).unwrap_or(i32::MAX)
    }
}

// ---------------------------------------------------------------------------
// VideoConfig
// ---------------------------------------------------------------------------

/// Outbound video geometry (BGRA, 4 bytes per pixel).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
            fps: 30,
        }
    }
}

impl VideoConfig {
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    pub fn frame_period(&self) -> Duration {
        Duration::from_secs(1) / self.fps.max(1)
    }
}

// ---------------------------------------------------------------------------
// ConversationConfig
// ---------------------------------------------------------------------------

/// Timing and budget knobs for the conversation orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Orchestrator tick period in milliseconds.
    pub tick_ms: u64,
    /// Character budget for the injected retrieved-context turn.
    pub context_budget_chars: usize,
    /// Upper bound on how long a knowledge query may hold up a response.
    pub knowledge_timeout_ms: u64,
    /// Trimmed partial transcripts longer than this interrupt playback.
    pub min_interrupt_chars: usize,
    /// Stall threshold before the first filler, in seconds.
    pub initial_filler_delay_secs: f64,
    /// Lower bound of the re-randomised stall threshold, in seconds.
    pub filler_delay_min_secs: f64,
    /// Exclusive upper bound of the re-randomised stall threshold.
    pub filler_delay_max_secs: f64,
    /// Fillers played before giving up on the outstanding request.
    pub max_fillers: u8,
    /// Where the agent claims to be, used in the system prompt.
    pub agent_location: String,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            context_budget_chars: 4_000,
            knowledge_timeout_ms: 3_000,
            min_interrupt_chars: 6,
            initial_filler_delay_secs: 4.0,
            filler_delay_min_secs: 4.0,
            filler_delay_max_secs: 7.0,
            max_fillers: 3,
            agent_location: "Melbourne, Australia".into(),
        }
    }
}

impl ConversationConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn knowledge_timeout(&self) -> Duration {
        Duration::from_millis(self.knowledge_timeout_ms)
    }

    /// Negative or NaN values clamp to zero, overflowing ones to
    /// `Duration::MAX`.
    pub fn initial_filler_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.initial_filler_delay_secs.max(0.0)).unwrap_or(Duration::MAX)
    }
}

// ---------------------------------------------------------------------------
// SkillsConfig
// ---------------------------------------------------------------------------

/// Settings for the built-in skills.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillsConfig {
    /// Register the `[LINKSEARCH]` skill.
    pub link_search_enabled: bool,
    /// Documentation search endpoint queried by `[LINKSEARCH]`.
    pub link_search_url: String,
}

impl Default for SkillsConfig {
    fn default() -> Self {
        Self {
            link_search_enabled: true,
            link_search_url: "https://learn.microsoft.com/api/search".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// CacheConfig
// ---------------------------------------------------------------------------

/// Phrase cache location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Overrides [`AppPaths::speech_cache_dir`] when set.
    pub dir: Option<PathBuf>,
}

impl CacheConfig {
    pub fn resolve_dir(&self) -> PathBuf {
        self.dir
            .clone()
            .unwrap_or_else(|| AppPaths::new().speech_cache_dir)
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use voice_call_agent::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub flags: FeatureFlags,
    pub llm: LlmConfig,
    pub speech: SpeechConfig,
    pub audio: AudioConfig,
    pub video: VideoConfig,
    pub conversation: ConversationConfig,
    pub skills: SkillsConfig,
    pub cache: CacheConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check the values the pacers and orchestrator cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let conv = &self.conversation;
        if conv.tick_ms == 0 {
            return Err(ConfigError::ZeroTick);
        }
        if conv.context_budget_chars == 0 {
            return Err(ConfigError::ZeroContextBudget);
        }
        if !(conv.initial_filler_delay_secs.is_finite() && conv.initial_filler_delay_secs >= 0.0) {
            return Err(ConfigError::InitialFillerDelay(conv.initial_filler_delay_secs));
        }
        if !(conv.filler_delay_min_secs >= 0.0
            && conv.filler_delay_min_secs < conv.filler_delay_max_secs
            && conv.filler_delay_max_secs.is_finite())
        {
            return Err(ConfigError::FillerRange {
                min: conv.filler_delay_min_secs,
                max: conv.filler_delay_max_secs,
            });
        }
        if self.audio.frame_ms == 0 {
            return Err(ConfigError::ZeroAudioFrame);
        }
        if self.audio.sample_rate == 0 || self.audio.channels == 0 {
            return Err(ConfigError::EmptyAudioFormat);
        }
        let v = self.video;
        if v.width == 0 || v.height == 0 || v.fps == 0 {
            return Err(ConfigError::EmptyVideoGeometry {
                width: v.width,
                height: v.height,
                fps: v.fps,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        assert_eq!(config.conversation.tick_ms, 100);
        assert_eq!(config.llm.chat_model, LlmConfig::default().chat_model);
    }

    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.conversation.context_budget_chars, 4_000);
        assert_eq!(cfg.conversation.min_interrupt_chars, 6);
        assert_eq!(cfg.conversation.max_fillers, 3);
        assert_eq!(cfg.audio.frame_ms, 20);
        assert_eq!(cfg.video.fps, 30);
        assert!(!cfg.flags.no_video);
        assert!(cfg.flags.agent_name_override.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn modified_values_survive_save_and_load() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("modified.toml");

        let mut cfg = AppConfig::default();
        cfg.flags.agent_name_override = Some("Ada".into());
        cfg.flags.no_video = true;
        cfg.llm.api_key = Some("sk-test".into());
        cfg.conversation.context_budget_chars = 1_234;
        cfg.cache.dir = Some(dir.path().join("phrases"));

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.flags.agent_name_override.as_deref(), Some("Ada"));
        assert!(loaded.flags.no_video);
        assert_eq!(loaded.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(loaded.conversation.context_budget_chars, 1_234);
        assert_eq!(loaded.cache.resolve_dir(), dir.path().join("phrases"));
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[conversation]\ntick_ms = 50\n").expect("write");

        let loaded = AppConfig::load_from(&path).expect("load");
        assert_eq!(loaded.conversation.tick_ms, 50);
        assert_eq!(loaded.conversation.context_budget_chars, 4_000);
        assert_eq!(loaded.audio, AudioConfig::default());
    }

    #[test]
    fn audio_frame_bytes_match_format() {
        let audio = AudioConfig::default();
        // 24 kHz * 20 ms = 480 samples * 2 bytes
        assert_eq!(audio.frame_bytes(), 960);
        assert_eq!(audio.duration_ms(48_000), 1_000);
    }

    #[test]
    fn video_frame_period_is_one_thirtieth() {
        let video = VideoConfig::default();
        assert_eq!(video.frame_bytes(), 640 * 360 * 4);
        assert_eq!(video.frame_period(), Duration::from_secs(1) / 30);
    }

    #[test]
    fn without_video_leaves_original_untouched() {
        let flags = FeatureFlags::default();
        let disabled = flags.without_video();
        assert!(disabled.no_video);
        assert!(!flags.no_video);
        assert_eq!(disabled.debug_logging, flags.debug_logging);
    }

    #[test]
    fn validate_rejects_inverted_filler_range() {
        let mut cfg = AppConfig::default();
        cfg.conversation.filler_delay_min_secs = 7.0;
        cfg.conversation.filler_delay_max_secs = 4.0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::FillerRange { .. })
        ));
    }

    #[test]
    fn validate_rejects_zero_tick_and_geometry() {
        let mut cfg = AppConfig::default();
        cfg.conversation.tick_ms = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroTick));

        let mut cfg = AppConfig::default();
        cfg.video.height = 0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::EmptyVideoGeometry { height: 0, .. })
        ));
    }

    #[test]
    fn validate_rejects_bad_initial_filler_delay() {
        for bad in [-1.0, f64::NAN, f64::INFINITY] {
            let mut cfg = AppConfig::default();
            cfg.conversation.initial_filler_delay_secs = bad;
            assert!(
                matches!(cfg.validate(), Err(ConfigError::InitialFillerDelay(_))),
                "{bad} accepted"
            );
        }
    }

    #[test]
    fn validate_rejects_unbounded_filler_range() {
        let mut cfg = AppConfig::default();
        cfg.conversation.filler_delay_max_secs = f64::INFINITY;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::FillerRange { .. })
        ));

        let parsed: AppConfig =
            toml::from_str("[conversation]\nfiller_delay_max_secs = inf\n").unwrap();
        assert!(parsed.validate().is_err());
    }

    #[test]
    fn initial_filler_delay_never_panics() {
        let mut conv = ConversationConfig::default();
        conv.initial_filler_delay_secs = -1.0;
        assert_eq!(conv.initial_filler_delay(), Duration::ZERO);
        conv.initial_filler_delay_secs = f64::INFINITY;
        assert_eq!(conv.initial_filler_delay(), Duration::MAX);
    }
}
