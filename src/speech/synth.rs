//! Text-to-speech: the [`Synthesizer`] seam and an OpenAI-compatible HTTP
//! implementation.
//!
//! Synthesized audio is always raw signed 16-bit little-endian PCM in the
//! configured [`AudioConfig`] format, ready to be handed to the audio pacer
//! without further conversion.

use async_trait::async_trait;
use thiserror::Error;

use crate::audio::AudioBuffer;
use crate::config::{AudioConfig, SpeechConfig};

// ---------------------------------------------------------------------------
// SpeechError
// ---------------------------------------------------------------------------

/// Errors from synthesis and recognition collaborators.
#[derive(Debug, Error)]
pub enum SpeechError {
    /// HTTP transport or connection error.
    #[error("speech request failed: {0}")]
    Request(String),

    #[error("speech request timed out")]
    Timeout,

    /// The endpoint answered with a non-success status.
    #[error("speech endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("synthesizer returned no audio")]
    EmptyAudio,

    /// The recognizer could not be started or stopped.
    #[error("recognizer failed: {0}")]
    Recognizer(String),
}

impl From<reqwest::Error> for SpeechError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SpeechError::Timeout
        } else {
            SpeechError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Synthesizer trait
// ---------------------------------------------------------------------------

/// Result of one synthesis call.
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub audio: AudioBuffer,
    pub duration_ms: i32,
}

#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize plain text.
    async fn speak(&self, text: &str) -> Result<SynthesizedAudio, SpeechError>;

    /// Synthesize an SSML document.
    async fn speak_ssml(&self, ssml: &str) -> Result<SynthesizedAudio, SpeechError>;
}

// ---------------------------------------------------------------------------
// ApiSynthesizer
// ---------------------------------------------------------------------------

/// Calls an OpenAI-compatible `/v1/audio/speech` endpoint with
/// `response_format = "pcm"`.
///
/// The endpoint has no SSML support, so [`speak_ssml`](Synthesizer::speak_ssml)
/// reduces the document to its text first.
pub struct ApiSynthesizer {
    client: reqwest::Client,
    config: SpeechConfig,
    format: AudioConfig,
}

impl ApiSynthesizer {
    pub fn from_config(config: &SpeechConfig, format: AudioConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
            format,
        }
    }
}

#[async_trait]
impl Synthesizer for ApiSynthesizer {
    async fn speak(&self, text: &str) -> Result<SynthesizedAudio, SpeechError> {
        let url = format!("{}/v1/audio/speech", self.config.base_url);
        let body = serde_json::json!({
            "model":           self.config.model,
            "voice":           self.config.voice,
            "input":           text,
            "response_format": "pcm"
        });

        let mut req = self.client.post(&url).json(&body);
        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SpeechError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(SpeechError::EmptyAudio);
        }
        log::debug!("synth: {} bytes for {:?}", bytes.len(), text);

        Ok(SynthesizedAudio {
            duration_ms: self.format.duration_ms(bytes.len()),
            audio: AudioBuffer::from(bytes.as_ref()),
        })
    }

    async fn speak_ssml(&self, ssml: &str) -> Result<SynthesizedAudio, SpeechError> {
        self.speak(&strip_markup(ssml)).await
    }
}

// ---------------------------------------------------------------------------
// strip_markup
// ---------------------------------------------------------------------------

/// Reduce an SSML / XML fragment to its text content.
///
/// Tags are removed, the five predefined XML entities are decoded and runs
/// of whitespace collapse to a single space.
pub fn strip_markup(markup: &str) -> String {
    let mut text = String::with_capacity(markup.len());
    let mut in_tag = false;
    for c in markup.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                text.push(' ');
            }
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    let decoded = text
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&");

    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
