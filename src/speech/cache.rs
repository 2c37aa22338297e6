//! Content-addressed store of pre-synthesized canned phrases.
//!
//! Each phrase is stored as `<sha256-hex of the text>.cache` in the cache
//! directory, using a small fixed little-endian layout:
//!
//! ```text
//! offset 0  [0x80 0x90 0x11]     magic
//! offset 3  i32 LE               duration in milliseconds
//! offset 7  ...                  raw PCM payload
//! ```
//!
//! The cache is built once at startup and is immutable afterwards.  A
//! missing or malformed file is a miss and is re-synthesized; failing to
//! synthesize or to write the cache directory aborts startup.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rand::Rng;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::audio::AudioBuffer;

use super::synth::{SpeechError, Synthesizer};

pub const CACHE_MAGIC: [u8; 3] = [0x80, 0x90, 0x11];
const HEADER_LEN: usize = 7;

// ---------------------------------------------------------------------------
// Canned phrases
// ---------------------------------------------------------------------------

pub const FILLER_HMM: &str = "hmm";
pub const FILLER_UM: &str = "um";
pub const GET_BACK_TO_YOU: &str = "I'll have to get back to you on that.";
pub const GOODBYE: &str = "Have a great day.";
pub const GREETING: &str = "Hi there, how can I help?";
pub const ACKNOWLEDGE_CHAT: &str = "Sure, let me put that in the chat.";

const PHRASES: [&str; 6] = [
    FILLER_HMM,
    FILLER_UM,
    GET_BACK_TO_YOU,
    GOODBYE,
    GREETING,
    ACKNOWLEDGE_CHAT,
];

// ---------------------------------------------------------------------------
// CacheError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to synthesize {phrase:?}: {source}")]
    Synthesis {
        phrase: String,
        #[source]
        source: SpeechError,
    },

    #[error("bad cache magic")]
    BadMagic,

    #[error("cache file truncated ({len} bytes)")]
    Truncated { len: usize },

    /// A phrase outside the built-in set was requested.
    #[error("phrase not cached: {0:?}")]
    Unknown(String),
}

// ---------------------------------------------------------------------------
// CachedPhrase
// ---------------------------------------------------------------------------

/// One pre-synthesized phrase.
#[derive(Debug, Clone)]
pub struct CachedPhrase {
    pub key: String,
    pub audio: AudioBuffer,
    pub duration_ms: i32,
}

impl CachedPhrase {
    /// Serialise to the on-disk layout.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.audio.len());
        out.extend_from_slice(&CACHE_MAGIC);
        out.extend_from_slice(&self.duration_ms.to_le_bytes());
        out.extend_from_slice(&self.audio);
        out
    }

    /// Parse the on-disk layout.  A file without any payload is treated as
    /// truncated.
    pub fn decode(key: &str, bytes: &[u8]) -> Result<Self, CacheError> {
        if bytes.len() <= HEADER_LEN {
            return Err(CacheError::Truncated { len: bytes.len() });
        }
        if bytes[..3] != CACHE_MAGIC {
            return Err(CacheError::BadMagic);
        }
        let duration_ms = i32::from_le_bytes([bytes[3], bytes[4], bytes[5], bytes[6]]);
        Ok(Self {
            key: key.to_string(),
            audio: AudioBuffer::from(&bytes[HEADER_LEN..]),
            duration_ms,
        })
    }
}

/// Content hash of `text`, used as the cache key and file stem.
pub fn cache_key(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

// ---------------------------------------------------------------------------
// PhraseCache
// ---------------------------------------------------------------------------

/// The canned phrases, keyed by their text.
#[derive(Debug, Clone)]
pub struct PhraseCache {
    phrases: HashMap<&'static str, CachedPhrase>,
}

impl PhraseCache {
    /// Load every canned phrase from `dir`, synthesizing and persisting the
    /// ones that are missing or unreadable.
    ///
    /// Phrases are processed one after another.
    pub async fn build(dir: &Path, synth: &dyn Synthesizer) -> Result<Self, CacheError> {
        std::fs::create_dir_all(dir).map_err(|source| CacheError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut phrases = HashMap::with_capacity(PHRASES.len());
        for text in PHRASES {
            let phrase = load_or_synthesize(dir, text, synth).await?;
            phrases.insert(text, phrase);
        }
        Ok(Self { phrases })
    }

    /// Look up one of the built-in phrases by its text.
    pub fn get(&self, text: &str) -> Result<&CachedPhrase, CacheError> {
        self.phrases
            .get(text)
            .ok_or_else(|| CacheError::Unknown(text.to_string()))
    }

    /// "hmm" or "um", uniformly at random.
    pub fn random_filler(&self) -> Option<&CachedPhrase> {
        let pick = if rand::thread_rng().gen_bool(0.5) {
            FILLER_HMM
        } else {
            FILLER_UM
        };
        self.phrases.get(pick)
    }

    pub fn get_back_to_you(&self) -> Option<&CachedPhrase> {
        self.phrases.get(GET_BACK_TO_YOU)
    }

    pub fn goodbye(&self) -> Option<&CachedPhrase> {
        self.phrases.get(GOODBYE)
    }

    pub fn greeting(&self) -> Option<&CachedPhrase> {
        self.phrases.get(GREETING)
    }

    pub fn acknowledge_chat(&self) -> Option<&CachedPhrase> {
        self.phrases.get(ACKNOWLEDGE_CHAT)
    }

    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }
}

async fn load_or_synthesize(
    dir: &Path,
    text: &str,
    synth: &dyn Synthesizer,
) -> Result<CachedPhrase, CacheError> {
    let key = cache_key(text);
    let path = dir.join(format!("{key}.cache"));

    match std::fs::read(&path) {
        Ok(bytes) => match CachedPhrase::decode(&key, &bytes) {
            Ok(phrase) => {
                log::info!("phrase-cache: hit {text:?}");
                return Ok(phrase);
            }
            Err(e) => log::warn!("phrase-cache: discarding {}: {e}", path.display()),
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("phrase-cache: cannot read {}: {e}", path.display()),
    }

    log::info!("phrase-cache: miss {text:?}, synthesizing");
    let synthesized = synth
        .speak(text)
        .await
        .map_err(|source| CacheError::Synthesis {
            phrase: text.to_string(),
            source,
        })?;

    let phrase = CachedPhrase {
        key,
        audio: synthesized.audio,
        duration_ms: synthesized.duration_ms,
    };
    std::fs::write(&path, phrase.encode()).map_err(|source| CacheError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(phrase)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
