//! Speech in and out: synthesis, the canned phrase cache, and the bridge
//! from recognizer callbacks to the conversation loop.
//!
//! * [`Synthesizer`] / [`ApiSynthesizer`] — text or SSML → raw PCM.
//! * [`PhraseCache`] — fillers, greeting, goodbye, apology and
//!   acknowledgement, synthesized once and persisted on disk.
//! * [`Recognizer`] / [`RecognitionHandler`] — streaming speech-to-text seam.
//! * [`RecognitionEventBridge`] — partial text interrupts the agent, final
//!   text becomes an [`Utterance`].
//! * [`ConsoleRecognizer`] — stdin lines as recognized speech.

pub mod bridge;
pub mod cache;
pub mod console;
pub mod recognizer;
pub mod synth;

pub use bridge::{InterruptFlag, RecognitionEventBridge, Utterance};
pub use cache::{cache_key, CacheError, CachedPhrase, PhraseCache};
pub use console::ConsoleRecognizer;
pub use recognizer::{RecognitionHandler, Recognizer};
pub use synth::{strip_markup, ApiSynthesizer, SpeechError, SynthesizedAudio, Synthesizer};
