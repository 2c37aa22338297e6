//! Response-triggered skills.
//!
//! A generated response that starts with a skill's trigger (`"[NAME]"`,
//! matched case-insensitively) is handed to that skill instead of being
//! spoken.  Skills get a [`SkillContext`] to acknowledge out loud and to
//! post to the call chat.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::audio::{AudioBuffer, SpeechOutput};
use crate::call::{ChatError, ChatPoster};
use crate::speech::{SpeechError, Synthesizer};

pub mod link_search;

pub use link_search::LinkSearchSkill;

// ---------------------------------------------------------------------------
// SkillError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SkillError {
    #[error("skill speech failed: {0}")]
    Speech(#[from] SpeechError),

    #[error("skill chat post failed: {0}")]
    Chat(#[from] ChatError),

    #[error("skill request failed: {0}")]
    Request(String),

    #[error("skill request timed out")]
    Timeout,
}

impl From<reqwest::Error> for SkillError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SkillError::Timeout
        } else {
            SkillError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Skill trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Skill: Send + Sync {
    /// Upper-case identifier, e.g. `"LINKSEARCH"`.
    fn name(&self) -> &str;

    /// Completes the sentence `Respond with "[NAME]" ...` in the system
    /// prompt.
    fn description(&self) -> &str;

    fn trigger(&self) -> String {
        format!("[{}]", self.name())
    }

    /// Run the skill on the response text that followed the trigger.
    async fn invoke(&self, input: &str, ctx: &SkillContext) -> Result<(), SkillError>;
}

// ---------------------------------------------------------------------------
// SkillContext
// ---------------------------------------------------------------------------

/// What a skill may do while it runs: speak an acknowledgement and post to
/// the chat.
#[derive(Clone)]
pub struct SkillContext {
    audio: Arc<dyn SpeechOutput>,
    acknowledgement: AudioBuffer,
    synth: Arc<dyn Synthesizer>,
    chat: Arc<dyn ChatPoster>,
}

impl SkillContext {
    pub fn new(
        audio: Arc<dyn SpeechOutput>,
        acknowledgement: AudioBuffer,
        synth: Arc<dyn Synthesizer>,
        chat: Arc<dyn ChatPoster>,
    ) -> Self {
        Self {
            audio,
            acknowledgement,
            synth,
            chat,
        }
    }

    /// Speak over whatever is playing.  Empty `text` plays the cached
    /// acknowledgement phrase; anything else is synthesized first.
    pub async fn ack_speak(&self, text: &str) -> Result<(), SkillError> {
        if text.trim().is_empty() {
            self.audio.speak_now(self.acknowledgement.clone());
            return Ok(());
        }
        let spoken = self.synth.speak(text).await?;
        self.audio.speak_now(spoken.audio);
        Ok(())
    }

    pub async fn post_chat(&self, html: &str) -> Result<(), SkillError> {
        self.chat.post_html(html).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::speech::SynthesizedAudio;
    use std::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct RecordingOutput {
        pub spoken: Mutex<Vec<Vec<u8>>>,
    }

    impl SpeechOutput for RecordingOutput {
        fn speak_now(&self, buffer: AudioBuffer) {
            self.spoken.lock().unwrap().push(buffer.to_vec());
        }

        fn maybe_speak(&self, buffer: AudioBuffer) -> bool {
            self.speak_now(buffer);
            true
        }

        fn interrupt(&self) {}
    }

    pub(crate) struct EchoSynth;

    #[async_trait]
    impl Synthesizer for EchoSynth {
        async fn speak(&self, text: &str) -> Result<SynthesizedAudio, SpeechError> {
            Ok(SynthesizedAudio {
                audio: AudioBuffer::from(text.as_bytes()),
                duration_ms: 0,
            })
        }

        async fn speak_ssml(&self, ssml: &str) -> Result<SynthesizedAudio, SpeechError> {
            self.speak(ssml).await
        }
    }

    #[derive(Default)]
    pub(crate) struct RecordingChat {
        pub posts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatPoster for RecordingChat {
        async fn post_html(&self, html: &str) -> Result<(), ChatError> {
            self.posts.lock().unwrap().push(html.to_string());
            Ok(())
        }
    }

    pub(crate) fn context() -> (SkillContext, Arc<RecordingOutput>, Arc<RecordingChat>) {
        let output = Arc::new(RecordingOutput::default());
        let chat = Arc::new(RecordingChat::default());
        let ctx = SkillContext::new(
            output.clone(),
            AudioBuffer::from(&b"ack"[..]),
            Arc::new(EchoSynth),
            chat.clone(),
        );
        (ctx, output, chat)
    }

    struct Named;

    #[async_trait]
    impl Skill for Named {
        fn name(&self) -> &str {
            "WEATHER"
        }

        fn description(&self) -> &str {
            "when asked about the weather."
        }

        async fn invoke(&self, _input: &str, _ctx: &SkillContext) -> Result<(), SkillError> {
            Ok(())
        }
    }

    #[test]
    fn trigger_wraps_name_in_brackets() {
        assert_eq!(Named.trigger(), "[WEATHER]");
    }

    #[tokio::test]
    async fn empty_ack_plays_cached_phrase() {
        let (ctx, output, _chat) = context();
        ctx.ack_speak("").await.unwrap();
        assert_eq!(*output.spoken.lock().unwrap(), vec![b"ack".to_vec()]);
    }

    #[tokio::test]
    async fn text_ack_is_synthesized() {
        let (ctx, output, _chat) = context();
        ctx.ack_speak("on it").await.unwrap();
        assert_eq!(*output.spoken.lock().unwrap(), vec![b"on it".to_vec()]);
    }

    #[tokio::test]
    async fn post_chat_forwards_html() {
        let (ctx, _output, chat) = context();
        ctx.post_chat("<p>x</p>").await.unwrap();
        assert_eq!(*chat.posts.lock().unwrap(), vec!["<p>x</p>".to_string()]);
    }
}
