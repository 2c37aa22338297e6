//! Speech-to-text seam.
//!
//! Recognizers push partial and final transcripts into a
//! [`RecognitionHandler`] from whatever thread they run on.  Handlers must
//! return quickly and never wait on the conversation loop.

use std::sync::Arc;

use async_trait::async_trait;

use super::synth::SpeechError;

/// Callbacks invoked by a running recognizer.
pub trait RecognitionHandler: Send + Sync {
    /// Hypothesis for the utterance in progress.  May be called many times.
    fn on_partial(&self, text: &str);

    /// The finished utterance.
    fn on_final(&self, text: &str);
}

#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Begin continuous recognition, delivering events to `handler` until
    /// [`stop_continuous`](Self::stop_continuous).
    async fn start_continuous(&self, handler: Arc<dyn RecognitionHandler>)
        -> Result<(), SpeechError>;

    async fn stop_continuous(&self) -> Result<(), SpeechError>;
}
