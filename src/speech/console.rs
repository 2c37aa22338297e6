//! Console stand-in for a streaming recognizer: every line typed on stdin
//! is delivered as one partial hypothesis followed by the final transcript.
//!
//! # Shutdown caveat
//!
//! Reading stdin blocks with no way to interrupt it.  Stopping sets a flag
//! so later lines are ignored, but the reader thread stays parked in
//! `read_line` until the next line or EOF.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::recognizer::{RecognitionHandler, Recognizer};
use super::synth::SpeechError;

#[derive(Default)]
pub struct ConsoleRecognizer {
    stop: Mutex<Option<Arc<AtomicBool>>>,
}

impl ConsoleRecognizer {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Deliver one input line to `handler`.  Blank lines produce nothing.
fn deliver(handler: &dyn RecognitionHandler, line: &str) {
    let text = line.trim();
    if text.is_empty() {
        return;
    }
    handler.on_partial(text);
    handler.on_final(text);
}

#[async_trait]
impl Recognizer for ConsoleRecognizer {
    async fn start_continuous(
        &self,
        handler: Arc<dyn RecognitionHandler>,
    ) -> Result<(), SpeechError> {
        let mut slot = self.stop.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            return Err(SpeechError::Recognizer("already listening".into()));
        }
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = Arc::clone(&stop);

        std::thread::Builder::new()
            .name("console-recognizer".into())
            .spawn(move || {
                let stdin = std::io::stdin();
                let mut lines = stdin.lock();
                let mut line = String::new();
                loop {
                    line.clear();
                    match lines.read_line(&mut line) {
                        Ok(0) => {
                            log::info!("console-recognizer: end of input");
                            break;
                        }
                        Ok(_) => {
                            if stop_clone.load(Ordering::Relaxed) {
                                break;
                            }
                            deliver(handler.as_ref(), &line);
                        }
                        Err(e) => {
                            log::warn!("console-recognizer: read failed: {e}");
                            break;
                        }
                    }
                }
            })
            .map_err(|e| SpeechError::Recognizer(e.to_string()))?;

        *slot = Some(stop);
        log::info!("console-recognizer: type a line and press enter to speak");
        Ok(())
    }

    async fn stop_continuous(&self) -> Result<(), SpeechError> {
        let stop = self.stop.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(stop) = stop {
            stop.store(true, Ordering::Relaxed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl RecognitionHandler for Recorder {
        fn on_partial(&self, text: &str) {
            self.events.lock().unwrap().push(format!("partial:{text}"));
        }

        fn on_final(&self, text: &str) {
            self.events.lock().unwrap().push(format!("final:{text}"));
        }
    }

    #[test]
    fn line_becomes_partial_then_final() {
        let recorder = Recorder::default();
        deliver(&recorder, "  tell me a joke\n");
        assert_eq!(
            *recorder.events.lock().unwrap(),
            vec!["partial:tell me a joke", "final:tell me a joke"]
        );
    }

    #[test]
    fn blank_line_is_ignored() {
        let recorder = Recorder::default();
        deliver(&recorder, "   \n");
        assert!(recorder.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn stop_without_start_is_ok() {
        let recognizer = ConsoleRecognizer::new();
        recognizer.stop_continuous().await.unwrap();
    }
}
