//! One call, from joining to hanging up.
//!
//! # Sequence
//!
//! ```text
//! sanitise flags ─▶ build phrase cache ─▶ warm up backend
//!   ─▶ start audio pacer ─▶ start video pacer (optional, falls back to audio only)
//!   ─▶ start recognizer ─▶ greet (background) ─▶ orchestrator.run
//!   ─▶ goodbye ─▶ stop audio pacer ─▶ stop video pacer
//! ```
//!
//! Pacers are always stopped before [`CallSession::run`] returns, whether the
//! conversation ended normally or something after their start failed.

use std::sync::Arc;

use thiserror::Error;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::audio::{AudioBuffer, AudioOutputPacer, PacerError, SpeechOutput};
use crate::config::{AppConfig, FeatureFlags};
use crate::conversation::{Collaborators, ConversationEnd, ConversationOrchestrator};
use crate::knowledge::KnowledgeSource;
use crate::llm::{ChatBackend, LlmError, Personality};
use crate::media::MediaSink;
use crate::skills::{Skill, SkillContext};
use crate::speech::cache::{ACKNOWLEDGE_CHAT, GOODBYE, GREETING};
use crate::speech::{
    CacheError, InterruptFlag, PhraseCache, RecognitionEventBridge, Recognizer, SpeechError,
    Synthesizer,
};
use crate::video::{RendererLink, VideoOutputPacer, VideoRenderer};

use super::chat::ChatPoster;

/// Pause between joining and fading the avatar in.
const GREETING_DELAY: Duration = Duration::from_millis(1_500);
/// Pause between the welcome chat message and the spoken greeting.
const GREETING_SPEECH_DELAY: Duration = Duration::from_millis(500);
/// Pause between the goodbye phrase starting and the avatar fading out.
const GOODBYE_FADE_DELAY: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// SessionError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("phrase cache unavailable: {0}")]
    Cache(#[from] CacheError),

    #[error("audio output failed to start: {0}")]
    Audio(#[source] PacerError),

    #[error("recognizer failed: {0}")]
    Recognizer(#[from] SpeechError),
}

// ---------------------------------------------------------------------------
// CallServices
// ---------------------------------------------------------------------------

/// The outside world a call is wired to.
pub struct CallServices {
    pub backend: Arc<dyn ChatBackend>,
    pub synth: Arc<dyn Synthesizer>,
    pub recognizer: Arc<dyn Recognizer>,
    pub chat: Arc<dyn ChatPoster>,
    pub renderer: Arc<dyn VideoRenderer>,
    pub audio_sink: Arc<dyn MediaSink>,
    pub video_sink: Arc<dyn MediaSink>,
    pub knowledge: Vec<Arc<dyn KnowledgeSource>>,
    pub skills: Vec<Arc<dyn Skill>>,
}

// ---------------------------------------------------------------------------
// CallSession
// ---------------------------------------------------------------------------

pub struct CallSession {
    config: AppConfig,
    services: CallServices,
}

impl CallSession {
    pub fn new(config: AppConfig, services: CallServices) -> Self {
        Self { config, services }
    }

    /// Run the call until the agent is asked to leave or `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) -> Result<ConversationEnd, SessionError> {
        let CallSession { config, services } = self;
        let mut flags = sanitize_flags(&config.flags);

        let cache_dir = config.cache.resolve_dir();
        log::info!("session: loading phrase cache from {}", cache_dir.display());
        let phrases = Arc::new(PhraseCache::build(&cache_dir, services.synth.as_ref()).await?);
        let acknowledgement = phrases.get(ACKNOWLEDGE_CHAT)?.audio.clone();

        match services.backend.warm_up(&cancel).await {
            Ok(()) => log::info!("session: backend warmed up"),
            Err(LlmError::Cancelled) => return Ok(ConversationEnd::Cancelled),
            Err(e) => log::warn!("session: backend warm-up failed: {e}"),
        }

        let audio = Arc::new(AudioOutputPacer::new(config.audio));
        audio
            .start(Arc::clone(&services.audio_sink))
            .map_err(SessionError::Audio)?;

        let mut video = None;
        if !flags.no_video {
            let pacer = VideoOutputPacer::new(config.video, Arc::clone(&services.renderer));
            match pacer.start(Arc::clone(&services.video_sink)).await {
                Ok(()) => {
                    audio.subscribe(Arc::new(RendererLink::new(Arc::clone(&services.renderer))));
                    video = Some(pacer);
                }
                Err(e) => {
                    log::warn!("session: video failed to start, continuing with audio only: {e}");
                    flags = flags.without_video();
                }
            }
        }
        let renderer = video.as_ref().map(|_| Arc::clone(&services.renderer));

        let outcome = converse(
            &config,
            &flags,
            &services,
            phrases,
            acknowledgement,
            Arc::clone(&audio),
            renderer,
            cancel,
        )
        .await;

        audio.stop().await;
        if let Some(video) = video {
            video.stop().await;
        }
        log::info!("session: ended");
        outcome
    }
}

/// Everything between the pacers starting and stopping.
#[allow(clippy::too_many_arguments)]
async fn converse(
    config: &AppConfig,
    flags: &FeatureFlags,
    services: &CallServices,
    phrases: Arc<PhraseCache>,
    acknowledgement: AudioBuffer,
    audio: Arc<AudioOutputPacer>,
    renderer: Option<Arc<dyn VideoRenderer>>,
    cancel: CancellationToken,
) -> Result<ConversationEnd, SessionError> {
    let summaries: Vec<(&str, &str)> = services
        .skills
        .iter()
        .map(|s| (s.name(), s.description()))
        .collect();
    let personality = Arc::new(Personality::new(
        &summaries,
        flags,
        &config.conversation.agent_location,
        &config.speech.voice,
    ));
    log::info!("session: joining as {}", personality.name());

    let output: Arc<dyn SpeechOutput> = audio;
    let interrupt = InterruptFlag::new();
    let (bridge, utterances) = RecognitionEventBridge::new(
        Arc::clone(&output),
        interrupt.clone(),
        config.conversation.min_interrupt_chars,
    );
    let greeting_audio = phrases.get(GREETING)?.audio.clone();
    let goodbye = phrases.get(GOODBYE)?.clone();
    services.recognizer.start_continuous(Arc::new(bridge)).await?;

    let greeting = tokio::spawn(greet(
        renderer.clone(),
        Arc::clone(&services.chat),
        personality.welcome_message().to_string(),
        Arc::clone(&output),
        greeting_audio,
    ));

    let parts = Collaborators {
        backend: Arc::clone(&services.backend),
        synth: Arc::clone(&services.synth),
        audio: Arc::clone(&output),
        phrases: Arc::clone(&phrases),
        personality,
        knowledge: services.knowledge.clone(),
        skills: services.skills.clone(),
        skill_context: SkillContext::new(
            Arc::clone(&output),
            acknowledgement,
            Arc::clone(&services.synth),
            Arc::clone(&services.chat),
        ),
    };
    let mut orchestrator =
        ConversationOrchestrator::new(&config.conversation, parts, utterances, interrupt);
    let end = orchestrator.run(cancel).await;

    if !greeting.is_finished() {
        greeting.abort();
    }
    if let Err(e) = services.recognizer.stop_continuous().await {
        log::warn!("session: recognizer did not stop cleanly: {e}");
    }

    if end == ConversationEnd::ExitRequested {
        log::info!("session: saying goodbye");
        output.speak_now(goodbye.audio.clone());
        tokio::time::sleep(GOODBYE_FADE_DELAY).await;
        if let Some(renderer) = &renderer {
            renderer.fade_out();
        }
        let remaining = u64::try_from(goodbye.duration_ms).unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(remaining)).await;
    }
    Ok(end)
}

async fn greet(
    renderer: Option<Arc<dyn VideoRenderer>>,
    chat: Arc<dyn ChatPoster>,
    welcome: String,
    output: Arc<dyn SpeechOutput>,
    greeting: AudioBuffer,
) {
    tokio::time::sleep(GREETING_DELAY).await;
    if let Some(renderer) = &renderer {
        renderer.fade_in();
    }

    let post = async {
        if let Err(e) = chat.post_html(&welcome).await {
            log::warn!("session: welcome message not posted: {e}");
        }
    };
    tokio::join!(post, tokio::time::sleep(GREETING_SPEECH_DELAY));

    output.speak_now(greeting);
    log::info!("session: greeted");
}

/// Turn off features this build cannot honour.
fn sanitize_flags(flags: &FeatureFlags) -> FeatureFlags {
    if flags.multi_language_support {
        log::warn!("session: multi-language support is not available, disabling it");
        flags.without_multi_language()
    } else {
        flags.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::ChatError;
    use crate::config::CacheConfig;
    use crate::llm::Turn;
    use crate::media::{FrameBuffer, NullSink};
    use crate::speech::{RecognitionHandler, SynthesizedAudio};
    use crate::video::RenderError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct ReplyBackend {
        reply: &'static str,
    }

    #[async_trait]
    impl ChatBackend for ReplyBackend {
        async fn complete_chat(
            &self,
            _history: &[Turn],
            _cancel: &CancellationToken,
        ) -> Result<Turn, LlmError> {
            Ok(Turn::assistant(self.reply))
        }

        async fn embed(&self, _text: &str, _cancel: &CancellationToken) -> Result<Vec<f32>, LlmError> {
            Ok(Vec::new())
        }

        async fn warm_up(&self, _cancel: &CancellationToken) -> Result<(), LlmError> {
            Ok(())
        }
    }

    struct TextSynth;

    #[async_trait]
    impl Synthesizer for TextSynth {
        async fn speak(&self, text: &str) -> Result<SynthesizedAudio, SpeechError> {
            Ok(SynthesizedAudio {
                audio: AudioBuffer::from(text.as_bytes()),
                duration_ms: 100,
            })
        }

        async fn speak_ssml(&self, ssml: &str) -> Result<SynthesizedAudio, SpeechError> {
            self.speak(ssml).await
        }
    }

    /// Says `line` once, three seconds after starting.
    struct ScriptedRecognizer {
        line: &'static str,
        stopped: AtomicBool,
    }

    #[async_trait]
    impl Recognizer for ScriptedRecognizer {
        async fn start_continuous(
            &self,
            handler: Arc<dyn RecognitionHandler>,
        ) -> Result<(), SpeechError> {
            let line = self.line;
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(3)).await;
                handler.on_partial(line);
                handler.on_final(line);
            });
            Ok(())
        }

        async fn stop_continuous(&self) -> Result<(), SpeechError> {
            self.stopped.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingChat {
        posts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatPoster for RecordingChat {
        async fn post_html(&self, html: &str) -> Result<(), ChatError> {
            self.posts.lock().unwrap().push(html.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct FadeRenderer {
        fail_init: bool,
        fade_ins: AtomicUsize,
        fade_outs: AtomicUsize,
    }

    impl VideoRenderer for FadeRenderer {
        fn init(&self, width: u32, height: u32) -> Result<(), RenderError> {
            if self.fail_init {
                Err(RenderError::InvalidSize { width, height })
            } else {
                Ok(())
            }
        }

        fn render(&self, _frame: &mut FrameBuffer) {}

        fn dispose(&self) {}

        fn fade_in(&self) {
            self.fade_ins.fetch_add(1, Ordering::SeqCst);
        }

        fn fade_out(&self) {
            self.fade_outs.fetch_add(1, Ordering::SeqCst);
        }

        fn set_active(&self, _active: bool) {}

        fn set_amplitude(&self, _amplitude: f32) {}
    }

    struct Fixture {
        config: AppConfig,
        recognizer: Arc<ScriptedRecognizer>,
        chat: Arc<RecordingChat>,
        renderer: Arc<FadeRenderer>,
        audio_sink: Arc<NullSink>,
        dir: TempDir,
    }

    impl Fixture {
        fn new(reply_line: &'static str, fail_video: bool) -> Self {
            let dir = TempDir::new().unwrap();
            let config = AppConfig {
                cache: CacheConfig {
                    dir: Some(dir.path().join("speech")),
                },
                ..AppConfig::default()
            };
            Self {
                config,
                recognizer: Arc::new(ScriptedRecognizer {
                    line: reply_line,
                    stopped: AtomicBool::new(false),
                }),
                chat: Arc::new(RecordingChat::default()),
                renderer: Arc::new(FadeRenderer {
                    fail_init: fail_video,
                    ..FadeRenderer::default()
                }),
                audio_sink: Arc::new(NullSink::new()),
                dir,
            }
        }

        fn session(&self, reply: &'static str) -> CallSession {
            CallSession::new(
                self.config.clone(),
                CallServices {
                    backend: Arc::new(ReplyBackend { reply }),
                    synth: Arc::new(TextSynth),
                    recognizer: self.recognizer.clone(),
                    chat: self.chat.clone(),
                    renderer: self.renderer.clone(),
                    audio_sink: self.audio_sink.clone(),
                    video_sink: Arc::new(NullSink::new()),
                    knowledge: Vec::new(),
                    skills: Vec::new(),
                },
            )
        }
    }

    #[tokio::test]
    async fn full_call_greets_then_leaves_on_exit() {
        let fx = Fixture::new("please leave now", false);
        let cancel = CancellationToken::new();
        let watchdog = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(20)).await;
            watchdog.cancel();
        });

        let end = fx.session("[EXIT]").run(cancel).await.unwrap();

        assert_eq!(end, ConversationEnd::ExitRequested);
        assert!(fx.recognizer.stopped.load(Ordering::SeqCst));
        assert_eq!(fx.renderer.fade_ins.load(Ordering::SeqCst), 1);
        assert_eq!(fx.renderer.fade_outs.load(Ordering::SeqCst), 1);
        let posts = fx.chat.posts.lock().unwrap();
        assert_eq!(posts.len(), 1);
        assert!(posts[0].contains("I'm ScottAI"));
        // Greeting and goodbye both reached the audio sink.
        assert!(fx.audio_sink.frames() >= 2);
    }

    #[tokio::test]
    async fn video_failure_falls_back_to_audio_only() {
        let fx = Fixture::new("", true);
        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2_500)).await;
            stopper.cancel();
        });

        let end = fx.session("[LISTENING]").run(cancel).await.unwrap();

        assert_eq!(end, ConversationEnd::Cancelled);
        assert_eq!(fx.renderer.fade_ins.load(Ordering::SeqCst), 0);
        assert_eq!(fx.chat.posts.lock().unwrap().len(), 1);
        assert!(fx.audio_sink.frames() >= 1);
    }

    #[tokio::test]
    async fn unusable_cache_dir_aborts_startup() {
        let mut fx = Fixture::new("", false);
        let blocker = fx.dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        fx.config.cache.dir = Some(blocker.join("speech"));

        let err = fx
            .session("[EXIT]")
            .run(CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Cache(_)), "{err}");
        assert_eq!(fx.audio_sink.frames(), 0);
    }

    #[test]
    fn multi_language_is_switched_off() {
        let flags = FeatureFlags {
            multi_language_support: true,
            ..FeatureFlags::default()
        };
        let sanitized = sanitize_flags(&flags);
        assert!(!sanitized.multi_language_support);
        assert_eq!(sanitized.no_video, flags.no_video);
    }
}
