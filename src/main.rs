//! Console entry point — one call with stdin as the microphone.
//!
//! # Startup sequence
//!
//! 1. Load [`AppConfig`] from disk (default on first run) and validate it.
//! 2. Initialise logging (`debug` for this crate when the flag is set).
//! 3. Build the HTTP generation backend and synthesizer from config.
//! 4. Bind console collaborators: stdin recognizer, stdout chat, PCM file
//!    for audio, a discarding sink for video.
//! 5. Run one [`CallSession`] until the agent is asked to leave or Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use voice_call_agent::{
    call::{CallServices, CallSession, ConsoleChat},
    config::AppConfig,
    conversation::ConversationEnd,
    knowledge::{KnowledgeSource, MetadataKnowledgeSource},
    llm::ApiBackend,
    media::{NullSink, PcmFileSink},
    skills::{LinkSearchSkill, Skill},
    speech::{ApiSynthesizer, ConsoleRecognizer},
    video::PulseRenderer,
};

const AUDIO_OUTPUT_FILE: &str = "agent-output.pcm";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Config
    let (config, load_error) = match AppConfig::load() {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    // 2. Logging
    let default_filter = if config.flags.debug_logging {
        "info,voice_call_agent=debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
    log::info!("voice call agent starting up");
    if let Some(e) = load_error {
        log::warn!("Failed to load config ({e}); using defaults");
    }
    config.validate().context("invalid configuration")?;

    // 3. Backends
    let backend = Arc::new(ApiBackend::from_config(&config.llm));
    let synth = Arc::new(ApiSynthesizer::from_config(&config.speech, config.audio));

    // 4. Console collaborators
    let audio_sink = Arc::new(
        PcmFileSink::create(AUDIO_OUTPUT_FILE)
            .with_context(|| format!("cannot open {AUDIO_OUTPUT_FILE}"))?,
    );
    log::info!(
        "agent audio: {AUDIO_OUTPUT_FILE} ({} Hz, {} ch, s16le)",
        config.audio.sample_rate,
        config.audio.channels
    );

    let knowledge: Vec<Arc<dyn KnowledgeSource>> = vec![Arc::new(MetadataKnowledgeSource::new())];
    let mut skills: Vec<Arc<dyn Skill>> = Vec::new();
    if config.skills.link_search_enabled {
        skills.push(Arc::new(LinkSearchSkill::from_config(&config.skills)));
    }

    let services = CallServices {
        backend,
        synth,
        recognizer: Arc::new(ConsoleRecognizer::new()),
        chat: Arc::new(ConsoleChat::new()),
        renderer: Arc::new(PulseRenderer::new()),
        audio_sink,
        video_sink: Arc::new(NullSink::new()),
        knowledge,
        skills,
    };

    // 5. Run
    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                log::info!("Ctrl-C received, leaving the call");
                on_ctrl_c.cancel();
            }
            Err(e) => log::warn!("cannot listen for Ctrl-C: {e}"),
        }
    });

    let end = CallSession::new(config, services).run(cancel).await?;
    match end {
        ConversationEnd::ExitRequested => log::info!("agent left the call"),
        ConversationEnd::Cancelled => log::info!("call cancelled"),
    }
    Ok(())
}
