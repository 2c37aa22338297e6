//! The conversation loop.
//!
//! [`ConversationOrchestrator::run`] is the only place history and stall
//! state change.  Everything else feeds it through channels:
//!
//! ```text
//! RecognitionEventBridge ──Utterance──▶ ┐
//!                                       │  100 ms tick
//! generation task ──Completion{epoch}─▶ ├──▶ ConversationOrchestrator
//!                                       │        │
//! knowledge tasks ──RetrievedItem─────▶ ┘        ├──▶ SpeechOutput (speak / filler / apology)
//!                                                └──▶ skills, synthesis tasks
//! ```
//!
//! Every generation request carries a monotonically increasing epoch.  A
//! completion is applied only if its epoch is still the outstanding one, so
//! superseded or given-up requests can never touch history or speech.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::audio::SpeechOutput;
use crate::config::ConversationConfig;
use crate::knowledge::{ContextWindow, KnowledgeSource, RetrievedItem};
use crate::llm::{ChatBackend, LlmError, Personality, Role, Turn};
use crate::skills::{Skill, SkillContext};
use crate::speech::{InterruptFlag, PhraseCache, Synthesizer, Utterance};

use super::response::ResponseAction;
use super::state::{StallState, StallStep};

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Everything the orchestrator talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub backend: Arc<dyn ChatBackend>,
    pub synth: Arc<dyn Synthesizer>,
    pub audio: Arc<dyn SpeechOutput>,
    pub phrases: Arc<PhraseCache>,
    pub personality: Arc<Personality>,
    pub knowledge: Vec<Arc<dyn KnowledgeSource>>,
    /// Checked in this order against each response.
    pub skills: Vec<Arc<dyn Skill>>,
    pub skill_context: SkillContext,
}

/// Why [`ConversationOrchestrator::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationEnd {
    /// The model answered `[EXIT]`.
    ExitRequested,
    /// The caller's token fired.
    Cancelled,
}

/// The single in-flight generation request.
struct OutstandingRequest {
    epoch: u64,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl OutstandingRequest {
    fn is_terminal(&self) -> bool {
        self.handle.is_finished()
    }
}

struct Completion {
    epoch: u64,
    result: Result<Turn, LlmError>,
}

enum Flow {
    Continue,
    Exit,
}

// ---------------------------------------------------------------------------
// ConversationOrchestrator
// ---------------------------------------------------------------------------

pub struct ConversationOrchestrator {
    config: ConversationConfig,
    parts: Collaborators,
    triggers: Vec<String>,
    utterances: mpsc::UnboundedReceiver<Utterance>,
    interrupt: InterruptFlag,

    history: Vec<Turn>,
    context: ContextWindow,
    stall: StallState,
    epoch: u64,
    outstanding: Option<OutstandingRequest>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    /// Synthesis and skill tasks; aborted on shutdown.
    background: Vec<JoinHandle<()>>,
}

impl ConversationOrchestrator {
    pub fn new(
        config: &ConversationConfig,
        parts: Collaborators,
        utterances: mpsc::UnboundedReceiver<Utterance>,
        interrupt: InterruptFlag,
    ) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let triggers = parts.skills.iter().map(|s| s.trigger()).collect();
        let history = vec![Turn::system(parts.personality.prompt())];

        Self {
            config: config.clone(),
            triggers,
            utterances,
            interrupt,
            history,
            context: ContextWindow::new(config.context_budget_chars),
            stall: StallState::new(config),
            epoch: 0,
            outstanding: None,
            completions_tx,
            completions_rx,
            background: Vec::new(),
            parts,
        }
    }

    /// Conversation so far.  The first turn is always the system prompt.
    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// Epoch of the most recently issued request (0 before the first).
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Tick until the model asks to exit or `cancel` fires, then cancel and
    /// await any outstanding request.
    pub async fn run(&mut self, cancel: CancellationToken) -> ConversationEnd {
        log::info!("orchestrator: listening");
        let mut ticker = tokio::time::interval(self.config.tick());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let end = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break ConversationEnd::Cancelled,
                Some(done) = self.completions_rx.recv() => {
                    if let Flow::Exit = self.handle_completion(done) {
                        break ConversationEnd::ExitRequested;
                    }
                }
                _ = ticker.tick() => {
                    if let Flow::Exit = self.tick().await {
                        break ConversationEnd::ExitRequested;
                    }
                }
            }
        };

        self.shutdown().await;
        log::info!("orchestrator: stopped ({end:?})");
        end
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    async fn tick(&mut self) -> Flow {
        self.background.retain(|task| !task.is_finished());

        // Completions that raced the tick are applied before new input
        // supersedes them.
        while let Ok(done) = self.completions_rx.try_recv() {
            if let Flow::Exit = self.handle_completion(done) {
                return Flow::Exit;
            }
        }

        let mut lookups = Vec::new();
        let mut drained = 0usize;
        while let Ok(utterance) = self.utterances.try_recv() {
            self.history.push(Turn::user(utterance.text.clone()));
            lookups.extend(self.spawn_lookups(&utterance));
            drained += 1;
        }

        if drained > 0 {
            self.cancel_outstanding();
            let retrieved = collect_lookups(lookups).await;
            let context = self.context.merge(retrieved);
            let transcript = self.transcript(&context);
            self.issue_request(transcript);
        }

        self.check_stall();
        Flow::Continue
    }

    /// One bounded query per knowledge source.
    fn spawn_lookups(&self, utterance: &Utterance) -> Vec<JoinHandle<Option<RetrievedItem>>> {
        let limit = self.config.knowledge_timeout();
        self.parts
            .knowledge
            .iter()
            .map(|source| {
                let source = Arc::clone(source);
                let text = utterance.text.clone();
                let at = utterance.arrived_at;
                tokio::spawn(async move {
                    match tokio::time::timeout(limit, source.query(&text)).await {
                        Ok(Ok(answer)) => Some(RetrievedItem::new(at, answer)),
                        Ok(Err(e)) => {
                            log::warn!("orchestrator: knowledge source {} failed: {e}", source.name());
                            None
                        }
                        Err(_) => {
                            log::warn!(
                                "orchestrator: knowledge source {} timed out after {limit:?}",
                                source.name()
                            );
                            None
                        }
                    }
                })
            })
            .collect()
    }

    /// History with the retrieved context placed just before the last user
    /// turn.  History itself is left untouched.
    fn transcript(&self, context: &str) -> Vec<Turn> {
        let mut transcript = self.history.clone();
        if !context.is_empty() {
            let at = transcript
                .iter()
                .rposition(|t| t.role == Role::User)
                .unwrap_or(transcript.len());
            transcript.insert(at, Turn::retrieved(context));
        }
        transcript
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    fn issue_request(&mut self, transcript: Vec<Turn>) {
        self.epoch += 1;
        let epoch = self.epoch;
        let cancel = CancellationToken::new();

        let backend = Arc::clone(&self.parts.backend);
        let tx = self.completions_tx.clone();
        let token = cancel.clone();
        log::debug!("orchestrator: request {epoch} issued ({} turns)", transcript.len());

        let handle = tokio::spawn(async move {
            let result = backend.complete_chat(&transcript, &token).await;
            // The receiver only disappears when the orchestrator is gone.
            let _ = tx.send(Completion { epoch, result });
        });

        self.outstanding = Some(OutstandingRequest {
            epoch,
            cancel,
            handle,
        });
        self.stall.start(Instant::now());
    }

    fn cancel_outstanding(&mut self) {
        if let Some(request) = self.outstanding.take() {
            if !request.is_terminal() {
                log::debug!("orchestrator: cancelling request {}", request.epoch);
            }
            request.cancel.cancel();
        }
    }

    fn handle_completion(&mut self, done: Completion) -> Flow {
        let current = self.outstanding.as_ref().map(|r| r.epoch);
        if current != Some(done.epoch) {
            log::debug!("orchestrator: discarding stale completion {}", done.epoch);
            return Flow::Continue;
        }
        self.outstanding = None;
        self.stall.clear();

        let text = match done.result {
            Ok(turn) => turn.text,
            Err(LlmError::Cancelled) => return Flow::Continue,
            Err(e) => {
                log::warn!("orchestrator: generation failed: {e}");
                return Flow::Continue;
            }
        };
        log::info!("orchestrator: response {}: {text:?}", done.epoch);

        match ResponseAction::parse(&text, self.triggers.as_slice()) {
            ResponseAction::Ignore | ResponseAction::Listening => Flow::Continue,
            ResponseAction::Exit => {
                log::info!("orchestrator: exit requested");
                Flow::Exit
            }
            ResponseAction::Skill { index, input } => {
                self.invoke_skill(index, input);
                Flow::Continue
            }
            ResponseAction::Speak(text) => {
                self.speak(text);
                Flow::Continue
            }
        }
    }

    fn speak(&mut self, text: String) {
        let ssml = self.parts.personality.ssml(&text);
        self.history.push(Turn::assistant(text));
        if self.interrupt.is_set() {
            log::info!("orchestrator: user is talking, response not spoken");
            return;
        }

        let synth = Arc::clone(&self.parts.synth);
        let audio = Arc::clone(&self.parts.audio);
        self.background.push(tokio::spawn(async move {
            match synth.speak_ssml(&ssml).await {
                Ok(spoken) => audio.speak_now(spoken.audio),
                Err(e) => log::warn!("orchestrator: synthesis failed: {e}"),
            }
        }));
    }

    fn invoke_skill(&mut self, index: usize, input: String) {
        let Some(skill) = self.parts.skills.get(index).cloned() else {
            return;
        };
        log::info!("orchestrator: skill {} <- {input:?}", skill.name());
        let ctx = self.parts.skill_context.clone();
        self.background.push(tokio::spawn(async move {
            if let Err(e) = skill.invoke(&input, &ctx).await {
                log::warn!("orchestrator: skill {} failed: {e}", skill.name());
            }
        }));
    }

    // -----------------------------------------------------------------------
    // Stall escalation
    // -----------------------------------------------------------------------

    fn check_stall(&mut self) {
        let pending = self
            .outstanding
            .as_ref()
            .is_some_and(|r| !r.is_terminal());
        if !pending {
            return;
        }

        match self.stall.check(Instant::now()) {
            StallStep::Wait => {}
            StallStep::Filler(n) => {
                if let Some(filler) = self.parts.phrases.random_filler() {
                    let offered = self.parts.audio.maybe_speak(filler.audio.clone());
                    log::info!(
                        "orchestrator: stalled, filler {n} {}",
                        if offered { "offered" } else { "skipped (audio busy)" }
                    );
                }
            }
            StallStep::GiveUp => {
                log::info!("orchestrator: giving up on request {}", self.epoch);
                if let Some(request) = self.outstanding.take() {
                    request.cancel.cancel();
                }
                if let Some(apology) = self.parts.phrases.get_back_to_you() {
                    self.parts.audio.speak_now(apology.audio.clone());
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Shutdown
    // -----------------------------------------------------------------------

    async fn shutdown(&mut self) {
        if let Some(request) = self.outstanding.take() {
            request.cancel.cancel();
            if let Err(e) = request.handle.await {
                log::warn!("orchestrator: request task failed: {e}");
            }
        }
        for task in self.background.drain(..) {
            task.abort();
        }
        self.stall.clear();
    }
}

/// Waits on every lookup of the tick, not only the newest; each one is
/// already bounded by the knowledge timeout.
async fn collect_lookups(lookups: Vec<JoinHandle<Option<RetrievedItem>>>) -> Vec<RetrievedItem> {
    let mut items = Vec::with_capacity(lookups.len());
    for lookup in lookups {
        match lookup.await {
            Ok(Some(item)) => items.push(item),
            Ok(None) => {}
            Err(e) => log::warn!("orchestrator: knowledge task failed: {e}"),
        }
    }
    items
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
