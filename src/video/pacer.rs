//! Fixed-period video output loop (1/30 s by default).
//!
//! The renderer's `init`/`dispose` pair belongs to this loop: both run on
//! the pacer thread, and a failing `init` is reported back to the caller of
//! [`VideoOutputPacer::start`] instead of being swallowed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::audio::PacerError;
use crate::config::VideoConfig;
use crate::media::{FrameBuffer, FramePacer, MediaSink, StreamState};

use super::renderer::VideoRenderer;

// ---------------------------------------------------------------------------
// VideoCore — one tick of the loop
// ---------------------------------------------------------------------------

pub(crate) struct VideoCore {
    renderer: Arc<dyn VideoRenderer>,
    sink: Arc<dyn MediaSink>,
    frame: FrameBuffer,
}

impl VideoCore {
    pub(crate) fn new(
        renderer: Arc<dyn VideoRenderer>,
        sink: Arc<dyn MediaSink>,
        frame_bytes: usize,
    ) -> Self {
        Self {
            renderer,
            sink,
            frame: FrameBuffer::new(frame_bytes),
        }
    }

    /// Returns whether a frame was transmitted.
    pub(crate) fn tick(&mut self) -> bool {
        if self.sink.state() != StreamState::Started {
            return false;
        }
        self.renderer.render(&mut self.frame);

        // The stream may have been torn down while rendering.
        if self.sink.state() != StreamState::Started {
            return false;
        }
        match self.sink.send(self.frame.as_slice()) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("video-pacer: sink send failed: {e}");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// VideoOutputPacer
// ---------------------------------------------------------------------------

pub struct VideoOutputPacer {
    format: VideoConfig,
    renderer: Arc<dyn VideoRenderer>,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
    launched: AtomicBool,
}

impl VideoOutputPacer {
    pub fn new(format: VideoConfig, renderer: Arc<dyn VideoRenderer>) -> Self {
        Self {
            format,
            renderer,
            cancel: CancellationToken::new(),
            worker: Mutex::new(None),
            launched: AtomicBool::new(false),
        }
    }

    pub fn renderer(&self) -> &Arc<dyn VideoRenderer> {
        &self.renderer
    }

    /// Launch the loop and wait until the renderer finished `init`.
    ///
    /// Only the first call launches; later calls return `Ok(())`.
    pub async fn start(&self, sink: Arc<dyn MediaSink>) -> Result<(), PacerError> {
        if self.cancel.is_cancelled() {
            return Err(PacerError::Stopped);
        }
        let frame_bytes = self.format.frame_bytes();
        if frame_bytes == 0 || self.format.fps == 0 {
            return Err(PacerError::InvalidFormat(format!(
                "{}x{} @ {} fps",
                self.format.width, self.format.height, self.format.fps
            )));
        }
        if self.launched.swap(true, Ordering::AcqRel) {
            log::debug!("video-pacer: start called twice, ignoring");
            return Ok(());
        }

        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), String>>();
        let renderer = Arc::clone(&self.renderer);
        let cancel = self.cancel.clone();
        let (width, height) = (self.format.width, self.format.height);
        let period = self.format.frame_period();

        let spawned = std::thread::Builder::new()
            .name("video-pacer".into())
            .spawn(move || {
                if let Err(e) = renderer.init(width, height) {
                    let _ = ready_tx.send(Err(e.to_string()));
                    return;
                }
                let _ = ready_tx.send(Ok(()));
                log::info!("video-pacer: started ({width}x{height} / {period:?})");

                let mut core = VideoCore::new(Arc::clone(&renderer), sink, frame_bytes);
                let mut pacer = FramePacer::new(period);
                while !cancel.is_cancelled() {
                    core.tick();
                    pacer.wait_next();
                }
                renderer.dispose();
                log::info!("video-pacer: stopped");
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.launched.store(false, Ordering::Release);
                return Err(PacerError::Spawn(e));
            }
        };

        let ready = ready_rx
            .await
            .unwrap_or_else(|_| Err("worker exited before initialising".into()));
        match ready {
            Ok(()) => {
                *self.worker.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
                Ok(())
            }
            Err(reason) => {
                let _ = tokio::task::spawn_blocking(move || handle.join()).await;
                // Allow a later start to retry init.
                self.launched.store(false, Ordering::Release);
                Err(PacerError::Init(reason))
            }
        }
    }

    /// Request cooperative cancellation and wait for the loop (and the
    /// renderer's `dispose`) to finish.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            match tokio::task::spawn_blocking(move || handle.join()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => log::error!("video-pacer: worker thread panicked"),
                Err(e) => log::error!("video-pacer: join task failed: {e}"),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::SinkError;
    use crate::video::RenderError;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Reports the scripted states in order, then repeats the last one.
    struct ScriptedSink {
        states: Mutex<VecDeque<StreamState>>,
        sent: AtomicUsize,
    }

    impl ScriptedSink {
        fn new(states: &[StreamState]) -> Self {
            Self {
                states: Mutex::new(states.iter().copied().collect()),
                sent: AtomicUsize::new(0),
            }
        }

        fn sent(&self) -> usize {
            self.sent.load(Ordering::SeqCst)
        }
    }

    impl MediaSink for ScriptedSink {
        fn send(&self, _frame: &[u8]) -> Result<(), SinkError> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn state(&self) -> StreamState {
            let mut states = self.states.lock().unwrap();
            if states.len() > 1 {
                states.pop_front().unwrap()
            } else {
                states.front().copied().unwrap_or(StreamState::Stopped)
            }
        }
    }

    #[derive(Default)]
    struct CountingRenderer {
        fail_init: bool,
        inits: AtomicUsize,
        renders: AtomicUsize,
        disposes: AtomicUsize,
    }

    impl VideoRenderer for CountingRenderer {
        fn init(&self, width: u32, height: u32) -> Result<(), RenderError> {
            self.inits.fetch_add(1, Ordering::SeqCst);
            if self.fail_init {
                return Err(RenderError::InvalidSize { width, height });
            }
            Ok(())
        }

        fn render(&self, frame: &mut FrameBuffer) {
            self.renders.fetch_add(1, Ordering::SeqCst);
            frame.clear();
        }

        fn dispose(&self) {
            self.disposes.fetch_add(1, Ordering::SeqCst);
        }

        fn fade_in(&self) {}
        fn fade_out(&self) {}
        fn set_active(&self, _active: bool) {}
        fn set_amplitude(&self, _amplitude: f32) {}
    }

    fn small() -> VideoConfig {
        VideoConfig {
            width: 4,
            height: 2,
            fps: 200,
        }
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    #[test]
    fn skips_while_sink_not_started() {
        let renderer = Arc::new(CountingRenderer::default());
        let sink = Arc::new(ScriptedSink::new(&[StreamState::Starting]));
        let mut core = VideoCore::new(renderer.clone(), sink.clone(), 32);

        assert!(!core.tick());
        assert!(!core.tick());
        assert_eq!(renderer.renders.load(Ordering::SeqCst), 0);
        assert_eq!(sink.sent(), 0);
    }

    #[test]
    fn renders_and_sends_when_started() {
        let renderer = Arc::new(CountingRenderer::default());
        let sink = Arc::new(ScriptedSink::new(&[StreamState::Started]));
        let mut core = VideoCore::new(renderer.clone(), sink.clone(), 32);

        assert!(core.tick());
        assert!(core.tick());
        assert_eq!(renderer.renders.load(Ordering::SeqCst), 2);
        assert_eq!(sink.sent(), 2);
    }

    #[test]
    fn teardown_during_render_suppresses_send() {
        let renderer = Arc::new(CountingRenderer::default());
        let sink = Arc::new(ScriptedSink::new(&[
            StreamState::Started,
            StreamState::Stopped,
        ]));
        let mut core = VideoCore::new(renderer.clone(), sink.clone(), 32);

        assert!(!core.tick());
        assert_eq!(renderer.renders.load(Ordering::SeqCst), 1);
        assert_eq!(sink.sent(), 0);
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn start_runs_init_and_stop_disposes() {
        let renderer = Arc::new(CountingRenderer::default());
        let pacer = VideoOutputPacer::new(small(), renderer.clone());
        let sink = Arc::new(ScriptedSink::new(&[StreamState::Started]));

        pacer.start(sink.clone()).await.expect("start");
        pacer.start(sink.clone()).await.expect("second start is a no-op");
        tokio::time::sleep(Duration::from_millis(50)).await;
        pacer.stop().await;

        assert_eq!(renderer.inits.load(Ordering::SeqCst), 1);
        assert_eq!(renderer.disposes.load(Ordering::SeqCst), 1);
        assert!(sink.sent() > 0);
    }

    #[tokio::test]
    async fn failed_init_fails_start() {
        let renderer = Arc::new(CountingRenderer {
            fail_init: true,
            ..Default::default()
        });
        let pacer = VideoOutputPacer::new(small(), renderer.clone());
        let err = pacer
            .start(Arc::new(ScriptedSink::new(&[StreamState::Started])))
            .await
            .unwrap_err();

        assert!(matches!(err, PacerError::Init(_)));
        assert_eq!(renderer.disposes.load(Ordering::SeqCst), 0);
        pacer.stop().await;
    }

    #[tokio::test]
    async fn failed_init_is_reported_again_on_retry() {
        let renderer = Arc::new(CountingRenderer {
            fail_init: true,
            ..Default::default()
        });
        let pacer = VideoOutputPacer::new(small(), renderer.clone());
        let sink = Arc::new(ScriptedSink::new(&[StreamState::Started]));

        assert!(matches!(
            pacer.start(sink.clone()).await,
            Err(PacerError::Init(_))
        ));
        assert!(matches!(
            pacer.start(sink.clone()).await,
            Err(PacerError::Init(_))
        ));

        assert_eq!(renderer.inits.load(Ordering::SeqCst), 2);
        assert_eq!(renderer.renders.load(Ordering::SeqCst), 0);
        assert_eq!(sink.sent(), 0);
        pacer.stop().await;
    }

    #[tokio::test]
    async fn empty_geometry_is_rejected() {
        let pacer = VideoOutputPacer::new(
            VideoConfig {
                width: 0,
                height: 360,
                fps: 30,
            },
            Arc::new(CountingRenderer::default()),
        );
        let err = pacer
            .start(Arc::new(ScriptedSink::new(&[StreamState::Started])))
            .await
            .unwrap_err();
        assert!(matches!(err, PacerError::InvalidFormat(_)));
    }
}
