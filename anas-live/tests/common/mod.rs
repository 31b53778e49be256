//! In-memory fakes for driving calls without audio hardware or a network.
#![allow(dead_code)]

use anas_live::{
    AudioDevices, AudioFormat, CallObserver, CallStatus, ClientEvent, EncodedFrame, FrameSink,
    InputContext, LiveConfig, LiveConnection, LiveError, LiveTransport, Microphone, OutputContext,
    PlaybackSegment, Result, ServerEvent, SessionSetup, SourceId,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};

/// Poll `cond` until it holds, failing the test after five seconds.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(tokio::time::Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub fn test_config() -> LiveConfig {
    LiveConfig::new("test-key").with_model("models/test-live").with_frame_samples(4)
}

/// PCM16 bytes for `samples` samples of silence.
pub fn pcm_bytes(samples: usize) -> bytes::Bytes {
    bytes::Bytes::from(vec![0u8; samples * 2])
}

/// Ordered record of release steps, shared by the fakes of one call so a
/// test can check the order teardown runs them in.
#[derive(Clone, Default)]
pub struct TeardownLog(Arc<Mutex<Vec<&'static str>>>);

impl TeardownLog {
    pub fn record(&self, step: &'static str) {
        self.0.lock().unwrap().push(step);
    }

    pub fn steps(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }
}

fn outcome(step: &'static str, fail: &AtomicBool) -> Result<()> {
    if fail.load(Ordering::SeqCst) {
        return Err(LiveError::device(format!("{step} failed")));
    }
    Ok(())
}

// ── Output ─────────────────────────────────────────────────────────

/// Output context whose clock only moves when the test says so.
#[derive(Default)]
pub struct ManualOutput {
    now: Mutex<f64>,
    next_id: AtomicUsize,
    pub started: Mutex<Vec<(SourceId, f64, usize)>>,
    pub stopped: Mutex<Vec<SourceId>>,
    pub closes: AtomicUsize,
    pub log: TeardownLog,
    pub fail_stop: AtomicBool,
    pub fail_close: AtomicBool,
}

impl ManualOutput {
    pub fn set_now(&self, secs: f64) {
        *self.now.lock().unwrap() = secs;
    }

    pub fn advance(&self, secs: f64) {
        *self.now.lock().unwrap() += secs;
    }
}

impl OutputContext for ManualOutput {
    fn sample_rate(&self) -> u32 {
        24_000
    }

    fn current_time(&self) -> f64 {
        *self.now.lock().unwrap()
    }

    fn start_source(&self, segment: &PlaybackSegment, at: f64) -> Result<SourceId> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) as SourceId;
        self.started.lock().unwrap().push((id, at, segment.samples.len()));
        Ok(id)
    }

    fn stop_source(&self, id: SourceId) -> Result<()> {
        self.stopped.lock().unwrap().push(id);
        self.log.record("stop_source");
        outcome("stop_source", &self.fail_stop)
    }

    fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.log.record("output_close");
        outcome("output_close", &self.fail_close)
    }
}

// ── Input ──────────────────────────────────────────────────────────

/// Microphone driven by the test through [`ScriptedMic::feed`].
#[derive(Default)]
pub struct ScriptedMic {
    sink: Mutex<Option<Arc<dyn FrameSink>>>,
    pub frame_samples: AtomicUsize,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    pub log: TeardownLog,
    pub fail_stop: AtomicBool,
}

impl ScriptedMic {
    /// Deliver one captured frame, as a device callback would.
    pub fn feed(&self, samples: &[f32]) {
        let sink = self.sink.lock().unwrap().clone();
        if let Some(sink) = sink {
            sink.on_frame(samples);
        }
    }
}

struct MicHandle(Arc<ScriptedMic>);

impl Microphone for MicHandle {
    fn start(&self, frame_samples: usize, sink: Arc<dyn FrameSink>) -> Result<()> {
        self.0.starts.fetch_add(1, Ordering::SeqCst);
        self.0.frame_samples.store(frame_samples, Ordering::SeqCst);
        *self.0.sink.lock().unwrap() = Some(sink);
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.0.stops.fetch_add(1, Ordering::SeqCst);
        self.0.sink.lock().unwrap().take();
        self.0.log.record("mic_stop");
        outcome("mic_stop", &self.0.fail_stop)
    }
}

#[derive(Default)]
pub struct FakeInput {
    pub mic: Arc<ScriptedMic>,
    pub deny_microphone: AtomicBool,
    pub closes: AtomicUsize,
    pub log: TeardownLog,
    pub fail_close: AtomicBool,
}

impl InputContext for FakeInput {
    fn acquire_microphone(&self) -> Result<Box<dyn Microphone>> {
        if self.deny_microphone.load(Ordering::SeqCst) {
            return Err(LiveError::device("permission denied"));
        }
        Ok(Box::new(MicHandle(self.mic.clone())))
    }

    fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.log.record("input_close");
        outcome("input_close", &self.fail_close)
    }
}

// ── Devices ────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeDevices {
    pub output: Arc<ManualOutput>,
    pub input: Arc<FakeInput>,
}

impl FakeDevices {
    /// Devices whose release steps all go to `log`.
    pub fn with_log(log: &TeardownLog) -> Self {
        let mic = ScriptedMic { log: log.clone(), ..ScriptedMic::default() };
        Self {
            output: Arc::new(ManualOutput { log: log.clone(), ..ManualOutput::default() }),
            input: Arc::new(FakeInput { mic: Arc::new(mic), log: log.clone(), ..FakeInput::default() }),
        }
    }

    pub fn mic(&self) -> &ScriptedMic {
        &self.input.mic
    }
}

impl AudioDevices for FakeDevices {
    fn open_output(&self, _format: AudioFormat) -> Result<Arc<dyn OutputContext>> {
        Ok(self.output.clone())
    }

    fn open_input(&self, _format: AudioFormat) -> Result<Arc<dyn InputContext>> {
        Ok(self.input.clone())
    }
}

// ── Transport ──────────────────────────────────────────────────────

pub enum Incoming {
    Event(ServerEvent),
    Error(LiveError),
    Close,
}

/// Shared state of one fake connection.
pub struct FakeConnectionState {
    pub session_id: String,
    pub setup: SessionSetup,
    incoming_tx: mpsc::UnboundedSender<Incoming>,
    incoming_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Incoming>>,
    pub sent: Mutex<Vec<ClientEvent>>,
    pub closes: AtomicUsize,
    log: TeardownLog,
    fail_close: bool,
}

impl FakeConnectionState {
    /// Script a server event.
    pub fn push(&self, event: ServerEvent) {
        let _ = self.incoming_tx.send(Incoming::Event(event));
    }

    /// Script a receive error.
    pub fn fail(&self, error: LiveError) {
        let _ = self.incoming_tx.send(Incoming::Error(error));
    }

    /// Script a remote close.
    pub fn close_remote(&self) {
        let _ = self.incoming_tx.send(Incoming::Close);
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                ClientEvent::Text(t) => Some(t.clone()),
                ClientEvent::Audio(_) => None,
            })
            .collect()
    }

    pub fn sent_audio_count(&self) -> usize {
        self.sent.lock().unwrap().iter().filter(|e| matches!(e, ClientEvent::Audio(_))).count()
    }

    pub fn sent_kinds(&self) -> Vec<&'static str> {
        self.sent.lock().unwrap().iter().map(ClientEvent::kind).collect()
    }
}

struct FakeConnection(Arc<FakeConnectionState>);

#[async_trait]
impl LiveConnection for FakeConnection {
    fn session_id(&self) -> &str {
        &self.0.session_id
    }

    fn is_connected(&self) -> bool {
        self.0.closes.load(Ordering::SeqCst) == 0
    }

    async fn send_audio(&self, frame: &EncodedFrame) -> Result<()> {
        self.0.sent.lock().unwrap().push(ClientEvent::Audio(frame.clone()));
        Ok(())
    }

    async fn send_text(&self, text: &str) -> Result<()> {
        self.0.sent.lock().unwrap().push(ClientEvent::Text(text.to_string()));
        Ok(())
    }

    async fn next_event(&self) -> Option<Result<ServerEvent>> {
        let mut incoming = self.0.incoming_rx.lock().await;
        match incoming.recv().await {
            Some(Incoming::Event(event)) => Some(Ok(event)),
            Some(Incoming::Error(error)) => Some(Err(error)),
            Some(Incoming::Close) | None => None,
        }
    }

    async fn close(&self) -> Result<()> {
        self.0.closes.fetch_add(1, Ordering::SeqCst);
        self.0.log.record("connection_close");
        if self.0.fail_close {
            return Err(LiveError::transport("close failed"));
        }
        Ok(())
    }
}

/// Transport handing out scripted connections.
pub struct FakeTransport {
    pub connections: Mutex<Vec<Arc<FakeConnectionState>>>,
    pub attempts: AtomicUsize,
    pub refuse: AtomicBool,
    /// Connections opened from now on fail to close.
    pub fail_close: AtomicBool,
    pub log: TeardownLog,
    hold: AtomicBool,
    gate: Semaphore,
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self {
            connections: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            refuse: AtomicBool::new(false),
            fail_close: AtomicBool::new(false),
            log: TeardownLog::default(),
            hold: AtomicBool::new(false),
            gate: Semaphore::new(0),
        }
    }
}

impl FakeTransport {
    /// Transport whose connections record their close in `log`.
    pub fn with_log(log: &TeardownLog) -> Self {
        Self { log: log.clone(), ..Self::default() }
    }

    /// Make `connect` wait until [`FakeTransport::release`] is called.
    pub fn hold_handshakes(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.gate.add_permits(1);
    }

    pub fn last(&self) -> Arc<FakeConnectionState> {
        self.connections.lock().unwrap().last().cloned().expect("no connection opened")
    }
}

#[async_trait]
impl LiveTransport for FakeTransport {
    fn provider(&self) -> &str {
        "fake"
    }

    fn model_id(&self) -> &str {
        "models/test-live"
    }

    async fn connect(&self, setup: SessionSetup) -> Result<anas_live::BoxedConnection> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.hold.load(Ordering::SeqCst) {
            self.gate
                .acquire()
                .await
                .map_err(|e| LiveError::transport(e.to_string()))?
                .forget();
        }
        if self.refuse.load(Ordering::SeqCst) {
            return Err(LiveError::transport("handshake refused"));
        }

        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        let state = Arc::new(FakeConnectionState {
            session_id: format!("session-{attempt}"),
            setup,
            incoming_tx,
            incoming_rx: tokio::sync::Mutex::new(incoming_rx),
            sent: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
            log: self.log.clone(),
            fail_close: self.fail_close.load(Ordering::SeqCst),
        });
        self.connections.lock().unwrap().push(state.clone());
        Ok(Box::new(FakeConnection(state)))
    }
}

// ── Observer ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingObserver {
    pub statuses: Mutex<Vec<CallStatus>>,
}

impl RecordingObserver {
    pub fn seen(&self) -> Vec<CallStatus> {
        self.statuses.lock().unwrap().clone()
    }
}

impl CallObserver for RecordingObserver {
    fn on_status(&self, status: CallStatus) {
        self.statuses.lock().unwrap().push(status);
    }
}
