//! Call lifecycle: connect, run, tear down.
//!
//! [`LiveCallClient`] owns the single call slot. Each placed call is driven
//! by two tasks: a writer that forwards the outbound queue to the connection
//! in order, and a reader that feeds server events into the playback
//! scheduler and the state machine. Whatever ends the call (hangup, remote
//! close, a fatal error or dropping the last [`CallHandle`]) runs the same
//! teardown exactly once.

use crate::audio::decode_buffer;
use crate::capture::{CapturePipeline, MuteSwitch};
use crate::config::{LiveConfig, VoiceProfile};
use crate::device::{AudioDevices, InputContext, Microphone, OutputContext};
use crate::error::{LiveError, Result};
use crate::events::{ClientEvent, ServerEvent};
use crate::playback::{PlaybackScheduler, ScheduledSource};
use crate::state::{CallEvent, CallState};
use crate::status::{CallObserver, CallStatus};
use crate::transport::{BoxedTransport, LiveConnection, SessionSetup};
use anas_telemetry::{call_span, teardown_span, transport_connect_span};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

enum Slot {
    Empty,
    Connecting(Arc<CallInner>),
    Active(Weak<HandleGuard>),
}

/// Places live calls, one at a time.
///
/// # Example
///
/// ```rust,ignore
/// use anas_live::gemini::GeminiLiveTransport;
/// use anas_live::{ChannelObserver, LiveCallClient, LiveConfig, VoiceProfile};
/// use std::sync::Arc;
///
/// let config = LiveConfig::new(api_key);
/// let transport = Arc::new(GeminiLiveTransport::from_config(&config));
/// let client = LiveCallClient::new(config, transport, devices);
///
/// let (observer, mut statuses) = ChannelObserver::new();
/// let call = client.connect(VoiceProfile::Female, Arc::new(observer)).await?;
/// call.send_text("سڵاو")?;
/// call.disconnect().await?;
/// ```
pub struct LiveCallClient {
    config: Arc<LiveConfig>,
    transport: BoxedTransport,
    devices: Arc<dyn AudioDevices>,
    slot: Mutex<Slot>,
}

impl LiveCallClient {
    /// Create a client.
    pub fn new(config: LiveConfig, transport: BoxedTransport, devices: Arc<dyn AudioDevices>) -> Self {
        Self { config: Arc::new(config), transport, devices, slot: Mutex::new(Slot::Empty) }
    }

    /// The configuration calls are placed with.
    pub fn config(&self) -> &LiveConfig {
        &self.config
    }

    /// Place a call.
    ///
    /// Reports `connecting`, `connected` and `listening` to `observer` as
    /// the call comes up. Fails with [`LiveError::CallInProgress`] while
    /// another call is still connecting; an established call is hung up
    /// first. On any failure the call reports `error`, everything acquired
    /// so far is released and the error is returned. A hangup through
    /// [`Self::disconnect`] while connecting ends the call as
    /// `disconnected` and fails with [`LiveError::Cancelled`].
    ///
    /// Dropping the returned future before it resolves hangs the call up.
    pub async fn connect(
        &self,
        voice: VoiceProfile,
        observer: Arc<dyn CallObserver>,
    ) -> Result<CallHandle> {
        self.config.validate()?;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(CallInner::new(voice, observer, outbound_tx));
        let previous = {
            let mut slot = self.slot.lock();
            if matches!(*slot, Slot::Connecting(_)) {
                return Err(LiveError::CallInProgress);
            }
            std::mem::replace(&mut *slot, Slot::Connecting(inner.clone()))
        };
        let mut reservation = SlotReservation { slot: &self.slot, inner: inner.clone(), armed: true };

        let span = call_span(&inner.call_id, voice.voice_name());
        let handle = self.establish(&inner, previous, outbound_rx).instrument(span).await?;
        *self.slot.lock() = Slot::Active(Arc::downgrade(&handle.guard));
        reservation.armed = false;
        Ok(handle)
    }

    /// The current call, if one is established and has handles left.
    pub fn current_call(&self) -> Option<CallHandle> {
        match &*self.slot.lock() {
            Slot::Active(weak) => weak.upgrade().map(|guard| CallHandle { guard }),
            _ => None,
        }
    }

    /// Hang up the current call, including one that is still connecting.
    ///
    /// Fails with [`LiveError::InvalidTransition`] when no call was placed.
    pub async fn disconnect(&self) -> Result<()> {
        let connecting = match &*self.slot.lock() {
            Slot::Connecting(inner) => Some(inner.clone()),
            _ => None,
        };
        if let Some(inner) = connecting {
            tracing::info!(call_id = %inner.call_id, "Hanging up while connecting");
            inner.teardown(CallEvent::Hangup, "hangup").await;
            return Ok(());
        }
        match self.current_call() {
            Some(call) => call.disconnect().await,
            None => Err(LiveError::InvalidTransition { from: CallState::Idle, event: CallEvent::Hangup }),
        }
    }

    async fn establish(
        &self,
        inner: &Arc<CallInner>,
        previous: Slot,
        outbound_rx: mpsc::UnboundedReceiver<ClientEvent>,
    ) -> Result<CallHandle> {
        inner.advance(CallEvent::Connect);

        if let Slot::Active(weak) = previous {
            if let Some(guard) = weak.upgrade() {
                tracing::info!(call_id = %guard.inner.call_id, "Hanging up previous call");
                guard.inner.teardown(CallEvent::Hangup, "replaced").await;
            }
        }

        match self.bring_up(inner, outbound_rx).await {
            Ok(()) => {
                tracing::info!(session_id = %inner.session_id(), "Call established");
                Ok(CallHandle { guard: Arc::new(HandleGuard { inner: inner.clone() }) })
            }
            Err(LiveError::Cancelled) => {
                tracing::info!("Call hung up while connecting");
                Err(LiveError::Cancelled)
            }
            Err(e) => {
                tracing::error!(error = %e, "Call setup failed");
                inner.teardown(CallEvent::Fatal, "setup failed").await;
                Err(e)
            }
        }
    }

    /// Acquire the call's resources in order. Every step checks for a
    /// hangup that raced it, so nothing acquired after teardown is kept.
    async fn bring_up(
        &self,
        inner: &Arc<CallInner>,
        outbound_rx: mpsc::UnboundedReceiver<ClientEvent>,
    ) -> Result<()> {
        let config = &self.config;
        inner.ensure_live()?;

        let output = self.devices.open_output(config.output_format)?;
        // Set exactly once per call, before any reader exists.
        let _ = inner.scheduler.set(Arc::new(PlaybackScheduler::new(output.clone())));
        inner.adopt(|r| r.output = Some(output)).await?;

        let input = self.devices.open_input(config.input_format)?;
        inner.adopt(|r| r.input = Some(input.clone())).await?;
        let microphone = input.acquire_microphone()?;
        inner.adopt(|r| r.microphone = Some(microphone)).await?;

        let setup = SessionSetup {
            model: config.model.clone(),
            voice: inner.voice,
            system_instruction: config.system_instruction(),
        };
        let handshake = self
            .transport
            .connect(setup)
            .instrument(transport_connect_span(self.transport.provider(), &config.model));
        let connection: Arc<dyn LiveConnection> = tokio::select! {
            _ = inner.cancel.cancelled() => return Err(LiveError::Cancelled),
            connection = handshake => Arc::from(connection?),
        };
        inner.adopt(|r| r.connection = Some(connection.clone())).await?;
        let _ = inner.session_id.set(connection.session_id().to_string());
        inner.advance(CallEvent::Opened);

        tokio::spawn(
            run_writer(connection.clone(), outbound_rx, inner.cancel.clone()).in_current_span(),
        );

        let pipeline = Arc::new(CapturePipeline::new(
            config.input_format,
            inner.mute.clone(),
            inner.outbound.clone(),
        ));
        // Holding the lock keeps teardown from stopping a half-started microphone.
        if let Some(microphone) = inner.resources.lock().microphone.as_ref() {
            microphone.start(config.frame_samples, pipeline)?;
        }
        inner.advance(CallEvent::CaptureStarted);

        tokio::spawn(run_reader(inner.clone(), connection, config.output_format.sample_rate).in_current_span());
        inner.ensure_live()
    }
}

/// Frees the slot if `connect` fails, and hangs the call up if the
/// `connect` future is dropped mid-setup.
struct SlotReservation<'a> {
    slot: &'a Mutex<Slot>,
    inner: Arc<CallInner>,
    armed: bool,
}

impl Drop for SlotReservation<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        {
            let mut slot = self.slot.lock();
            if matches!(&*slot, Slot::Connecting(inner) if Arc::ptr_eq(inner, &self.inner)) {
                *slot = Slot::Empty;
            }
        }
        self.inner.abandon("connect abandoned");
    }
}

#[derive(Default)]
struct CallResources {
    output: Option<Arc<dyn OutputContext>>,
    input: Option<Arc<dyn InputContext>>,
    microphone: Option<Box<dyn Microphone>>,
    connection: Option<Arc<dyn LiveConnection>>,
}

struct CallInner {
    call_id: String,
    session_id: OnceLock<String>,
    voice: VoiceProfile,
    state: Mutex<CallState>,
    // Serializes transitions with their notifications so observers see them in order.
    notify_lock: Mutex<()>,
    observer: Mutex<Option<Arc<dyn CallObserver>>>,
    status_tx: watch::Sender<Option<CallStatus>>,
    mute: MuteSwitch,
    outbound: mpsc::UnboundedSender<ClientEvent>,
    scheduler: OnceLock<Arc<PlaybackScheduler>>,
    resources: Mutex<CallResources>,
    torn_down: AtomicBool,
    cancel: CancellationToken,
}

impl CallInner {
    fn new(
        voice: VoiceProfile,
        observer: Arc<dyn CallObserver>,
        outbound: mpsc::UnboundedSender<ClientEvent>,
    ) -> Self {
        Self {
            call_id: uuid::Uuid::new_v4().to_string(),
            session_id: OnceLock::new(),
            voice,
            state: Mutex::new(CallState::Idle),
            notify_lock: Mutex::new(()),
            observer: Mutex::new(Some(observer)),
            status_tx: watch::Sender::new(None),
            mute: MuteSwitch::default(),
            outbound,
            scheduler: OnceLock::new(),
            resources: Mutex::new(CallResources::default()),
            torn_down: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    fn session_id(&self) -> &str {
        self.session_id.get().map(String::as_str).unwrap_or(&self.call_id)
    }

    fn state(&self) -> CallState {
        *self.state.lock()
    }

    /// Apply `event`, notifying the observer if the state changed.
    fn transition(&self, event: CallEvent) -> Result<CallState> {
        let _order = self.notify_lock.lock();
        let (previous, next) = {
            let mut state = self.state.lock();
            let previous = *state;
            let next = previous.transition(event)?;
            *state = next;
            (previous, next)
        };

        if next != previous {
            tracing::debug!(from = ?previous, to = ?next, ?event, "Call state changed");
            if let Some(status) = next.status() {
                let observer = self.observer.lock().clone();
                if let Some(observer) = observer {
                    observer.on_status(status);
                }
                self.status_tx.send_replace(Some(status));
            }
        }
        Ok(next)
    }

    /// Like [`Self::transition`] for events that may race with teardown.
    fn advance(&self, event: CallEvent) {
        if let Err(e) = self.transition(event) {
            tracing::debug!(error = %e, "Ignoring event");
        }
    }

    fn scheduler(&self) -> Option<&Arc<PlaybackScheduler>> {
        self.scheduler.get()
    }

    fn handle_server_event(&self, event: ServerEvent, output_rate: u32) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Ok(());
        }
        match event {
            ServerEvent::Audio { data } => {
                let segment = match decode_buffer(&data, output_rate) {
                    Ok(segment) => segment,
                    Err(e) => {
                        tracing::warn!(error = %e, bytes = data.len(), "Dropping speech chunk");
                        return Ok(());
                    }
                };
                if let Some(scheduler) = self.scheduler() {
                    match scheduler.enqueue(segment) {
                        Ok(_) => {}
                        Err(LiveError::NotConnected) => {
                            tracing::debug!("Playback closed, dropping speech chunk");
                            return Ok(());
                        }
                        Err(e) => return Err(e),
                    }
                }
                self.advance(CallEvent::ServerAudio);
            }
            ServerEvent::Interrupted => {
                let stopped = self.scheduler().map(|s| s.cancel_all()).unwrap_or(0);
                tracing::debug!(stopped, "Assistant interrupted");
                self.advance(CallEvent::ServerInterrupted);
            }
            ServerEvent::TurnComplete => self.advance(CallEvent::ServerTurnComplete),
            ServerEvent::Text { text } => tracing::debug!(%text, "Assistant text"),
            ServerEvent::GoAway { time_left } => {
                tracing::warn!(time_left = time_left.as_deref().unwrap_or("unknown"), "Server going away");
            }
            other @ (ServerEvent::SetupComplete | ServerEvent::Unknown) => {
                tracing::trace!(kind = other.kind(), "Ignoring server event");
            }
        }
        Ok(())
    }

    /// Fails with [`LiveError::Cancelled`] once teardown has run.
    fn ensure_live(&self) -> Result<()> {
        if self.torn_down.load(Ordering::SeqCst) {
            return Err(LiveError::Cancelled);
        }
        Ok(())
    }

    /// Record a resource acquired during setup. If teardown already ran,
    /// the resource is released on the spot instead.
    async fn adopt(&self, store: impl FnOnce(&mut CallResources)) -> Result<()> {
        let late = {
            let mut resources = self.resources.lock();
            store(&mut resources);
            if !self.torn_down.load(Ordering::SeqCst) {
                return Ok(());
            }
            std::mem::take(&mut *resources)
        };
        tracing::debug!("Releasing resource acquired after hangup");
        if let Some(connection) = release_resources(late) {
            close_connection(connection).await;
        }
        Err(LiveError::Cancelled)
    }

    /// Run every local teardown step once. Returns the connection still to
    /// close, or `None` if teardown already ran.
    fn release_local(&self, reason: &str) -> Option<Option<Arc<dyn LiveConnection>>> {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return None;
        }
        let _span = teardown_span(reason).entered();
        self.cancel.cancel();

        if let Some(scheduler) = self.scheduler() {
            scheduler.close();
        }

        let resources = std::mem::take(&mut *self.resources.lock());
        Some(release_resources(resources))
    }

    /// Report the terminal status and let go of the observer.
    fn finish(&self, event: CallEvent) {
        self.advance(event);
        self.observer.lock().take();
        tracing::info!(call_id = %self.call_id, state = ?self.state(), "Call ended");
    }

    async fn teardown(&self, event: CallEvent, reason: &str) {
        let Some(connection) = self.release_local(reason) else {
            return;
        };
        if let Some(connection) = connection {
            close_connection(connection).await;
        }
        self.finish(event);
    }

    /// Teardown for synchronous callers. The connection is closed on the
    /// current runtime, if there is one.
    fn abandon(&self, reason: &str) {
        let Some(connection) = self.release_local(reason) else {
            return;
        };
        if let Some(connection) = connection {
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    runtime.spawn(close_connection(connection));
                }
                Err(_) => tracing::warn!("No runtime to close the connection on"),
            }
        }
        self.finish(CallEvent::Hangup);
    }
}

/// Stop the microphone, then close the input and output contexts. A failing
/// step is logged and the rest still run. Returns the connection to close.
fn release_resources(mut resources: CallResources) -> Option<Arc<dyn LiveConnection>> {
    if let Some(microphone) = resources.microphone.take() {
        if let Err(e) = microphone.stop() {
            tracing::warn!(error = %e, "Failed to stop microphone");
        }
    }
    if let Some(input) = resources.input.take() {
        if let Err(e) = input.close() {
            tracing::warn!(error = %e, "Failed to close input context");
        }
    }
    if let Some(output) = resources.output.take() {
        if let Err(e) = output.close() {
            tracing::warn!(error = %e, "Failed to close output context");
        }
    }
    resources.connection.take()
}

async fn close_connection(connection: Arc<dyn LiveConnection>) {
    if let Err(e) = connection.close().await {
        tracing::warn!(error = %e, "Failed to close connection");
    }
}

async fn run_writer(
    connection: Arc<dyn LiveConnection>,
    mut outbound: mpsc::UnboundedReceiver<ClientEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = outbound.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };
        match connection.send_event(&event).await {
            Ok(()) => tracing::trace!(kind = event.kind(), "Sent"),
            Err(e) => tracing::warn!(kind = event.kind(), error = %e, "Dropping outbound message"),
        }
    }
    tracing::debug!("Writer stopped");
}

async fn run_reader(inner: Arc<CallInner>, connection: Arc<dyn LiveConnection>, output_rate: u32) {
    let cancel = inner.cancel.clone();
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = connection.next_event() => next,
        };
        let result = match next {
            Some(Ok(event)) => inner.handle_server_event(event, output_rate),
            Some(Err(e)) => Err(e),
            None => {
                tracing::info!("Connection closed by server");
                inner.teardown(CallEvent::TransportClosed, "remote closed").await;
                break;
            }
        };
        match result {
            Ok(()) => {}
            Err(e) if e.is_fatal() => {
                tracing::error!(error = %e, "Call failed");
                inner.teardown(CallEvent::Fatal, "fatal error").await;
                break;
            }
            Err(e) => tracing::warn!(error = %e, "Recoverable call error"),
        }
    }
    tracing::debug!("Reader stopped");
}

/// Tears the call down when the last [`CallHandle`] goes away.
struct HandleGuard {
    inner: Arc<CallInner>,
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        self.inner.abandon("handle dropped");
    }
}

/// Handle to a placed call. Clones share the call.
#[derive(Clone)]
pub struct CallHandle {
    guard: Arc<HandleGuard>,
}

impl std::fmt::Debug for CallHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallHandle")
            .field("session_id", &self.session_id())
            .field("state", &self.state())
            .finish()
    }
}

impl CallHandle {
    fn inner(&self) -> &CallInner {
        &self.guard.inner
    }

    /// Session ID assigned by the transport.
    pub fn session_id(&self) -> &str {
        self.inner().session_id()
    }

    /// Voice chosen for this call.
    pub fn voice(&self) -> VoiceProfile {
        self.inner().voice
    }

    /// Current state.
    pub fn state(&self) -> CallState {
        self.inner().state()
    }

    /// Current UI status.
    pub fn status(&self) -> Option<CallStatus> {
        self.state().status()
    }

    /// Mute or unmute the microphone. Frames captured while muted are
    /// discarded; nothing is sent to the server.
    pub fn set_mute(&self, muted: bool) {
        self.inner().mute.set(muted);
        tracing::debug!(muted, "Mute changed");
    }

    /// Whether the microphone is muted.
    pub fn is_muted(&self) -> bool {
        self.inner().mute.is_muted()
    }

    /// Send a typed user turn, queued behind any captured audio.
    pub fn send_text(&self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Err(LiveError::InvalidInput("text must not be empty".to_string()));
        }
        let inner = self.inner();
        if !inner.state().is_connected() || inner.torn_down.load(Ordering::SeqCst) {
            return Err(LiveError::NotConnected);
        }
        inner
            .outbound
            .send(ClientEvent::Text(text.to_string()))
            .map_err(|_| LiveError::NotConnected)
    }

    /// Hang up. Calling it again after the call ended does nothing.
    pub async fn disconnect(&self) -> Result<()> {
        self.guard.inner.teardown(CallEvent::Hangup, "hangup").await;
        Ok(())
    }

    /// Speech segments still playing or queued.
    pub fn active_sources(&self) -> Vec<ScheduledSource> {
        self.inner().scheduler().map(|s| s.active_sources()).unwrap_or_default()
    }

    /// Wait for the call to end and return its terminal status.
    pub async fn closed(&self) -> CallStatus {
        let mut statuses = self.inner().status_tx.subscribe();
        loop {
            let current = *statuses.borrow_and_update();
            if let Some(status) = current.filter(CallStatus::is_terminal) {
                return status;
            }
            if statuses.changed().await.is_err() {
                return CallStatus::Disconnected;
            }
        }
    }
}
