//! Session lifecycle manager.
//!
//! Owns the realtime connection for one call: stands up the capture
//! pipeline and playback scheduler, dispatches inbound events strictly in
//! arrival order, and tears everything down on disconnect. The UI side
//! consumes typed [`SessionEvent`]s from an mpsc channel instead of poking
//! at any session internals.
//!
//! State machine: Idle → Connecting → Open → Closed, with Error absorbing
//! from Connecting or Open. At most one session is active at a time; a
//! second connect without an intervening disconnect is refused.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::audio::{CaptureBlock, CaptureDevice, PlaybackDevice, PlaybackScheduler};
use crate::error::CallError;
use crate::pcm::{self, AudioFrame, PLAYBACK_SAMPLE_RATE};
use crate::protocol::{
    ClientMessage, FunctionResponse, RealtimeInput, ServerMessage, Setup, ToolResponse,
};
use crate::transport::{TransportEvent, TransportSink, TransportStream};
use crate::wishlist::WishlistUpdate;

/// Cadence of the output level ticks while the session is open,
/// approximating a display refresh.
const LEVEL_TICK: Duration = Duration::from_millis(16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

/// Typed events raised toward the UI layer.
#[derive(Debug)]
pub enum SessionEvent {
    /// One decoded frame of synthesized speech, already scheduled for
    /// playback; delivered for visualization hookup.
    Audio(AudioFrame),
    /// Declared in the contract but never driven by the current persona
    /// configuration; may never fire.
    Transcription { text: String, role: Role },
    /// Partial dossier update from one tool invocation.
    WishlistUpdate(WishlistUpdate),
    /// Output activity level, ~[0, 1], unclamped.
    Level(f32),
    /// The remote peer ended the call.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Idle = 0,
    Connecting = 1,
    Open = 2,
    Closed = 3,
    Error = 4,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Connecting,
            2 => Self::Open,
            3 => Self::Closed,
            4 => Self::Error,
            _ => Self::Idle,
        }
    }
}

/// Everything a session needs from the outside world, behind the narrow
/// device/transport traits so tests run against fakes.
pub struct SessionDeps {
    pub sink: Box<dyn TransportSink>,
    pub stream: Box<dyn TransportStream>,
    pub capture: Box<dyn CaptureDevice>,
    pub playback: Box<dyn PlaybackDevice>,
    pub model: String,
    pub voice: String,
}

/// One active realtime connection. Created by [`SessionManager::connect`],
/// destroyed on disconnect or terminal error.
pub struct SessionHandle {
    state: Arc<AtomicU8>,
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self.state(),
            SessionState::Connecting | SessionState::Open
        )
    }

    async fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

/// Owns the single active session. The UI layer goes through this for
/// connect/disconnect and never touches scheduler or device state.
#[derive(Default)]
pub struct SessionManager {
    current: Option<SessionHandle>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stand up a session for `caller_name`: setup handshake, capture
    /// pipeline, playback scheduler, and the dispatch task. Refuses with
    /// `SessionActive` while a previous session is still live.
    pub async fn connect(
        &mut self,
        deps: SessionDeps,
        caller_name: &str,
        event_tx: mpsc::Sender<SessionEvent>,
    ) -> Result<(), CallError> {
        if self.current.as_ref().is_some_and(|h| h.is_active()) {
            return Err(CallError::SessionActive);
        }

        let handle = start_session(deps, caller_name, event_tx).await?;
        self.current = Some(handle);
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.current
            .as_ref()
            .map_or(SessionState::Idle, |h| h.state())
    }

    /// End the current call. Idempotent; a no-op when nothing is active.
    /// Audio already scheduled may finish playing after this returns.
    pub async fn disconnect(&mut self) {
        if let Some(mut handle) = self.current.take() {
            handle.shutdown().await;
        }
    }
}

async fn start_session(
    mut deps: SessionDeps,
    caller_name: &str,
    event_tx: mpsc::Sender<SessionEvent>,
) -> Result<SessionHandle, CallError> {
    let state = Arc::new(AtomicU8::new(SessionState::Connecting as u8));

    let setup = Setup::for_caller(&deps.model, &deps.voice, caller_name);
    if let Err(e) = deps.sink.send(&ClientMessage::Setup(setup)).await {
        state.store(SessionState::Error as u8, Ordering::SeqCst);
        return Err(CallError::Connection(format!("setup send failed: {e}")));
    }

    // Wait for the remote acknowledgement before opening the pipelines.
    loop {
        match deps.stream.recv().await {
            TransportEvent::Message(msg) if msg.setup_complete.is_some() => break,
            TransportEvent::Message(_) => {
                log::warn!("Ignoring pre-handshake server message");
            }
            TransportEvent::Error(e) => {
                state.store(SessionState::Error as u8, Ordering::SeqCst);
                return Err(CallError::Connection(format!("handshake failed: {e}")));
            }
            TransportEvent::Closed => {
                state.store(SessionState::Error as u8, Ordering::SeqCst);
                return Err(CallError::Connection(
                    "connection closed during handshake".into(),
                ));
            }
        }
    }

    // Microphone comes up only after the handshake; a denied device leaves
    // the state machine in Error and closes the link.
    let (block_tx, block_rx) = mpsc::channel::<CaptureBlock>(8);
    if let Err(e) = deps.capture.start(block_tx) {
        state.store(SessionState::Error as u8, Ordering::SeqCst);
        deps.sink.close().await;
        return Err(e);
    }

    let scheduler = PlaybackScheduler::new(deps.playback);

    state.store(SessionState::Open as u8, Ordering::SeqCst);
    log::info!("Session open for {caller_name}");

    let (stop_tx, stop_rx) = oneshot::channel();
    let task = tokio::spawn(run_session(
        deps.sink,
        deps.stream,
        deps.capture,
        scheduler,
        block_rx,
        event_tx,
        state.clone(),
        stop_rx,
    ));

    Ok(SessionHandle {
        state,
        stop_tx: Some(stop_tx),
        task: Some(task),
    })
}

#[allow(clippy::too_many_arguments)]
async fn run_session(
    mut sink: Box<dyn TransportSink>,
    mut stream: Box<dyn TransportStream>,
    mut capture: Box<dyn CaptureDevice>,
    mut scheduler: PlaybackScheduler,
    mut block_rx: mpsc::Receiver<CaptureBlock>,
    event_tx: mpsc::Sender<SessionEvent>,
    state: Arc<AtomicU8>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(LEVEL_TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            event = stream.recv() => match event {
                TransportEvent::Message(msg) => {
                    dispatch(msg, &mut sink, &mut scheduler, &event_tx).await;
                }
                TransportEvent::Error(e) => {
                    // Reported only; the remote may recover.
                    log::warn!("Session error event: {e}");
                }
                TransportEvent::Closed => {
                    let _ = event_tx.send(SessionEvent::Closed).await;
                    state.store(SessionState::Closed as u8, Ordering::SeqCst);
                    break;
                }
            },

            Some(block) = block_rx.recv() => {
                let chunk = pcm::encode_frame(&block);
                let msg = ClientMessage::RealtimeInput(RealtimeInput {
                    media_chunks: vec![chunk],
                });
                if let Err(e) = sink.send(&msg).await {
                    log::warn!("Failed to send microphone block: {e}");
                }
            }

            _ = ticker.tick() => {
                // Levels are animation hints; a full consumer just misses one.
                let _ = event_tx.try_send(SessionEvent::Level(scheduler.level()));
            }

            _ = &mut stop_rx => {
                sink.close().await;
                state.store(SessionState::Closed as u8, Ordering::SeqCst);
                break;
            }
        }
    }

    capture.stop();
    scheduler.shutdown();
    log::info!("Session torn down");
}

/// Process one inbound message: audio parts to the scheduler, tool
/// invocations to the UI plus one acknowledgement each, transcriptions
/// straight through. Runs strictly in arrival order.
async fn dispatch(
    msg: ServerMessage,
    sink: &mut Box<dyn TransportSink>,
    scheduler: &mut PlaybackScheduler,
    event_tx: &mpsc::Sender<SessionEvent>,
) {
    if let Some(content) = msg.server_content {
        if let Some(turn) = content.model_turn {
            for part in turn.parts {
                let Some(inline) = part.inline_data else {
                    continue;
                };
                let rate = inline
                    .mime_type
                    .as_deref()
                    .and_then(pcm::rate_from_mime)
                    .unwrap_or(PLAYBACK_SAMPLE_RATE);
                match pcm::decode_chunk(&inline.data) {
                    Ok(samples) => {
                        let frame = pcm::to_float_frame(&samples, rate);
                        if let Err(e) = scheduler.enqueue(frame.clone()) {
                            log::warn!("Failed to schedule frame: {e}");
                        }
                        let _ = event_tx.send(SessionEvent::Audio(frame)).await;
                    }
                    Err(e) => {
                        // Drop this frame only; the session stays open.
                        log::warn!("Dropping malformed audio payload: {e}");
                    }
                }
            }
        }

        if let Some(t) = content.input_transcription {
            let _ = event_tx
                .send(SessionEvent::Transcription {
                    text: t.text,
                    role: Role::User,
                })
                .await;
        }
        if let Some(t) = content.output_transcription {
            let _ = event_tx
                .send(SessionEvent::Transcription {
                    text: t.text,
                    role: Role::Model,
                })
                .await;
        }
    }

    if let Some(tool_call) = msg.tool_call {
        for call in tool_call.function_calls {
            if call.name == "update_wishlist" {
                match serde_json::from_value::<WishlistUpdate>(call.args.clone()) {
                    Ok(update) => {
                        let _ = event_tx.send(SessionEvent::WishlistUpdate(update)).await;
                    }
                    Err(e) => log::warn!("Bad wishlist arguments: {e}"),
                }
            } else {
                log::warn!("Unknown tool invocation: {}", call.name);
            }

            // Exactly one acknowledgement per invocation id, unconditionally:
            // a missing response stalls the peer's turn no matter what
            // happened above.
            let ack = ClientMessage::ToolResponse(ToolResponse {
                function_responses: vec![FunctionResponse {
                    id: call.id,
                    name: call.name,
                    response: json!({ "result": "Noted in the dossier." }),
                }],
            });
            if let Err(e) = sink.send(&ack).await {
                log::warn!("Failed to send tool acknowledgement: {e}");
            }
        }
    }
}
