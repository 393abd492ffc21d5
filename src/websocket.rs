//! # WebSocket Relay Handler
//!
//! Relays streaming audio from a client to its recognizer and streams the
//! recognition events back. Clients connect to `/ws`.
//!
//! ## Two layers:
//! - **ConnectionHandler**: the transport-free protocol state machine. It
//!   owns the connection's `RecognizerSession`, takes classified inputs and
//!   returns one `Step` per input saying what to send and whether to close.
//! - **RelaySocket**: the actix actor bound to one WebSocket. It turns
//!   transport messages into inputs and carries out the returned steps.
//!
//! ## State machine:
//! `Open` → (`__end__`) `Closing` → `Closed`; disconnects and fatal errors
//! go from `Open` straight to `Closed`. Anything arriving once the handler
//! has left `Open` is ignored.
//!
//! ## Ordering:
//! The actor's stream handler runs one frame at a time, so frames are
//! processed strictly in arrival order and every event is queued before the
//! next frame is read. An engine instance is never used by two frames at once.
//!
//! ## Fragmented messages:
//! A message split across continuation frames is one chunk. `FragmentBuffer`
//! joins the pieces and the whole message is handled once its last frame
//! arrives. A joined message larger than `server.max_frame_bytes` is a
//! transport error.
//!
//! ## Disconnects:
//! A client that goes away without `__end__` loses any audio the engine had
//! not yet closed into a segment. The session is dropped without a final flush.

use crate::audio::{FeedOutcome, RecognizerSession, SessionConfig, SessionStats};
use crate::error::SessionError;
use crate::protocol::{ControlCommand, Frame, RecognitionEvent};
use crate::state::AppState;
use crate::transcription::RecognizerFactory;

use actix::prelude::*;
use actix_http::ws::Item;
use actix_web::web::{Bytes, BytesMut};
use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use actix_web_actors::ws;
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Longest close reason a WebSocket close frame can carry (125 - 2 code bytes).
const MAX_CLOSE_REASON_BYTES: usize = 123;

/// Lifecycle of one relay connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepting frames
    Open,
    /// `__end__` received, final flush in progress
    Closing,
    /// Terminal; the session is disposed
    Closed,
}

/// An input to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound<'a> {
    /// A data frame from the client
    Frame(Frame<'a>),
    /// The client closed the connection or the stream ended
    Disconnect,
    /// The transport reported a protocol error
    TransportError(String),
}

/// What the transport must do after one input.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Nothing to send; keep reading
    Idle,
    /// Send this event and keep reading
    Send(RecognitionEvent),
    /// Send this last event, then close normally
    Finish(RecognitionEvent),
    /// Client is gone; stop without sending anything
    Disconnected,
    /// Close with an internal-error code and this reason
    Fail(SessionError),
}

/// Transport-free protocol logic for one connection.
pub struct ConnectionHandler {
    session: RecognizerSession,
    state: ConnectionState,
}

impl ConnectionHandler {
    /// Accept a connection by creating its session.
    pub fn open(factory: Arc<dyn RecognizerFactory>, config: SessionConfig) -> Result<Self, SessionError> {
        Ok(Self {
            session: RecognizerSession::create(factory, config)?,
            state: ConnectionState::Open,
        })
    }

    #[cfg(test)]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn stats(&self) -> SessionStats {
        self.session.stats()
    }

    pub fn session_config(&self) -> SessionConfig {
        self.session.config()
    }

    /// Process one input and say what the transport should do.
    pub fn handle(&mut self, input: Inbound<'_>) -> Step {
        if self.state != ConnectionState::Open {
            return Step::Idle;
        }

        match input {
            Inbound::Frame(Frame::Audio(data)) => match self.session.feed(data) {
                Ok(FeedOutcome::NoOp) => Step::Idle,
                Ok(FeedOutcome::PartialUpdate(result)) => Step::Send(RecognitionEvent::Partial(result)),
                Ok(FeedOutcome::SegmentFinalized(result)) => Step::Send(RecognitionEvent::Final(result)),
                Err(err) => self.abort(err),
            },
            Inbound::Frame(Frame::Control(ControlCommand::End)) => {
                self.state = ConnectionState::Closing;
                match self.session.finalize() {
                    Ok(result) => {
                        self.close();
                        Step::Finish(RecognitionEvent::Final(result))
                    }
                    Err(err) => self.abort(err),
                }
            }
            Inbound::Frame(Frame::Control(ControlCommand::Reset)) => match self.session.reset() {
                Ok(()) => Step::Send(RecognitionEvent::reset_ack()),
                Err(err) => self.abort(err),
            },
            Inbound::Frame(Frame::Noise) => Step::Idle,
            Inbound::Disconnect => {
                self.close();
                Step::Disconnected
            }
            Inbound::TransportError(msg) => self.abort(SessionError::Transport(msg)),
        }
    }

    /// Tear down after a fatal error.
    pub fn abort(&mut self, err: SessionError) -> Step {
        self.close();
        Step::Fail(err)
    }

    fn close(&mut self) {
        self.session.dispose();
        self.state = ConnectionState::Closed;
    }
}

/// Cut a close reason to what fits in a close frame, on a char boundary.
fn close_reason_text(reason: &str) -> String {
    if reason.len() <= MAX_CLOSE_REASON_BYTES {
        return reason.to_string();
    }

    let mut end = MAX_CLOSE_REASON_BYTES;
    while !reason.is_char_boundary(end) {
        end -= 1;
    }
    reason[..end].to_string()
}

/// Data type of a message, taken from its first frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessageKind {
    Text,
    Binary,
}

/// Joins continuation frames back into whole messages.
struct FragmentBuffer {
    kind: Option<MessageKind>,
    data: BytesMut,
    limit: usize,
}

impl FragmentBuffer {
    fn new(limit: usize) -> Self {
        Self {
            kind: None,
            data: BytesMut::new(),
            limit,
        }
    }

    /// Add one fragment. Returns the whole message after its last fragment.
    fn push(&mut self, item: Item) -> Result<Option<(MessageKind, Bytes)>, String> {
        let (chunk, last) = match item {
            Item::FirstText(chunk) => {
                self.begin(MessageKind::Text)?;
                (chunk, false)
            }
            Item::FirstBinary(chunk) => {
                self.begin(MessageKind::Binary)?;
                (chunk, false)
            }
            Item::Continue(chunk) => (chunk, false),
            Item::Last(chunk) => (chunk, true),
        };

        let kind = self
            .kind
            .ok_or_else(|| "continuation frame without a first fragment".to_string())?;

        if self.data.len() + chunk.len() > self.limit {
            self.kind = None;
            self.data.clear();
            return Err(format!("fragmented message exceeds {} bytes", self.limit));
        }
        self.data.extend_from_slice(&chunk);

        if !last {
            return Ok(None);
        }

        self.kind = None;
        Ok(Some((kind, self.data.split().freeze())))
    }

    fn begin(&mut self, kind: MessageKind) -> Result<(), String> {
        if self.kind.is_some() {
            return Err("new message started inside a fragmented message".to_string());
        }
        self.kind = Some(kind);
        Ok(())
    }
}

/// WebSocket actor for one relay connection.
///
/// ## Actor Model:
/// Each connection is an independent actor. Its session is created in
/// `started` and dropped in `stopped`, so the engine lives exactly as long as
/// the connection.
pub struct RelaySocket {
    /// Identifies this connection in logs
    connection_id: Uuid,

    /// Shared state: engine factory, config, metrics
    app_state: web::Data<AppState>,

    /// Protocol state; `None` until started, or if the session never opened
    handler: Option<ConnectionHandler>,

    /// Whether the connection ended with a fatal error
    failed: bool,

    /// Partial message while continuation frames are arriving
    fragments: FragmentBuffer,
}

impl RelaySocket {
    pub fn new(app_state: web::Data<AppState>) -> Self {
        let fragments = FragmentBuffer::new(app_state.config.server.max_frame_bytes);
        Self {
            connection_id: Uuid::new_v4(),
            app_state,
            handler: None,
            failed: false,
            fragments,
        }
    }

    /// Feed one continuation frame; dispatch once the message is whole.
    fn dispatch_fragment(&mut self, item: Item) -> Step {
        match self.fragments.push(item) {
            Ok(None) => Step::Idle,
            Ok(Some((MessageKind::Binary, data))) => self.dispatch(Inbound::Frame(Frame::from_binary(&data))),
            Ok(Some((MessageKind::Text, data))) => match std::str::from_utf8(&data) {
                Ok(text) => self.dispatch(Inbound::Frame(Frame::from_text(text))),
                Err(_) => self.dispatch(Inbound::TransportError(
                    "fragmented text message is not valid UTF-8".to_string(),
                )),
            },
            Err(msg) => self.dispatch(Inbound::TransportError(msg)),
        }
    }

    fn dispatch(&mut self, input: Inbound<'_>) -> Step {
        match self.handler.as_mut() {
            Some(handler) => handler.handle(input),
            None => Step::Idle,
        }
    }

    /// Carry out a step returned by the state machine.
    fn apply(&mut self, step: Step, ctx: &mut ws::WebsocketContext<Self>) {
        match step {
            Step::Idle => {}
            Step::Send(event) => {
                if let RecognitionEvent::System(_) = event {
                    self.app_state.record_reset();
                    info!(connection_id = %self.connection_id, "Session reset");
                }
                self.send_event(&event, ctx);
            }
            Step::Finish(event) => {
                if self.send_event(&event, ctx) {
                    info!(connection_id = %self.connection_id, "Session ended by client");
                    ctx.close(Some(ws::CloseCode::Normal.into()));
                    ctx.stop();
                }
            }
            Step::Disconnected => {
                info!(connection_id = %self.connection_id, "Client disconnected");
                ctx.stop();
            }
            Step::Fail(err) => self.close_with_error(err, ctx),
        }
    }

    /// Serialize and queue one event. Returns false if the connection had to
    /// be closed because the event could not be encoded.
    fn send_event(&mut self, event: &RecognitionEvent, ctx: &mut ws::WebsocketContext<Self>) -> bool {
        match event.to_json() {
            Ok(json) => {
                ctx.text(json);
                self.app_state.record_event_sent();
                debug!(connection_id = %self.connection_id, kind = event.kind(), "Event sent");
                true
            }
            Err(err) => {
                if let Some(handler) = self.handler.as_mut() {
                    handler.abort(err.clone());
                }
                self.close_with_error(err, ctx);
                false
            }
        }
    }

    fn close_with_error(&mut self, err: SessionError, ctx: &mut ws::WebsocketContext<Self>) {
        error!(connection_id = %self.connection_id, error = %err, "Closing connection after fatal error");
        self.failed = true;
        ctx.close(Some(ws::CloseReason {
            code: ws::CloseCode::Error,
            description: Some(close_reason_text(&err.to_string())),
        }));
        ctx.stop();
    }
}

impl Actor for RelaySocket {
    type Context = ws::WebsocketContext<Self>;

    /// Called when the WebSocket connection starts: create the session.
    fn started(&mut self, ctx: &mut Self::Context) {
        match ConnectionHandler::open(self.app_state.engine.clone(), self.app_state.session_config()) {
            Ok(handler) => {
                let config = handler.session_config();
                self.handler = Some(handler);
                self.app_state.session_opened();
                info!(
                    connection_id = %self.connection_id,
                    engine = self.app_state.engine.name(),
                    sample_rate = config.sample_rate,
                    words = config.words_enabled,
                    "Relay session started"
                );
            }
            Err(err) => {
                self.app_state.session_rejected();
                self.close_with_error(err, ctx);
            }
        }
    }

    /// Called when the connection stops, whatever the reason.
    fn stopped(&mut self, _ctx: &mut Self::Context) {
        if let Some(handler) = self.handler.take() {
            let stats = handler.stats();
            self.app_state.session_closed(self.failed);
            info!(
                connection_id = %self.connection_id,
                audio_bytes = stats.audio_bytes,
                chunks = stats.chunks,
                segments = stats.segments,
                resets = stats.resets,
                failed = self.failed,
                "Relay session closed"
            );
        }
    }
}

/// Handle incoming WebSocket messages.
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for RelaySocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        let step = match msg {
            Ok(ws::Message::Binary(data)) => self.dispatch(Inbound::Frame(Frame::from_binary(&data))),
            Ok(ws::Message::Text(text)) => self.dispatch(Inbound::Frame(Frame::from_text(&text))),
            Ok(ws::Message::Ping(data)) => {
                ctx.pong(&data);
                return;
            }
            Ok(ws::Message::Pong(_)) => return,
            Ok(ws::Message::Close(reason)) => {
                debug!(connection_id = %self.connection_id, "Close frame received: {:?}", reason);
                ctx.close(reason);
                self.dispatch(Inbound::Disconnect)
            }
            Ok(ws::Message::Continuation(item)) => self.dispatch_fragment(item),
            Ok(ws::Message::Nop) => return,
            Err(err) => self.dispatch(Inbound::TransportError(err.to_string())),
        };

        self.apply(step, ctx);
    }

    /// The stream ended without a close frame (dropped TCP connection).
    fn finished(&mut self, ctx: &mut Self::Context) {
        let step = self.dispatch(Inbound::Disconnect);
        self.apply(step, ctx);
        ctx.stop();
    }
}

/// WebSocket endpoint handler.
///
/// ## HTTP to WebSocket Upgrade:
/// Upgrades the request and hands the connection to a `RelaySocket` actor.
/// Frames (and joined fragmented messages) larger than `server.max_frame_bytes`
/// are rejected.
pub async fn relay_websocket(
    req: HttpRequest,
    stream: web::Payload,
    app_state: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    info!("New relay connection request from: {:?}", req.connection_info().peer_addr());

    let max_frame_bytes = app_state.config.server.max_frame_bytes;
    ws::WsResponseBuilder::new(RelaySocket::new(app_state), &req, stream)
        .frame_size(max_frame_bytes)
        .start()
}
