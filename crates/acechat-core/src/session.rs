//! Session controller: send, new session, clear, apply settings, listen.
//!
//! All state lives on the task that owns the [`Session`]. Network calls run in
//! spawned tasks that report back through [`SessionEvent`]s; the owner feeds
//! each one to [`Session::handle`]. Every spawned task emits exactly one
//! terminal event.

use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{ChatBackend, ChatResponse, JsonReply, ResponseKind};
use crate::epoch::{Epoch, Ticket};
use crate::error::Error;
use crate::gate::InputGate;
use crate::settings::{Settings, SettingsStore};
use crate::state::{ChatRole, MessageId};
use crate::stream::{consume_stream, is_success, StreamObserver, StreamOutcome};
use crate::transcript::Transcript;

/// How many ticks a notice stays up (~3s at the 300ms UI tick).
pub const NOTICE_TICKS: u8 = 10;

#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Full reply text so far.
    ReplyChunk { generation: u64, text: String },
    ReplyDone { generation: u64 },
    ReplyFailed { generation: u64, message: String },
    /// The reply was cut off because the transcript was reset.
    ReplyAbandoned { generation: u64 },
    NewChatFinished(Result<(), String>),
    SettingsFinished {
        settings: Settings,
        result: Result<(), String>,
    },
    ListenFinished(Result<String, String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

/// A short-lived toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub kind: NoticeKind,
    ticks_left: u8,
}

pub struct Session<B: ChatBackend> {
    backend: Arc<B>,
    store: SettingsStore,
    transcript: Transcript,
    gate: InputGate,
    settings: Settings,
    model_label: String,
    epoch: Epoch,
    tx: mpsc::UnboundedSender<SessionEvent>,
    in_flight: usize,
    active_reply: Option<MessageId>,
    /// Fires on reset so a reply blocked on a silent connection is dropped.
    reply_cancel: Option<CancellationToken>,
    listening: bool,
    dictation: Option<String>,
    notice: Option<Notice>,
}

impl<B: ChatBackend> Session<B> {
    /// Create the session and the receiver its background tasks report to.
    /// Settings are pre-populated from the store.
    pub fn new(
        backend: Arc<B>,
        store: SettingsStore,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let settings = store.load().unwrap_or_else(|e| {
            warn!(error = %e, path = %store.path().display(), "could not read saved settings");
            Settings::default()
        });
        let model_label = settings.model.clone();

        let session = Self {
            backend,
            store,
            transcript: Transcript::new(),
            gate: InputGate::new(),
            settings,
            model_label,
            epoch: Epoch::new(),
            tx,
            in_flight: 0,
            active_reply: None,
            reply_cancel: None,
            listening: false,
            dictation: None,
            notice: None,
        };
        (session, rx)
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn transcript_mut(&mut self) -> &mut Transcript {
        &mut self.transcript
    }

    pub fn gate(&self) -> &InputGate {
        &self.gate
    }

    pub fn gate_mut(&mut self) -> &mut InputGate {
        &mut self.gate
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The last successfully saved model.
    pub fn model_label(&self) -> &str {
        &self.model_label
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// Text captured by the last successful listen, if not yet consumed.
    pub fn take_dictation(&mut self) -> Option<String> {
        self.dictation.take()
    }

    /// True when no background task is outstanding.
    pub fn is_idle(&self) -> bool {
        self.in_flight == 0
    }

    /// Send a message. Returns false (and does nothing) for blank input or
    /// while a previous send is still outstanding.
    pub fn send(&mut self, message: &str) -> bool {
        let message = message.trim();
        if message.is_empty() {
            return false;
        }
        if self.gate.is_busy() {
            debug!("send ignored, reply in progress");
            return false;
        }

        self.transcript.append_message(ChatRole::User, message);
        self.gate.lock();
        self.transcript.show_typing_placeholder();
        self.active_reply = None;

        let ticket = self.epoch.ticket();
        info!(generation = ticket.generation(), "sending message");
        let backend = Arc::clone(&self.backend);
        let message = message.to_string();
        let tx = self.tx.clone();
        let cancel = CancellationToken::new();
        self.reply_cancel = Some(cancel.clone());
        self.spawn(async move { run_chat(backend, message, ticket, cancel, tx).await });
        true
    }

    /// Ask the server for a fresh conversation; the transcript is only reset
    /// once it agrees.
    pub fn new_session(&mut self) {
        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        self.spawn(async move {
            let result = backend.new_chat().await.map_err(|e| e.to_string());
            let _ = tx.send(SessionEvent::NewChatFinished(result));
        });
    }

    /// Wipe the transcript locally. No network call.
    pub fn clear(&mut self) {
        self.reset_conversation(false);
        self.set_notice("Chat cleared", NoticeKind::Success);
    }

    /// Send settings to the server; they are adopted and stored locally only
    /// if the server accepts them. Values are not validated here.
    pub fn apply_settings(&mut self, settings: Settings) {
        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        self.spawn(async move {
            let result = backend
                .save_settings(&settings)
                .await
                .map_err(|e| e.to_string());
            let _ = tx.send(SessionEvent::SettingsFinished { settings, result });
        });
    }

    /// Ask the server to capture speech. Ignored while a capture is running.
    pub fn listen(&mut self) -> bool {
        if self.listening {
            return false;
        }
        self.listening = true;

        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        self.spawn(async move {
            let result = match backend.listen().await {
                Ok(text) => Ok(text),
                Err(Error::Rejected(message)) => Err(message),
                Err(e) => {
                    warn!(error = %e, "voice recognition request failed");
                    Err("Voice recognition failed".to_string())
                }
            };
            let _ = tx.send(SessionEvent::ListenFinished(result));
        });
        true
    }

    /// Advance animations and expire the notice.
    pub fn tick(&mut self) {
        self.transcript.tick();
        if let Some(notice) = &mut self.notice {
            notice.ticks_left = notice.ticks_left.saturating_sub(1);
            if notice.ticks_left == 0 {
                self.notice = None;
            }
        }
    }

    /// Apply one event reported by a background task.
    pub fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::ReplyChunk { generation, text } => {
                if !self.is_current(generation) {
                    debug!(generation, "dropping stale chunk");
                    return;
                }
                let id = match self.active_reply {
                    Some(id) => id,
                    None => {
                        self.transcript.remove_typing_placeholder();
                        let id = self.transcript.begin_message(ChatRole::Assistant);
                        self.active_reply = Some(id);
                        id
                    }
                };
                self.transcript.update_message(id, text);
            }
            SessionEvent::ReplyDone { generation } => {
                self.task_finished();
                if !self.is_current(generation) {
                    return;
                }
                if self.active_reply.is_none() {
                    warn!("reply finished without any content");
                }
                self.finish_reply();
            }
            SessionEvent::ReplyFailed {
                generation,
                message,
            } => {
                self.task_finished();
                if !self.is_current(generation) {
                    return;
                }
                warn!(%message, "chat request failed");
                self.transcript.remove_typing_placeholder();
                self.transcript
                    .append_message(ChatRole::Error, format!("Error: {message}"));
                self.finish_reply();
            }
            SessionEvent::ReplyAbandoned { generation } => {
                self.task_finished();
                debug!(generation, "stale reply abandoned");
            }
            SessionEvent::NewChatFinished(result) => {
                self.task_finished();
                match result {
                    Ok(()) => {
                        info!("new conversation started");
                        self.reset_conversation(true);
                        self.set_notice("New conversation started", NoticeKind::Success);
                    }
                    Err(e) => {
                        warn!(error = %e, "error starting new chat");
                        self.set_notice("Error starting new chat", NoticeKind::Error);
                    }
                }
            }
            SessionEvent::SettingsFinished { settings, result } => {
                self.task_finished();
                match result {
                    Ok(()) => {
                        if let Err(e) = self.store.save(&settings) {
                            warn!(error = %e, "could not store settings locally");
                        }
                        info!(model = %settings.model, "settings saved");
                        self.model_label = settings.model.clone();
                        self.settings = settings;
                        self.set_notice("Settings saved successfully", NoticeKind::Success);
                    }
                    Err(e) => {
                        warn!(error = %e, "error saving settings");
                        self.set_notice("Error saving settings", NoticeKind::Error);
                    }
                }
            }
            SessionEvent::ListenFinished(result) => {
                self.task_finished();
                self.listening = false;
                match result {
                    Ok(text) => self.dictation = Some(text),
                    Err(message) => self.set_notice(message, NoticeKind::Error),
                }
            }
        }
    }

    fn spawn<F>(&mut self, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.in_flight += 1;
        tokio::spawn(task);
    }

    fn task_finished(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    fn is_current(&self, generation: u64) -> bool {
        generation == self.epoch.current()
    }

    fn finish_reply(&mut self) {
        self.transcript.remove_typing_placeholder();
        self.active_reply = None;
        self.reply_cancel = None;
        self.gate.unlock();
    }

    /// Invalidate in-flight replies and empty the transcript.
    fn reset_conversation(&mut self, with_welcome: bool) {
        self.epoch.advance();
        self.active_reply = None;
        if let Some(cancel) = self.reply_cancel.take() {
            cancel.cancel();
        }
        if self.gate.is_busy() {
            self.gate.unlock();
        }
        self.transcript.clear(with_welcome);
    }

    fn set_notice(&mut self, message: impl Into<String>, kind: NoticeKind) {
        self.notice = Some(Notice {
            message: message.into(),
            kind,
            ticks_left: NOTICE_TICKS,
        });
    }
}

/// Forwards stream progress to the session, tagged with its generation.
struct ReplyForwarder {
    tx: mpsc::UnboundedSender<SessionEvent>,
    ticket: Ticket,
}

impl ReplyForwarder {
    fn on_abandoned(&mut self) {
        let _ = self.tx.send(SessionEvent::ReplyAbandoned {
            generation: self.ticket.generation(),
        });
    }
}

impl StreamObserver for ReplyForwarder {
    fn on_chunk(&mut self, full_text: &str) {
        let _ = self.tx.send(SessionEvent::ReplyChunk {
            generation: self.ticket.generation(),
            text: full_text.to_string(),
        });
    }

    fn on_done(&mut self) {
        let _ = self.tx.send(SessionEvent::ReplyDone {
            generation: self.ticket.generation(),
        });
    }

    fn on_error(&mut self, message: String) {
        let _ = self.tx.send(SessionEvent::ReplyFailed {
            generation: self.ticket.generation(),
            message,
        });
    }

    fn is_cancelled(&self) -> bool {
        !self.ticket.is_current() || self.tx.is_closed()
    }
}

async fn run_chat<B: ChatBackend>(
    backend: Arc<B>,
    message: String,
    ticket: Ticket,
    cancel: CancellationToken,
    tx: mpsc::UnboundedSender<SessionEvent>,
) {
    let generation = ticket.generation();
    let mut forwarder = ReplyForwarder {
        tx: tx.clone(),
        ticket,
    };

    // The reply future only emits its terminal event as its last step, so
    // exactly one of these branches reports back.
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!(generation, "reply cancelled by reset");
            let _ = tx.send(SessionEvent::ReplyAbandoned { generation });
        }
        _ = deliver_reply(backend.as_ref(), &message, &mut forwarder) => {}
    }
}

async fn deliver_reply<B: ChatBackend>(
    backend: &B,
    message: &str,
    forwarder: &mut ReplyForwarder,
) {
    let response = match backend.chat(message).await {
        Ok(response) => response,
        Err(e) => {
            forwarder.on_error(e.to_string());
            return;
        }
    };

    match response.kind {
        ResponseKind::Stream => {
            let outcome = consume_stream(response.status, response.body, forwarder).await;
            if outcome == StreamOutcome::Cancelled {
                forwarder.on_abandoned();
            }
        }
        ResponseKind::Json => match read_json_reply(response).await {
            Ok(text) => {
                forwarder.on_chunk(&text);
                forwarder.on_done();
            }
            Err(message) => forwarder.on_error(message),
        },
    }
}

/// The non-streaming variant: the whole body is one JSON document.
async fn read_json_reply(response: ChatResponse) -> Result<String, String> {
    let ChatResponse {
        status, mut body, ..
    } = response;

    let mut bytes = Vec::new();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| e.to_string())?;
        bytes.extend_from_slice(&chunk);
    }

    let parsed = serde_json::from_slice::<JsonReply>(&bytes);
    if !is_success(status) {
        // A failed status never becomes a reply, whatever the body says.
        return match parsed {
            Ok(JsonReply {
                error: Some(error), ..
            }) => Err(error),
            _ => Err(Error::Status(status).to_string()),
        };
    }

    match parsed {
        Ok(reply) => reply.into_result(),
        Err(e) => Err(Error::Json(e).to_string()),
    }
}
