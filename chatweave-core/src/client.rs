//! Session-level driver
//!
//! [`ChatClient`] owns a [`Reconciler`] and wires it to the outside world:
//! it bootstraps the session, stamps outbound questions, forwards requests to
//! the transport over an [`OutboundEvent`] channel and feeds timer expiries
//! back into the reconciler.
//!
//! All mutation happens on whichever task drives the client, one event at a
//! time. [`ChatClient::run`] is a convenience loop for the common case of a
//! single inbound channel.

use chrono::Utc;
use tokio::sync::mpsc;

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::events::{InboundEvent, OutboundEvent};
use crate::notify::{Notification, Notifier};
use crate::reconcile::Reconciler;
use crate::session::SessionBootstrap;
use crate::timeout::TimeoutTracker;
use crate::transcript::Transcript;
use crate::types::Message;

/// One step of the [`ChatClient::run`] loop
enum Step {
    Inbound(Option<InboundEvent>),
    Expired(String),
    Welcome,
}

/// A chat session bound to a bootstrap implementation and a transport.
pub struct ChatClient<B> {
    bootstrap: B,
    reconciler: Reconciler,
    outbound: mpsc::UnboundedSender<OutboundEvent>,
    expired_rx: mpsc::UnboundedReceiver<String>,
}

impl<B: SessionBootstrap> ChatClient<B> {
    pub fn new(
        settings: SessionConfig,
        bootstrap: B,
        outbound: mpsc::UnboundedSender<OutboundEvent>,
    ) -> Self {
        let (timeouts, expired_rx) = TimeoutTracker::channel(settings.ack_timeout());
        Self {
            bootstrap,
            reconciler: Reconciler::new(settings, timeouts, Notifier::new()),
            outbound,
            expired_rx,
        }
    }

    /// Subscribe to notifications over a channel.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<Notification> {
        self.reconciler.notifier_mut().subscribe()
    }

    pub fn notifier_mut(&mut self) -> &mut Notifier {
        self.reconciler.notifier_mut()
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn transcript(&self) -> &Transcript {
        self.reconciler.transcript()
    }

    pub fn message_by_record_id(&self, record_id: &str) -> Option<&Message> {
        self.reconciler.transcript().message_by_record_id(record_id)
    }

    pub fn question_for(&self, record_id: &str) -> Option<&Message> {
        self.reconciler.question_for(record_id)
    }

    /// Number of questions still waiting for acknowledgment
    pub fn pending_timeouts(&self) -> usize {
        self.reconciler.timeouts().len()
    }

    /// Bootstrap the session. Alias of [`ChatClient::query_config`].
    pub async fn init(&mut self) -> Result<()> {
        self.query_config().await
    }

    /// Obtain a session id and bot metadata, then publish `configChange`.
    pub async fn query_config(&mut self) -> Result<()> {
        let info = self.bootstrap.bootstrap().await.map_err(|e| match e {
            Error::Bootstrap(_) => e,
            other => Error::Bootstrap(other.to_string()),
        })?;
        tracing::info!(session_id = %info.session_id, bot = %info.bot.name, "Session ready");

        let bot = info.bot.clone();
        self.reconciler.session_mut().init(info);
        self.reconciler.notifier_mut().config_changed(&bot);
        Ok(())
    }

    /// Send a question, bootstrapping first if needed.
    ///
    /// Returns the request id the question was sent under. If the bootstrap
    /// fails nothing is sent and the transcript is left untouched.
    pub async fn trigger_send_msg(&mut self, text: &str) -> Result<String> {
        if !self.reconciler.session().is_ready() {
            self.query_config().await?;
        }
        let session_id = self
            .reconciler
            .session()
            .session_id()
            .map(str::to_string)
            .ok_or_else(|| Error::Bootstrap("session has no id".to_string()))?;

        let request_id = uuid::Uuid::new_v4().to_string();
        let mut question = Message::question(&request_id, text, Utc::now().timestamp_millis());
        question.session_id = Some(session_id.clone());
        self.reconciler.send_question(question)?;

        let send = OutboundEvent::Send {
            request_id: request_id.clone(),
            session_id,
            content: text.to_string(),
        };
        if self.outbound.send(send).is_err() {
            tracing::warn!(request_id = %request_id, "Transport closed; question will time out");
        }
        Ok(request_id)
    }

    /// Apply one inbound server event.
    pub fn handle(&mut self, event: InboundEvent) {
        self.reconciler.apply(event);
    }

    /// Apply a timer expiry. Returns false if the request was already settled.
    pub fn handle_expired(&mut self, request_id: &str) -> bool {
        self.reconciler.expire(request_id)
    }

    /// Wait for the next timer expiry that actually fails a question.
    pub async fn next_expiry(&mut self) -> Option<String> {
        loop {
            let request_id = self.expired_rx.recv().await?;
            if self.reconciler.expire(&request_id) {
                return Some(request_id);
            }
        }
    }

    /// Apply every expiry already queued, returning how many failed a question.
    pub fn drain_expired(&mut self) -> usize {
        let mut failed = 0;
        while let Ok(request_id) = self.expired_rx.try_recv() {
            if self.reconciler.expire(&request_id) {
                failed += 1;
            }
        }
        failed
    }

    /// Insert the configured greeting into an empty transcript.
    pub fn show_welcome(&mut self) -> bool {
        let Some(text) = self.reconciler.settings().welcome_message.clone() else {
            return false;
        };
        self.reconciler
            .show_welcome(&text, Utc::now().timestamp_millis())
    }

    /// Stop the streaming message and ask the transport to stop upstream.
    pub fn stop_generation(&mut self) -> Option<String> {
        let record_id = self.reconciler.stop_generation()?;
        let stop = OutboundEvent::StopGeneration {
            record_id: record_id.clone(),
        };
        if self.outbound.send(stop).is_err() {
            tracing::warn!(record_id = %record_id, "Transport closed; stop not forwarded");
        }
        Some(record_id)
    }

    /// Drive the session until `inbound` closes.
    ///
    /// Interleaves server events with timer expiries and shows the greeting
    /// once the welcome delay has passed.
    pub async fn run(&mut self, mut inbound: mpsc::UnboundedReceiver<InboundEvent>) -> Result<()> {
        let welcome = tokio::time::sleep(self.reconciler.settings().welcome_delay());
        tokio::pin!(welcome);
        let mut welcome_pending = self.reconciler.settings().welcome_message.is_some();

        loop {
            let step = tokio::select! {
                event = inbound.recv() => Step::Inbound(event),
                Some(request_id) = self.expired_rx.recv() => Step::Expired(request_id),
                () = &mut welcome, if welcome_pending => Step::Welcome,
            };

            match step {
                Step::Inbound(Some(event)) => self.handle(event),
                Step::Inbound(None) => break,
                Step::Expired(request_id) => {
                    self.handle_expired(&request_id);
                }
                Step::Welcome => {
                    welcome_pending = false;
                    self.show_welcome();
                }
            }
        }

        tracing::debug!("Inbound channel closed");
        Ok(())
    }

    /// Tear down the session: cancel timers, clear transcript and session.
    pub fn destroy(&mut self) {
        self.reconciler.reset();
        tracing::info!("Session destroyed");
    }
}
