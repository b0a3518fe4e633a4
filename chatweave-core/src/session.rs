//! Session-scoped state and the bootstrap seam
//!
//! A chat session needs a session id and bot metadata before the first
//! question can be sent. Obtaining them is the job of a [`SessionBootstrap`]
//! implementation (an outbound call in a real deployment); the resulting
//! [`SessionState`] lives for the duration of the session and is cleared by
//! [`SessionState::destroy`].

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::config::BotSettings;
use crate::error::Result;

/// Bot metadata published to observers via `configChange`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub is_available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_biz_id: Option<String>,
    /// Session this bot metadata was issued for
    pub session_id: String,
}

/// Everything a bootstrap call yields
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    pub session_id: String,
    pub bot: BotInfo,
}

/// Obtains a session id and bot metadata.
///
/// This is the only suspension point before messaging can begin.
pub trait SessionBootstrap: Send + Sync {
    fn bootstrap(&self) -> impl Future<Output = Result<SessionInfo>> + Send;
}

/// Bootstrap that mints a UUID v4 session id locally and reports the
/// configured bot metadata.
#[derive(Debug, Clone)]
pub struct LocalBootstrap {
    bot: BotSettings,
}

impl LocalBootstrap {
    pub fn new(bot: BotSettings) -> Self {
        Self { bot }
    }
}

impl SessionBootstrap for LocalBootstrap {
    async fn bootstrap(&self) -> Result<SessionInfo> {
        let session_id = uuid::Uuid::new_v4().to_string();
        Ok(SessionInfo {
            bot: BotInfo {
                name: self.bot.name.clone(),
                avatar: self.bot.avatar.clone(),
                is_available: true,
                bot_biz_id: self.bot.bot_biz_id.clone(),
                session_id: session_id.clone(),
            },
            session_id,
        })
    }
}

/// Per-session state owned by the reconciler.
#[derive(Debug, Default, Clone)]
pub struct SessionState {
    session_id: Option<String>,
    bot: Option<BotInfo>,
    /// A human agent currently owns the conversation
    handoff_active: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt the result of a successful bootstrap.
    pub fn init(&mut self, info: SessionInfo) {
        self.session_id = Some(info.session_id);
        self.bot = Some(info.bot);
        self.handoff_active = false;
    }

    /// Forget everything; the session must bootstrap again before sending.
    pub fn destroy(&mut self) {
        *self = Self::default();
    }

    /// True once a session id and bot metadata are known
    pub fn is_ready(&self) -> bool {
        self.session_id.is_some() && self.bot.is_some()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn bot(&self) -> Option<&BotInfo> {
        self.bot.as_ref()
    }

    /// Whether an event stamped with `session_id` belongs to this session
    pub fn is_current(&self, session_id: Option<&str>) -> bool {
        match (self.session_id.as_deref(), session_id) {
            (Some(ours), Some(theirs)) => ours == theirs,
            _ => false,
        }
    }

    pub fn handoff_active(&self) -> bool {
        self.handoff_active
    }

    pub fn set_handoff(&mut self, active: bool) {
        if self.handoff_active != active {
            tracing::info!(active, "Human handoff state changed");
        }
        self.handoff_active = active;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_bootstrap_mints_session() {
        let bootstrap = LocalBootstrap::new(BotSettings::default());
        let first = bootstrap.bootstrap().await.unwrap();
        let second = bootstrap.bootstrap().await.unwrap();

        assert_eq!(first.session_id, first.bot.session_id);
        assert!(first.bot.is_available);
        assert_ne!(first.session_id, second.session_id);
    }

    #[tokio::test]
    async fn test_state_lifecycle() {
        let mut state = SessionState::new();
        assert!(!state.is_ready());
        assert!(!state.is_current(Some("s1")));

        let info = LocalBootstrap::new(BotSettings::default())
            .bootstrap()
            .await
            .unwrap();
        let id = info.session_id.clone();
        state.init(info);

        assert!(state.is_ready());
        assert!(state.is_current(Some(&id)));
        assert!(!state.is_current(Some("other")));
        assert!(!state.is_current(None));

        state.set_handoff(true);
        state.destroy();
        assert!(!state.is_ready());
        assert!(!state.handoff_active());
    }
}
