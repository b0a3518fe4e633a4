//! # chatweave-core
//!
//! Client-side reconciliation engine for streaming chat transcripts.
//!
//! This library provides:
//! - Domain types for messages, citations and agent thought traces
//! - The transcript store with record-id deduplication
//! - The event reconciler (questions, answers, history backfill, side channels)
//! - Acknowledgment timeouts and change notifications
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! Events flow in one direction:
//! - **Inbound:** server pushes (`reply`, `reference`, `rating`, `token_stat`,
//!   `thought`, history pages) and local actions (send, stop, timer expiry)
//! - **Reconcile:** each event is merged into the [`Transcript`] to
//!   completion, then the transcript is deduplicated and re-ordered
//! - **Notify:** observers receive the updated transcript and the kind of
//!   change that produced it
//!
//! ## Example
//!
//! ```rust,no_run
//! use chatweave_core::{ChatClient, Config, LocalBootstrap};
//! use tokio::sync::mpsc;
//!
//! # async fn demo() -> chatweave_core::Result<()> {
//! let config = Config::load()?;
//! let (outbound_tx, _outbound_rx) = mpsc::unbounded_channel();
//! let mut client = ChatClient::new(
//!     config.session.clone(),
//!     LocalBootstrap::new(config.bot.clone()),
//!     outbound_tx,
//! );
//! let mut updates = client.subscribe();
//! client.trigger_send_msg("hello").await?;
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use client::ChatClient;
pub use config::Config;
pub use error::{Error, Result};
pub use events::{ChangeKind, InboundEvent, OutboundEvent};
pub use notify::{Notification, Notifier, Observer};
pub use reconcile::Reconciler;
pub use session::{BotInfo, LocalBootstrap, SessionBootstrap, SessionInfo};
pub use transcript::Transcript;
pub use types::*;

// Public modules
pub mod citation;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod format;
pub mod logging;
pub mod notify;
pub mod procedure;
pub mod reconcile;
pub mod session;
pub mod timeout;
pub mod transcript;
pub mod types;
