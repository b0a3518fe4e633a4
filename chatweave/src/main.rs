//! chatweave - chat transcript reconciliation CLI
//!
//! Replays recorded event feeds through the reconciliation engine and prints
//! the resulting transcript.

mod feed;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chatweave_core::citation;
use chatweave_core::format::{format_line, transcript_json};
use chatweave_core::notify::Notification;
use chatweave_core::reconcile::Reconciler;
use chatweave_core::timeout::TimeoutTracker;
use chatweave_core::types::{Message, QuoteInfo};
use chatweave_core::{BotInfo, Config, Notifier, SessionBootstrap, SessionInfo};
use clap::{Parser, Subcommand};

use crate::feed::{parse_feed, FeedLine, LocalAction};

#[derive(Parser)]
#[command(name = "chatweave")]
#[command(about = "Replay chat event feeds through the transcript reconciler")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a JSON Lines event feed and print the final transcript
    Replay {
        /// Feed file (one event or local action per line)
        file: PathBuf,

        /// Session the feed was recorded in
        #[arg(short, long, default_value = "s1")]
        session_id: String,

        /// Print the transcript as JSON
        #[arg(long)]
        json: bool,

        /// Print every change notification as it happens
        #[arg(short, long)]
        verbose: bool,
    },
    /// Splice citation markers into text
    Annotate {
        /// Text to annotate
        content: String,

        /// Citation tag as POSITION:INDEX (repeatable)
        #[arg(short, long = "tag", value_parser = parse_tag)]
        tags: Vec<QuoteInfo>,
    },
}

fn parse_tag(s: &str) -> std::result::Result<QuoteInfo, String> {
    let (position, index) = s
        .split_once(':')
        .ok_or_else(|| format!("expected POSITION:INDEX, got '{}'", s))?;
    Ok(QuoteInfo {
        position: position
            .parse()
            .map_err(|e| format!("bad position '{}': {}", position, e))?,
        index: index
            .parse()
            .map_err(|e| format!("bad index '{}': {}", index, e))?,
    })
}

/// Greeting used when the config does not set one
const DEFAULT_WELCOME: &str = "Hello! How can I help you today?";

/// Bootstrap for a recorded session: the id is known up front.
struct RecordedSession {
    session_id: String,
    bot_name: String,
}

impl SessionBootstrap for RecordedSession {
    async fn bootstrap(&self) -> chatweave_core::Result<SessionInfo> {
        Ok(SessionInfo {
            session_id: self.session_id.clone(),
            bot: BotInfo {
                name: self.bot_name.clone(),
                avatar: None,
                is_available: true,
                bot_biz_id: None,
                session_id: self.session_id.clone(),
            },
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging
    let _log_guard =
        chatweave_core::logging::init(&config.logging).context("failed to initialize logging")?;

    match args.command {
        Command::Replay {
            file,
            session_id,
            json,
            verbose,
        } => replay(&config, &file, session_id, json, verbose).await,
        Command::Annotate { content, tags } => {
            println!("{}", citation::annotate(&content, &tags, &[]).content);
            Ok(())
        }
    }
}

async fn replay(
    config: &Config,
    file: &Path,
    session_id: String,
    json: bool,
    verbose: bool,
) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read feed {}", file.display()))?;
    let lines = parse_feed(&text)?;
    tracing::info!(path = %file.display(), lines = lines.len(), "Replaying feed");

    let settings = config.session.clone();
    let (timeouts, _expired) = TimeoutTracker::channel(settings.ack_timeout());
    let mut notifier = Notifier::new();
    let mut notifications = notifier.subscribe();
    let mut reconciler = Reconciler::new(settings, timeouts, notifier);

    let bootstrap = RecordedSession {
        session_id,
        bot_name: config.bot.name.clone(),
    };
    let info = bootstrap
        .bootstrap()
        .await
        .context("failed to bootstrap session")?;
    reconciler.session_mut().init(info);

    let mut changes = 0usize;
    for line in lines {
        match line {
            FeedLine::Server(event) => reconciler.apply(event),
            FeedLine::Local(action) => apply_local(&mut reconciler, action)?,
        }

        while let Ok(notification) = notifications.try_recv() {
            if let Notification::TranscriptChange { kind, messages } = notification {
                changes += 1;
                if verbose {
                    eprintln!("{:<9} {} message(s)", kind, messages.len());
                }
            }
        }
    }

    let messages = reconciler.transcript().messages();
    if json {
        println!(
            "{}",
            transcript_json(messages).context("failed to encode transcript")?
        );
    } else {
        for message in messages {
            println!("{}", format_line(message));
        }
        println!();
        println!("{} message(s), {} change(s)", messages.len(), changes);
    }

    // Timers still armed belong to questions the feed never acknowledged
    reconciler.reset();
    Ok(())
}

fn apply_local(reconciler: &mut Reconciler, action: LocalAction) -> Result<()> {
    match action {
        LocalAction::Send {
            request_id,
            content,
            timestamp,
        } => {
            let mut question = Message::question(request_id, content, timestamp);
            question.session_id = reconciler.session().session_id().map(str::to_string);
            reconciler
                .send_question(question)
                .context("failed to send question")?;
        }
        LocalAction::StopGeneration => {
            if reconciler.stop_generation().is_none() {
                tracing::info!("Nothing to stop");
            }
        }
        LocalAction::Expire { request_id } => {
            reconciler.expire(&request_id);
        }
        LocalAction::Welcome { timestamp } => {
            let content = reconciler
                .settings()
                .welcome_message
                .clone()
                .unwrap_or_else(|| DEFAULT_WELCOME.to_string());
            reconciler.show_welcome(&content, timestamp);
        }
    }
    Ok(())
}
