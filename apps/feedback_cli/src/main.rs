use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use client_core::{
    load_settings, ChannelNotifier, FeedbackController, FeedbackExtra, FeedbackValue, MemoryStore,
    MutationOutcome, StateStore,
};
use shared::domain::{FeedbackType, MessageId};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Action {
    Like,
    Dislike,
    Remove,
    ToggleLike,
    ToggleDislike,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Current {
    None,
    Like,
    Dislike,
}

impl From<Current> for FeedbackValue {
    fn from(value: Current) -> Self {
        match value {
            Current::None => None,
            Current::Like => Some(FeedbackType::Like),
            Current::Dislike => Some(FeedbackType::Dislike),
        }
    }
}

#[derive(Parser, Debug)]
struct Args {
    /// Overrides the server url from client.toml / environment.
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    message_id: i64,
    #[arg(long, value_enum)]
    action: Action,
    /// Feedback currently shown for the message.
    #[arg(long, value_enum, default_value = "none")]
    current: Current,
    #[arg(long)]
    text: Option<String>,
    #[arg(long)]
    predefined: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }
    info!(server_url = %settings.server_url, "feedback client starting");

    let message_id = MessageId(args.message_id);
    let store = Arc::new(MemoryStore::from_entries([(
        message_id,
        FeedbackValue::from(args.current),
    )]));
    let (notifier, mut notifications) = ChannelNotifier::new();
    let controller = FeedbackController::from_settings(&settings, store.clone(), Arc::new(notifier))
        .context("failed to build feedback controller")?;

    let extra = (args.text.is_some() || args.predefined.is_some()).then(|| FeedbackExtra {
        feedback_text: args.text,
        predefined_feedback: args.predefined,
    });
    let handle = match args.action {
        Action::Like => controller.submit(message_id, FeedbackType::Like, extra),
        Action::Dislike => controller.submit(message_id, FeedbackType::Dislike, extra),
        Action::Remove => controller.remove(message_id),
        Action::ToggleLike => controller.toggle(message_id, FeedbackType::Like, extra),
        Action::ToggleDislike => controller.toggle(message_id, FeedbackType::Dislike, extra),
    };
    println!(
        "optimistic value for message {message_id}: {}",
        describe(store.get(&message_id).flatten())
    );

    let outcome = handle.await;
    match &outcome {
        MutationOutcome::Committed => println!("committed"),
        MutationOutcome::RolledBack { message } => println!("rolled back: {message}"),
        MutationOutcome::Skipped => println!("skipped: message {message_id} is not tracked"),
        MutationOutcome::Interrupted => println!("interrupted before settling"),
    }
    println!(
        "final value for message {message_id}: {}",
        describe(store.get(&message_id).flatten())
    );

    while let Ok(notification) = notifications.try_recv() {
        println!("notification: {}", serde_json::to_string(&notification)?);
    }

    Ok(())
}

fn describe(value: FeedbackValue) -> String {
    value.map_or_else(|| "none".to_string(), |feedback| feedback.to_string())
}
