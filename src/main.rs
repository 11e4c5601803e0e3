//! Terminal chat
//!
//! Each stdin line becomes the draft and is committed. A line ending in `\`
//! keeps the draft open and continues it on the next line.

use chat_core::{
    spawn_conversation, ChatConfig, KeyInput, LoggingReply, Message, Origin, ViewEvent,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they never interleave with the transcript
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat_core=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let json = std::env::args().skip(1).any(|arg| arg == "--json");

    let config = ChatConfig::from_env()?;
    tracing::info!(
        reply_delay_ms = %config.reply_delay.as_millis(),
        reply_mode = ?config.reply_mode,
        max_reply_attempts = config.max_reply_attempts,
        "Configuration loaded"
    );

    let generator = Arc::new(LoggingReply::new(config.reply_mode.generator()));
    let handle = spawn_conversation(&config, generator);

    let (_, rx) = handle.subscribe();
    let renderer = tokio::spawn(render(BroadcastStream::new(rx), json));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let draft = handle.snapshot().draft;
        if let Some(continued) = line.strip_suffix('\\') {
            handle.set_draft(format!("{draft}{continued}")).await?;
            handle.key(KeyInput::ShiftEnter).await?;
        } else {
            handle.set_draft(format!("{draft}{line}")).await?;
            handle.key(KeyInput::Enter).await?;
        }
    }

    tracing::info!(conv_id = %handle.conversation_id(), "Input closed, tearing down");
    handle.discard().await;
    renderer.await?;

    Ok(())
}

async fn render(mut events: BroadcastStream<ViewEvent>, json: bool) {
    while let Some(event) = events.next().await {
        let event = match event {
            Ok(event) => event,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Renderer lagged behind view events");
                continue;
            }
        };

        if json {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::error!(error = %e, "Failed to serialize view event"),
            }
        } else {
            match &event {
                ViewEvent::MessageAppended { message } => println!("{}", format_message(message)),
                ViewEvent::PendingChanged { pending: true, .. } => println!("AI is typing..."),
                _ => {}
            }
        }

        if matches!(event, ViewEvent::Closed) {
            break;
        }
    }
}

fn format_message(message: &Message) -> String {
    let label = match message.origin() {
        Origin::User => "You",
        Origin::Assistant => "AI",
    };
    if message.is_error() {
        format!("{label} [error]: {}", message.content())
    } else {
        format!("{label}: {}", message.content())
    }
}
