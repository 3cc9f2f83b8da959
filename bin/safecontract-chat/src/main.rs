//! safecontract-chat – terminal front-end for the streaming chat API.
//!
//! Reads one message per line from stdin and prints the reply as it streams.
//! Ctrl-C during a reply cancels it; Ctrl-C at the prompt exits.

use clap::Parser;
use safecontract_client::{
    ChatClient, ConversationEvent, Outcome, Role, Settlement, cancel_channel,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};
use tracing::debug;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "safecontract-chat", version, about = "Chat with the SafeContract legal copilot")]
struct Args {
    /// API base URL; messages are posted to `{base}/api/chat`.
    #[arg(long, env = "SAFECONTRACT_API_BASE_URL", default_value = "http://localhost:5222")]
    base_url: String,

    /// `tracing` filter for diagnostics written to stderr.
    #[arg(long, env = "SAFECONTRACT_LOG", default_value = "warn")]
    log: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| args.log.parse::<tracing_subscriber::EnvFilter>())
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let client = ChatClient::new(&args.base_url);
    debug!(base_url = %args.base_url, "chat client ready");

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        prompt(&mut stdout).await?;
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }

        let settlement = converse(&client, message, &mut stdout).await?;
        if let Outcome::Faulted(e) = &settlement.outcome {
            eprintln!("error: {e}");
        }
    }

    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}

async fn prompt(stdout: &mut Stdout) -> std::io::Result<()> {
    stdout.write_all(b"> ").await?;
    stdout.flush().await
}

/// Send one message and echo the assistant's reply until it settles.
async fn converse(
    client: &ChatClient,
    message: &str,
    stdout: &mut Stdout,
) -> anyhow::Result<Settlement> {
    let mut events = client.conversation().subscribe();
    let (cancel, signal) = cancel_channel();
    let send = client.send_message_with_cancel(message, signal);
    tokio::pin!(send);

    let mut reply: Option<Uuid> = None;
    let settlement = loop {
        tokio::select! {
            settlement = &mut send => break settlement,
            event = events.recv() => {
                if let Ok(event) = event {
                    echo(stdout, &mut reply, event).await?;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                debug!("cancelling reply");
                cancel.cancel();
            }
        }
    };

    // Events published just before settlement may still be queued.
    while let Ok(event) = events.try_recv() {
        echo(stdout, &mut reply, event).await?;
    }
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(settlement)
}

async fn echo(
    stdout: &mut Stdout,
    reply: &mut Option<Uuid>,
    event: ConversationEvent,
) -> std::io::Result<()> {
    match event {
        ConversationEvent::Added {
            id,
            role: Role::Assistant,
        } => *reply = Some(id),
        ConversationEvent::Appended { id, text } if Some(id) == *reply => {
            stdout.write_all(text.as_bytes()).await?;
            stdout.flush().await?;
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn base_url_defaults_to_local_server() {
        use clap::CommandFactory;

        let command = Args::command();
        let arg = command
            .get_arguments()
            .find(|a| a.get_id() == "base_url")
            .expect("base_url arg");
        let defaults: Vec<_> = arg.get_default_values().iter().map(|v| v.to_str()).collect();
        assert_eq!(defaults, vec![Some("http://localhost:5222")]);
        assert_eq!(
            arg.get_env(),
            Some(std::ffi::OsStr::new("SAFECONTRACT_API_BASE_URL"))
        );
    }

    #[test]
    fn base_url_flag_overrides() {
        let args = Args::try_parse_from(["safecontract-chat", "--base-url", "http://api:8080"])
            .expect("args");
        assert_eq!(args.base_url, "http://api:8080");
    }
}
