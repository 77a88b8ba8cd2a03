// ABOUTME: slackbot command-line entry point
// ABOUTME: Loads config, initializes logging, and runs one send/receive/chat/history flow

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use slackbot::config::Config;
use slackbot::platform::slack::AppsConnectionsOpen;
use slackbot::reply::ReplySignal;
use slackbot::traits::{FileUploadParams, SlackApi};
use slackbot::watchers::{FileCollector, ReplyWatcher};
use slackbot::{logging, FileDownloader, MessageService, SlackWebClient, SocketModeTransport};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

type AppTransport = SocketModeTransport<AppsConnectionsOpen>;

#[derive(Parser)]
#[command(name = "slackbot")]
#[command(about = "Send and receive Slack messages and files as a bot")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Post a message to a channel, or DM a user
    Send {
        /// Channel ID to post into
        #[arg(short, long, required_unless_present = "user", conflicts_with = "user")]
        channel: Option<String>,
        /// User ID to DM
        #[arg(short, long)]
        user: Option<String>,
        #[arg(short, long)]
        message: String,
    },
    /// DM a user a file and wait for their reply
    SendFile {
        /// Recipient's Slack user ID
        user: String,
        /// File to upload
        path: PathBuf,
        #[arg(short, long, default_value = "Sending you a file")]
        message: String,
        /// File title (optional)
        #[arg(short, long)]
        title: Option<String>,
        /// Snippet type, e.g. "text" or "python" (optional)
        #[arg(long)]
        snippet_type: Option<String>,
        /// Delete the upload once the wait is over
        #[arg(long)]
        rm: bool,
        /// Seconds to wait for a reply
        #[arg(short, long, default_value_t = 10)]
        wait: u64,
    },
    /// Ask a user for files and save the ones they send back
    Receive {
        /// Slack user ID to ask
        user: String,
        #[arg(short, long, default_value = "Please send me a file")]
        message: String,
        /// Download directory
        #[arg(short, long, default_value = "tmp")]
        dir: PathBuf,
        /// Delete received files from Slack after downloading
        #[arg(long)]
        rm: bool,
        /// Seconds to wait for files
        #[arg(short, long, default_value_t = 10)]
        wait: u64,
    },
    /// Interactive DM chat on stdin
    Chat {
        /// User ID to chat with (prompted when omitted)
        user: Option<String>,
    },
    /// Delete an uploaded file
    DeleteFile { file_id: String },
    /// Print recent messages in a channel
    History {
        channel: String,
        #[arg(short, long, default_value_t = 10)]
        limit: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::load()?;
    let _log_guard = logging::init(&config.logging)?;
    tracing::debug!(slack = ?config.slack, "Configuration loaded");

    let client = SlackWebClient::new(&config.slack.bot_token)?;
    let service = MessageService::from_config(client, &config);

    let ok = match cli.command {
        Commands::Send {
            channel,
            user,
            message,
        } => run_send(&service, channel, user, &message).await,
        Commands::SendFile {
            user,
            path,
            message,
            title,
            snippet_type,
            rm,
            wait,
        } => {
            let mut params = FileUploadParams::from_path(&path);
            params.title = title;
            params.snippet_type = snippet_type;
            let transport = socket_transport(&config)?;
            run_send_file(&service, transport, &user, &path, &message, params, rm, wait).await?
        }
        Commands::Receive {
            user,
            message,
            dir,
            rm,
            wait,
        } => {
            let transport = socket_transport(&config)?;
            run_receive(&service, transport, &user, &message, dir, rm, wait).await?
        }
        Commands::Chat { user } => {
            let transport = socket_transport(&config)?;
            run_chat(&service, transport, user).await?;
            true
        }
        Commands::DeleteFile { file_id } => {
            let deleted = service.delete_file(&file_id).await;
            if deleted {
                println!("Deleted file {}", file_id);
            } else {
                println!("Failed to delete file {}", file_id);
            }
            deleted
        }
        Commands::History { channel, limit } => run_history(&service, &channel, limit).await,
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

fn socket_transport(config: &Config) -> Result<AppTransport> {
    SocketModeTransport::for_app(config.slack.require_app_token()?)
}

async fn run_send<A: SlackApi + 'static>(
    service: &MessageService<A>,
    channel: Option<String>,
    user: Option<String>,
    message: &str,
) -> bool {
    let sent = match (channel, user) {
        (Some(channel), _) => service.send_message(&channel, message).await.is_some(),
        (None, Some(user)) => service.send_dm(&user, message, None).await.is_some(),
        (None, None) => false,
    };

    if sent {
        println!("Message sent");
    } else {
        println!("Failed to send message");
    }
    sent
}

#[allow(clippy::too_many_arguments)]
async fn run_send_file<A: SlackApi + 'static>(
    service: &MessageService<A>,
    transport: AppTransport,
    user: &str,
    path: &std::path::Path,
    message: &str,
    params: FileUploadParams,
    rm: bool,
    wait: u64,
) -> Result<bool> {
    if !path.exists() {
        println!("Error: file '{}' not found", path.display());
        return Ok(false);
    }

    let signal = ReplySignal::new();
    service.add_message_handler(Arc::new(ReplyWatcher::new(user, signal.clone())));
    let guard = service.start(transport).await?;

    let sent = match service.send_dm(user, message, Some(params)).await {
        Some(result) => {
            let file_id = result.file_id().unwrap_or_default().to_string();
            println!("File sent. File ID: {}", file_id);

            if !signal.wait(Duration::from_secs(wait)).await {
                println!("No reply");
            }
            if rm && !file_id.is_empty() {
                service.delete_file(&file_id).await;
            }
            true
        }
        None => {
            println!("Failed to send file");
            false
        }
    };

    guard.stop().await?;
    Ok(sent)
}

async fn run_receive(
    service: &MessageService<SlackWebClient>,
    transport: AppTransport,
    user: &str,
    message: &str,
    dir: PathBuf,
    rm: bool,
    wait: u64,
) -> Result<bool> {
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let signal = ReplySignal::new();
    let downloader = FileDownloader::new(service.api().http().clone(), service.api().bot_token());
    let collector = FileCollector::new(user, service.clone(), downloader, dir, signal.clone())
        .remove_after(rm);
    service.add_message_handler(Arc::new(collector));
    let guard = service.start(transport).await?;

    let sent = match service.send_dm(user, message, None).await {
        Some(_) => {
            println!("Message sent: {}", message);
            println!("Waiting for files...");
            if !signal.wait(Duration::from_secs(wait)).await {
                println!("No reply");
            }
            true
        }
        None => {
            println!("Failed to send message");
            false
        }
    };

    guard.stop().await?;
    Ok(sent)
}

async fn run_chat<A: SlackApi + 'static>(
    service: &MessageService<A>,
    transport: AppTransport,
    user: Option<String>,
) -> Result<()> {
    let guard = service.start(transport).await?;
    println!("Connected to Slack.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let user = match user {
        Some(user) => user,
        None => {
            prompt("User ID to chat with: ")?;
            match lines.next_line().await? {
                Some(line) => line.trim().to_string(),
                None => return guard.stop().await,
            }
        }
    };
    service.add_message_handler(Arc::new(ReplyWatcher::new(&user, ReplySignal::new())));

    loop {
        prompt("Message (type 'exit' to quit): ")?;
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!("\nExiting...");
                break;
            }
        };
        let Some(line) = line else { break };

        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if message.eq_ignore_ascii_case("exit") {
            break;
        }

        match service.send_dm(&user, message, None).await {
            Some(_) => println!("Message sent."),
            None => println!("Failed to send message."),
        }
    }

    guard.stop().await
}

async fn run_history<A: SlackApi + 'static>(
    service: &MessageService<A>,
    channel: &str,
    limit: u16,
) -> bool {
    let Some(messages) = service.channel_history(channel, limit).await else {
        println!("Failed to fetch history for {}", channel);
        return false;
    };

    for msg in messages {
        println!(
            "{} {}: {}",
            msg.ts,
            msg.user.as_deref().unwrap_or("-"),
            msg.text.as_deref().unwrap_or_default()
        );
    }
    true
}

fn prompt(text: &str) -> Result<()> {
    print!("{}", text);
    std::io::stdout().flush().context("Failed to flush stdout")
}
