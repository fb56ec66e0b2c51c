use anyhow::Result;
use clap::Parser;
use client_core::RacingClient;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

mod commands;
mod session;

use commands::{parse_command, Command, USAGE};
use session::EditorSession;

#[derive(Parser, Debug)]
struct Args {
    /// Racing server to load from and save to; edits stay local without it.
    #[arg(long)]
    server_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut session = match args.server_url.as_deref() {
        Some(url) => {
            let mut session = EditorSession::with_remote(RacingClient::new(url)?);
            session.load_remote().await?;
            session
        }
        None => EditorSession::offline(),
    };

    println!("{USAGE}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(error) => {
                eprintln!("error: {error:#}");
                continue;
            }
        };

        match command {
            Command::Quit => break,
            Command::Help => println!("{USAGE}"),
            Command::Entity { kind, action } => match session.apply(kind, action).await {
                Ok(output) => println!("{output}"),
                Err(error) => eprintln!("error: {error:#}"),
            },
        }
    }

    Ok(())
}
