//! Serve command: run a pairing session until interrupted.
//!
//! Prints the connection invite (QR code or JSON), then keeps the
//! session alive. While running, a small line protocol on stdin drives
//! the session:
//!
//! ```text
//! send <path>      send a file to the peer
//! folder <path>    archive a folder and send it
//! clipboard        send the current clipboard text now
//! request          ask the peer for its clipboard
//! quit             stop the session and exit
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use paircast_core::invite::{local_ip, ConnectionInvite};
use paircast_core::session::{EngineEvent, SessionManager, SessionState};

use super::ServeArgs;

/// Run the serve command.
pub async fn run(args: ServeArgs) -> Result<()> {
    let mut config = super::load_config();
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(folder) = args.folder {
        config.sync_folder = folder;
    }
    if args.no_clipboard {
        config.clipboard_sync = false;
    }

    let (manager, events) = SessionManager::new(&config).context("failed to create session")?;
    let addr = manager
        .start(config.port)
        .await
        .context("failed to start session")?;

    let invite = ConnectionInvite::new(local_ip(), addr.port());
    if args.json {
        println!("{}", invite.to_json()?);
    } else {
        println!();
        println!("  Paircast session on {}:{}", invite.ip, invite.port);
        println!("  Receiving files into {}", manager.sync_folder().display());
        println!();
        println!("{}", invite.to_qr_string()?);
        println!();
        println!("  Scan the code with the mobile app to connect.");
        println!("  Type 'help' for session commands, Ctrl-C to stop.");
        println!();
    }

    tokio::spawn(print_events(events));

    command_loop(&manager).await;

    manager.stop().await;
    println!("  Session stopped.");
    Ok(())
}

/// Read stdin commands until quit, EOF, or Ctrl-C.
async fn command_loop(manager: &SessionManager) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => line,
                _ => break,
            },
        };

        let line = line.trim();
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        let result = match command {
            "" => continue,
            "quit" | "exit" => break,
            "help" => {
                print_help();
                continue;
            }
            "send" => manager.send_file(Path::new(rest)).await,
            "folder" => manager.send_folder(Path::new(rest)).await,
            "clipboard" => manager.send_clipboard().await,
            "request" => manager.request_clipboard().await,
            other => {
                eprintln!("  Unknown command '{other}'; type 'help'.");
                continue;
            }
        };

        if let Err(e) = result {
            eprintln!("  Error: {e}");
        }
    }
}

async fn print_events(mut events: mpsc::Receiver<EngineEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            EngineEvent::StatusChanged { state, peer } => match (state, peer) {
                (SessionState::Connected, Some(peer)) => {
                    println!("  Connected to {peer}");
                }
                (SessionState::Connected, None) => println!("  Connected"),
                (SessionState::Idle, _) => println!("  Disconnected"),
                (SessionState::Listening, _) => println!("  Waiting for peer..."),
            },
            EngineEvent::TransferProgress(label) => println!("  {label}"),
            EngineEvent::FileReceived(name) => println!("  Received {name}"),
            EngineEvent::Error { message, .. } => eprintln!("  Error: {message}"),
        }
    }
}

fn print_help() {
    println!("  send <path>      send a file to the peer");
    println!("  folder <path>    archive a folder and send it");
    println!("  clipboard        send the current clipboard text now");
    println!("  request          ask the peer for its clipboard");
    println!("  quit             stop the session and exit");
}
