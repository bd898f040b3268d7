//! Terminal chat client for the relay.
//!
//! Usage: `chat-client [ws://host:port/ws]`. Plain lines are sent to the
//! active room; commands start with `/`.

use anyhow::{Context, Result};
use chat_relay::{init_tracing, ChatClient, MessageStore, Settings, WsChannel};
use dotenv::dotenv;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "/join <room>  /switch <room>  /delete <n>  /list  /quit";

fn short_id(id: Option<uuid::Uuid>) -> String {
    id.map(|id| id.to_string()[..8].to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn render_thread(store: &MessageStore) {
    let Some(room) = store.active_room() else {
        println!("(no room joined)");
        return;
    };

    println!("--- #{} ---", room);
    for (index, message) in store.active_thread().iter().enumerate() {
        let who = if message.self_sent {
            "you".to_string()
        } else {
            short_id(message.sender)
        };
        println!(
            "{:>3} [{}] {}: {}",
            index,
            message.sent_at.format("%H:%M"),
            who,
            message.text
        );
    }
}

fn render_conversations(store: &MessageStore) {
    for conversation in store.conversations() {
        let marker = if store.active_room() == Some(conversation.room.as_str()) { "*" } else { " " };
        let unread = if conversation.unread > 0 {
            format!(" ({} new)", conversation.unread)
        } else {
            String::new()
        };
        println!("{} #{}{}: {}", marker, conversation.room, unread, conversation.preview);
    }
}

/// Returns `false` when the user asked to quit.
async fn handle_line(client: &mut ChatClient<WsChannel>, line: &str) -> Result<bool> {
    let (command, argument) = match line.split_once(' ') {
        Some((command, argument)) => (command, argument.trim()),
        None => (line, ""),
    };

    match command {
        "" => {}
        "/quit" => return Ok(false),
        "/help" => println!("{}", HELP),
        "/list" => render_conversations(client.store()),
        "/join" => match client.join_room(argument).await {
            Ok(()) => render_thread(client.store()),
            Err(e) => eprintln!("{}", e),
        },
        "/switch" => {
            if client.focus(argument) {
                render_thread(client.store());
            } else {
                eprintln!("Not in room {}", argument);
            }
        }
        "/delete" => {
            let target = argument
                .parse::<usize>()
                .ok()
                .and_then(|index| client.store().active_thread().get(index))
                .map(|message| message.id);
            match target {
                Some(id) => {
                    client.delete(id).await?;
                    render_thread(client.store());
                }
                None => eprintln!("No message at {}", argument),
            }
        }
        _ => match client.send(line).await {
            Ok(_) => render_thread(client.store()),
            Err(e) => eprintln!("{}", e),
        },
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    init_tracing("warn");

    let settings = Settings::new().context("Failed to load settings")?;
    let url = std::env::args().nth(1).unwrap_or(settings.client.server_url);

    let mut client = ChatClient::new(WsChannel::new(&url)?);
    let id = client
        .mount()
        .await
        .with_context(|| format!("Failed to connect to {}", url))?;
    println!("Connected to {} as {}", url, short_id(Some(id)));
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("Failed to read stdin")? {
                    Some(line) => {
                        if !handle_line(&mut client, line.trim()).await? {
                            break;
                        }
                    }
                    None => break,
                }
            }
            update = client.recv_update() => {
                match update {
                    Some(true) => render_thread(client.store()),
                    Some(false) => {}
                    None => {
                        eprintln!("Connection to {} lost", url);
                        break;
                    }
                }
            }
        }
    }

    client.unmount().await?;
    Ok(())
}
