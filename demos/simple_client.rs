//! Simple IRC client example
//!
//! Connects to Libera.Chat over TLS, joins a channel, greets it and echoes
//! anyone who says hello. Set `RUST_LOG=slirc_client=debug` to watch the
//! engine at work, and `IRC_NICK` / `IRC_CHANNEL` to change the defaults.

use std::ops::ControlFlow;

use tracing_subscriber::EnvFilter;

use slirc_client::transport::{run, TokioTransport, DEFAULT_POLL_INTERVAL};
use slirc_client::{Client, ClientConfig, Event, ServerAddress};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let nick = std::env::var("IRC_NICK").unwrap_or_else(|_| "slirc_example".to_owned());
    let channel = std::env::var("IRC_CHANNEL").unwrap_or_else(|_| "#slirc-example".to_owned());

    let config = ClientConfig {
        nickname: nick.clone(),
        alt_nicks: vec![format!("{nick}_")],
        ..ClientConfig::default()
    };
    let mut client = Client::new(config, Box::new(TokioTransport::new()?));
    client.connect(ServerAddress::tls("irc.libera.chat"))?;

    run(&mut client, DEFAULT_POLL_INTERVAL, |client, event| {
        match event {
            Event::Connected => {
                println!("✓ Registered as {}", client.current_nick());
                client.join(&channel, None);
            }
            Event::Joined { channel } => {
                println!("→ joined {channel}");
                client.send_privmsg(&channel, "Hello from slirc-client example!");
            }
            Event::Privmsg(msg) => {
                println!("← <{}> {}: {}", msg.sender, msg.target, msg.text);
                let own = msg.sender.eq_ignore_ascii_case(client.current_nick());
                if !own && msg.target.starts_with('#') && msg.text.to_lowercase().contains("hello") {
                    match msg_id(&msg.tags) {
                        Some(id) => client.send_reply(&msg.target, "Hello there! 👋", id),
                        None => client.send_privmsg(&msg.target, "Hello there! 👋"),
                    }
                }
            }
            Event::Reconnecting { attempt, delay_secs, host, port } => {
                println!("… reconnect #{attempt} to {host}:{port} in {delay_secs}s");
            }
            Event::Disconnected(reason) => {
                println!("Connection closed: {reason}");
                return ControlFlow::Break(());
            }
            Event::ConnectionError(reason) => eprintln!("Error: {reason}"),
            _ => {}
        }
        ControlFlow::Continue(())
    })
    .await;

    Ok(())
}

fn msg_id(tags: &[slirc_client::Tag]) -> Option<&str> {
    tags.iter()
        .find(|tag| tag.0 == "msgid")
        .and_then(|tag| tag.1.as_deref())
}
