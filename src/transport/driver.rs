//! Async driver loop.

use std::ops::ControlFlow;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::client::Client;
use crate::event::Event;

/// How often [`run`] polls the client unless told otherwise.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Poll `client` every `interval` and hand each event to `on_event`.
///
/// The callback gets the client back so it can issue commands. Returning
/// [`ControlFlow::Break`] stops the loop.
///
/// ```no_run
/// use std::ops::ControlFlow;
/// use slirc_client::transport::{run, TokioTransport, DEFAULT_POLL_INTERVAL};
/// use slirc_client::{Client, ClientConfig, Event, ServerAddress};
///
/// # async fn demo() -> anyhow::Result<()> {
/// let mut client = Client::new(ClientConfig::default(), Box::new(TokioTransport::new()?));
/// client.connect(ServerAddress::tls("irc.libera.chat"))?;
/// run(&mut client, DEFAULT_POLL_INTERVAL, |client, event| {
///     if let Event::Connected = event {
///         client.join("#rust", None);
///     }
///     ControlFlow::Continue(())
/// })
/// .await;
/// # Ok(())
/// # }
/// ```
pub async fn run<F>(client: &mut Client, interval: Duration, mut on_event: F)
where
    F: FnMut(&mut Client, Event) -> ControlFlow<()>,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        client.poll();
        while let Some(event) = client.poll_event() {
            if on_event(client, event).is_break() {
                debug!("driver stopped by host");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientConfig;
    use crate::reconnect::ServerAddress;
    use crate::transport::MemoryTransport;

    #[tokio::test]
    async fn test_run_until_connected() {
        let transport = MemoryTransport::new();
        let peer = transport.peer();
        let mut config = ClientConfig::default();
        config.nickname = "driver".to_string();
        let mut client = Client::new(config, Box::new(transport));
        client.connect(ServerAddress::plain("irc.test")).unwrap();
        peer.send_line(":irc.test 001 driver :Welcome");

        let mut seen = Vec::new();
        run(&mut client, Duration::from_millis(1), |_, event| {
            let done = event == Event::Connected;
            seen.push(event);
            if done {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .await;

        assert!(client.is_connected());
        assert!(seen.contains(&Event::Connected));
    }
}
