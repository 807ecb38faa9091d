//! Connection loop: connect, pump frames, reconnect with backoff.

use futures_util::{SinkExt, StreamExt};
use tokio::{
    net::TcpStream,
    sync::mpsc,
    time::{self, Instant, Interval, MissedTickBehavior},
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message,
};

use crate::{
    config::ClientConfig,
    error::TransportError,
    protocol::{Incoming, frame},
};

use super::{Channel, ConnectionStatus, backoff::reconnect_delay};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Why a session ended
enum SessionEnd {
    /// The connection dropped; reconnect
    Lost,
    /// Nobody listens to events anymore; stop
    Abandoned,
}

pub(super) async fn run(
    channel: Channel,
    config: ClientConfig,
    events: mpsc::UnboundedSender<Incoming>,
) {
    // Shared by all sessions so reconnects don't reset the keep-alive cadence
    let mut keepalive = time::interval_at(
        Instant::now() + config.keepalive_interval,
        config.keepalive_interval,
    );
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut failed_attempts: u32 = 0;

    loop {
        channel.set_status(ConnectionStatus::Connecting);
        tracing::info!(
            "Attempting to connect to {} (attempt {})",
            config.url,
            failed_attempts + 1
        );

        match connect(&config).await {
            Ok(ws) => {
                failed_attempts = 0;
                tracing::info!("Connected to sync server");
                let end = run_session(&channel, &config, ws, &events, &mut keepalive).await;
                channel.close();
                if matches!(end, SessionEnd::Abandoned) {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!("Connection failed: {}", e);
                channel.close();
                if events.send(Incoming::SocketError(e)).is_err() {
                    break;
                }
                failed_attempts = failed_attempts.saturating_add(1);
            }
        }

        if events.send(Incoming::SocketClose).is_err() {
            break;
        }

        let delay = reconnect_delay(failed_attempts, &config);
        tracing::info!("Reconnecting in {:.1}s", delay.as_secs_f64());
        time::sleep(delay).await;
    }

    tracing::debug!("Event receiver dropped, stopping connection loop");
}

async fn connect(config: &ClientConfig) -> Result<WsStream, TransportError> {
    match time::timeout(config.connect_timeout, connect_async(config.url.as_str())).await {
        Err(_) => Err(TransportError::Timeout),
        Ok(Err(e)) => Err(TransportError::Connect(e.to_string())),
        Ok(Ok((ws, _response))) => Ok(ws),
    }
}

async fn run_session(
    channel: &Channel,
    config: &ClientConfig,
    ws: WsStream,
    events: &mpsc::UnboundedSender<Incoming>,
    keepalive: &mut Interval,
) -> SessionEnd {
    let (mut write, mut read) = ws.split();
    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<String>();

    let mut write_task = tokio::spawn(async move {
        while let Some(text) = frame_rx.recv().await {
            if let Err(e) = write.send(Message::Text(text.into())).await {
                return Err(TransportError::Write(e.to_string()));
            }
        }
        write.close().await.ok();
        Ok(())
    });

    if events.send(Incoming::SocketOpen).is_err() {
        write_task.abort();
        return SessionEnd::Abandoned;
    }
    channel.open(frame_tx);

    // Sync burst: probe now, then every interval until enough round trips succeed
    let mut round_trips: u32 = 0;
    channel.probe();
    let mut burst = time::interval_at(
        Instant::now() + config.sync_burst_interval,
        config.sync_burst_interval,
    );

    let end = loop {
        tokio::select! {
            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    let client_end = channel.now_millis();
                    let incoming = frame::decode(text.as_str(), client_end);
                    if matches!(incoming, Incoming::ClientTime(_)) {
                        round_trips += 1;
                    }
                    tracing::debug!("REC  {}", incoming.message_type());
                    if events.send(incoming).is_err() {
                        break SessionEnd::Abandoned;
                    }
                }
                Some(Ok(Message::Binary(data))) => {
                    tracing::warn!("Ignoring {} bytes of binary data", data.len());
                }
                Some(Ok(Message::Close(_))) => {
                    tracing::info!("Server closed the connection");
                    break SessionEnd::Lost;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!("WebSocket read error: {}", e);
                    if events.send(Incoming::SocketError(TransportError::Read(e.to_string()))).is_err() {
                        break SessionEnd::Abandoned;
                    }
                    break SessionEnd::Lost;
                }
                None => break SessionEnd::Lost,
            },
            _ = burst.tick(), if round_trips < config.sync_burst_target => {
                channel.probe();
            }
            _ = keepalive.tick() => {
                channel.probe();
            }
            result = &mut write_task => {
                if let Ok(Err(e)) = result {
                    tracing::warn!("WebSocket write error: {}", e);
                    if events.send(Incoming::SocketError(e)).is_err() {
                        break SessionEnd::Abandoned;
                    }
                }
                break SessionEnd::Lost;
            }
        }
    };

    write_task.abort();
    end
}
