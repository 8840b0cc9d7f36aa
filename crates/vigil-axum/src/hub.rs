//! Distribution hub: pushes bus events to connected viewers.
//!
//! Each viewer gets its own bus subscription and its own outbound loop, so a
//! slow viewer only ever fills its own bounded queue. Events already queued
//! when the loop wakes up are coalesced into one newline-joined text frame.
//! After `ping_interval` without outbound traffic a `ping` message is sent
//! so dead links are noticed by both ends.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use vigil_core::{EventBus, MonitorEvent, Subscription, WireMessage, encode_frame};

/// Upper bound on messages coalesced into one frame.
const MAX_BATCH: usize = 64;

/// Fans bus events out to WebSocket viewers.
///
/// Viewers are closed when `shutdown` fires.
#[derive(Debug, Clone)]
pub struct DistributionHub {
    bus: Arc<EventBus>,
    ping_interval: Duration,
    shutdown: CancellationToken,
}

impl DistributionHub {
    pub fn new(bus: Arc<EventBus>, ping_interval: Duration, shutdown: CancellationToken) -> Self {
        Self {
            bus,
            ping_interval,
            shutdown,
        }
    }

    /// Serve one viewer until it disconnects.
    pub async fn serve_viewer(&self, socket: WebSocket, label: String) {
        let mut subscription = self.bus.subscribe(label.clone());
        let id = subscription.id();
        info!(%id, viewer = %label, "Viewer connected");

        let (mut sender, mut receiver) = socket.split();
        let idle = sleep(self.ping_interval);
        tokio::pin!(idle);

        loop {
            let frame = tokio::select! {
                event = subscription.recv() => match event {
                    Some(first) => batch_frame(first, &mut subscription),
                    None => break,
                },
                () = &mut idle => WireMessage::ping().to_line(),
                () = self.shutdown.cancelled() => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
                incoming = receiver.next() => match incoming {
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    // Viewers have nothing to say; pongs are handled by axum.
                    Some(Ok(_)) => continue,
                },
            };

            if sender.send(Message::Text(frame.into())).await.is_err() {
                debug!(%id, viewer = %label, "Send failed, dropping viewer");
                break;
            }
            idle.as_mut().reset(Instant::now() + self.ping_interval);
        }

        self.bus.unsubscribe(id);
        info!(
            %id,
            viewer = %label,
            dropped = subscription.dropped(),
            "Viewer disconnected"
        );
    }
}

/// Encode `first` plus whatever is already queued behind it as one frame.
fn batch_frame(first: MonitorEvent, subscription: &mut Subscription) -> String {
    let mut batch = vec![WireMessage::from(&first)];
    while batch.len() < MAX_BATCH {
        match subscription.try_recv() {
            Some(event) => batch.push(WireMessage::from(&event)),
            None => break,
        }
    }
    encode_frame(&batch)
}
