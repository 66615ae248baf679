//! Push channel from the backend, carried over server-sent events.
//!
//! The transport task forwards connectivity changes and decoded scan events
//! into the dashboard queue and keeps a shared health flag that the periodic
//! health check reads. Retry and backoff are left to `reqwest-eventsource`;
//! once its stream closes for good the task waits and opens a new one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use reqwest::Url;
use reqwest_eventsource::{Event, EventSource};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::types::ScanEvent;

pub const EVENT_PROGRESS: &str = "scan_update";
pub const EVENT_DISCOVERY: &str = "new_result";
pub const EVENT_COMPLETE: &str = "scan_complete";
pub const EVENT_ERROR: &str = "scan_error";

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected,
    Disconnected,
    Scan(ScanEvent),
}

/// Shared view of whether the push channel is currently open.
#[derive(Debug, Clone, Default)]
pub struct TransportHealth {
    connected: Arc<AtomicBool>,
}

impl TransportHealth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Returns the previous value.
    pub fn set_connected(&self, connected: bool) -> bool {
        self.connected.swap(connected, Ordering::Relaxed)
    }
}

/// Decode one SSE message. Keepalives and unknown event names yield `None`.
pub fn decode_message(event: &str, data: &str) -> Result<Option<ScanEvent>, serde_json::Error> {
    let data = data.trim();
    if data.is_empty() || data == "keepalive" {
        return Ok(None);
    }
    let decoded = match event {
        EVENT_PROGRESS => ScanEvent::Progress(serde_json::from_str(data)?),
        EVENT_DISCOVERY => ScanEvent::Discovery(serde_json::from_str(data)?),
        EVENT_COMPLETE => ScanEvent::Completed(serde_json::from_str(data)?),
        EVENT_ERROR => ScanEvent::Failed(serde_json::from_str(data)?),
        _ => return Ok(None),
    };
    Ok(Some(decoded))
}

/// Spawn the transport task. It runs until `shutdown` fires or the receiver
/// side of `tx` is dropped.
pub fn spawn<T>(
    url: Url,
    health: TransportHealth,
    tx: mpsc::UnboundedSender<T>,
    reconnect_delay: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()>
where
    T: From<TransportEvent> + Send + 'static,
{
    tokio::spawn(async move {
        'outer: loop {
            info!(url = %url, "opening event stream");
            let mut source = EventSource::get(url.clone());

            loop {
                let next = tokio::select! {
                    _ = shutdown.cancelled() => {
                        source.close();
                        break 'outer;
                    }
                    next = source.next() => next,
                };
                let Some(event) = next else { break };

                let forwarded = match event {
                    Ok(Event::Open) => {
                        health.set_connected(true);
                        info!("event stream connected");
                        Some(TransportEvent::Connected)
                    }
                    Ok(Event::Message(msg)) => match decode_message(&msg.event, &msg.data) {
                        Ok(Some(scan_event)) => Some(TransportEvent::Scan(scan_event)),
                        Ok(None) => {
                            debug!(event = %msg.event, "ignoring event");
                            None
                        }
                        Err(e) => {
                            warn!(event = %msg.event, data = %msg.data, "malformed event: {e}");
                            None
                        }
                    },
                    Err(e) => {
                        let was_connected = health.set_connected(false);
                        warn!("event stream error: {e}");
                        was_connected.then_some(TransportEvent::Disconnected)
                    }
                };

                if let Some(ev) = forwarded {
                    if tx.send(T::from(ev)).is_err() {
                        source.close();
                        break 'outer;
                    }
                }
            }

            if health.set_connected(false) && tx.send(T::from(TransportEvent::Disconnected)).is_err() {
                break;
            }
            debug!(delay_ms = reconnect_delay.as_millis() as u64, "event stream closed, reopening");
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(reconnect_delay) => {}
            }
        }
        health.set_connected(false);
        info!("transport stopped");
    })
}
