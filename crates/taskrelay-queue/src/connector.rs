//! Production [`QueueTransport`] over AMQP 0-9-1 (`lapin`, §10.3).
//!
//! Connection and channel handles are opened lazily and cached; the cache
//! entry's own mutex coalesces concurrent openers (whichever task acquires
//! the lock first does the connecting, the rest simply wait on it), which is
//! the same lazy-connect shape as `openintent-adapters`'s MQTT adapter.

use std::sync::Arc;

use dashmap::DashMap;
use lapin::options::{BasicPublishOptions, ConfirmSelectOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{QueueError, Result};
use crate::transport::QueueTransport;

pub struct LapinQueueConnector {
    amqp_url: String,
    heartbeat_secs: u16,
    connection: Mutex<Option<Arc<Connection>>>,
    channels: DashMap<String, Arc<Mutex<Channel>>>,
}

impl LapinQueueConnector {
    pub fn new(amqp_url: impl Into<String>, heartbeat_secs: u16) -> Self {
        Self {
            amqp_url: amqp_url.into(),
            heartbeat_secs,
            connection: Mutex::new(None),
            channels: DashMap::new(),
        }
    }

    async fn connection(&self) -> Result<Arc<Connection>> {
        let mut guard = self.connection.lock().await;
        if let Some(conn) = guard.as_ref() {
            if conn.status().connected() {
                return Ok(conn.clone());
            }
            warn!("queue connection no longer healthy, reconnecting");
            *guard = None;
            self.channels.clear();
        }

        let uri = with_heartbeat(&self.amqp_url, self.heartbeat_secs);
        let conn = Connection::connect(&uri, ConnectionProperties::default())
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))?;
        info!("queue connection opened");
        let conn = Arc::new(conn);
        *guard = Some(conn.clone());
        Ok(conn)
    }

    async fn channel(&self, name: &str) -> Result<Arc<Mutex<Channel>>> {
        if let Some(existing) = self.channels.get(name) {
            if existing.lock().await.status().connected() {
                return Ok(existing.clone());
            }
            self.channels.remove(name);
        }

        let conn = self.connection().await?;
        let channel = conn
            .create_channel()
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))?;
        // Confirm mode makes `publish_burst`'s await on the returned
        // `PublisherConfirm` mean something: without it the channel resolves
        // every publish as `Confirmation::NotRequested` immediately, with no
        // broker ack and no backpressure at all.
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))?;
        debug!(queue = name, "queue channel opened");
        let handle = Arc::new(Mutex::new(channel));
        self.channels.insert(name.to_string(), handle.clone());
        Ok(handle)
    }
}

#[async_trait::async_trait]
impl QueueTransport for LapinQueueConnector {
    async fn check_queue(&self, name: &str) -> Result<bool> {
        let channel = self.channel(name).await?;
        let guard = channel.lock().await;
        let declared = guard
            .queue_declare(
                name,
                QueueDeclareOptions {
                    passive: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await;
        drop(guard);

        match declared {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => {
                // The 404 closes the channel server-side; drop it from the
                // cache so the next call reopens (§9, open question 2).
                self.channels.remove(name);
                Ok(false)
            }
            Err(e) => Err(QueueError::Transport(e.to_string())),
        }
    }

    async fn publish(&self, name: &str, payload: &[u8]) -> Result<()> {
        let channel = self.channel(name).await?;
        let guard = channel.lock().await;
        guard
            .basic_publish(
                "",
                name,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default(),
            )
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))?;
        Ok(())
    }

    async fn publish_burst(&self, name: &str, payload: &[u8]) -> Result<()> {
        let channel = self.channel(name).await?;
        let guard = channel.lock().await;
        let confirm = guard
            .basic_publish(
                "",
                name,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default(),
            )
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))?;
        // Waiting for the publisher confirm is this binding's drain
        // equivalent: it blocks until the broker has accepted the message,
        // which is the backpressure point `createBatch` relies on.
        confirm
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        for entry in self.channels.iter() {
            let _ = entry.value().lock().await.close(200, "closing").await;
        }
        self.channels.clear();

        let mut guard = self.connection.lock().await;
        if let Some(conn) = guard.take() {
            conn.close(200, "closing")
                .await
                .map_err(|e| QueueError::Transport(e.to_string()))?;
        }
        info!("queue connection closed");
        Ok(())
    }
}

fn is_not_found(err: &lapin::Error) -> bool {
    err.to_string().contains("404")
}

fn with_heartbeat(url: &str, secs: u16) -> String {
    if url.contains("heartbeat=") {
        url.to_string()
    } else {
        let sep = if url.contains('?') { '&' } else { '?' };
        format!("{url}{sep}heartbeat={secs}")
    }
}
