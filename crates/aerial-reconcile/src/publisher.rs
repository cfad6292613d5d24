use aerial_store::Store;
use anyhow::{Context, Result};

use crate::ChangeEvent;

/// Broadcasts change events on one fixed channel. Fire-and-forget: no ack,
/// no retry, late subscribers miss earlier events.
#[derive(Clone)]
pub struct EventPublisher {
    store: Store,
    channel: String,
}

impl EventPublisher {
    pub fn new(store: &Store, channel: impl Into<String>) -> Self {
        Self {
            store: store.clone(),
            channel: channel.into(),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub async fn publish(&self, event: &ChangeEvent) -> Result<()> {
        let payload = serde_json::to_string(event).context("change event serialize failed")?;
        self.store
            .publish(&self.channel, &payload)
            .await
            .with_context(|| format!("publish on channel {} failed", self.channel))?;

        tracing::debug!(
            channel = %self.channel,
            route = %event.route,
            origin = %event.origin.id,
            destination = %event.destination.id,
            "change event published"
        );
        Ok(())
    }
}
