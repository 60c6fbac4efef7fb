//! Publish/subscribe feed of recorded events
//!
//! Delivery is at-most-once: a subscriber that falls behind skips the events
//! it missed, and publishing never waits for anyone.

use std::sync::Arc;
use tokio::sync::broadcast;

use super::Event;
use crate::registry::{AgentId, QueueId};

/// Subscription partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    Tenant(String),
    Queue(QueueId),
    Agent(AgentId),
    All,
}

impl Channel {
    pub fn matches(&self, event: &Event) -> bool {
        match self {
            Channel::Tenant(tenant) => &event.tenant == tenant,
            Channel::Queue(queue_id) => event.queue_id == Some(*queue_id),
            Channel::Agent(agent_id) => event.agent_id.as_ref() == Some(agent_id),
            Channel::All => true,
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Tenant(tenant) => write!(f, "events:tenant:{}", tenant),
            Channel::Queue(queue_id) => write!(f, "events:queue:{}", queue_id),
            Channel::Agent(agent_id) => write!(f, "events:agent:{}", agent_id),
            Channel::All => write!(f, "events:*"),
        }
    }
}

/// Broadcast hub for recorded events.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<Event>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Hand an event to every live subscriber. Returns how many received it.
    pub fn publish(&self, event: Arc<Event>) -> usize {
        // No subscribers is not an error.
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self, channel: Channel) -> Subscription {
        Subscription {
            tenant: None,
            channel,
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe to `channel` within one tenant's events.
    pub fn subscribe_tenant(&self, tenant: impl Into<String>, channel: Channel) -> Subscription {
        Subscription {
            tenant: Some(tenant.into()),
            channel,
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// A filtered view of the bus.
pub struct Subscription {
    tenant: Option<String>,
    channel: Channel,
    receiver: broadcast::Receiver<Arc<Event>>,
}

impl Subscription {
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn tenant(&self) -> Option<&str> {
        self.tenant.as_deref()
    }

    fn accepts(&self, event: &Event) -> bool {
        self.tenant.as_ref().map_or(true, |t| &event.tenant == t) && self.channel.matches(event)
    }

    /// Next event on this channel, or `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<Arc<Event>> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.accepts(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        channel = %self.channel,
                        skipped,
                        "Event subscriber lagged, skipping missed events"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
