//! Sequential connect
//!
//! Offers a waiting call to each selection of the queue's strategy in turn
//! until someone answers. A single agent is rung alone; a ringall group is
//! rung together. Answers are observed on the event bus: the connector subscribes
//! before the first ring and then blocks on the subscription with a timeout.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use super::{DistributionError, DistributionService};
use crate::call_control::CallControl;
use crate::events::{Channel, EventBus, KnownEvent, Subscription};
use crate::registry::{AgentId, QueueId};

/// Result of a sequential connect attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectOutcome {
    pub connected: bool,
    /// Agent that answered
    pub agent_id: Option<AgentId>,
    /// Agents offered the call, in order
    pub tried: Vec<AgentId>,
}

/// Drives a call through the queue's strategy one selection at a time.
pub struct SequentialConnector {
    distribution: Arc<DistributionService>,
    call_control: Arc<dyn CallControl>,
    bus: EventBus,
    ring_timeout: Duration,
    answer_grace: Duration,
}

impl SequentialConnector {
    pub fn new(
        distribution: Arc<DistributionService>,
        call_control: Arc<dyn CallControl>,
        bus: EventBus,
    ) -> Self {
        Self {
            distribution,
            call_control,
            bus,
            ring_timeout: Duration::from_secs(15),
            answer_grace: Duration::from_secs(1),
        }
    }

    pub fn with_ring_timeout(mut self, ring_timeout: Duration) -> Self {
        self.ring_timeout = ring_timeout;
        self
    }

    /// Extra time to wait for the answer event after the ring timeout.
    pub fn with_answer_grace(mut self, grace: Duration) -> Self {
        self.answer_grace = grace;
        self
    }

    /// Offer `call_id` to the queue's agents until one answers or none is left.
    ///
    /// # Errors
    ///
    /// Queue lookup and strategy errors as for
    /// [`DistributionService::get_next_agent`]. A failing call-control
    /// request aborts the attempt with an `Unavailable` error; it is not
    /// retried here.
    pub async fn connect(
        &self,
        tenant: &str,
        queue_id: QueueId,
        call_id: &str,
        ring_timeout: Option<Duration>,
    ) -> Result<ConnectOutcome, DistributionError> {
        let ring_timeout = ring_timeout.unwrap_or(self.ring_timeout);
        let mut answers = self.bus.subscribe(Channel::Tenant(tenant.to_string()));

        let mut tried_members = Vec::new();
        let mut tried = Vec::new();

        loop {
            let selection = self.distribution.get_next_agent_excluding(
                tenant,
                queue_id,
                call_id,
                &tried_members,
            )?;
            if selection.is_empty() {
                break;
            }

            // A ringall group is rung at once and shares one ring timeout.
            let offered: Vec<AgentId> = selection.agent_ids().into_iter().cloned().collect();
            for candidate in selection.candidates() {
                tried_members.push(candidate.member_id());
            }
            tried.extend(offered.iter().cloned());

            let rings = offered
                .iter()
                .map(|agent_id| self.call_control.connect_agent(call_id, agent_id, ring_timeout));
            futures::future::try_join_all(rings).await?;

            let deadline = ring_timeout + self.answer_grace;
            if let Some(answered_by) = wait_for_answer(&mut answers, call_id, deadline).await {
                let agent_id = answered_by.or_else(|| match offered.as_slice() {
                    [only] => Some(only.clone()),
                    _ => None,
                });
                tracing::info!(
                    queue_id = %queue_id,
                    call_id,
                    agent_id = ?agent_id,
                    attempts = tried.len(),
                    "Call connected"
                );
                return Ok(ConnectOutcome {
                    connected: true,
                    agent_id,
                    tried,
                });
            }

            tracing::info!(
                queue_id = %queue_id,
                call_id,
                agents = ?offered,
                "No answer within ring timeout, trying next selection"
            );
        }

        tracing::info!(queue_id = %queue_id, call_id, attempts = tried.len(), "No agent answered");
        Ok(ConnectOutcome {
            connected: false,
            agent_id: None,
            tried,
        })
    }
}

/// Wait for `call_answered` on `call_id`. Returns the answering agent when the
/// event names one.
async fn wait_for_answer(
    answers: &mut Subscription,
    call_id: &str,
    deadline: Duration,
) -> Option<Option<AgentId>> {
    let answered = async {
        while let Some(event) = answers.recv().await {
            if event.known() == Some(KnownEvent::CallAnswered)
                && event.call_id.as_deref() == Some(call_id)
            {
                return Some(event.agent_id.clone());
            }
        }
        None
    };
    tokio::time::timeout(deadline, answered).await.ok().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call_control::CallControlError;
    use crate::error::ErrorKind;
    use crate::events::{EventPayload, EventPipeline, EventType};
    use crate::registry::{Queue, Registry, Strategy};
    use crate::stats::MemoryStatsStore;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Records connect requests and answers when ringing `answering`.
    struct ScriptedCallControl {
        pipeline: Arc<EventPipeline>,
        answering: Option<AgentId>,
        fail: bool,
        rung: Mutex<Vec<AgentId>>,
    }

    #[async_trait]
    impl CallControl for ScriptedCallControl {
        async fn connect_agent(
            &self,
            call_id: &str,
            agent_id: &AgentId,
            _ring_timeout: Duration,
        ) -> Result<(), CallControlError> {
            if self.fail {
                return Err(CallControlError::Network("connection refused".to_string()));
            }
            self.rung.lock().push(agent_id.clone());
            if self.answering.as_ref() == Some(agent_id) {
                let pipeline = Arc::clone(&self.pipeline);
                let payload = EventPayload::new()
                    .queue(QueueId(1))
                    .call(call_id)
                    .agent(agent_id.clone());
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    pipeline
                        .record_event("tenant-a", EventType::Call, "call_answered", payload)
                        .unwrap();
                });
            }
            Ok(())
        }
    }

    fn fixture(
        answering: Option<&str>,
        fail: bool,
    ) -> (SequentialConnector, Arc<ScriptedCallControl>) {
        fixture_with(Strategy::Linear, answering, fail)
    }

    fn fixture_with(
        strategy: Strategy,
        answering: Option<&str>,
        fail: bool,
    ) -> (SequentialConnector, Arc<ScriptedCallControl>) {
        let registry = Arc::new(Registry::new());
        registry
            .add_queue(Queue::new(QueueId(1), "tenant-a", "support").with_strategy(strategy))
            .unwrap();
        for agent in ["alice", "bob", "carol"] {
            registry.add_member(QueueId(1), agent.into(), 0).unwrap();
        }

        let pipeline = Arc::new(EventPipeline::in_memory(Arc::clone(&registry)));
        let distribution = Arc::new(DistributionService::new(
            registry,
            Arc::new(MemoryStatsStore::new()),
        ));
        let call_control = Arc::new(ScriptedCallControl {
            pipeline: Arc::clone(&pipeline),
            answering: answering.map(AgentId::from),
            fail,
            rung: Mutex::new(Vec::new()),
        });
        let connector = SequentialConnector::new(
            distribution,
            call_control.clone(),
            pipeline.bus().clone(),
        )
        .with_ring_timeout(Duration::from_millis(100))
        .with_answer_grace(Duration::ZERO);
        (connector, call_control)
    }

    #[tokio::test]
    async fn test_connects_first_answering_agent() {
        let (connector, call_control) = fixture(Some("bob"), false);

        let outcome = connector
            .connect("tenant-a", QueueId(1), "call-1", None)
            .await
            .unwrap();

        assert!(outcome.connected);
        assert_eq!(outcome.agent_id, Some(AgentId::from("bob")));
        assert_eq!(outcome.tried, vec![AgentId::from("alice"), AgentId::from("bob")]);
        assert_eq!(call_control.rung.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_nobody_answers_tries_everyone_once() {
        let (connector, call_control) = fixture(None, false);

        let outcome = connector
            .connect("tenant-a", QueueId(1), "call-1", Some(Duration::from_millis(20)))
            .await
            .unwrap();

        assert!(!outcome.connected);
        assert_eq!(outcome.agent_id, None);
        assert_eq!(outcome.tried.len(), 3);
        assert_eq!(call_control.rung.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_ringall_group_rings_together_and_waits_once() {
        let (connector, call_control) = fixture_with(Strategy::RingAll, Some("carol"), false);

        let started = std::time::Instant::now();
        let outcome = connector
            .connect("tenant-a", QueueId(1), "call-1", Some(Duration::from_millis(200)))
            .await
            .unwrap();

        assert!(outcome.connected);
        assert_eq!(outcome.agent_id, Some(AgentId::from("carol")));
        assert_eq!(outcome.tried.len(), 3);
        assert_eq!(call_control.rung.lock().len(), 3);
        // Answered within the first ring, not after two timeouts.
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_unanswered_ringall_group_is_not_rung_twice() {
        let (connector, call_control) = fixture_with(Strategy::RingAll, None, false);

        let outcome = connector
            .connect("tenant-a", QueueId(1), "call-1", Some(Duration::from_millis(20)))
            .await
            .unwrap();

        assert!(!outcome.connected);
        assert_eq!(outcome.tried.len(), 3);
        assert_eq!(call_control.rung.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_call_control_failure_is_unavailable() {
        let (connector, _) = fixture(Some("alice"), true);

        let err = connector
            .connect("tenant-a", QueueId(1), "call-1", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }

    #[tokio::test]
    async fn test_unknown_queue_is_not_found() {
        let (connector, _) = fixture(None, false);
        let err = connector
            .connect("tenant-a", QueueId(42), "call-1", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
