use anyhow::Result;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::core::agent::{Agent, ScheduleMode};
use crate::core::llm::TextGenerator;
use crate::core::pipeline;
use crate::core::social::SocialClient;
use crate::core::store::AgentStore;

const RANDOM_DELAY_MIN_MINUTES: u64 = 1;
const RANDOM_DELAY_MAX_MINUTES: u64 = 120;

struct ArmedTimer {
    generation: u64,
    token: CancellationToken,
}

/// Owns one timer per eligible agent and drives the
/// armed → running → armed|unscheduled sequence for each of them.
///
/// Every decision is taken against the freshly persisted record, never
/// an in-memory snapshot: at fire time (the operator may have edited
/// or deleted the agent while the timer slept) and again before
/// re-arming (the cycle itself rotated credentials). Cancelling a
/// timer never interrupts a cycle already past its sleep; it only
/// suppresses that cycle's re-arm, because a newer schedule owns the
/// agent id from then on.
pub struct AgentScheduler {
    store: Arc<AgentStore>,
    generator: Arc<dyn TextGenerator>,
    social: Arc<dyn SocialClient>,
    timers: Mutex<HashMap<String, ArmedTimer>>,
    seq: AtomicU64,
    minute: Duration,
}

impl AgentScheduler {
    pub fn new(
        store: Arc<AgentStore>,
        generator: Arc<dyn TextGenerator>,
        social: Arc<dyn SocialClient>,
    ) -> Arc<Self> {
        Self::with_minute(store, generator, social, Duration::from_secs(60))
    }

    /// The "minute" unit is injectable so tests can run the whole
    /// timer machinery in milliseconds.
    pub fn with_minute(
        store: Arc<AgentStore>,
        generator: Arc<dyn TextGenerator>,
        social: Arc<dyn SocialClient>,
        minute: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            generator,
            social,
            timers: Mutex::new(HashMap::new()),
            seq: AtomicU64::new(0),
            minute,
        })
    }

    /// Next-run delay in minutes. Fixed mode uses the configured
    /// interval unchanged; random mode draws uniformly from [1,120]
    /// independently each cycle.
    pub fn compute_delay_minutes(agent: &Agent) -> u64 {
        match agent.schedule_mode {
            ScheduleMode::Fixed => agent.interval_minutes.max(1) as u64,
            ScheduleMode::Random => {
                rand::thread_rng().gen_range(RANDOM_DELAY_MIN_MINUTES..=RANDOM_DELAY_MAX_MINUTES)
            }
        }
    }

    /// Cancel every armed timer and re-arm from the persisted list.
    /// Called at startup and after any store mutation, since
    /// eligibility and delay mode may depend on fields that changed.
    pub async fn reschedule_all(self: &Arc<Self>) -> Result<()> {
        let agents = self.store.list_agents().await?;
        let mut timers = self.timers.lock().await;
        for (_, timer) in timers.drain() {
            timer.token.cancel();
        }
        for agent in agents {
            if agent.is_eligible() {
                self.arm(&mut timers, agent);
            }
        }
        Ok(())
    }

    #[allow(dead_code)]
    pub async fn armed_count(&self) -> usize {
        self.timers.lock().await.len()
    }

    #[allow(dead_code)]
    pub async fn is_armed(&self, id: &str) -> bool {
        self.timers.lock().await.contains_key(id)
    }

    fn arm(self: &Arc<Self>, timers: &mut HashMap<String, ArmedTimer>, agent: Agent) {
        let generation = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();
        if let Some(previous) = timers.insert(
            agent.id.clone(),
            ArmedTimer {
                generation,
                token: token.clone(),
            },
        ) {
            previous.token.cancel();
        }

        let delay = Self::compute_delay_minutes(&agent);
        info!(agent = %agent.id, minutes = delay, "armed posting timer");

        let scheduler = Arc::clone(self);
        let id = agent.id;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(scheduler.minute * delay as u32) => {}
            }
            scheduler.fire(id, generation, token).await;
        });
    }

    async fn fire(self: Arc<Self>, id: String, generation: u64, token: CancellationToken) {
        // The snapshot captured at arm time is stale by now; only the
        // persisted record decides whether this cycle runs.
        let agent = match self.store.get_agent(&id).await {
            Ok(Some(agent)) if agent.is_eligible() => agent,
            Ok(_) => {
                info!(agent = %id, "agent removed or no longer eligible, skipping cycle");
                self.disarm_if_current(&id, generation).await;
                return;
            }
            Err(e) => {
                error!(agent = %id, "could not re-read agent before cycle: {e:#}");
                self.disarm_if_current(&id, generation).await;
                return;
            }
        };

        let outcome =
            pipeline::run_cycle(&agent, self.generator.as_ref(), self.social.as_ref()).await;

        // Persist the rotation before anything else: refresh tokens
        // are single-use, and this must land even for failed cycles.
        if let Err(e) = self
            .store
            .update_tokens(&id, &outcome.access_token, &outcome.refresh_token)
            .await
        {
            error!(agent = %id, "failed to persist rotated credentials: {e:#}");
        }

        match (&outcome.post_id, &outcome.error) {
            (Some(post_id), _) => info!(
                agent = %id,
                post_id = %post_id,
                text = outcome.text.as_deref().unwrap_or_default(),
                "published post"
            ),
            (None, Some(err)) => warn!(agent = %id, "cycle failed: {err}"),
            (None, None) => {}
        }

        // A reschedule that ran while this cycle was in flight owns
        // the id now; leave the re-arm to it.
        if token.is_cancelled() {
            return;
        }

        match self.store.get_agent(&id).await {
            Ok(Some(fresh)) if fresh.is_eligible() => {
                let mut timers = self.timers.lock().await;
                if timers.get(&id).map(|t| t.generation) == Some(generation) {
                    self.arm(&mut timers, fresh);
                }
            }
            _ => self.disarm_if_current(&id, generation).await,
        }
    }

    async fn disarm_if_current(&self, id: &str, generation: u64) {
        let mut timers = self.timers.lock().await;
        if timers.get(id).map(|t| t.generation) == Some(generation) {
            timers.remove(id);
        }
    }
}
