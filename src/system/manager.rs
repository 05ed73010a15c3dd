//! Service lifecycle controller.
//!
//! [`wait_until_state`] drives one resource from its observed state to a desired one:
//! check, transition at most once, then poll on a fixed interval until the check reports
//! done or the absolute timeout fires. [`ServiceManager::dependents_for_service`] resolves
//! the running dependents of a service so a cascading stop can proceed leaves first.

use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use super::error::LifecycleError;
use super::service::{Service, ServiceFactory};

pub const SERVICE_STATE_RUNNING: &str = "Running";
pub const SERVICE_STATE_STOPPED: &str = "Stopped";

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Outcome of one state probe.
pub struct StateCheck<H> {
    /// Whether the resource already satisfies the desired condition.
    pub done: bool,
    /// Observed state, reported back to the caller.
    pub state: String,
    /// Handle the transition is applied to.
    pub resource: H,
}

/// Waits until `check` reports done, invoking `transition` once if the first check does not.
///
/// `check` is never run concurrently with itself. The timeout counts from the call, and on
/// expiry a final check refreshes the state carried by [`LifecycleError::Timeout`].
pub async fn wait_until_state<H, C, CFut, T, TFut>(
    transition: T,
    mut check: C,
    interval: Duration,
    timeout: Duration,
) -> Result<String, LifecycleError>
where
    C: FnMut() -> CFut,
    CFut: Future<Output = anyhow::Result<StateCheck<H>>>,
    T: FnOnce(H) -> TFut,
    TFut: Future<Output = anyhow::Result<()>>,
{
    let deadline = Instant::now() + timeout;

    let initial = check().await.map_err(|source| LifecycleError::Check {
        state: String::new(),
        source,
    })?;
    if initial.done {
        return Ok(initial.state);
    }

    let mut state = initial.state;
    transition(initial.resource)
        .await
        .map_err(|source| LifecycleError::Transition {
            state: state.clone(),
            source,
        })?;

    let interval = interval.max(MIN_INTERVAL);
    let mut ticker = interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let expired = sleep_until(deadline);
    tokio::pin!(expired);

    loop {
        tokio::select! {
            biased;
            _ = &mut expired => {
                match check().await {
                    Ok(last) => state = last.state,
                    Err(e) => warn!(
                        component = "lifecycle",
                        event = "final_check_failed",
                        state = %state,
                        error = %e,
                        "final state check after timeout failed"
                    ),
                }
                return Err(LifecycleError::Timeout { state });
            }
            _ = ticker.tick() => {
                let probe = check().await.map_err(|source| LifecycleError::Check {
                    state: state.clone(),
                    source: source.context("check failed"),
                })?;
                state = probe.state;
                if probe.done {
                    return Ok(state);
                }
            }
        }
    }
}

/// ServiceManager resolves service dependency graphs.
pub struct ServiceManager {
    factory: Arc<dyn ServiceFactory>,
}

impl ServiceManager {
    pub fn new(factory: Arc<dyn ServiceFactory>) -> Self {
        Self { factory }
    }

    /// Returns the running services in the dependency graph rooted at `name`, deepest
    /// dependents first and `name` itself last (when it is running).
    ///
    /// Services that are not running are neither recorded nor expanded. A service may be
    /// queued once per incoming edge; only its first dequeue counts.
    pub async fn dependents_for_service(&self, name: &str) -> Result<Vec<String>, LifecycleError> {
        let root = self.factory.get_service(name).await?;

        let mut queue: VecDeque<Arc<dyn Service>> = VecDeque::from([root]);
        let mut visited: HashSet<String> = HashSet::new();
        let mut names: VecDeque<String> = VecDeque::new();

        while let Some(service) = queue.pop_front() {
            let service_name = service.name().await?;
            if !visited.insert(service_name.clone()) {
                continue;
            }

            let state = service.state().await?;
            if state != SERVICE_STATE_RUNNING {
                debug!(
                    component = "lifecycle",
                    event = "dependent_skipped",
                    service = %service_name,
                    state = %state,
                    "service is not running"
                );
                continue;
            }

            names.push_front(service_name);
            queue.extend(service.dependents().await?);
        }

        Ok(names.into())
    }
}
