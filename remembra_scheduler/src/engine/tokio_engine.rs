use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};
use tokio::{
    sync::{Mutex, mpsc, watch},
    task::{self, JoinHandle},
};
use tokio_util::sync::CancellationToken;

use remembra_storage::{JobRecord, JobSchedule, JobStore};

use crate::time_math::next_occurrence;

use super::{
    DEFAULT_MISFIRE_GRACE, FiredTrigger, OnceTrigger, RecurringTrigger, TriggerEngine,
    TriggerEngineError, TriggerId, TriggerPayload,
};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub misfire_grace: Duration,
    pub fired_queue: usize,
    pub cleanup_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            misfire_grace: DEFAULT_MISFIRE_GRACE,
            fired_queue: 64,
            cleanup_interval: Duration::from_secs(300),
        }
    }
}

struct TriggerTask {
    handle: JoinHandle<()>,
    token: CancellationToken,
}

impl TriggerTask {
    fn cancel(self) {
        self.token.cancel();
    }
}

struct EngineInner {
    store: Arc<dyn JobStore>,
    tasks: Mutex<HashMap<TriggerId, TriggerTask>>,
    fired_tx: mpsc::Sender<FiredTrigger>,
    misfire_grace: TimeDelta,
}

struct CleanupTask(watch::Sender<()>);

/// Process-wide trigger engine: one tokio task per armed trigger, fired
/// triggers delivered over a channel, registrations mirrored into the
/// job store so pending alerts survive restarts.
pub struct TokioTriggerEngine {
    inner: Arc<EngineInner>,
    cleanup_task: CleanupTask,
}

impl Drop for TokioTriggerEngine {
    fn drop(&mut self) {
        let _ = self.cleanup_task.0.send(());
    }
}

enum OnceDisposition {
    Fire(Duration),
    Missed,
}

fn once_disposition(
    fire_at: DateTime<Utc>,
    now: DateTime<Utc>,
    grace: TimeDelta,
) -> OnceDisposition {
    let delta = fire_at - now;
    if delta > TimeDelta::zero() {
        OnceDisposition::Fire(delta.to_std().unwrap_or(Duration::ZERO))
    } else if -delta <= grace {
        OnceDisposition::Fire(Duration::ZERO)
    } else {
        OnceDisposition::Missed
    }
}

fn payload_json(payload: &TriggerPayload) -> serde_json::Value {
    serde_json::to_value(payload).unwrap_or(serde_json::Value::Null)
}

impl TokioTriggerEngine {
    pub fn start(
        store: Arc<dyn JobStore>,
        config: EngineConfig,
    ) -> (Self, mpsc::Receiver<FiredTrigger>) {
        let (fired_tx, fired_rx) = mpsc::channel(config.fired_queue);
        let inner = Arc::new(EngineInner {
            store,
            tasks: Mutex::new(HashMap::new()),
            fired_tx,
            misfire_grace: TimeDelta::from_std(config.misfire_grace)
                .unwrap_or(TimeDelta::seconds(60)),
        });
        let cleanup_task = Self::spawn_cleanup_task(Arc::clone(&inner), config.cleanup_interval);

        (
            Self {
                inner,
                cleanup_task,
            },
            fired_rx,
        )
    }

    /// Re-arms every persisted job. Called once on boot; the job store
    /// is the sole source of truth for what fires next, so nothing else
    /// is consulted. Returns the number of records processed.
    pub async fn restore(&self) -> Result<usize, TriggerEngineError> {
        let records = self.inner.store.load_all().await?;
        let mut processed = 0;

        for record in records {
            let Ok(id) = record.trigger_id.parse::<TriggerId>() else {
                log::warn!(
                    "Skipping persisted job with unparseable trigger id '{}'",
                    record.trigger_id
                );
                continue;
            };
            let payload = match serde_json::from_value::<TriggerPayload>(record.payload.clone()) {
                Ok(payload) => payload,
                Err(e) => {
                    log::warn!("Skipping persisted job {id}, bad payload: {e}");
                    continue;
                }
            };

            match record.schedule {
                JobSchedule::Once { fire_at } => {
                    self.register_once(OnceTrigger {
                        id,
                        fire_at,
                        payload,
                    })
                    .await?;
                }
                JobSchedule::Recurring {
                    time_of_day,
                    weekdays,
                    timezone,
                } => {
                    self.register_recurring(RecurringTrigger {
                        id,
                        time_of_day,
                        weekdays,
                        timezone,
                        payload,
                    })
                    .await?;
                }
            }
            processed += 1;
        }

        Ok(processed)
    }

    /// Number of triggers currently armed.
    pub async fn active_triggers(&self) -> usize {
        let tasks = self.inner.tasks.lock().await;
        tasks
            .values()
            .filter(|task| !task.handle.is_finished())
            .count()
    }

    fn spawn_cleanup_task(inner: Arc<EngineInner>, interval: Duration) -> CleanupTask {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(());
        task::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        Self::clean_finished_tasks(&inner).await;
                    }
                    _ = shutdown_rx.changed() => {
                        log::info!("Trigger engine cleanup task shutting down");
                        break;
                    }
                };
            }
        });

        CleanupTask(shutdown_tx)
    }

    async fn clean_finished_tasks(inner: &EngineInner) {
        let mut tasks = inner.tasks.lock().await;
        let before = tasks.len();
        tasks.retain(|_, task| !task.handle.is_finished());
        let after = tasks.len();

        if before != after {
            log::info!("Cleaned up {} completed trigger tasks", before - after);
        }
    }

    fn spawn_once(inner: &Arc<EngineInner>, trigger: OnceTrigger, delay: Duration) -> TriggerTask {
        let token = CancellationToken::new();
        let task_token = token.child_token();
        let inner = Arc::clone(inner);

        let handle = task::spawn(async move {
            tokio::select! {
                _ = task_token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    // Row goes first so a crash mid-fire cannot replay the
                    // trigger on the next restart.
                    if let Err(e) = inner.store.remove(&trigger.id.to_string()).await {
                        log::error!("Failed to clear fired job {}: {e}", trigger.id);
                    }
                    let fired = FiredTrigger { id: trigger.id, payload: trigger.payload };
                    if inner.fired_tx.send(fired).await.is_err() {
                        log::warn!("Fired trigger {} had no receiver", trigger.id);
                    }
                }
            }
        });

        TriggerTask { handle, token }
    }

    fn spawn_recurring(inner: &Arc<EngineInner>, trigger: RecurringTrigger) -> TriggerTask {
        let token = CancellationToken::new();
        let task_token = token.child_token();
        let inner = Arc::clone(inner);

        let handle = task::spawn(async move {
            loop {
                let now = Utc::now();
                let Some(next) = next_occurrence(
                    now,
                    trigger.time_of_day,
                    &trigger.weekdays,
                    trigger.timezone,
                ) else {
                    log::error!("No next occurrence for recurring trigger {}", trigger.id);
                    break;
                };
                let delay = (next - now).to_std().unwrap_or(Duration::ZERO);

                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {
                        let fired = FiredTrigger { id: trigger.id, payload: trigger.payload };
                        if inner.fired_tx.send(fired).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        TriggerTask { handle, token }
    }
}

#[async_trait::async_trait]
impl TriggerEngine for TokioTriggerEngine {
    async fn register_once(&self, trigger: OnceTrigger) -> Result<(), TriggerEngineError> {
        // Store write and task swap happen under one lock acquisition so
        // two registrations for the same id cannot interleave.
        let mut tasks = self.inner.tasks.lock().await;

        match once_disposition(trigger.fire_at, Utc::now(), self.inner.misfire_grace) {
            OnceDisposition::Missed => {
                log::warn!(
                    "Dropping trigger {}: due time {} is outside the misfire grace",
                    trigger.id,
                    trigger.fire_at
                );
                if let Some(old) = tasks.remove(&trigger.id) {
                    old.cancel();
                }
                self.inner.store.remove(&trigger.id.to_string()).await?;
            }
            OnceDisposition::Fire(delay) => {
                self.inner
                    .store
                    .upsert(JobRecord {
                        trigger_id: trigger.id.to_string(),
                        schedule: JobSchedule::Once {
                            fire_at: trigger.fire_at,
                        },
                        payload: payload_json(&trigger.payload),
                    })
                    .await?;

                log::info!("Armed trigger {} to fire at {}", trigger.id, trigger.fire_at);
                let id = trigger.id;
                let task = Self::spawn_once(&self.inner, trigger, delay);
                if let Some(old) = tasks.insert(id, task) {
                    old.cancel();
                }
            }
        }

        Ok(())
    }

    async fn register_recurring(
        &self,
        trigger: RecurringTrigger,
    ) -> Result<(), TriggerEngineError> {
        let mut tasks = self.inner.tasks.lock().await;

        self.inner
            .store
            .upsert(JobRecord {
                trigger_id: trigger.id.to_string(),
                schedule: JobSchedule::Recurring {
                    time_of_day: trigger.time_of_day,
                    weekdays: trigger.weekdays,
                    timezone: trigger.timezone,
                },
                payload: payload_json(&trigger.payload),
            })
            .await?;

        log::info!(
            "Armed recurring trigger {} at {} ({})",
            trigger.id,
            trigger.time_of_day.format("%H:%M"),
            trigger.timezone
        );
        let id = trigger.id;
        let task = Self::spawn_recurring(&self.inner, trigger);
        if let Some(old) = tasks.insert(id, task) {
            old.cancel();
        }

        Ok(())
    }

    async fn cancel(&self, id: &TriggerId) -> Result<bool, TriggerEngineError> {
        let mut tasks = self.inner.tasks.lock().await;
        let had_task = match tasks.remove(id) {
            Some(task) => {
                task.cancel();
                true
            }
            None => false,
        };
        let had_row = self.inner.store.remove(&id.to_string()).await?;

        Ok(had_task || had_row)
    }

    async fn cancel_all(&self) -> Result<(), TriggerEngineError> {
        let mut tasks = self.inner.tasks.lock().await;
        for (_, task) in tasks.drain() {
            task.cancel();
        }
        self.inner.store.clear().await?;
        log::info!("All scheduled triggers have been cleared");

        Ok(())
    }

    async fn exists(&self, id: &TriggerId) -> Result<bool, TriggerEngineError> {
        let tasks = self.inner.tasks.lock().await;
        Ok(tasks.get(id).is_some_and(|task| !task.handle.is_finished()))
    }
}

#[cfg(test)]
mod tests;
