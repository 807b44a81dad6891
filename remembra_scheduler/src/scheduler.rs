use std::sync::Arc;

use chrono::{DateTime, NaiveTime, TimeDelta, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use tokio::{
    sync::{Mutex, mpsc},
    task::{self, JoinHandle},
};

use remembra_models::{
    fixed::{FixedReminder, FixedReminderId},
    owner::Owner,
    reminder::{Reminder, ReminderId, ReminderState},
};
use remembra_storage::{
    FixedReminderStorage, KEY_TIMEZONE, ReminderPatch, ReminderStorage, StorageError,
    UserConfigStorage,
};

use crate::{
    dispatch::{ActionSpec, Destination, DispatchError, NotificationDispatcher, ReminderAction},
    engine::{
        FiredTrigger, OnceTrigger, RecurringTrigger, TriggerEngine, TriggerEngineError, TriggerId,
        TriggerKind, TriggerPayload,
    },
    messages,
    time_math::{pre_alert_at, round_minutes},
};

/// Fixed step a pre-alert can be pushed by.
pub const POSTPONE_DELTA_MINUTES: u32 = 10;
/// Pre-alerts at or below this lead don't offer postponing, and a
/// postpone that would leave less lead than this is refused: the
/// resulting alert would land too close to the due time to be useful.
pub const POSTPONE_MIN_LEAD_MINUTES: u32 = 10;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("no reminder with id {0}")]
    NotFound(ReminderId),

    #[error("reminder is done or its due time has already passed")]
    LeadTimeNotAllowed,

    #[error("reminder has no due time to attach an alert to")]
    NoDueDate,

    #[error("the requested pre-alert instant is already in the past")]
    PastDueSchedule,

    #[error(transparent)]
    Engine(#[from] TriggerEngineError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

#[derive(Debug, PartialEq, Eq)]
pub enum DoneOutcome {
    Completed { text: String },
    AlreadyDone { text: String },
    Missing,
}

#[derive(Debug, PartialEq, Eq)]
pub enum AcknowledgeOutcome {
    Acknowledged,
    AlreadyDone { text: String },
    Missing,
}

#[derive(Debug, PartialEq, Eq)]
pub enum PostponeOutcome {
    Postponed {
        new_lead_minutes: u32,
        pre_alert_at: DateTime<Utc>,
        timezone: Tz,
        text: String,
    },
    /// Postponing would leave no usable lead before the due time. The
    /// original schedule is untouched.
    Rejected {
        text: String,
    },
    AlreadyDone {
        text: String,
    },
    Missing,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ReactivateOutcome {
    /// Pending again with the main alert armed. When `prompt_lead` is
    /// set the surface should ask for a fresh lead time instead of
    /// silently reusing the stored one.
    Scheduled { prompt_lead: bool },
    /// Pending again, but the due time has passed: no alert attached.
    PastDue,
    /// Pending again; there is no due time, so nothing to arm.
    NoDueDate,
    Missing,
}

/// Turns reminder lifecycle events into trigger registrations and fired
/// triggers into notifications. Owns trigger lifecycle exclusively; all
/// durable state lives in the injected stores, so the whole subsystem
/// restarts without losing pending alerts.
pub struct ReminderScheduler {
    engine: Arc<dyn TriggerEngine>,
    reminders: Arc<dyn ReminderStorage>,
    fixed: Arc<dyn FixedReminderStorage>,
    user_config: Arc<dyn UserConfigStorage>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    // Serializes trigger mutations: a cancel-then-register sequence for
    // one reminder must never interleave with another for the same id.
    mutation_lock: Mutex<()>,
}

impl ReminderScheduler {
    pub fn new(
        engine: Arc<dyn TriggerEngine>,
        reminders: Arc<dyn ReminderStorage>,
        fixed: Arc<dyn FixedReminderStorage>,
        user_config: Arc<dyn UserConfigStorage>,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self {
            engine,
            reminders,
            fixed,
            user_config,
            dispatcher,
            mutation_lock: Mutex::new(()),
        }
    }

    /// Registers the main trigger at `due_at` and, when the lead time
    /// still fits before it, the pre-alert trigger. Returns whether a
    /// pre-alert was registered; callers use this to decide whether to
    /// persist the lead time or ask the user again.
    pub async fn schedule(&self, reminder: &Reminder) -> Result<bool, ScheduleError> {
        let _guard = self.mutation_lock.lock().await;
        self.schedule_inner(reminder, Utc::now()).await
    }

    async fn schedule_inner(
        &self,
        reminder: &Reminder,
        now: DateTime<Utc>,
    ) -> Result<bool, ScheduleError> {
        let Some(due_at) = reminder.due_at else {
            return Ok(false);
        };
        let payload = TriggerPayload {
            reminder_id: Some(reminder.id),
            owner: reminder.owner,
        };

        self.engine
            .register_once(OnceTrigger {
                id: TriggerId::main(reminder.id),
                fire_at: due_at,
                payload,
            })
            .await?;

        if reminder.lead_minutes > 0 {
            let alert_at = pre_alert_at(due_at, reminder.lead_minutes);
            if alert_at > now {
                self.engine
                    .register_once(OnceTrigger {
                        id: TriggerId::pre_alert(reminder.id),
                        fire_at: alert_at,
                        payload,
                    })
                    .await?;
                return Ok(true);
            }
            log::info!(
                "Pre-alert for reminder {} skipped: {} has already passed",
                reminder.id,
                alert_at
            );
        }

        // No valid pre-alert; make sure no stale one stays armed either.
        self.engine.cancel(&TriggerId::pre_alert(reminder.id)).await?;
        Ok(false)
    }

    /// Removes both triggers for the reminder. Idempotent; canceling
    /// what is not there is success.
    pub async fn cancel(&self, id: ReminderId) -> Result<(), ScheduleError> {
        let _guard = self.mutation_lock.lock().await;
        self.cancel_inner(id).await
    }

    async fn cancel_inner(&self, id: ReminderId) -> Result<(), ScheduleError> {
        self.engine.cancel(&TriggerId::main(id)).await?;
        self.engine.cancel(&TriggerId::pre_alert(id)).await?;
        Ok(())
    }

    /// Reset/admin flow only: clears every trigger unconditionally.
    pub async fn cancel_all(&self) -> Result<(), ScheduleError> {
        let _guard = self.mutation_lock.lock().await;
        self.engine.cancel_all().await?;
        Ok(())
    }

    /// Repository delete plus trigger cleanup.
    pub async fn delete_reminder(&self, id: ReminderId) -> Result<bool, ScheduleError> {
        let _guard = self.mutation_lock.lock().await;
        let existed = self.reminders.delete(id).await?;
        self.cancel_inner(id).await?;
        Ok(existed)
    }

    /// One recurring trigger per fixed reminder; re-registering under
    /// the same id replaces the previous spec, so edits never leave the
    /// old schedule running in parallel.
    pub async fn reschedule_fixed_daily(&self, fixed: &FixedReminder) -> Result<(), ScheduleError> {
        let _guard = self.mutation_lock.lock().await;
        self.engine
            .register_recurring(RecurringTrigger {
                id: TriggerId::fixed(fixed.id),
                time_of_day: fixed.time_of_day,
                weekdays: fixed.weekdays,
                timezone: fixed.timezone,
                payload: TriggerPayload {
                    reminder_id: Some(fixed.id),
                    owner: fixed.owner,
                },
            })
            .await?;
        Ok(())
    }

    pub async fn cancel_fixed(&self, id: FixedReminderId) -> Result<(), ScheduleError> {
        let _guard = self.mutation_lock.lock().await;
        self.engine.cancel(&TriggerId::fixed(id)).await?;
        Ok(())
    }

    /// Per-chat recurring digest of the day's pending reminders.
    pub async fn schedule_daily_digest(
        &self,
        owner: Owner,
        time_of_day: NaiveTime,
        timezone: Tz,
    ) -> Result<(), ScheduleError> {
        let _guard = self.mutation_lock.lock().await;
        self.engine
            .register_recurring(RecurringTrigger {
                id: TriggerId::digest(owner.chat_id),
                time_of_day,
                weekdays: remembra_models::fixed::Weekdays::EVERY_DAY,
                timezone,
                payload: TriggerPayload {
                    reminder_id: None,
                    owner,
                },
            })
            .await?;
        Ok(())
    }

    pub async fn cancel_daily_digest(&self, chat_id: i64) -> Result<(), ScheduleError> {
        let _guard = self.mutation_lock.lock().await;
        self.engine.cancel(&TriggerId::digest(chat_id)).await?;
        Ok(())
    }

    /// Entry point for the fire router. Fire-time failures are logged
    /// and swallowed; they must not take down the engine or affect
    /// other pending triggers.
    pub async fn handle_fired(&self, fired: FiredTrigger) {
        let result = match fired.id.kind() {
            TriggerKind::Main => self.on_main_fired(&fired).await,
            TriggerKind::PreAlert => self.on_pre_alert_fired(&fired).await,
            TriggerKind::Fixed => self.on_fixed_fired(&fired).await,
            TriggerKind::Digest => self.on_digest_fired(&fired).await,
        };

        if let Err(e) = result {
            log::error!("Handling fired trigger {} failed: {e}", fired.id);
        }
    }

    async fn on_main_fired(&self, fired: &FiredTrigger) -> Result<(), ScheduleError> {
        let Some(reminder_id) = fired.payload.reminder_id else {
            return Ok(());
        };
        // A fire racing a delete or completion must see current state,
        // not the snapshot that was scheduled.
        let Some(reminder) = self.reminders.get(reminder_id).await? else {
            log::info!("Trigger {} fired for a deleted reminder", fired.id);
            return Ok(());
        };
        if reminder.is_done() {
            return Ok(());
        }

        // The pre-alert bookkeeping is spent once the main alert is out;
        // list views must not show a stale pending alert.
        if reminder.lead_minutes > 0 {
            self.reminders
                .update_fields(
                    reminder_id,
                    ReminderPatch {
                        lead_minutes: Some(0),
                        ..Default::default()
                    },
                )
                .await?;
        }

        let actions = vec![
            ActionSpec::new("👌 OK", ReminderAction::Acknowledge, reminder_id),
            ActionSpec::new("✅ Done", ReminderAction::MarkDone, reminder_id),
        ];
        self.dispatcher
            .send(
                Destination {
                    chat_id: reminder.owner.chat_id,
                },
                messages::main_alert(&reminder),
                actions,
            )
            .await?;
        Ok(())
    }

    async fn on_pre_alert_fired(&self, fired: &FiredTrigger) -> Result<(), ScheduleError> {
        let Some(reminder_id) = fired.payload.reminder_id else {
            return Ok(());
        };
        let Some(reminder) = self.reminders.get(reminder_id).await? else {
            log::info!("Trigger {} fired for a deleted reminder", fired.id);
            return Ok(());
        };
        if reminder.is_done() {
            return Ok(());
        }

        let mut actions = vec![ActionSpec::new(
            "👌 OK",
            ReminderAction::Acknowledge,
            reminder_id,
        )];
        // Postponing only makes sense while another full step still fits
        // before the due time.
        if reminder.lead_minutes > POSTPONE_MIN_LEAD_MINUTES {
            actions.push(ActionSpec::new(
                "⏰ +10 min",
                ReminderAction::Postpone {
                    minutes: POSTPONE_DELTA_MINUTES,
                },
                reminder_id,
            ));
        }
        actions.push(ActionSpec::new("✅ Done", ReminderAction::MarkDone, reminder_id));

        self.dispatcher
            .send(
                Destination {
                    chat_id: reminder.owner.chat_id,
                },
                messages::pre_alert(&reminder),
                actions,
            )
            .await?;
        Ok(())
    }

    async fn on_fixed_fired(&self, fired: &FiredTrigger) -> Result<(), ScheduleError> {
        let Some(fixed_id) = fired.payload.reminder_id else {
            return Ok(());
        };
        let Some(fixed) = self.fixed.get(fixed_id).await? else {
            log::info!("Trigger {} fired for a deleted fixed reminder", fired.id);
            return Ok(());
        };

        self.dispatcher
            .send(
                Destination {
                    chat_id: fixed.owner.chat_id,
                },
                messages::fixed_alert(&fixed),
                vec![],
            )
            .await?;
        Ok(())
    }

    async fn on_digest_fired(&self, fired: &FiredTrigger) -> Result<(), ScheduleError> {
        let owner = fired.payload.owner;
        let tz = self.owner_timezone(owner.chat_id).await?;
        let due_today = self.reminders.list_due_today(owner, tz, Utc::now()).await?;
        if due_today.is_empty() {
            return Ok(());
        }

        match self
            .dispatcher
            .send(
                Destination {
                    chat_id: owner.chat_id,
                },
                messages::digest(&due_today, tz),
                vec![],
            )
            .await
        {
            Err(DispatchError::Unavailable) => {
                log::warn!("Digest for chat {} skipped, recipient unavailable", owner.chat_id);
                Ok(())
            }
            other => other.map_err(Into::into),
        }
    }

    async fn owner_timezone(&self, chat_id: i64) -> Result<Tz, ScheduleError> {
        Ok(self
            .user_config
            .get(chat_id, KEY_TIMEZONE)
            .await?
            .and_then(|tz| tz.parse().ok())
            .unwrap_or(chrono_tz::UTC))
    }

    /// "Mark done" button. Idempotent: a reminder that is already done
    /// short-circuits with no further writes.
    pub async fn mark_done(&self, id: ReminderId) -> Result<DoneOutcome, ScheduleError> {
        let _guard = self.mutation_lock.lock().await;
        let Some(reminder) = self.reminders.get(id).await? else {
            return Ok(DoneOutcome::Missing);
        };
        if reminder.is_done() {
            return Ok(DoneOutcome::AlreadyDone {
                text: reminder.text,
            });
        }

        self.reminders
            .update_fields(
                id,
                ReminderPatch {
                    state: Some(ReminderState::Done),
                    lead_minutes: Some(0),
                    ..Default::default()
                },
            )
            .await?;
        self.cancel_inner(id).await?;

        Ok(DoneOutcome::Completed {
            text: reminder.text,
        })
    }

    /// "OK" button: a dismissal, not a completion. Drops the pre-alert
    /// bookkeeping and whatever trigger is still armed; state stays
    /// Pending.
    pub async fn acknowledge(&self, id: ReminderId) -> Result<AcknowledgeOutcome, ScheduleError> {
        let _guard = self.mutation_lock.lock().await;
        let Some(reminder) = self.reminders.get(id).await? else {
            return Ok(AcknowledgeOutcome::Missing);
        };
        if reminder.is_done() {
            return Ok(AcknowledgeOutcome::AlreadyDone {
                text: reminder.text,
            });
        }

        if reminder.lead_minutes > 0 {
            self.reminders
                .update_fields(
                    id,
                    ReminderPatch {
                        lead_minutes: Some(0),
                        ..Default::default()
                    },
                )
                .await?;
        }
        self.cancel_inner(id).await?;

        Ok(AcknowledgeOutcome::Acknowledged)
    }

    /// "+10 min" button. Keeps `due_at` fixed and pulls only the
    /// pre-alert closer: the new pre-alert lands at `now + minutes` and
    /// the lead time is recomputed from what remains until the due time.
    pub async fn postpone(
        &self,
        id: ReminderId,
        minutes: u32,
    ) -> Result<PostponeOutcome, ScheduleError> {
        let _guard = self.mutation_lock.lock().await;
        let Some(reminder) = self.reminders.get(id).await? else {
            return Ok(PostponeOutcome::Missing);
        };
        if reminder.is_done() {
            return Ok(PostponeOutcome::AlreadyDone {
                text: reminder.text,
            });
        }
        let Some(due_at) = reminder.due_at else {
            return Ok(PostponeOutcome::Rejected {
                text: reminder.text,
            });
        };

        let now = Utc::now();
        let new_pre_alert = now + TimeDelta::minutes(minutes as i64);
        let new_lead = round_minutes(due_at - new_pre_alert);
        if new_pre_alert >= due_at || new_lead < POSTPONE_MIN_LEAD_MINUTES {
            return Ok(PostponeOutcome::Rejected {
                text: reminder.text,
            });
        }

        let Some(updated) = self
            .reminders
            .update_fields(
                id,
                ReminderPatch {
                    lead_minutes: Some(new_lead),
                    ..Default::default()
                },
            )
            .await?
        else {
            return Ok(PostponeOutcome::Missing);
        };
        self.schedule_inner(&updated, now).await?;

        Ok(PostponeOutcome::Postponed {
            new_lead_minutes: new_lead,
            pre_alert_at: pre_alert_at(due_at, new_lead),
            timezone: updated.creation_timezone,
            text: updated.text,
        })
    }

    /// Content edit: new text and/or due time, lead time preserved. A
    /// pre-alert that no longer fits before the new due time is simply
    /// not armed.
    pub async fn reschedule_content(
        &self,
        id: ReminderId,
        text: String,
        due_at: Option<DateTime<Utc>>,
        timezone: Tz,
    ) -> Result<Option<Reminder>, ScheduleError> {
        let _guard = self.mutation_lock.lock().await;
        self.cancel_inner(id).await?;

        let Some(updated) = self
            .reminders
            .update_fields(
                id,
                ReminderPatch {
                    text: Some(text),
                    due_at: Some(due_at),
                    creation_timezone: Some(timezone),
                    ..Default::default()
                },
            )
            .await?
        else {
            return Ok(None);
        };

        self.schedule_inner(&updated, Utc::now()).await?;
        Ok(Some(updated))
    }

    /// Lead-time edit. Unlike creation, this flow treats an unsatisfiable
    /// pre-alert as a hard failure: the user is asked to pick a
    /// different lead instead of silently ending up without one.
    pub async fn change_lead_time(
        &self,
        id: ReminderId,
        minutes: u32,
    ) -> Result<u32, ScheduleError> {
        let _guard = self.mutation_lock.lock().await;
        let now = Utc::now();

        let Some(reminder) = self.reminders.get(id).await? else {
            return Err(ScheduleError::NotFound(id));
        };
        if reminder.is_done() || reminder.is_overdue(now) {
            return Err(ScheduleError::LeadTimeNotAllowed);
        }
        if minutes > 0 {
            let Some(due_at) = reminder.due_at else {
                return Err(ScheduleError::NoDueDate);
            };
            // Validated before anything is touched: a refusal leaves
            // both the stored lead and the triggers as they were.
            if pre_alert_at(due_at, minutes) <= now {
                return Err(ScheduleError::PastDueSchedule);
            }
        }

        let Some(updated) = self
            .reminders
            .update_fields(
                id,
                ReminderPatch {
                    lead_minutes: Some(minutes),
                    ..Default::default()
                },
            )
            .await?
        else {
            return Err(ScheduleError::NotFound(id));
        };

        self.cancel_inner(id).await?;
        let scheduled = self.schedule_inner(&updated, now).await?;
        if minutes > 0 && !scheduled {
            // Raced past the pre-alert instant between validation and
            // registration.
            return Err(ScheduleError::PastDueSchedule);
        }

        Ok(minutes)
    }

    /// Done -> Pending. Stale triggers go first; the main alert is only
    /// re-armed for a still-future due time, and the old lead time is
    /// never silently reused.
    pub async fn reactivate(&self, id: ReminderId) -> Result<ReactivateOutcome, ScheduleError> {
        let _guard = self.mutation_lock.lock().await;
        self.cancel_inner(id).await?;

        let Some(updated) = self
            .reminders
            .update_fields(
                id,
                ReminderPatch {
                    state: Some(ReminderState::Pending),
                    ..Default::default()
                },
            )
            .await?
        else {
            return Ok(ReactivateOutcome::Missing);
        };

        let now = Utc::now();
        let Some(due_at) = updated.due_at else {
            return Ok(ReactivateOutcome::NoDueDate);
        };
        if due_at <= now {
            return Ok(ReactivateOutcome::PastDue);
        }

        let main_only = Reminder {
            lead_minutes: 0,
            ..updated.clone()
        };
        self.schedule_inner(&main_only, now).await?;

        let prompt_lead =
            updated.lead_minutes > 0 && pre_alert_at(due_at, updated.lead_minutes) > now;
        Ok(ReactivateOutcome::Scheduled { prompt_lead })
    }
}

/// Consumes fired triggers from the engine and routes them into the
/// scheduler, one at a time in due order.
pub fn spawn_fire_router(
    mut fired_rx: mpsc::Receiver<FiredTrigger>,
    scheduler: Arc<ReminderScheduler>,
) -> JoinHandle<()> {
    task::spawn(async move {
        while let Some(fired) = fired_rx.recv().await {
            scheduler.handle_fired(fired).await;
        }
        log::info!("Trigger fire router stopped");
    })
}
