pub mod dispatch;
pub mod engine;
pub mod messages;
pub mod scheduler;
pub mod time_math;

pub use dispatch::{
    ActionSpec, Destination, DispatchError, MessageRef, NotificationDispatcher, ReminderAction,
};
pub use engine::{
    EngineConfig, FiredTrigger, OnceTrigger, RecurringTrigger, TokioTriggerEngine, TriggerEngine,
    TriggerEngineError, TriggerId, TriggerKind, TriggerPayload,
};
pub use scheduler::{
    AcknowledgeOutcome, DoneOutcome, PostponeOutcome, ReactivateOutcome, ReminderScheduler,
    ScheduleError, spawn_fire_router,
};
