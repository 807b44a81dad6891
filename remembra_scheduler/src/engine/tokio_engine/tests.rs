use std::{sync::Arc, time::Duration};

use chrono::{TimeDelta, Utc};
use tokio::sync::mpsc;

use remembra_models::{fixed::Weekdays, owner::Owner};
use remembra_storage::InMemoryJobStore;

use super::*;

fn owner() -> Owner {
    Owner {
        user_id: 1,
        chat_id: 100,
    }
}

fn payload(reminder_id: i64) -> TriggerPayload {
    TriggerPayload {
        reminder_id: Some(reminder_id),
        owner: owner(),
    }
}

fn engine_with_store(
    store: Arc<InMemoryJobStore>,
) -> (TokioTriggerEngine, mpsc::Receiver<FiredTrigger>) {
    TokioTriggerEngine::start(store, EngineConfig::default())
}

fn engine() -> (TokioTriggerEngine, mpsc::Receiver<FiredTrigger>) {
    engine_with_store(Arc::new(InMemoryJobStore::new()))
}

async fn recv_within(
    rx: &mut mpsc::Receiver<FiredTrigger>,
    duration: Duration,
) -> Option<FiredTrigger> {
    tokio::time::timeout(duration, rx.recv()).await.ok().flatten()
}

#[tokio::test(start_paused = true)]
pub async fn once_trigger_fires_at_due_time() {
    let (engine, mut rx) = engine();
    let fire_at = Utc::now() + TimeDelta::minutes(30);

    engine
        .register_once(OnceTrigger {
            id: TriggerId::main(1),
            fire_at,
            payload: payload(1),
        })
        .await
        .unwrap();

    let fired = recv_within(&mut rx, Duration::from_secs(31 * 60)).await.unwrap();
    assert_eq!(fired.id, TriggerId::main(1));
    assert_eq!(fired.payload, payload(1));
}

#[tokio::test(start_paused = true)]
pub async fn reregistering_same_id_replaces_not_duplicates() {
    let store = Arc::new(InMemoryJobStore::new());
    let (engine, mut rx) = engine_with_store(Arc::clone(&store));
    let id = TriggerId::main(1);

    engine
        .register_once(OnceTrigger {
            id,
            fire_at: Utc::now() + TimeDelta::minutes(10),
            payload: payload(1),
        })
        .await
        .unwrap();
    engine
        .register_once(OnceTrigger {
            id,
            fire_at: Utc::now() + TimeDelta::minutes(20),
            payload: payload(1),
        })
        .await
        .unwrap();

    assert_eq!(store.len().await, 1);

    // Only the second registration fires.
    assert!(recv_within(&mut rx, Duration::from_secs(60 * 60)).await.is_some());
    assert!(recv_within(&mut rx, Duration::from_secs(60 * 60)).await.is_none());
}

#[tokio::test(start_paused = true)]
pub async fn cancelled_trigger_never_fires() {
    let store = Arc::new(InMemoryJobStore::new());
    let (engine, mut rx) = engine_with_store(Arc::clone(&store));
    let id = TriggerId::main(1);

    engine
        .register_once(OnceTrigger {
            id,
            fire_at: Utc::now() + TimeDelta::minutes(10),
            payload: payload(1),
        })
        .await
        .unwrap();

    assert!(engine.cancel(&id).await.unwrap());
    assert!(!engine.exists(&id).await.unwrap());
    assert!(store.is_empty().await);

    assert!(recv_within(&mut rx, Duration::from_secs(60 * 60)).await.is_none());
}

#[tokio::test(start_paused = true)]
pub async fn cancel_is_idempotent() {
    let (engine, _rx) = engine();
    let id = TriggerId::pre_alert(5);

    engine
        .register_once(OnceTrigger {
            id,
            fire_at: Utc::now() + TimeDelta::minutes(10),
            payload: payload(5),
        })
        .await
        .unwrap();

    assert!(engine.cancel(&id).await.unwrap());
    // Absence of the target is success, not an error.
    assert!(!engine.cancel(&id).await.unwrap());
    assert!(!engine.cancel(&TriggerId::main(999)).await.unwrap());
}

#[tokio::test(start_paused = true)]
pub async fn missed_trigger_within_grace_fires_immediately() {
    let (engine, mut rx) = engine();

    engine
        .register_once(OnceTrigger {
            id: TriggerId::main(1),
            fire_at: Utc::now() - TimeDelta::seconds(30),
            payload: payload(1),
        })
        .await
        .unwrap();

    assert!(recv_within(&mut rx, Duration::from_secs(5)).await.is_some());
}

#[tokio::test(start_paused = true)]
pub async fn missed_trigger_outside_grace_is_dropped() {
    let store = Arc::new(InMemoryJobStore::new());
    let (engine, mut rx) = engine_with_store(Arc::clone(&store));

    engine
        .register_once(OnceTrigger {
            id: TriggerId::main(1),
            fire_at: Utc::now() - TimeDelta::minutes(5),
            payload: payload(1),
        })
        .await
        .unwrap();

    assert!(store.is_empty().await);
    assert!(recv_within(&mut rx, Duration::from_secs(5)).await.is_none());
}

#[tokio::test(start_paused = true)]
pub async fn restore_rearms_persisted_jobs() {
    let store = Arc::new(InMemoryJobStore::new());

    // First engine persists a job and goes away without firing it.
    {
        let (engine, _rx) = engine_with_store(Arc::clone(&store));
        engine
            .register_once(OnceTrigger {
                id: TriggerId::main(7),
                fire_at: Utc::now() + TimeDelta::minutes(30),
                payload: payload(7),
            })
            .await
            .unwrap();
    }
    assert_eq!(store.len().await, 1);

    let (engine, mut rx) = engine_with_store(Arc::clone(&store));
    assert_eq!(engine.restore().await.unwrap(), 1);
    assert!(engine.exists(&TriggerId::main(7)).await.unwrap());

    let fired = recv_within(&mut rx, Duration::from_secs(31 * 60)).await.unwrap();
    assert_eq!(fired.id, TriggerId::main(7));
}

#[tokio::test(start_paused = true)]
pub async fn recurring_trigger_is_replaced_on_reregistration() {
    let store = Arc::new(InMemoryJobStore::new());
    let (engine, _rx) = engine_with_store(Arc::clone(&store));
    let id = TriggerId::fixed(3);

    let register = |hour: u32| RecurringTrigger {
        id,
        time_of_day: chrono::NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
        weekdays: Weekdays::EVERY_DAY,
        timezone: chrono_tz::UTC,
        payload: payload(3),
    };

    engine.register_recurring(register(8)).await.unwrap();
    engine.register_recurring(register(9)).await.unwrap();

    assert_eq!(store.len().await, 1);
    assert!(engine.exists(&id).await.unwrap());
    assert_eq!(engine.active_triggers().await, 1);
}

#[tokio::test(start_paused = true)]
pub async fn recurring_trigger_fires_and_stays_registered() {
    let store = Arc::new(InMemoryJobStore::new());
    let (engine, mut rx) = engine_with_store(Arc::clone(&store));
    let id = TriggerId::digest(100);

    engine
        .register_recurring(RecurringTrigger {
            id,
            time_of_day: chrono::NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            weekdays: Weekdays::EVERY_DAY,
            timezone: chrono_tz::UTC,
            payload: TriggerPayload {
                reminder_id: None,
                owner: owner(),
            },
        })
        .await
        .unwrap();

    let fired = recv_within(&mut rx, Duration::from_secs(25 * 60 * 60)).await.unwrap();
    assert_eq!(fired.id, id);
    // A recurring job keeps its row; it is re-armed, not consumed.
    assert_eq!(store.len().await, 1);
}

#[tokio::test(start_paused = true)]
pub async fn cancel_all_clears_everything() {
    let store = Arc::new(InMemoryJobStore::new());
    let (engine, mut rx) = engine_with_store(Arc::clone(&store));

    for reminder_id in 1..=3 {
        engine
            .register_once(OnceTrigger {
                id: TriggerId::main(reminder_id),
                fire_at: Utc::now() + TimeDelta::minutes(10),
                payload: payload(reminder_id),
            })
            .await
            .unwrap();
    }

    engine.cancel_all().await.unwrap();

    assert!(store.is_empty().await);
    assert_eq!(engine.active_triggers().await, 0);
    assert!(recv_within(&mut rx, Duration::from_secs(60 * 60)).await.is_none());
}
