// ABOUTME: Integration tests for envelope dispatch through the public core API
// ABOUTME: Covers acceptance filtering, duplicate suppression, ordering and acknowledgements

use std::sync::{Arc, Mutex};

use slackbot_core::{
    handler_fn, Acknowledgement, DispatchOutcome, EventDispatcher, OrderedFixedSizeSet,
    SkipReason, SocketModeEnvelope,
};

/// Build a raw Socket Mode frame the way Slack sends it
fn frame(envelope_id: &str, event_id: &str, event_time: i64, app_id: Option<&str>) -> String {
    let bot_profile = match app_id {
        Some(id) => format!(r#","bot_profile":{{"id":"B1","app_id":"{}"}}"#, id),
        None => String::new(),
    };
    format!(
        r#"{{"envelope_id":"{envelope_id}","type":"events_api","accepts_response_payload":false,
            "payload":{{"type":"event_callback","event_id":"{event_id}","event_time":{event_time},
            "event":{{"type":"message","user":"U1","text":"{event_id}","channel":"D1"{bot_profile}}}}}}}"#
    )
}

fn parse(raw: &str) -> SocketModeEnvelope {
    SocketModeEnvelope::from_json(raw).expect("frame should parse")
}

fn recording_dispatcher(start_time: i64) -> (EventDispatcher, Arc<Mutex<Vec<String>>>) {
    let dispatcher = EventDispatcher::new(Some("A_SELF".to_string()), start_time, 100);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    dispatcher.register(handler_fn(move |event| {
        log.lock().unwrap().push(event.text_or_empty().to_string());
        Ok(())
    }));
    (dispatcher, seen)
}

// =============================================================================
// SCENARIO: dedup set capacity two keeps the latest two keys
// =============================================================================
#[test]
fn scenario_capacity_two_evicts_first_key() {
    let mut set = OrderedFixedSizeSet::new(2);
    set.add("a");
    set.add("b");
    set.add("c");

    assert!(set.contains("b"));
    assert!(set.contains("c"));
    assert!(!set.contains("a"));
}

// =============================================================================
// SCENARIO: stale event ignored, fresh event dispatched once, redelivery ignored
// =============================================================================
#[tokio::test]
async fn scenario_stale_fresh_and_redelivered() {
    let (dispatcher, seen) = recording_dispatcher(100);

    let stale = dispatcher.process(&parse(&frame("e1", "EvOld", 50, None))).await;
    assert_eq!(stale.outcome, DispatchOutcome::Skipped(SkipReason::Stale));

    let fresh = dispatcher.process(&parse(&frame("e2", "EvNew", 150, None))).await;
    assert_eq!(fresh.outcome, DispatchOutcome::Dispatched { handlers: 1 });

    let redelivered = dispatcher.process(&parse(&frame("e3", "EvNew", 150, None))).await;
    assert_eq!(
        redelivered.outcome,
        DispatchOutcome::Skipped(SkipReason::Duplicate)
    );

    assert_eq!(*seen.lock().unwrap(), vec!["EvNew"]);
}

// =============================================================================
// SCENARIO: mixed feed dispatches exactly the qualifying events, in order
// =============================================================================
#[tokio::test]
async fn scenario_mixed_feed_dispatches_in_input_order() {
    let (dispatcher, seen) = recording_dispatcher(1000);

    let feed = vec![
        frame("e1", "Ev1", 1001, None),          // accepted
        frame("e2", "Ev2", 999, None),           // stale
        frame("e3", "Ev3", 1002, Some("A_SELF")), // self echo
        frame("e4", "Ev4", 1003, Some("A_OTHER")), // accepted
        frame("e5", "Ev1", 1001, None),          // duplicate
        frame("e6", "Ev5", 1000, None),          // stale (not strictly after)
        frame("e7", "Ev6", 1004, None),          // accepted
    ];

    let mut outcomes = Vec::new();
    for raw in &feed {
        outcomes.push(dispatcher.process(&parse(raw)).await.outcome);
    }

    assert_eq!(*seen.lock().unwrap(), vec!["Ev1", "Ev4", "Ev6"]);
    assert_eq!(
        outcomes,
        vec![
            DispatchOutcome::Dispatched { handlers: 1 },
            DispatchOutcome::Skipped(SkipReason::Stale),
            DispatchOutcome::Skipped(SkipReason::SelfEcho),
            DispatchOutcome::Dispatched { handlers: 1 },
            DispatchOutcome::Skipped(SkipReason::Duplicate),
            DispatchOutcome::Skipped(SkipReason::Stale),
            DispatchOutcome::Dispatched { handlers: 1 },
        ]
    );
}

// =============================================================================
// SCENARIO: every identified envelope is acknowledged exactly once
// =============================================================================
#[tokio::test]
async fn scenario_every_envelope_acknowledged() {
    let (dispatcher, _seen) = recording_dispatcher(100);
    dispatcher.register(handler_fn(|_| anyhow::bail!("downstream unavailable")));

    let feed = vec![
        frame("e1", "Ev1", 50, None),
        frame("e2", "Ev2", 150, None),
        frame("e3", "Ev2", 150, None),
        frame("e4", "Ev3", 150, Some("A_SELF")),
        r#"{"envelope_id":"e5","type":"slash_commands","payload":{"command":"/hi"}}"#.to_string(),
    ];

    let mut acks = Vec::new();
    for raw in &feed {
        let report = dispatcher.process(&parse(raw)).await;
        acks.extend(report.ack);
    }

    let expected: Vec<Acknowledgement> = ["e1", "e2", "e3", "e4", "e5"]
        .into_iter()
        .map(Acknowledgement::new)
        .collect();
    assert_eq!(acks, expected);
}

// =============================================================================
// SCENARIO: repeated burst of one event yields a single handler call
// =============================================================================
#[tokio::test]
async fn scenario_burst_of_duplicates() {
    let (dispatcher, seen) = recording_dispatcher(0);
    for i in 0..10 {
        let env_id = format!("e{}", i);
        dispatcher
            .process(&parse(&frame(&env_id, "EvBurst", 42, None)))
            .await;
    }
    assert_eq!(seen.lock().unwrap().len(), 1);
}

// =============================================================================
// SCENARIO: concurrent delivery paths still dispatch a key at most once
// =============================================================================
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scenario_concurrent_delivery_at_most_once() {
    let (dispatcher, seen) = recording_dispatcher(0);
    let dispatcher = Arc::new(dispatcher);

    let mut tasks = Vec::new();
    for i in 0..16 {
        let dispatcher = Arc::clone(&dispatcher);
        tasks.push(tokio::spawn(async move {
            let raw = frame(&format!("e{}", i), "EvShared", 7, None);
            dispatcher.process(&parse(&raw)).await.outcome
        }));
    }

    let mut dispatched = 0;
    for task in tasks {
        if task.await.unwrap().accepted() {
            dispatched += 1;
        }
    }

    assert_eq!(dispatched, 1);
    assert_eq!(seen.lock().unwrap().len(), 1);
}

// =============================================================================
// SCENARIO: eviction lets an old key through again
// =============================================================================
#[tokio::test]
async fn scenario_evicted_key_is_dispatched_again() {
    let dispatcher = EventDispatcher::new(None, 0, 2);
    let count = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&count);
    dispatcher.register(handler_fn(move |_| {
        *counter.lock().unwrap() += 1;
        Ok(())
    }));

    for event_id in ["Ev1", "Ev2", "Ev3", "Ev1"] {
        dispatcher
            .process(&parse(&frame("e", event_id, 1, None)))
            .await;
    }

    assert_eq!(*count.lock().unwrap(), 4);
    assert_eq!(dispatcher.seen_count(), 2);
}

// =============================================================================
// SCENARIO: non-message events with nested objects still reach handlers
// =============================================================================

/// Wrap an arbitrary inner event the way Slack delivers it
fn callback_frame(envelope_id: &str, event_id: &str, event: serde_json::Value) -> String {
    serde_json::json!({
        "envelope_id": envelope_id,
        "type": "events_api",
        "payload": {
            "type": "event_callback",
            "event_id": event_id,
            "event_time": 10,
            "event": event
        }
    })
    .to_string()
}

#[tokio::test]
async fn scenario_event_shapes_reach_handlers() {
    let dispatcher = EventDispatcher::new(Some("A_SELF".to_string()), 0, 100);
    let types = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&types);
    dispatcher.register(handler_fn(move |event| {
        log.lock().unwrap().push(event.event_type.clone());
        Ok(())
    }));

    let feed = vec![
        callback_frame(
            "e1",
            "EvReact",
            serde_json::json!({
                "type": "reaction_added",
                "user": "U1",
                "reaction": "thumbsup",
                "item": {"type": "message", "channel": "C1", "ts": "1700000000.000100"},
                "item_user": "U2",
                "event_ts": "1700000010.000200"
            }),
        ),
        callback_frame(
            "e2",
            "EvUserChange",
            serde_json::json!({
                "type": "user_change",
                "user": {"id": "U1", "name": "ada", "profile": {"display_name": "Ada"}},
                "cache_ts": 1700000010
            }),
        ),
        callback_frame(
            "e3",
            "EvChannel",
            serde_json::json!({
                "type": "channel_created",
                "channel": {"id": "C9", "name": "launch", "created": 1700000010, "creator": "U1"}
            }),
        ),
    ];

    let mut reports = Vec::new();
    for raw in &feed {
        reports.push(dispatcher.process(&parse(raw)).await);
    }

    for report in &reports {
        assert_eq!(report.outcome, DispatchOutcome::Dispatched { handlers: 1 });
        assert!(report.ack.is_some());
    }
    assert_eq!(
        *types.lock().unwrap(),
        vec!["reaction_added", "user_change", "channel_created"]
    );
    assert_eq!(dispatcher.seen_count(), 3);

    // Redelivery of an object-valued event is still recognized
    let again = dispatcher.process(&parse(&feed[1])).await;
    assert_eq!(again.outcome, DispatchOutcome::Skipped(SkipReason::Duplicate));
}
