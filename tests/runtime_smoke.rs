use std::time::Duration;

use roomlog::{
    op::OpKind,
    runtime::{
        events::RoomEvent,
        handle::{RuntimeConfig, RuntimeError, spawn_room},
        hub::RoomHub,
    },
    stroke::{Point, Stroke},
    types::{MemberId, OpId, RoomId, User},
};

fn room(name: &str) -> RoomId {
    RoomId::parse(name).expect("room id")
}

fn ada() -> User {
    User::new("u1", "Ada", "#e11d48")
}

fn bob() -> User {
    User::new("u2", "Bob", "#2563eb")
}

fn dot(x: f64) -> Stroke {
    Stroke::new(Default::default(), vec![Point::new(x, x)])
}

#[tokio::test]
async fn room_actor_orders_ops_and_events() {
    let handle = spawn_room(room("r"), &RuntimeConfig::default());
    let mut sub = handle.subscribe();

    let a = handle.record_stroke(ada(), dot(1.0)).await.expect("stroke");
    let undo = handle.undo(bob(), None).await.expect("undo").expect("some");
    assert_eq!(undo.target(), Some(a.op_id));
    assert!(handle.undo(bob(), None).await.expect("undo").is_none());

    let mut kinds = Vec::new();
    for _ in 0..2 {
        let evt = tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .expect("event")
            .expect("recv");
        match evt {
            RoomEvent::Appended(op) => kinds.push(op.kind()),
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert_eq!(kinds, vec![OpKind::Stroke, OpKind::Undo]);

    assert_eq!(handle.log().await.expect("log").len(), 2);
    assert!(handle.replay().await.expect("replay").is_empty());
    assert!(handle.last_undoable().await.expect("last").is_none());
    assert_eq!(handle.recent(1).await.expect("recent"), vec![undo]);

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn join_snapshot_and_subscription_do_not_overlap() {
    let hub = RoomHub::new(RuntimeConfig::default());
    let r = room("r");
    let a = hub.record_stroke(&r, ada(), dot(1.0)).await.expect("stroke");

    let member = MemberId::new_v4();
    let (handle, mut ack) = hub.join(&r, member, bob()).await.expect("join");
    assert_eq!(ack.roster, vec![bob()]);
    assert_eq!(ack.snapshot.op_log.len(), 1);
    assert_eq!(ack.snapshot.op_log[0].op_id, a.op_id);

    let b = hub.record_stroke(&r, bob(), dot(2.0)).await.expect("stroke");
    let evt = tokio::time::timeout(Duration::from_secs(1), ack.events.recv())
        .await
        .expect("event")
        .expect("recv");
    assert_eq!(evt, RoomEvent::Appended(b));

    assert!(handle.leave(member).await.expect("leave"));
    assert!(!handle.leave(member).await.expect("leave again"));
    assert!(handle.members().await.expect("members").is_empty());

    hub.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn hub_keeps_rooms_isolated() {
    let hub = RoomHub::new(RuntimeConfig::default());
    let (x, y) = (room("x"), room("y"));

    let a = hub.record_stroke(&x, ada(), dot(1.0)).await.expect("x stroke");
    let b = hub.record_stroke(&y, bob(), dot(2.0)).await.expect("y stroke");
    hub.undo(&x, bob(), None).await.expect("undo").expect("some");

    assert!(hub.replay(&x).await.expect("x").is_empty());
    let y_ids: Vec<OpId> = hub.replay(&y).await.expect("y").into_iter().map(|s| s.op_id).collect();
    assert_eq!(y_ids, vec![b.op_id]);
    assert!(hub.undo(&y, ada(), Some(a.op_id)).await.expect("undo").is_none());
    assert_eq!(hub.room_count(), 2);

    hub.shutdown().await.expect("shutdown");
    assert_eq!(hub.room_count(), 0);
}

#[tokio::test]
async fn concurrent_explicit_undos_hit_distinct_strokes() {
    let hub = RoomHub::new(RuntimeConfig::default());
    let r = room("r");
    let a = hub.record_stroke(&r, ada(), dot(1.0)).await.expect("a");
    let b = hub.record_stroke(&r, bob(), dot(2.0)).await.expect("b");

    let (ua, ub) = tokio::join!(
        hub.undo(&r, ada(), Some(a.op_id)),
        hub.undo(&r, bob(), Some(b.op_id)),
    );
    let mut targets = vec![
        ua.expect("ua").expect("some").target(),
        ub.expect("ub").expect("some").target(),
    ];
    targets.sort();
    let mut expected = vec![Some(a.op_id), Some(b.op_id)];
    expected.sort();
    assert_eq!(targets, expected);
    assert!(hub.replay(&r).await.expect("replay").is_empty());

    hub.shutdown().await.expect("shutdown");
}

#[tokio::test(start_paused = true)]
async fn idle_empty_rooms_are_evicted_and_recreated() {
    let cfg = RuntimeConfig {
        idle_room_ttl_ms: Some(1_000),
        ..RuntimeConfig::default()
    };
    let hub = RoomHub::new(cfg);
    let (idle, busy) = (room("idle"), room("busy"));

    hub.record_stroke(&idle, ada(), dot(1.0)).await.expect("stroke");
    let (_busy_handle, _ack) = hub.join(&busy, MemberId::new_v4(), bob()).await.expect("join");
    assert_eq!(hub.room_count(), 2);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(hub.room_count(), 1);

    assert!(hub.log(&idle).await.expect("log").is_empty());
    assert_eq!(hub.room_count(), 2);

    hub.shutdown().await.expect("shutdown");
}

#[tokio::test(start_paused = true)]
async fn command_at_the_idle_deadline_is_retried_on_a_fresh_room() {
    let cfg = RuntimeConfig {
        idle_room_ttl_ms: Some(1_000),
        ..RuntimeConfig::default()
    };
    let hub = RoomHub::new(cfg);
    let r = room("r");
    let old = hub.record_stroke(&r, ada(), dot(1.0)).await.expect("stroke");
    let stale = hub.get_or_create(&r);

    // Queue the stroke, then move the clock onto the deadline before the actor runs.
    let (late, ()) = tokio::join!(
        hub.record_stroke(&r, bob(), dot(2.0)),
        tokio::time::advance(Duration::from_millis(1_000)),
    );
    let late = late.expect("retried stroke");

    assert!(stale.is_closed());
    assert_eq!(stale.log().await, Err(RuntimeError::ChannelClosed));
    let log = hub.log(&r).await.expect("log");
    assert_eq!(log, vec![late]);
    assert!(log.iter().all(|op| op.op_id != old.op_id));
    assert_eq!(hub.room_count(), 1);

    hub.shutdown().await.expect("shutdown");
}
