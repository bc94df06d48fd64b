use roomlog::{
    core::store::RoomStore,
    op::OpKind,
    stroke::{Point, Stroke},
    types::{OpId, RoomId, User},
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

fn line(x: f64) -> Stroke {
    Stroke::new(Default::default(), vec![Point::new(x, 0.0), Point::new(x, 10.0)])
}

fn visible(store: &mut RoomStore, room: &RoomId) -> Vec<OpId> {
    store.replay(room).into_iter().map(|s| s.op_id).collect()
}

#[test]
fn undo_then_redo_round_trips() {
    let mut store = RoomStore::new();
    let r = room("r");
    let a = store.record_stroke(&r, ada(), line(1.0));

    let undo = store.undo(&r, ada(), None).expect("undo");
    assert_eq!(undo.kind(), OpKind::Undo);
    assert_eq!(undo.target(), Some(a.op_id));
    assert!(visible(&mut store, &r).is_empty());

    let redo = store.redo(&r, ada(), None).expect("redo");
    assert_eq!(redo.kind(), OpKind::Redo);
    assert_eq!(redo.target(), Some(a.op_id));
    assert_eq!(visible(&mut store, &r), vec![a.op_id]);
}

#[test]
fn redo_moves_stroke_to_top() {
    let mut store = RoomStore::new();
    let r = room("r");
    let a = store.record_stroke(&r, ada(), line(1.0));
    let b = store.record_stroke(&r, bob(), line(2.0));

    store.undo(&r, ada(), Some(a.op_id)).expect("undo a");
    store.redo(&r, ada(), Some(a.op_id)).expect("redo a");

    assert_eq!(visible(&mut store, &r), vec![b.op_id, a.op_id]);
}

#[test]
fn new_stroke_clears_redo() {
    let mut store = RoomStore::new();
    let r = room("r");
    store.record_stroke(&r, ada(), line(1.0));
    store.undo(&r, ada(), None).expect("undo");
    let b = store.record_stroke(&r, ada(), line(2.0));

    let log_len = store.log_of(&r).len();
    assert!(store.redo(&r, ada(), None).is_none());
    assert_eq!(store.log_of(&r).len(), log_len);
    assert_eq!(visible(&mut store, &r), vec![b.op_id]);
}

#[test]
fn explicit_target_undo_skips_the_top() {
    let mut store = RoomStore::new();
    let r = room("r");
    let a = store.record_stroke(&r, ada(), line(1.0));
    let b = store.record_stroke(&r, bob(), line(2.0));

    let undo = store.undo(&r, bob(), Some(a.op_id)).expect("undo a");
    assert_eq!(undo.target(), Some(a.op_id));
    assert_eq!(visible(&mut store, &r), vec![b.op_id]);

    let undo = store.undo(&r, ada(), None).expect("undo b");
    assert_eq!(undo.target(), Some(b.op_id));
    assert!(visible(&mut store, &r).is_empty());
}

#[test]
fn empty_history_and_unknown_targets_append_nothing() {
    let mut store = RoomStore::new();
    let r = room("r");

    assert!(store.undo(&r, ada(), None).is_none());
    assert!(store.redo(&r, ada(), None).is_none());

    let a = store.record_stroke(&r, ada(), line(1.0));
    assert!(store.undo(&r, ada(), Some(OpId::new())).is_none());
    assert!(store.redo(&r, ada(), Some(a.op_id)).is_none());

    assert_eq!(store.log_of(&r).len(), 1);
}

#[test]
fn concurrent_implicit_undos_take_successive_tops() {
    let mut store = RoomStore::new();
    let r = room("r");
    let a = store.record_stroke(&r, ada(), line(1.0));
    let b = store.record_stroke(&r, bob(), line(2.0));

    let first = store.undo(&r, ada(), None).expect("first");
    let second = store.undo(&r, bob(), None).expect("second");

    assert_eq!(first.target(), Some(b.op_id));
    assert_eq!(second.target(), Some(a.op_id));
}

#[test]
fn last_undoable_returns_log_entry_without_mutation() {
    let mut store = RoomStore::new();
    let r = room("r");
    assert!(store.last_undoable(&r).is_none());

    store.record_stroke(&r, ada(), line(1.0));
    let b = store.record_stroke(&r, bob(), line(2.0));

    let top = store.last_undoable(&r).expect("top");
    assert_eq!(top, b);
    assert_eq!(store.last_undoable(&r).expect("again"), b);
    assert_eq!(store.log_of(&r).len(), 2);
}

#[test]
fn rooms_are_isolated() {
    let mut store = RoomStore::new();
    let (x, y) = (room("x"), room("y"));
    let a = store.record_stroke(&x, ada(), line(1.0));
    let b = store.record_stroke(&y, bob(), line(2.0));

    store.undo(&x, ada(), None).expect("undo in x");

    assert!(visible(&mut store, &x).is_empty());
    assert_eq!(visible(&mut store, &y), vec![b.op_id]);
    assert!(store.undo(&y, ada(), Some(a.op_id)).is_none());
    assert_eq!(store.len(), 2);
}

#[test]
fn replay_is_idempotent() {
    let mut store = RoomStore::new();
    let r = room("r");
    let a = store.record_stroke(&r, ada(), line(1.0));
    store.record_stroke(&r, bob(), line(2.0));
    store.undo(&r, ada(), Some(a.op_id)).expect("undo");

    let first = store.replay(&r);
    let second = store.replay(&r);
    assert_eq!(first, second);
}

#[test]
fn empty_room_ids_are_rejected() {
    assert!(RoomId::parse("").is_err());
    assert!(RoomId::parse("   ").is_err());
    assert_eq!(room(" lobby ").as_str(), "lobby");
}

#[test]
fn idle_rooms_are_evicted() {
    let mut store = RoomStore::new();
    let (x, y) = (room("x"), room("y"));
    store.record_stroke(&x, ada(), line(1.0));
    store.record_stroke(&y, ada(), line(2.0));

    let x_seen = store.get(&x).expect("x").last_activity_ms();
    let y_seen = store.get(&y).expect("y").last_activity_ms();
    let now = x_seen.max(y_seen);

    assert_eq!(store.evict_idle(now, 60_000), 0);
    assert_eq!(store.evict_idle(now + 60_000, 60_000), 2);
    assert!(store.is_empty());
    assert!(store.log_of(&x).is_empty());
}

#[test]
fn recent_returns_tail_in_order() {
    let mut store = RoomStore::new();
    let r = room("r");
    let a = store.record_stroke(&r, ada(), line(1.0));
    let undo = store.undo(&r, bob(), None).expect("undo");

    let state = store.get_or_create(&r);
    assert_eq!(state.recent(1), &[undo.clone()]);
    assert_eq!(state.recent(10), &[a, undo]);
}
