//! Router behavior when the storage backend fails.
//!
//! A store failure in steady state is transient: the requester gets a
//! scoped `error` event, the triggering event is dropped, and nothing
//! reaches the room or the store. These tests drive the router over a
//! fault-injecting store and check exactly that.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use pinghub_proto::{
    ClientEvent, GroupCreateData, LoginData, MessageSendData, RoomId, ServerEvent, UserId,
};
use pinghub_server::{
    Environment, FlakyStore, MemoryStore, Router, RouterAction, RouterConfig, RouterEvent, Store,
};
use proptest::prelude::*;

#[derive(Clone)]
struct TestEnv {
    now: Arc<AtomicU64>,
    counter: Arc<AtomicU64>,
}

impl TestEnv {
    fn new(start: u64) -> Self {
        Self { now: Arc::new(AtomicU64::new(start)), counter: Arc::new(AtomicU64::new(0)) }
    }
}

impl Environment for TestEnv {
    fn wall_clock_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let bytes = n.to_be_bytes();
        for (i, b) in buffer.iter_mut().enumerate() {
            *b = bytes[i % bytes.len()];
        }
    }
}

fn router(store: FlakyStore<MemoryStore>) -> Router<TestEnv, FlakyStore<MemoryStore>> {
    Router::new(TestEnv::new(1_000_000), store, RouterConfig::default())
}

fn send(
    router: &mut Router<TestEnv, FlakyStore<MemoryStore>>,
    session_id: u64,
    event: ClientEvent,
) -> Vec<RouterAction> {
    router.process_event(RouterEvent::EventReceived { session_id, event }).unwrap()
}

fn open_and_login(
    router: &mut Router<TestEnv, FlakyStore<MemoryStore>>,
    session_id: u64,
    user: &str,
) {
    router.process_event(RouterEvent::ConnectionOpened { session_id }).unwrap();
    send(
        router,
        session_id,
        ClientEvent::Login(LoginData { id: UserId::from(user), username: user.to_string() }),
    );
}

fn text_send(text: &str) -> ClientEvent {
    ClientEvent::MessageSend(MessageSendData {
        user_id: None,
        username: "alice".to_string(),
        text: text.to_string(),
        room: None,
        kind: None,
        file: None,
    })
}

/// Error events sent back to one session.
fn scoped_errors(actions: &[RouterAction], target: u64) -> Vec<String> {
    actions
        .iter()
        .filter_map(|a| match a {
            RouterAction::SendToSession {
                session_id,
                event: ServerEvent::Error(data),
            } if *session_id == target => Some(data.message.clone()),
            _ => None,
        })
        .collect()
}

fn broadcast_count(actions: &[RouterAction]) -> usize {
    actions
        .iter()
        .filter(|a| {
            matches!(a, RouterAction::BroadcastAll { .. } | RouterAction::BroadcastRoom { .. })
        })
        .count()
}

#[test]
fn failed_send_is_scoped_to_the_sender_and_persists_nothing() {
    let store = FlakyStore::new(MemoryStore::new(), 1.0);
    let mut router = router(store.clone());
    open_and_login(&mut router, 1, "u1");
    open_and_login(&mut router, 2, "u2");

    let actions = send(&mut router, 1, text_send("hello"));

    let errors = scoped_errors(&actions, 1);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("storage unavailable"));

    assert_eq!(broadcast_count(&actions), 0);
    assert!(scoped_errors(&actions, 2).is_empty());
    assert_eq!(store.inner().count_messages(RoomId::Global).unwrap(), 0);
}

#[test]
fn failed_history_read_reports_storage_unavailable() {
    let store = FlakyStore::new(MemoryStore::new(), 1.0);
    let mut router = router(store);
    open_and_login(&mut router, 1, "u1");

    let actions = send(&mut router, 1, ClientEvent::MessagesGet(None));

    let errors = scoped_errors(&actions, 1);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("storage unavailable"));
    assert!(
        !actions
            .iter()
            .any(|a| matches!(
                a,
                RouterAction::SendToSession { event: ServerEvent::MessagesHistory(_), .. }
            ))
    );
}

#[test]
fn failed_group_create_leaves_no_group_behind() {
    let store = FlakyStore::new(MemoryStore::new(), 1.0);
    let mut router = router(store.clone());
    open_and_login(&mut router, 1, "u1");

    let actions = send(
        &mut router,
        1,
        ClientEvent::GroupCreate(GroupCreateData {
            name: "backend".to_string(),
            description: String::new(),
            is_private: false,
        }),
    );

    assert_eq!(scoped_errors(&actions, 1).len(), 1);
    assert!(
        !actions
            .iter()
            .any(|a| matches!(
                a,
                RouterAction::SendToSession { event: ServerEvent::GroupCreated(_), .. }
            ))
    );
    assert!(store.inner().groups_for_member(&UserId::from("u1")).unwrap().is_empty());
}

#[test]
fn send_succeeds_after_the_store_recovers() {
    let store = FlakyStore::new(MemoryStore::new(), 1.0);
    let mut router = router(store.clone());
    open_and_login(&mut router, 1, "u1");

    let failed = send(&mut router, 1, text_send("first try"));
    assert_eq!(scoped_errors(&failed, 1).len(), 1);

    store.set_failure_rate(0.0);

    let retried = send(&mut router, 1, text_send("second try"));
    assert!(scoped_errors(&retried, 1).is_empty());
    assert_eq!(broadcast_count(&retried), 1);
    assert_eq!(store.inner().count_messages(RoomId::Global).unwrap(), 1);
}

#[test]
fn prop_every_send_either_lands_or_errors() {
    proptest!(|(
        failure_rate in 0.0..0.8f64,
        seed in any::<u64>(),
        send_count in 1usize..40,
    )| {
        let store = FlakyStore::with_seed(MemoryStore::new(), failure_rate, seed);
        let mut router = router(store.clone());
        open_and_login(&mut router, 1, "u1");

        let mut delivered = 0usize;
        for i in 0..send_count {
            let actions = send(&mut router, 1, text_send(&format!("msg {i}")));

            let errors = scoped_errors(&actions, 1);
            let broadcasts = broadcast_count(&actions);

            // Exactly one outcome per send: delivery or a scoped error.
            prop_assert_eq!(errors.len() + broadcasts, 1);
            delivered += broadcasts;
        }

        // The store holds exactly the messages that were announced.
        prop_assert_eq!(
            store.inner().count_messages(RoomId::Global).unwrap(),
            delivered
        );
    });
}
