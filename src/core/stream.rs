//! Last-value-cached broadcast of the chat history.
//!
//! A [`MessageStream`] holds the full ordered list of turns as an immutable
//! [`Snapshot`]. Publishing replaces the snapshot and hands the whole new
//! value to every subscriber, in subscription order. Subscribers receive the
//! current snapshot as soon as they subscribe.
//!
//! Observers run without the internal lock held, so they may publish,
//! subscribe or unsubscribe from inside their callback. Work triggered that
//! way is queued and delivered once the current round finishes; every
//! observer therefore sees snapshots strictly in publish order.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, Weak};
use std::thread::{self, ThreadId};

use tokio::sync::mpsc;
use tracing::debug;

use crate::core::constants::GREETING;
use crate::core::message::ChatTurn;

/// The full ordered turn history at one point in time.
pub type Snapshot = Arc<[ChatTurn]>;

type Observer = Arc<dyn Fn(&Snapshot) + Send + Sync>;

struct Registration {
    id: u64,
    /// Sequence number current when the observer subscribed. Broadcasts at
    /// or below it are already covered by the replay.
    since: u64,
    active: Arc<AtomicBool>,
    observer: Observer,
}

struct Delivery {
    seq: u64,
    snapshot: Snapshot,
    /// Replays go to a single subscriber; broadcasts have no target.
    target: Option<u64>,
}

struct StreamState {
    snapshot: Snapshot,
    seq: u64,
    next_id: u64,
    registrations: Vec<Registration>,
    pending: VecDeque<Delivery>,
    /// Thread currently running observers, if any.
    drainer: Option<ThreadId>,
}

struct Shared {
    state: Mutex<StreamState>,
    /// Signalled whenever a drainer hands the queue back.
    idle: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, StreamState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn remove(&self, id: u64) {
        self.lock().registrations.retain(|reg| reg.id != id);
    }

    /// Deliver queued snapshots until the queue is empty.
    ///
    /// One thread drains at a time. A call from inside an observer on the
    /// draining thread only enqueues; a call from any other thread waits
    /// until the current drainer has emptied the queue, which includes the
    /// caller's own deliveries.
    fn drain<'a>(&'a self, mut state: MutexGuard<'a, StreamState>) {
        let me = thread::current().id();
        match state.drainer {
            Some(owner) if owner == me => return,
            Some(_) => {
                while state.drainer.is_some() {
                    state = self
                        .idle
                        .wait(state)
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                }
                if state.pending.is_empty() {
                    return;
                }
            }
            None => {}
        }

        state.drainer = Some(me);
        let mut guard = DrainGuard {
            shared: self,
            finished: false,
        };

        loop {
            let Some(delivery) = state.pending.pop_front() else {
                state.drainer = None;
                guard.finished = true;
                drop(state);
                self.idle.notify_all();
                return;
            };

            let targets: Vec<(Arc<AtomicBool>, Observer)> = state
                .registrations
                .iter()
                .filter(|reg| match delivery.target {
                    Some(id) => reg.id == id,
                    None => reg.since < delivery.seq,
                })
                .map(|reg| (Arc::clone(&reg.active), Arc::clone(&reg.observer)))
                .collect();
            drop(state);

            for (active, observer) in targets {
                if active.load(Ordering::Acquire) {
                    observer(&delivery.snapshot);
                }
            }

            state = self.lock();
        }
    }
}

/// Releases the drainer slot if an observer panics mid-round. Only the
/// delivery in progress is lost; whatever is still queued goes out with the
/// next drain (a waiting thread picks it up immediately).
struct DrainGuard<'a> {
    shared: &'a Shared,
    finished: bool,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.shared.lock().drainer = None;
            self.shared.idle.notify_all();
        }
    }
}

/// Handle to the chat history. Clones share the same underlying stream.
#[derive(Clone)]
pub struct MessageStream {
    shared: Arc<Shared>,
}

impl MessageStream {
    /// A fresh history holding only the assistant greeting.
    pub fn new() -> Self {
        Self::from_turns(vec![ChatTurn::assistant(GREETING)])
    }

    pub fn from_turns(turns: Vec<ChatTurn>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(StreamState {
                    snapshot: turns.into(),
                    seq: 0,
                    next_id: 0,
                    registrations: Vec::new(),
                    pending: VecDeque::new(),
                    drainer: None,
                }),
                idle: Condvar::new(),
            }),
        }
    }

    pub fn current_value(&self) -> Snapshot {
        Arc::clone(&self.shared.lock().snapshot)
    }

    /// Replace the held snapshot and notify every subscriber with it.
    pub fn publish(&self, next: impl Into<Snapshot>) {
        let next = next.into();
        let mut state = self.shared.lock();
        Self::enqueue(&mut state, next);
        self.shared.drain(state);
    }

    /// Read the whole history, append one turn and publish the result.
    ///
    /// The read and the publish happen under one lock, so concurrent appends
    /// never drop each other's turns.
    pub fn append(&self, turn: ChatTurn) -> Snapshot {
        let mut state = self.shared.lock();
        let mut turns = state.snapshot.to_vec();
        turns.push(turn);
        let next: Snapshot = turns.into();
        Self::enqueue(&mut state, Arc::clone(&next));
        self.shared.drain(state);
        next
    }

    fn enqueue(state: &mut StreamState, next: Snapshot) {
        state.seq += 1;
        debug!(
            seq = state.seq,
            turns = next.len(),
            subscribers = state.registrations.len(),
            "publishing snapshot"
        );
        state.snapshot = Arc::clone(&next);
        state.pending.push_back(Delivery {
            seq: state.seq,
            snapshot: next,
            target: None,
        });
    }

    /// Register `observer`. It is called right away with the current
    /// snapshot, then once per publish until unsubscribed.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        let mut state = self.shared.lock();
        let id = state.next_id;
        state.next_id += 1;
        let active = Arc::new(AtomicBool::new(true));
        let since = state.seq;
        state.registrations.push(Registration {
            id,
            since,
            active: Arc::clone(&active),
            observer: Arc::new(observer),
        });
        let replay = Arc::clone(&state.snapshot);
        state.pending.push_back(Delivery {
            seq: since,
            snapshot: replay,
            target: Some(id),
        });
        self.shared.drain(state);

        Subscription {
            id,
            active,
            stream: Arc::downgrade(&self.shared),
        }
    }

    /// Subscribe through an unbounded channel instead of a callback.
    ///
    /// Sends after the receiver is dropped are ignored; call
    /// [`Subscription::unsubscribe`] to stop delivery altogether.
    pub fn subscribe_channel(&self) -> (Subscription, mpsc::UnboundedReceiver<Snapshot>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(move |snapshot| {
            let _ = tx.send(Arc::clone(snapshot));
        });
        (subscription, rx)
    }

    pub fn unsubscribe(&self, subscription: &Subscription) {
        subscription.unsubscribe();
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.lock().registrations.len()
    }
}

impl Default for MessageStream {
    fn default() -> Self {
        Self::new()
    }
}

/// A live registration against a [`MessageStream`].
///
/// Dropping the handle does not unsubscribe; call [`Subscription::unsubscribe`].
pub struct Subscription {
    id: u64,
    active: Arc<AtomicBool>,
    stream: Weak<Shared>,
}

impl Subscription {
    /// Stop delivery. Idempotent, and safe to call from inside the
    /// observer's own callback.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(shared) = self.stream.upgrade() {
            shared.remove(self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Origin;
    use std::sync::Mutex as StdMutex;

    fn recorder() -> (Arc<StdMutex<Vec<Vec<String>>>>, impl Fn(&Snapshot) + Send + Sync) {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let observer = move |snapshot: &Snapshot| {
            let texts: Vec<String> = snapshot.iter().map(|t| t.text().to_string()).collect();
            sink.lock().unwrap().push(texts);
        };
        (seen, observer)
    }

    fn texts(snapshot: &Snapshot) -> Vec<&str> {
        snapshot.iter().map(ChatTurn::text).collect()
    }

    #[test]
    fn fresh_stream_holds_only_the_greeting() {
        let stream = MessageStream::new();
        let snapshot = stream.current_value();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].origin(), Origin::Assistant);
        assert_eq!(snapshot[0].text(), GREETING);
    }

    #[test]
    fn subscribe_replays_current_snapshot_immediately() {
        let stream = MessageStream::from_turns(vec![ChatTurn::user("a")]);
        let (seen, observer) = recorder();
        let _sub = stream.subscribe(observer);
        assert_eq!(*seen.lock().unwrap(), vec![vec!["a".to_string()]]);
    }

    #[test]
    fn every_subscriber_sees_each_publish_once_in_order() {
        let stream = MessageStream::from_turns(Vec::new());
        let (first, first_observer) = recorder();
        let (second, second_observer) = recorder();
        let _a = stream.subscribe(first_observer);
        let _b = stream.subscribe(second_observer);

        stream.append(ChatTurn::user("one"));
        stream.append(ChatTurn::assistant("two"));

        let expected = vec![
            vec![],
            vec!["one".to_string()],
            vec!["one".to_string(), "two".to_string()],
        ];
        assert_eq!(*first.lock().unwrap(), expected);
        assert_eq!(*second.lock().unwrap(), expected);
    }

    #[test]
    fn late_subscriber_starts_from_latest_snapshot() {
        let stream = MessageStream::new();
        stream.append(ChatTurn::user("hi"));
        let (seen, observer) = recorder();
        let _sub = stream.subscribe(observer);
        stream.append(ChatTurn::assistant("hello"));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], vec![GREETING.to_string(), "hi".to_string()]);
        assert_eq!(seen[1].last().map(String::as_str), Some("hello"));
    }

    #[test]
    fn unsubscribe_stops_delivery_and_is_idempotent() {
        let stream = MessageStream::new();
        let (seen, observer) = recorder();
        let sub = stream.subscribe(observer);
        sub.unsubscribe();
        sub.unsubscribe();
        stream.unsubscribe(&sub);
        stream.append(ChatTurn::user("ignored"));

        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(stream.subscriber_count(), 0);
        assert!(!sub.is_active());
    }

    #[test]
    fn unsubscribe_from_inside_own_callback() {
        let stream = MessageStream::from_turns(Vec::new());
        let calls = Arc::new(StdMutex::new(0usize));
        let slot: Arc<StdMutex<Option<Subscription>>> = Arc::new(StdMutex::new(None));

        let calls_in = Arc::clone(&calls);
        let slot_in = Arc::clone(&slot);
        let sub = stream.subscribe(move |snapshot| {
            *calls_in.lock().unwrap() += 1;
            if !snapshot.is_empty() {
                if let Some(sub) = slot_in.lock().unwrap().as_ref() {
                    sub.unsubscribe();
                }
            }
        });
        *slot.lock().unwrap() = Some(sub);

        stream.append(ChatTurn::user("first"));
        stream.append(ChatTurn::user("second"));

        // replay + "first"; nothing after unsubscribing
        assert_eq!(*calls.lock().unwrap(), 2);
        assert_eq!(stream.subscriber_count(), 0);
    }

    #[test]
    fn observer_unsubscribed_mid_round_by_earlier_observer_is_skipped() {
        let stream = MessageStream::from_turns(Vec::new());
        let victim_slot: Arc<StdMutex<Option<Subscription>>> = Arc::new(StdMutex::new(None));

        let slot_in = Arc::clone(&victim_slot);
        let _killer = stream.subscribe(move |snapshot| {
            if !snapshot.is_empty() {
                if let Some(sub) = slot_in.lock().unwrap().as_ref() {
                    sub.unsubscribe();
                }
            }
        });
        let (seen, observer) = recorder();
        *victim_slot.lock().unwrap() = Some(stream.subscribe(observer));

        stream.append(ChatTurn::user("x"));

        assert_eq!(*seen.lock().unwrap(), vec![Vec::<String>::new()]);
    }

    #[test]
    fn publish_from_inside_callback_keeps_order_for_everyone() {
        let stream = MessageStream::from_turns(Vec::new());
        let echo_stream = stream.clone();
        let _echo = stream.subscribe(move |snapshot| {
            if snapshot.last().is_some_and(ChatTurn::is_user) {
                echo_stream.append(ChatTurn::assistant("echo"));
            }
        });
        let (seen, observer) = recorder();
        let _watcher = stream.subscribe(observer);

        stream.append(ChatTurn::user("ping"));

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                vec![],
                vec!["ping".to_string()],
                vec!["ping".to_string(), "echo".to_string()],
            ]
        );
        assert_eq!(texts(&stream.current_value()), vec!["ping", "echo"]);
    }

    #[test]
    fn subscribe_from_inside_callback_gets_replay_then_newer_only() {
        let stream = MessageStream::from_turns(Vec::new());
        let (seen, observer) = recorder();
        let observer = Arc::new(observer);
        let inner_stream = stream.clone();
        let holder: Arc<StdMutex<Vec<Subscription>>> = Arc::new(StdMutex::new(Vec::new()));
        let holder_in = Arc::clone(&holder);

        let _outer = stream.subscribe(move |snapshot| {
            if snapshot.len() == 1 && holder_in.lock().unwrap().is_empty() {
                let observer = Arc::clone(&observer);
                let sub = inner_stream.subscribe(move |s| observer(s));
                holder_in.lock().unwrap().push(sub);
            }
        });

        stream.append(ChatTurn::user("a"));
        stream.append(ChatTurn::user("b"));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                vec!["a".to_string()],
                vec!["a".to_string(), "b".to_string()],
            ]
        );
    }

    #[test]
    fn publish_replaces_whole_snapshot() {
        let stream = MessageStream::new();
        stream.publish(vec![ChatTurn::user("only")]);
        assert_eq!(texts(&stream.current_value()), vec!["only"]);
    }

    #[test]
    fn concurrent_appends_never_lose_turns() {
        let stream = MessageStream::from_turns(Vec::new());
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let stream = stream.clone();
                std::thread::spawn(move || {
                    for n in 0..25 {
                        stream.append(ChatTurn::user(format!("{worker}-{n}")));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("worker thread");
        }
        assert_eq!(stream.current_value().len(), 200);
    }

    #[test]
    fn append_from_another_thread_returns_after_delivery() {
        let stream = MessageStream::from_turns(Vec::new());
        let (entered_tx, entered_rx) = std::sync::mpsc::channel::<()>();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let release_rx = StdMutex::new(release_rx);
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = stream.subscribe(move |snapshot| {
            if snapshot.len() == 1 {
                entered_tx.send(()).ok();
                release_rx.lock().unwrap().recv().ok();
            }
            sink.lock().unwrap().push(snapshot.len());
        });

        let first = {
            let stream = stream.clone();
            std::thread::spawn(move || stream.append(ChatTurn::user("a")))
        };
        entered_rx.recv().expect("observer is handling the first append");

        let releaser = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(50));
            release_tx.send(()).ok();
        });
        stream.append(ChatTurn::user("b"));

        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
        first.join().expect("first appender");
        releaser.join().expect("releaser");
    }

    #[test]
    fn panicking_observer_does_not_swallow_queued_replays() {
        let stream = MessageStream::from_turns(Vec::new());
        let late_seen = Arc::new(StdMutex::new(Vec::new()));

        let inner = stream.clone();
        let late_sink = Arc::clone(&late_seen);
        let panicked = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&panicked);
        let _noisy = stream.subscribe(move |snapshot| {
            if snapshot.len() == 1 && !flag.swap(true, Ordering::SeqCst) {
                let sink = Arc::clone(&late_sink);
                let _late = inner.subscribe(move |snapshot| {
                    sink.lock().unwrap().push(snapshot.len());
                });
                panic!("observer failure");
            }
        });

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            stream.append(ChatTurn::user("a"));
        }));
        assert!(outcome.is_err());
        assert!(panicked.load(Ordering::SeqCst));

        stream.append(ChatTurn::user("b"));
        assert_eq!(*late_seen.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn channel_subscription_receives_snapshots() {
        let stream = MessageStream::new();
        let (sub, mut rx) = stream.subscribe_channel();
        stream.append(ChatTurn::user("hi"));

        let replay = rx.recv().await.expect("replay");
        assert_eq!(replay.len(), 1);
        let next = rx.recv().await.expect("update");
        assert_eq!(texts(&next), vec![GREETING, "hi"]);

        sub.unsubscribe();
        stream.append(ChatTurn::assistant("late"));
        assert!(rx.try_recv().is_err());
    }
}
