use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::{Duration, Instant};

use crate::Sample;
use crate::error::{Result, ScopeError};

/// What a bounded queue does with a push once it is full.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// The producer waits until the consumer frees a slot or the queue closes.
    Block,
    /// The oldest queued sample is discarded to make room.
    DropOldest,
    /// The incoming sample is discarded.
    DropNewest,
}

impl OverflowPolicy {
    pub const ALL: [OverflowPolicy; 3] = [
        OverflowPolicy::Block,
        OverflowPolicy::DropOldest,
        OverflowPolicy::DropNewest,
    ];

    pub fn as_key(self) -> &'static str {
        match self {
            OverflowPolicy::Block => "block",
            OverflowPolicy::DropOldest => "drop_oldest",
            OverflowPolicy::DropNewest => "drop_newest",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key.to_ascii_lowercase().as_str() {
            "block" => Some(OverflowPolicy::Block),
            "drop_oldest" | "oldest" => Some(OverflowPolicy::DropOldest),
            "drop_newest" | "newest" => Some(OverflowPolicy::DropNewest),
            _ => None,
        }
    }
}

/// Result of a single [`SampleQueue::push`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    Accepted,
    /// Stored, after evicting the head of a full queue.
    DroppedOldest,
    /// Not stored: the queue was full under [`OverflowPolicy::DropNewest`].
    Rejected,
    /// Not stored: the queue has been closed.
    Closed,
}

impl PushOutcome {
    pub fn is_stored(self) -> bool {
        matches!(self, PushOutcome::Accepted | PushOutcome::DroppedOldest)
    }
}

#[derive(Clone, Copy, Debug)]
struct Bound {
    capacity: usize,
    policy: OverflowPolicy,
}

struct State {
    samples: VecDeque<Sample>,
    closed: bool,
}

/// FIFO hand-off between the generator thread and the render loop.
///
/// Built for exactly one producer and one consumer. Pushes wake one waiting
/// consumer; [`try_pop`](Self::try_pop) never blocks, not even on lock
/// contention, so the render thread can call it from a frame callback.
pub struct SampleQueue {
    state: Mutex<State>,
    not_empty: Condvar,
    not_full: Condvar,
    bound: Option<Bound>,
    dropped: AtomicU64,
}

impl SampleQueue {
    /// `capacity == None` gives an unbounded queue and the policy is ignored.
    pub fn new(capacity: Option<usize>, policy: OverflowPolicy) -> Result<Self> {
        let bound = match capacity {
            Some(0) => {
                return Err(ScopeError::InvalidConfig(
                    "queue capacity must be at least 1".to_string(),
                ));
            }
            Some(capacity) => Some(Bound { capacity, policy }),
            None => None,
        };
        Ok(Self {
            state: Mutex::new(State {
                samples: VecDeque::with_capacity(capacity.unwrap_or(0)),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            bound,
            dropped: AtomicU64::new(0),
        })
    }

    pub fn unbounded() -> Self {
        Self {
            state: Mutex::new(State {
                samples: VecDeque::new(),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            bound: None,
            dropped: AtomicU64::new(0),
        }
    }

    pub fn bounded(capacity: usize, policy: OverflowPolicy) -> Result<Self> {
        Self::new(Some(capacity), policy)
    }

    pub fn capacity(&self) -> Option<usize> {
        self.bound.map(|b| b.capacity)
    }

    pub fn policy(&self) -> Option<OverflowPolicy> {
        self.bound.map(|b| b.policy)
    }

    // A VecDeque of floats stays valid even if a holder panicked.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_lock(&self) -> Option<MutexGuard<'_, State>> {
        match self.state.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    pub fn push(&self, sample: Sample) -> PushOutcome {
        let mut state = self.lock();
        if state.closed {
            return PushOutcome::Closed;
        }

        let mut outcome = PushOutcome::Accepted;
        if let Some(bound) = self.bound {
            if state.samples.len() >= bound.capacity {
                match bound.policy {
                    OverflowPolicy::DropOldest => {
                        state.samples.pop_front();
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        outcome = PushOutcome::DroppedOldest;
                    }
                    OverflowPolicy::DropNewest => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        return PushOutcome::Rejected;
                    }
                    OverflowPolicy::Block => {
                        state = self
                            .not_full
                            .wait_while(state, |s| {
                                !s.closed && s.samples.len() >= bound.capacity
                            })
                            .unwrap_or_else(PoisonError::into_inner);
                        if state.closed {
                            return PushOutcome::Closed;
                        }
                    }
                }
            }
        }

        state.samples.push_back(sample);
        drop(state);
        self.not_empty.notify_one();
        outcome
    }

    /// Removes the head without blocking.
    ///
    /// Returns `None` when the queue is empty and also when the lock is held
    /// elsewhere at this instant; callers treat both as "nothing available
    /// right now".
    pub fn try_pop(&self) -> Option<Sample> {
        let mut state = self.try_lock()?;
        let sample = state.samples.pop_front();
        drop(state);
        if sample.is_some() {
            self.not_full.notify_one();
        }
        sample
    }

    /// Blocks until a sample is available.
    pub fn wait_and_pop(&self) -> Sample {
        let mut state = self.lock();
        loop {
            if let Some(sample) = state.samples.pop_front() {
                drop(state);
                self.not_full.notify_one();
                return sample;
            }
            state = self
                .not_empty
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub fn wait_and_pop_timeout(&self, timeout: Duration) -> Option<Sample> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if let Some(sample) = state.samples.pop_front() {
                drop(state);
                self.not_full.notify_one();
                return Some(sample);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            state = self
                .not_empty
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Runs `func` on the queued samples if the lock is free right now.
    ///
    /// Returns `None` without calling `func` when the lock is contended.
    pub fn try_with<R>(&self, func: impl FnOnce(&mut VecDeque<Sample>) -> R) -> Option<R> {
        let mut state = self.try_lock()?;
        let result = func(&mut state.samples);
        drop(state);
        self.not_empty.notify_one();
        self.not_full.notify_one();
        Some(result)
    }

    /// Snapshot of the backlog; may be stale by the time it is read.
    pub fn len(&self) -> usize {
        self.lock().samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().samples.is_empty()
    }

    /// Samples discarded by the overflow policy since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stops accepting pushes and releases a producer blocked on a full queue.
    /// Samples already queued can still be popped.
    ///
    /// Only producers are affected. A consumer in `wait_and_pop` keeps
    /// waiting until a sample arrives after `reopen`.
    pub fn close(&self) {
        self.lock().closed = true;
        self.not_full.notify_all();
    }

    pub fn reopen(&self) {
        self.lock().closed = false;
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

impl Default for SampleQueue {
    fn default() -> Self {
        Self::unbounded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn pops_in_push_order_then_reports_empty() {
        let queue = SampleQueue::unbounded();
        let input: Vec<f32> = (0..100).map(|v| v as f32 * 0.01).collect();
        for &v in &input {
            assert_eq!(queue.push(v), PushOutcome::Accepted);
        }
        assert_eq!(queue.len(), 100);

        let mut output = Vec::new();
        while let Some(v) = queue.try_pop() {
            output.push(v);
        }
        assert_eq!(output, input);
        assert!(queue.is_empty());
        assert_eq!(queue.try_pop(), None);
    }

    #[test]
    fn drop_oldest_keeps_the_newest_samples() {
        let queue = SampleQueue::bounded(3, OverflowPolicy::DropOldest).unwrap();
        for v in 0..5 {
            queue.push(v as f32);
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dropped(), 2);
        assert_eq!(queue.try_pop(), Some(2.0));
        assert_eq!(queue.try_pop(), Some(3.0));
        assert_eq!(queue.try_pop(), Some(4.0));
    }

    #[test]
    fn drop_newest_rejects_when_full() {
        let queue = SampleQueue::bounded(2, OverflowPolicy::DropNewest).unwrap();
        assert_eq!(queue.push(1.0), PushOutcome::Accepted);
        assert_eq!(queue.push(2.0), PushOutcome::Accepted);
        assert_eq!(queue.push(3.0), PushOutcome::Rejected);
        assert_eq!(queue.dropped(), 1);
        assert_eq!(queue.try_pop(), Some(1.0));
        assert_eq!(queue.try_pop(), Some(2.0));
        assert_eq!(queue.try_pop(), None);
    }

    #[test]
    fn blocking_push_waits_for_the_consumer() {
        let queue = Arc::new(SampleQueue::bounded(4, OverflowPolicy::Block).unwrap());
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for v in 0..64 {
                    assert!(queue.push(v as f32).is_stored());
                }
            })
        };

        let mut received = Vec::new();
        while received.len() < 64 {
            if let Some(v) = queue.wait_and_pop_timeout(Duration::from_secs(5)) {
                received.push(v);
            } else {
                panic!("producer stalled after {} samples", received.len());
            }
        }
        producer.join().unwrap();

        let expected: Vec<f32> = (0..64).map(|v| v as f32).collect();
        assert_eq!(received, expected);
        assert_eq!(queue.dropped(), 0);
    }

    #[test]
    fn close_releases_a_blocked_producer() {
        let queue = Arc::new(SampleQueue::bounded(1, OverflowPolicy::Block).unwrap());
        queue.push(1.0);
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.push(2.0))
        };
        thread::sleep(Duration::from_millis(20));
        queue.close();
        assert_eq!(producer.join().unwrap(), PushOutcome::Closed);

        // already queued data survives the close
        assert_eq!(queue.try_pop(), Some(1.0));
        assert_eq!(queue.push(3.0), PushOutcome::Closed);

        queue.reopen();
        assert_eq!(queue.push(3.0), PushOutcome::Accepted);
    }

    #[test]
    fn wait_and_pop_wakes_on_push() {
        let queue = Arc::new(SampleQueue::unbounded());
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.wait_and_pop())
        };
        thread::sleep(Duration::from_millis(20));
        queue.push(0.25);
        assert_eq!(consumer.join().unwrap(), 0.25);
    }

    #[test]
    fn close_leaves_a_waiting_consumer_waiting() {
        let queue = Arc::new(SampleQueue::unbounded());
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.wait_and_pop())
        };
        thread::sleep(Duration::from_millis(20));
        queue.close();
        thread::sleep(Duration::from_millis(20));
        assert!(!consumer.is_finished());

        queue.reopen();
        assert_eq!(queue.push(0.5), PushOutcome::Accepted);
        assert_eq!(consumer.join().unwrap(), 0.5);
    }

    #[test]
    fn wait_and_pop_timeout_gives_up_on_an_empty_queue() {
        let queue = SampleQueue::unbounded();
        assert_eq!(queue.wait_and_pop_timeout(Duration::from_millis(10)), None);
    }

    #[test]
    fn try_with_is_not_applied_while_locked() {
        let queue = SampleQueue::unbounded();
        queue.push(1.0);

        let nested = queue.try_with(|_| queue.try_pop());
        assert_eq!(nested, Some(None));

        let nested = queue.try_with(|_| queue.try_with(|samples| samples.len()));
        assert_eq!(nested, Some(None));

        assert_eq!(queue.try_with(|samples| samples.len()), Some(1));
    }

    #[test]
    fn zero_capacity_is_invalid() {
        assert!(matches!(
            SampleQueue::bounded(0, OverflowPolicy::DropOldest),
            Err(ScopeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn policy_keys_parse_back() {
        for policy in OverflowPolicy::ALL {
            assert_eq!(OverflowPolicy::from_key(policy.as_key()), Some(policy));
        }
        assert_eq!(OverflowPolicy::from_key("spill"), None);
    }
}
