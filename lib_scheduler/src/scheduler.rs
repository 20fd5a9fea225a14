use crate::time::{Time, TimeKey};
use futures::executor::{LocalPool, LocalSpawner};
use futures::task::LocalSpawnExt;
use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

/// One pending wakeup: `waker` belongs to whatever process is suspended in a
/// `Timeout`. Ordered so that the earliest `time` sorts first, with ties
/// broken by `seq` (the order in which the `Timeout` was first polled) to
/// give the FIFO-at-equal-time guarantee the scheduler promises.
struct TimerEntry {
    time: TimeKey,
    seq: u64,
    waker: Waker,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}
impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    // Reversed so that `BinaryHeap` (a max-heap) pops the earliest time / lowest seq first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct Inner {
    pool: RefCell<LocalPool>,
    spawner: LocalSpawner,
    timers: RefCell<BinaryHeap<TimerEntry>>,
    now: Cell<Time>,
    seq: Cell<u64>,
}

/// A single-threaded, cooperative discrete-event scheduler.
///
/// `Scheduler` is a cheap `Clone` (an `Rc` handle) so every peer and the
/// network can hold one without the simulator needing any locking: nothing
/// in this crate is ever touched from more than one OS thread.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<Inner>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Scheduler {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Scheduler {
            inner: Rc::new(Inner {
                pool: RefCell::new(pool),
                spawner,
                timers: RefCell::new(BinaryHeap::new()),
                now: Cell::new(0.0),
                seq: Cell::new(0),
            }),
        }
    }

    /// The current simulated time.
    pub fn now(&self) -> Time {
        self.inner.now.get()
    }

    /// Admits a process into the executor's ready queue. The process begins
    /// running the next time the executor drains (either immediately, if
    /// called from within `run_until`'s driving loop, or at the start of the
    /// next `run_until` call).
    pub fn spawn<F>(&self, process: F)
    where
        F: Future<Output = ()> + 'static,
    {
        self.inner
            .spawner
            .spawn_local(process)
            .expect("scheduler executor is never shut down while a process is spawned");
    }

    /// Returns a future that resolves after `delta` simulated time units
    /// have elapsed. This is the only suspension point a process can await
    /// directly (the other is `spawn`, suspending into a sub-process).
    pub fn timeout(&self, delta: Time) -> Timeout {
        Timeout {
            inner: self.inner.clone(),
            deadline: self.now() + delta,
            registered: false,
        }
    }

    fn next_seq(&self) -> u64 {
        let seq = self.inner.seq.get();
        self.inner.seq.set(seq + 1);
        seq
    }

    fn register_timer(&self, deadline: Time, waker: Waker) {
        let seq = self.next_seq();
        self.inner.timers.borrow_mut().push(TimerEntry {
            time: TimeKey(deadline),
            seq,
            waker,
        });
    }

    /// Drains every process that is immediately ready to run, without
    /// advancing simulated time. Called after admitting new processes and
    /// after firing each timer so their effects (new sends, new spawns, new
    /// timers) are fully settled before the next timer is considered.
    fn drain_ready(&self) {
        self.inner.pool.borrow_mut().run_until_stalled();
    }

    /// Runs the simulation until either the timer queue is empty or the
    /// earliest pending timer is later than `horizon`. `now()` is left at
    /// `horizon` when this returns.
    pub fn run_until(&self, horizon: Time) {
        self.drain_ready();
        loop {
            let next = self.inner.timers.borrow().peek().map(|e| e.time.0);
            match next {
                Some(t) if t <= horizon => {
                    let entry = self
                        .inner
                        .timers
                        .borrow_mut()
                        .pop()
                        .expect("just peeked a non-empty heap");
                    self.inner.now.set(entry.time.0);
                    tracing::trace!(now = entry.time.0, "firing timer");
                    entry.waker.wake();
                    self.drain_ready();
                }
                _ => break,
            }
        }
        if horizon > self.inner.now.get() {
            self.inner.now.set(horizon);
        }
    }
}

/// The future returned by [`Scheduler::timeout`]. Registers its waker with
/// the scheduler's timer heap on first poll and resolves the next time it is
/// polled, which only happens once the scheduler has advanced `now()` past
/// the deadline and called `Waker::wake` on it.
pub struct Timeout {
    inner: Rc<Inner>,
    deadline: Time,
    registered: bool,
}

impl Future for Timeout {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if this.registered {
            return Poll::Ready(());
        }
        this.registered = true;
        let deadline = this.deadline;
        let waker = cx.waker().clone();
        let seq = {
            let seq = this.inner.seq.get();
            this.inner.seq.set(seq + 1);
            seq
        };
        this.inner.timers.borrow_mut().push(TimerEntry {
            time: TimeKey(deadline),
            seq,
            waker,
        });
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell as StdRefCell;

    #[test]
    fn timeout_resumes_at_the_right_time() {
        let sched = Scheduler::new();
        let log = Rc::new(StdRefCell::new(Vec::new()));

        {
            let sched2 = sched.clone();
            let log2 = log.clone();
            sched.spawn(async move {
                sched2.timeout(10.0).await;
                log2.borrow_mut().push(sched2.now());
                sched2.timeout(5.0).await;
                log2.borrow_mut().push(sched2.now());
            });
        }

        sched.run_until(100.0);
        assert_eq!(*log.borrow(), vec![10.0, 15.0]);
        assert_eq!(sched.now(), 100.0);
    }

    #[test]
    fn equal_deadlines_fire_in_fifo_order() {
        let sched = Scheduler::new();
        let log = Rc::new(StdRefCell::new(Vec::new()));

        for i in 0..5 {
            let sched2 = sched.clone();
            let log2 = log.clone();
            sched.spawn(async move {
                sched2.timeout(1.0).await;
                log2.borrow_mut().push(i);
            });
        }

        sched.run_until(1.0);
        assert_eq!(*log.borrow(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn spawn_from_within_a_process_runs_before_the_next_timer() {
        let sched = Scheduler::new();
        let log = Rc::new(StdRefCell::new(Vec::new()));

        let sched2 = sched.clone();
        let log2 = log.clone();
        sched.spawn(async move {
            log2.borrow_mut().push("outer-start");
            let sched3 = sched2.clone();
            let log3 = log2.clone();
            sched2.spawn(async move {
                log3.borrow_mut().push("inner");
                sched3.timeout(1.0).await;
                log3.borrow_mut().push("inner-done");
            });
            log2.borrow_mut().push("outer-end");
        });

        sched.run_until(10.0);
        assert_eq!(
            *log.borrow(),
            vec!["outer-start", "outer-end", "inner", "inner-done"]
        );
    }

    #[test]
    fn run_until_with_no_events_still_advances_now() {
        let sched = Scheduler::new();
        sched.run_until(42.0);
        assert_eq!(sched.now(), 42.0);
    }

    #[test]
    fn timers_past_the_horizon_are_left_pending() {
        let sched = Scheduler::new();
        let log = Rc::new(StdRefCell::new(Vec::new()));

        let sched2 = sched.clone();
        let log2 = log.clone();
        sched.spawn(async move {
            sched2.timeout(1000.0).await;
            log2.borrow_mut().push(sched2.now());
        });

        sched.run_until(10.0);
        assert!(log.borrow().is_empty());
        assert_eq!(sched.now(), 10.0);
    }
}
