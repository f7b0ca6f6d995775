//! Native task queue, drained from the event loop between winit events.
//!
//! Nothing here blocks: a task waiting on a [`Delay`] is parked until a later
//! [`drive`] finds its deadline passed, so input events run in between.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

use futures::executor::{LocalPool, LocalSpawner};
use futures::task::LocalSpawnExt;
use tracing::error;

struct Executor {
    pool: RefCell<LocalPool>,
    spawner: LocalSpawner,
}

thread_local! {
    static EXECUTOR: Executor = {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Executor { pool: RefCell::new(pool), spawner }
    };
    static TIMERS: RefCell<Vec<(Instant, Waker)>> = const { RefCell::new(Vec::new()) };
}

pub fn spawn<F>(future: F)
where
    F: Future<Output = ()> + 'static,
{
    EXECUTOR.with(|executor| {
        if let Err(e) = executor.spawner.spawn_local(future) {
            error!("couldn't queue task: {e}");
        }
    });
}

/// Wake every expired timer, then poll queued tasks until none can progress.
pub fn drive() {
    let now = Instant::now();
    let due: Vec<Waker> = TIMERS.with(|timers| {
        let mut timers = timers.borrow_mut();
        let (due, pending): (Vec<_>, Vec<_>) = timers.drain(..).partition(|(at, _)| *at <= now);
        *timers = pending;
        due.into_iter().map(|(_, waker)| waker).collect()
    });
    due.into_iter().for_each(Waker::wake);

    EXECUTOR.with(|executor| executor.pool.borrow_mut().run_until_stalled());
}

/// Resolves once `duration` has passed, as observed by [`drive`].
pub struct Delay {
    deadline: Instant,
}

impl Delay {
    pub fn new(duration: Duration) -> Self {
        Self { deadline: Instant::now() + duration }
    }
}

impl Future for Delay {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if Instant::now() >= self.deadline {
            return Poll::Ready(());
        }
        TIMERS.with(|timers| timers.borrow_mut().push((self.deadline, cx.waker().clone())));
        Poll::Pending
    }
}
