use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serial_test::serial;

use aas_mirror_core::scheduler::{PollTask, Scheduler};

#[derive(Default)]
struct Counters {
    runs: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    shutdowns: AtomicUsize,
}

struct CountingTask {
    id: String,
    delay: Duration,
    counters: Arc<Counters>,
}

impl CountingTask {
    fn new(id: &str, delay: Duration, counters: Arc<Counters>) -> Box<Self> {
        Box::new(Self {
            id: id.to_string(),
            delay,
            counters,
        })
    }
}

#[async_trait]
impl PollTask for CountingTask {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&mut self) {
        let now = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.counters.runs.fetch_add(1, Ordering::SeqCst);
    }

    async fn shutdown(&mut self) {
        self.counters.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

struct PanickingTask {
    id: String,
    attempts: Arc<AtomicUsize>,
}

#[async_trait]
impl PollTask for PanickingTask {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&mut self) {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        panic!("this source misbehaves every cycle");
    }

    async fn shutdown(&mut self) {}
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn slow_task_never_piles_up_and_never_blocks_the_fast_one() {
    let fast = Arc::new(Counters::default());
    let slow = Arc::new(Counters::default());

    let scheduler = Scheduler::new(|| Duration::from_millis(20));
    scheduler.register(CountingTask::new(
        "fast",
        Duration::from_millis(1),
        Arc::clone(&fast),
    ));
    scheduler.register(CountingTask::new(
        "slow",
        Duration::from_millis(150),
        Arc::clone(&slow),
    ));

    let handle = scheduler.start();
    tokio::time::sleep(Duration::from_millis(600)).await;
    scheduler.stop();
    handle.await.expect("tick loop must not panic");

    let fast_runs = fast.runs.load(Ordering::SeqCst);
    let slow_runs = slow.runs.load(Ordering::SeqCst);

    // The fast task keeps its own cadence while the slow one is in flight.
    assert!(fast_runs >= 10, "fast task ran only {fast_runs} times");
    assert!(
        slow_runs <= fast_runs / 2,
        "slow task ran {slow_runs} times vs fast's {fast_runs}"
    );
    // Requeue-on-completion bounds in-flight work per source to one.
    assert_eq!(slow.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(fast.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn deregistering_a_mid_run_task_discards_it_after_completion() {
    let counters = Arc::new(Counters::default());

    let scheduler = Scheduler::new(|| Duration::from_millis(20));
    scheduler.register(CountingTask::new(
        "doomed",
        Duration::from_millis(150),
        Arc::clone(&counters),
    ));

    let handle = scheduler.start();
    tokio::time::sleep(Duration::from_millis(50)).await;
    // The task is mid-run now; deregistration must not interrupt it.
    scheduler.deregister("doomed");
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(counters.runs.load(Ordering::SeqCst), 1, "the in-flight run finishes, no more follow");
    assert_eq!(counters.shutdowns.load(Ordering::SeqCst), 1, "shutdown hook runs exactly once");

    scheduler.stop();
    handle.await.expect("scheduler must survive deregistration");
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn deregistering_a_queued_task_filters_it_at_the_next_drain() {
    let counters = Arc::new(Counters::default());

    let scheduler = Scheduler::new(|| Duration::from_millis(20));
    scheduler.register(CountingTask::new(
        "never-runs",
        Duration::from_millis(1),
        Arc::clone(&counters),
    ));
    scheduler.deregister("never-runs");

    let handle = scheduler.start();
    tokio::time::sleep(Duration::from_millis(100)).await;
    scheduler.stop();
    handle.await.expect("tick loop must not panic");

    assert_eq!(counters.runs.load(Ordering::SeqCst), 0);
    assert_eq!(counters.shutdowns.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn stop_lets_the_in_flight_batch_finish() {
    let counters = Arc::new(Counters::default());

    let scheduler = Scheduler::new(|| Duration::from_millis(20));
    scheduler.register(CountingTask::new(
        "laggard",
        Duration::from_millis(100),
        Arc::clone(&counters),
    ));

    let handle = scheduler.start();
    tokio::time::sleep(Duration::from_millis(30)).await;
    scheduler.stop();
    assert!(scheduler.is_stopped());
    handle.await.expect("tick loop must not panic");

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        counters.runs.load(Ordering::SeqCst),
        1,
        "the run that was in flight at stop() completes"
    );
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn interval_is_read_freshly_on_every_tick() {
    let interval_ms = Arc::new(AtomicU64::new(20));
    let counters = Arc::new(Counters::default());

    let provider = Arc::clone(&interval_ms);
    let scheduler = Scheduler::new(move || Duration::from_millis(provider.load(Ordering::SeqCst)));
    scheduler.register(CountingTask::new(
        "steady",
        Duration::from_millis(1),
        Arc::clone(&counters),
    ));

    let handle = scheduler.start();
    tokio::time::sleep(Duration::from_millis(150)).await;
    let runs_before = counters.runs.load(Ordering::SeqCst);
    assert!(runs_before >= 3, "expected several runs at the short interval");

    // Slow the clock way down without restarting anything.
    interval_ms.store(5_000, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(100)).await;
    let settled = counters.runs.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(250)).await;
    let after = counters.runs.load(Ordering::SeqCst);
    assert!(
        after <= settled + 1,
        "interval change must take effect at the next tick ({settled} -> {after})"
    );

    scheduler.stop();
    handle.await.expect("tick loop must not panic");
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn a_panicking_task_is_caught_and_requeued() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let survivor = Arc::new(Counters::default());

    let scheduler = Scheduler::new(|| Duration::from_millis(20));
    scheduler.register(Box::new(PanickingTask {
        id: "broken".to_string(),
        attempts: Arc::clone(&attempts),
    }));
    scheduler.register(CountingTask::new(
        "healthy",
        Duration::from_millis(1),
        Arc::clone(&survivor),
    ));

    let handle = scheduler.start();
    tokio::time::sleep(Duration::from_millis(200)).await;
    scheduler.stop();
    handle.await.expect("the scheduler outlives panicking tasks");

    // The broken source got another chance every cycle, the healthy one was
    // never disturbed.
    assert!(attempts.load(Ordering::SeqCst) >= 2);
    assert!(survivor.runs.load(Ordering::SeqCst) >= 2);
}
