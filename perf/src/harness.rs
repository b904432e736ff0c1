//! Throughput harness driving the queues through their push/pop contract.
//!
//! Every timed run starts from a freshly built queue (`setup`), so no state
//! leaks between runs. Two shapes are measured:
//!
//! - **single thread**: one thread alternates `try_push` / `try_pop`, which
//!   isolates the per-operation cost of each variant.
//! - **producer/consumer**: two threads spin on a shared start flag, then one
//!   pushes `iterations` values while the other pops them. The run is only
//!   accepted if both sides counted exactly `iterations` operations.

use crossbeam_utils::Backoff;
use std::hint::black_box;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Instant;
use tachyon_config::{QueueVariant, RunMode};
use tachyon_ring::{BlockingQueue, BoundedQueue, FixedRing, QueueError, SpscQueue};
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("produced {produced} / consumed {consumed}, expected {expected} each")]
    CountMismatch {
        produced: usize,
        consumed: usize,
        expected: usize,
    },

    #[error("queue reported {0} where the single-thread run cannot hit it")]
    Stalled(&'static str),

    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),

    #[error("a run needs at least one iteration")]
    NoIterations,
}

/// Timing of one run.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct RunResult {
    pub seconds: f64,
    pub ops_per_sec: f64,
    pub ns_per_op: f64,
}

impl RunResult {
    /// Rates are zero when `ops == 0`; a sub-nanosecond run counts as 1 ns.
    fn from_elapsed(nanos: u128, ops: usize) -> Self {
        let nanos = nanos.max(1);
        let seconds = nanos as f64 / 1e9;
        if ops == 0 {
            return Self {
                seconds,
                ops_per_sec: 0.0,
                ns_per_op: 0.0,
            };
        }
        Self {
            seconds,
            ops_per_sec: ops as f64 / seconds,
            ns_per_op: nanos as f64 / ops as f64,
        }
    }
}

/// Builds the subject with `setup`, then times `run` over it.
///
/// `ops` is the number of queue operations `run` performs (a push/pop pair
/// counts as two).
pub fn run_once<Q, E, S, R>(setup: S, run: R, ops: usize) -> Result<RunResult, E>
where
    S: FnOnce() -> Result<Q, E>,
    R: FnOnce(Q) -> Result<(), E>,
{
    let subject = setup()?;
    let start = Instant::now();
    run(subject)?;
    let nanos = start.elapsed().as_nanos();
    Ok(RunResult::from_elapsed(nanos, ops))
}

/// Alternates push and pop on one thread, `iterations` times.
pub fn run_single_thread<Q: BoundedQueue<u64>>(
    capacity: usize,
    iterations: usize,
) -> Result<RunResult, HarnessError> {
    require_iterations(iterations)?;
    run_once(
        || Q::with_capacity(capacity).map_err(HarnessError::from),
        |mut q| {
            for i in 0..iterations as u64 {
                q.try_push(i).map_err(|_| HarnessError::Stalled("full"))?;
                let v = q.try_pop().ok_or(HarnessError::Stalled("empty"))?;
                black_box(v);
            }
            Ok(())
        },
        iterations * 2,
    )
}

/// One producer and one consumer thread over a split [`SpscQueue`].
pub fn run_spsc(capacity: usize, iterations: usize) -> Result<RunResult, HarnessError> {
    require_iterations(iterations)?;
    run_once(
        || SpscQueue::<u64>::with_capacity(capacity).map_err(HarnessError::from),
        |q| {
            let (mut tx, mut rx) = q.split();
            let start_flag = AtomicBool::new(false);
            let produced = AtomicUsize::new(0);
            let consumed = AtomicUsize::new(0);

            thread::scope(|s| {
                let prod = s.spawn(|| {
                    wait_for_start(&start_flag);
                    for i in 0..iterations as u64 {
                        let backoff = Backoff::new();
                        let mut v = i;
                        while let Err(back) = tx.try_push(v) {
                            v = back;
                            backoff.spin();
                        }
                        produced.fetch_add(1, Ordering::Relaxed);
                    }
                });
                let cons = s.spawn(|| {
                    wait_for_start(&start_flag);
                    for _ in 0..iterations {
                        let backoff = Backoff::new();
                        let v = loop {
                            if let Some(v) = rx.try_pop() {
                                break v;
                            }
                            backoff.spin();
                        };
                        black_box(v);
                        consumed.fetch_add(1, Ordering::Relaxed);
                    }
                });

                start_flag.store(true, Ordering::Release);
                prod.join()
                    .map_err(|_| HarnessError::ThreadPanicked("producer"))?;
                cons.join()
                    .map_err(|_| HarnessError::ThreadPanicked("consumer"))
            })?;

            check_counts(&produced, &consumed, iterations)
        },
        iterations * 2,
    )
}

/// One producer and one consumer thread over a shared [`BlockingQueue`],
/// using the blocking `push` / `pop`.
pub fn run_blocking_pair(capacity: usize, iterations: usize) -> Result<RunResult, HarnessError> {
    require_iterations(iterations)?;
    run_once(
        || BlockingQueue::<u64>::with_capacity(capacity).map_err(HarnessError::from),
        |q| {
            let start_flag = AtomicBool::new(false);
            let produced = AtomicUsize::new(0);
            let consumed = AtomicUsize::new(0);

            thread::scope(|s| {
                let prod = s.spawn(|| {
                    wait_for_start(&start_flag);
                    for i in 0..iterations as u64 {
                        q.push(i);
                        produced.fetch_add(1, Ordering::Relaxed);
                    }
                });
                let cons = s.spawn(|| {
                    wait_for_start(&start_flag);
                    for _ in 0..iterations {
                        black_box(q.pop());
                        consumed.fetch_add(1, Ordering::Relaxed);
                    }
                });

                start_flag.store(true, Ordering::Release);
                prod.join()
                    .map_err(|_| HarnessError::ThreadPanicked("producer"))?;
                cons.join()
                    .map_err(|_| HarnessError::ThreadPanicked("consumer"))
            })?;

            check_counts(&produced, &consumed, iterations)
        },
        iterations * 2,
    )
}

/// Runs `variant` in `mode` once.
///
/// Returns `Ok(None)` for combinations that do not exist: the fixed ring has
/// no cross-thread mode.
pub fn run_variant(
    variant: QueueVariant,
    mode: RunMode,
    capacity: usize,
    iterations: usize,
) -> Result<Option<RunResult>, HarnessError> {
    let result = match (variant, mode) {
        (QueueVariant::Fixed, RunMode::SingleThread) => {
            run_single_thread::<FixedRing<u64>>(capacity, iterations)?
        }
        (QueueVariant::Spsc, RunMode::SingleThread) => {
            run_single_thread::<SpscQueue<u64>>(capacity, iterations)?
        }
        (QueueVariant::Blocking, RunMode::SingleThread) => {
            run_single_thread::<BlockingQueue<u64>>(capacity, iterations)?
        }
        (QueueVariant::Spsc, RunMode::Spsc) => run_spsc(capacity, iterations)?,
        (QueueVariant::Blocking, RunMode::Spsc) => run_blocking_pair(capacity, iterations)?,
        (QueueVariant::Fixed, RunMode::Spsc) => {
            warn!("fixed ring is single-threaded; skipping cross-thread run");
            return Ok(None);
        }
    };
    debug!(
        ?variant,
        ?mode,
        seconds = result.seconds,
        ns_per_op = result.ns_per_op,
        "run complete"
    );
    Ok(Some(result))
}

pub fn variant_name(variant: QueueVariant) -> &'static str {
    match variant {
        QueueVariant::Fixed => "FixedRing<u64>",
        QueueVariant::Spsc => "SpscQueue<u64>",
        QueueVariant::Blocking => "BlockingQueue<u64>",
    }
}

pub fn mode_name(mode: RunMode) -> &'static str {
    match mode {
        RunMode::SingleThread => "SingleThread",
        RunMode::Spsc => "SPSC",
    }
}

fn require_iterations(iterations: usize) -> Result<(), HarnessError> {
    if iterations == 0 {
        return Err(HarnessError::NoIterations);
    }
    Ok(())
}

#[inline]
fn wait_for_start(flag: &AtomicBool) {
    while !flag.load(Ordering::Acquire) {
        std::hint::spin_loop();
    }
}

fn check_counts(
    produced: &AtomicUsize,
    consumed: &AtomicUsize,
    expected: usize,
) -> Result<(), HarnessError> {
    let produced = produced.load(Ordering::Relaxed);
    let consumed = consumed.load(Ordering::Relaxed);
    if produced != expected || consumed != expected {
        return Err(HarnessError::CountMismatch {
            produced,
            consumed,
            expected,
        });
    }
    Ok(())
}
