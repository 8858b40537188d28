//! Host simulation: idle loops and worker threads feeding a task watchdog
//! driven by a real timer.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Serialize;
use twdt::{HostPlatform, Platform, TaskWatchdog, TwdtMetrics, WdtConfig};
use twdt_timer::ThreadTimerBackend;

use crate::error::CliError;

/// Idle loop tick interval.
const IDLE_INTERVAL: Duration = Duration::from_millis(1);

/// What to simulate.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub config: WdtConfig,
    pub cores: u32,
    pub workers: usize,
    pub feed_interval: Duration,
    pub duration: Duration,
    /// Worker that stops feeding, and when.
    pub stall: Option<Stall>,
}

#[derive(Debug, Clone, Copy)]
pub struct Stall {
    pub worker: usize,
    pub after: Duration,
}

/// Result printed at the end of a run.
#[derive(Debug, Serialize)]
pub struct Summary {
    pub config: WdtConfig,
    pub cores: u32,
    pub workers: usize,
    pub elapsed_ms: u64,
    pub aborted: bool,
    pub metrics: TwdtMetrics,
}

pub fn run(scenario: &Scenario) -> Result<Summary, CliError> {
    let aborts = Arc::new(AtomicUsize::new(0));
    let platform = Arc::new(HostPlatform::with_cores(scenario.cores).with_abort_handler({
        let aborts = Arc::clone(&aborts);
        Arc::new(move |reason: &str| {
            tracing::error!(reason, "Watchdog requested abort");
            aborts.fetch_add(1, Ordering::SeqCst);
        })
    }));
    let watchdog = Arc::new(TaskWatchdog::new(
        Arc::clone(&platform) as Arc<dyn Platform>,
        Arc::new(ThreadTimerBackend::with_thread_name("twdt-timer")),
    ));
    watchdog.init(scenario.config)?;

    let idle_loops = scenario
        .config
        .idle_cores()
        .iter()
        .map(|core| platform.spawn_idle_loop(core, IDLE_INTERVAL))
        .collect::<Result<Vec<_>, _>>()?;

    let started = Instant::now();
    let deadline = started + scenario.duration;
    let mut handles = Vec::with_capacity(scenario.workers);
    for index in 0..scenario.workers {
        let watchdog = Arc::clone(&watchdog);
        let aborts = Arc::clone(&aborts);
        let interval = scenario.feed_interval;
        let stall_at = scenario
            .stall
            .filter(|s| s.worker == index)
            .map(|s| started + s.after);

        let handle = thread::Builder::new()
            .name(format!("worker-{index}"))
            .spawn(move || worker(&watchdog, index, interval, deadline, stall_at, &aborts))?;
        handles.push(handle);
    }

    join_workers(handles)?;

    let metrics = watchdog.metrics();
    // Idle subscriptions are released by deinit, so the loops can stop after.
    if watchdog.is_initialized() {
        watchdog.deinit()?;
    }
    drop(idle_loops);

    Ok(Summary {
        config: scenario.config,
        cores: scenario.cores,
        workers: scenario.workers,
        elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        aborted: aborts.load(Ordering::SeqCst) > 0,
        metrics,
    })
}

/// Join every worker, then fail with the first worker error or panic.
fn join_workers(handles: Vec<JoinHandle<Result<(), CliError>>>) -> Result<(), CliError> {
    let mut first_error = None;
    for (index, handle) in handles.into_iter().enumerate() {
        let outcome = match handle.join() {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(worker = index, "Worker thread panicked");
                Err(CliError::WorkerPanicked(index))
            }
        };
        if let Err(err) = outcome {
            if first_error.is_none() {
                first_error = Some(err);
            }
        }
    }
    first_error.map_or(Ok(()), Err)
}

fn worker(
    watchdog: &TaskWatchdog,
    index: usize,
    interval: Duration,
    deadline: Instant,
    stall_at: Option<Instant>,
    aborts: &AtomicUsize,
) -> Result<(), CliError> {
    let subscription = watchdog.subscribe_user(&format!("worker-{index}"))?;
    tracing::info!(worker = index, "Worker started");

    loop {
        let now = Instant::now();
        if now >= deadline || aborts.load(Ordering::SeqCst) > 0 {
            break;
        }
        if stall_at.is_some_and(|at| now >= at) {
            thread::sleep(interval);
            continue;
        }
        subscription.feed()?;
        thread::sleep(interval);
    }

    tracing::info!(worker = index, "Worker finished");
    Ok(())
}
