//! Bounded thread pool for independent file tasks.
//!
//! At most `max_workers` tasks run at once. Each task gets a wall-clock
//! deadline when it starts; a task past its deadline is abandoned (its thread
//! finishes in the background and its result is discarded) and reported as
//! [`TaskFailure::TimedOut`]. Results are handed out in completion order.
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, PartialEq)]
pub enum TaskFailure {
    #[error("Processing exceeded the timeout of {} seconds", .0.as_secs_f64())]
    TimedOut(Duration),

    #[error("Processing panicked: {0}")]
    Panicked(String),

    #[error("Cannot start worker thread: {0}")]
    SpawnFailed(String),
}

impl TaskFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            TaskFailure::TimedOut(_) => "timeout",
            TaskFailure::Panicked(_) => "panic",
            TaskFailure::SpawnFailed(_) => "io",
        }
    }
}

/// Outcome of one task, tagged with the position of its input.
#[derive(Debug)]
pub struct Completed<T> {
    pub index: usize,
    pub outcome: Result<T, TaskFailure>,
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => payload
            .downcast_ref::<&str>()
            .map(|message| message.to_string())
            .unwrap_or_else(|| "unknown panic payload".to_owned()),
    }
}

/// Runs `task` on every input in the calling thread, in input order.
///
/// Panics are caught and reported; there is no timeout.
pub fn run_sequential<I, T, F>(inputs: Vec<I>, task: F) -> Vec<Completed<T>>
where
    F: Fn(I) -> T,
{
    inputs
        .into_iter()
        .enumerate()
        .map(|(index, input)| Completed {
            index,
            outcome: panic::catch_unwind(AssertUnwindSafe(|| task(input)))
                .map_err(|payload| TaskFailure::Panicked(panic_message(payload))),
        })
        .collect()
}

#[derive(Copy, Clone, Debug)]
pub struct WorkerPool {
    max_workers: usize,
    timeout: Duration,
}

impl WorkerPool {
    /// # Arguments
    ///
    /// * `max_workers` - Upper bound of concurrently running tasks, at least 1
    /// * `timeout` - Wall-clock budget of each task, counted from its start
    pub fn new(max_workers: usize, timeout: Duration) -> Self {
        WorkerPool {
            max_workers: max_workers.max(1),
            timeout,
        }
    }

    /// Runs `task` on every input and collects outcomes as they finish.
    ///
    /// Abandoned tasks do not count against `max_workers` once their
    /// deadline has passed.
    pub fn run<I, T, F>(&self, inputs: Vec<I>, task: F) -> Vec<Completed<T>>
    where
        I: Send + 'static,
        T: Send + 'static,
        F: Fn(I) -> T + Send + Sync + 'static,
    {
        let task = Arc::new(task);
        let (sender, receiver) = mpsc::channel::<(usize, thread::Result<T>)>();
        let mut pending = inputs.into_iter().enumerate();
        let mut running = Vec::<(usize, Instant)>::new();
        let mut completed = Vec::new();

        loop {
            while running.len() < self.max_workers {
                let Some((index, input)) = pending.next() else {
                    break;
                };
                let task = Arc::clone(&task);
                let sender = sender.clone();
                let spawned = thread::Builder::new()
                    .name(format!("sheet-worker-{index}"))
                    .spawn(move || {
                        let outcome = panic::catch_unwind(AssertUnwindSafe(|| task(input)));
                        // The receiver is gone once the pool returned; late results are dropped.
                        let _ = sender.send((index, outcome));
                    });
                match spawned {
                    Ok(_) => running.push((index, Instant::now() + self.timeout)),
                    Err(error) => completed.push(Completed {
                        index,
                        outcome: Err(TaskFailure::SpawnFailed(error.to_string())),
                    }),
                }
            }

            let Some(deadline) = running.iter().map(|(_, deadline)| *deadline).min() else {
                break;
            };
            match receiver.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                Ok((index, outcome)) => match running.iter().position(|(id, _)| *id == index) {
                    Some(position) => {
                        running.swap_remove(position);
                        debug!("Task {index} finished");
                        completed.push(Completed {
                            index,
                            outcome: outcome.map_err(|payload| TaskFailure::Panicked(panic_message(payload))),
                        });
                    }
                    None => debug!("Discarding late result of abandoned task {index}"),
                },
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    let now = Instant::now();
                    running.retain(|(index, deadline)| {
                        if *deadline > now {
                            return true;
                        }
                        warn!("Task {index} exceeded {:?}, abandoning it", self.timeout);
                        completed.push(Completed {
                            index: *index,
                            outcome: Err(TaskFailure::TimedOut(self.timeout)),
                        });
                        false
                    });
                }
            }
        }
        completed
    }
}

#[cfg(test)]
mod tests {
    use crate::pipeline::pool::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn every_input_gets_one_outcome() {
        let pool = WorkerPool::new(3, Duration::from_secs(5));
        let mut completed = pool.run((0..10).collect(), |n: u64| n * n);
        completed.sort_by_key(|result| result.index);

        assert_eq!(completed.len(), 10);
        for (index, result) in completed.iter().enumerate() {
            assert_eq!(result.index, index);
            assert_eq!(result.outcome, Ok((index * index) as u64));
        }
    }

    #[test]
    fn concurrency_is_bounded() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (task_active, task_peak) = (Arc::clone(&active), Arc::clone(&peak));
        let pool = WorkerPool::new(2, Duration::from_secs(5));
        let completed = pool.run((0..6).collect(), move |_: usize| {
            let now = task_active.fetch_add(1, Ordering::SeqCst) + 1;
            task_peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(30));
            task_active.fetch_sub(1, Ordering::SeqCst);
        });

        assert_eq!(completed.len(), 6);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn slow_task_times_out_without_blocking_others() {
        let pool = WorkerPool::new(2, Duration::from_millis(200));
        let started = Instant::now();
        let completed = pool.run(vec![0u64, 1, 2], |n| {
            if n == 0 {
                thread::sleep(Duration::from_secs(3));
            }
            n
        });

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(completed.len(), 3);
        let slow = completed.iter().find(|result| result.index == 0).expect("slow task reported");
        assert_eq!(slow.outcome, Err(TaskFailure::TimedOut(Duration::from_millis(200))));
        assert_eq!(slow.outcome.as_ref().expect_err("timed out").kind(), "timeout");
        assert!(completed.iter().filter(|result| result.index != 0).all(|result| result.outcome.is_ok()));
        // Fast tasks finish before the slow one is abandoned.
        assert_eq!(completed.last().map(|result| result.index), Some(0));
    }

    #[test]
    fn panics_are_reported() {
        let pool = WorkerPool::new(2, Duration::from_secs(5));
        let completed = pool.run(vec!["ok", "boom"], |name| {
            if name == "boom" {
                panic!("cannot read {name}");
            }
            name.len()
        });
        let failed = completed.iter().find(|result| result.index == 1).expect("panic reported");
        assert_eq!(failed.outcome, Err(TaskFailure::Panicked("cannot read boom".to_owned())));

        let sequential = run_sequential(vec![1, 0], |n: i32| {
            assert!(n > 0, "zero");
            n
        });
        assert_eq!(sequential[0].outcome, Ok(1));
        assert_eq!(sequential[1].outcome.as_ref().map_err(TaskFailure::kind), Err("panic"));
    }
}
