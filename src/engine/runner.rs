//! Running engines for several sources.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info};

use super::RunReport;

/// Keeps runs at least `min_interval` apart, shared by all workers.
///
/// The interval counts from the most recent run start or finish, whichever
/// is later, so a long run is still followed by a pause.
#[derive(Debug)]
pub struct PacingGate {
    min_interval: Duration,
    last_event: Mutex<Option<Instant>>,
}

impl PacingGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_event: Mutex::new(None),
        }
    }

    /// Wait until a new run may start, then claim the slot.
    pub async fn wait(&self) {
        let mut last_event = self.last_event.lock().await;
        if let Some(last) = *last_event {
            let ready_at = last + self.min_interval;
            let now = Instant::now();
            if ready_at > now {
                debug!("Pacing next run by {:?}", ready_at - now);
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last_event = Some(Instant::now());
    }

    /// Record that a run has finished.
    pub async fn finished(&self) {
        *self.last_event.lock().await = Some(Instant::now());
    }
}

/// Runs one engine per source on a bounded set of workers.
///
/// With one worker sources run strictly in the given order.
#[derive(Debug, Clone)]
pub struct Runner {
    workers: usize,
    min_interval: Duration,
}

impl Runner {
    pub fn new(workers: usize, min_interval: Duration) -> Self {
        Self {
            workers: workers.max(1),
            min_interval,
        }
    }

    /// Run `run_source` for every source name; reports come back in input order.
    ///
    /// A panicking run is reported as failed and does not affect the others.
    pub async fn run<F, Fut>(&self, sources: Vec<String>, run_source: F) -> Vec<RunReport>
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RunReport> + Send + 'static,
    {
        let total = sources.len();
        info!(
            "Running {} sources with {} workers",
            total,
            self.workers.min(total.max(1))
        );

        let queue: Arc<Mutex<VecDeque<(usize, String)>>> =
            Arc::new(Mutex::new(sources.into_iter().enumerate().collect()));
        let results: Arc<Mutex<Vec<Option<RunReport>>>> =
            Arc::new(Mutex::new((0..total).map(|_| None).collect()));
        let gate = Arc::new(PacingGate::new(self.min_interval));
        let run_source = Arc::new(run_source);

        let mut handles = Vec::new();
        for _ in 0..self.workers.min(total) {
            let queue = queue.clone();
            let results = results.clone();
            let gate = gate.clone();
            let run_source = run_source.clone();

            handles.push(tokio::spawn(async move {
                loop {
                    let job = {
                        let mut queue = queue.lock().await;
                        queue.pop_front()
                    };
                    let Some((index, name)) = job else {
                        break;
                    };

                    gate.wait().await;
                    let report = match tokio::spawn(run_source(name.clone())).await {
                        Ok(report) => report,
                        Err(e) => {
                            error!(source = %name, "Run task failed: {}", e);
                            RunReport::failed(&name, format!("run task failed: {e}"))
                        }
                    };
                    gate.finished().await;
                    results.lock().await[index] = Some(report);
                }
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!("Worker failed: {}", e);
            }
        }

        let results = std::mem::take(&mut *results.lock().await);
        results
            .into_iter()
            .enumerate()
            .map(|(i, report)| {
                report.unwrap_or_else(|| RunReport::failed(&format!("#{i}"), "not run"))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[tokio::test(start_paused = true)]
    async fn test_sequential_runs_are_paced_in_order() {
        let starts: Arc<StdMutex<Vec<(String, Instant)>>> = Arc::default();
        let runner = Runner::new(1, Duration::from_secs(5));
        let origin = Instant::now();

        let recorded = starts.clone();
        let reports = runner
            .run(
                vec!["Wong".into(), "Metro".into(), "Plaza Vea".into()],
                move |name| {
                    let recorded = recorded.clone();
                    async move {
                        recorded.lock().unwrap().push((name.clone(), Instant::now()));
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        RunReport::new(&name)
                    }
                },
            )
            .await;

        let names: Vec<_> = reports.iter().map(|r| r.source.as_str()).collect();
        assert_eq!(names, vec!["Wong", "Metro", "Plaza Vea"]);

        let starts = starts.lock().unwrap();
        let offsets: Vec<u64> = starts
            .iter()
            .map(|(_, at)| (*at - origin).as_secs())
            .collect();
        assert_eq!(offsets, vec![0, 6, 12]);
        assert_eq!(starts[1].0, "Metro");
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_runs_are_followed_by_a_pause() {
        let spans: Arc<StdMutex<Vec<(Instant, Instant)>>> = Arc::default();
        let runner = Runner::new(1, Duration::from_secs(5));

        let recorded = spans.clone();
        runner
            .run(vec!["Wong".into(), "Metro".into()], move |name| {
                let recorded = recorded.clone();
                async move {
                    let started = Instant::now();
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    recorded.lock().unwrap().push((started, Instant::now()));
                    RunReport::new(&name)
                }
            })
            .await;

        let spans = spans.lock().unwrap();
        assert_eq!(spans.len(), 2);
        let (_, first_end) = spans[0];
        let (second_start, _) = spans[1];
        assert!(second_start - first_end >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_panicking_run_is_isolated() {
        let runner = Runner::new(2, Duration::ZERO);
        let reports = runner
            .run(vec!["Wong".into(), "Metro".into()], |name| async move {
                if name == "Wong" {
                    panic!("boom");
                }
                RunReport::new(&name)
            })
            .await;

        assert_eq!(reports.len(), 2);
        assert!(!reports[0].is_success());
        assert_eq!(reports[0].source, "Wong");
        assert!(reports[1].is_success());
    }

    #[tokio::test]
    async fn test_empty_source_list() {
        let runner = Runner::new(3, Duration::from_secs(5));
        let reports = runner
            .run(Vec::new(), |name| async move { RunReport::new(&name) })
            .await;
        assert!(reports.is_empty());
    }
}
