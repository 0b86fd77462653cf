use std::future::Future;
use std::sync::Arc;

use rocket::tokio::{
    self,
    sync::Notify,
    task::JoinHandle,
    time::{self, Duration, Instant, MissedTickBehavior},
};

/// A task that runs repeatedly at a fixed period, independent of request traffic.
/// It can also be triggered early, or cancelled.
///
/// The first run happens one period after creation. Runs never overlap: if a
/// run overruns the period, the next one is delayed rather than doubled up.
pub struct PeriodicTask {
    loop_handle: JoinHandle<()>,
    signal: Arc<Notify>,
}

impl PeriodicTask {
    /// Run `task` every `period`.
    pub fn new<F, Fut>(period: Duration, mut task: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let signal = Arc::new(Notify::new());

        let loop_signal = signal.clone();
        let loop_handle = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = loop_signal.notified() => {}
                }
                task().await;
            }
        });

        Self {
            loop_handle,
            signal,
        }
    }

    /// Run the task as soon as possible, without waiting for the next period.
    /// If a run is already in progress, another follows straight after it.
    pub fn trigger_now(&self) {
        self.signal.notify_one();
    }

    /// Stop the task. A run in progress is dropped at its next suspension point.
    pub async fn cancel(self) {
        self.loop_handle.abort();
        let _ = self.loop_handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_task(period: Duration) -> (PeriodicTask, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let task_runs = runs.clone();
        let task = PeriodicTask::new(period, move || {
            let runs = task_runs.clone();
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
            }
        });
        (task, runs)
    }

    #[rocket::async_test]
    async fn runs_every_period() {
        let (task, runs) = counting_task(Duration::from_millis(50));
        time::sleep(Duration::from_millis(20)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        time::sleep(Duration::from_millis(250)).await;
        assert!(runs.load(Ordering::SeqCst) >= 2);
        task.cancel().await;
    }

    #[rocket::async_test]
    async fn trigger_runs_early() {
        let (task, runs) = counting_task(Duration::from_secs(3600));
        task.trigger_now();
        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        task.cancel().await;
    }

    #[rocket::async_test]
    async fn cancel_stops_runs() {
        let (task, runs) = counting_task(Duration::from_millis(20));
        task.cancel().await;
        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
