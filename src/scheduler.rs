use crate::errors::Result;
use chrono::{DateTime, Local, Utc};
use log::{debug, info};
use std::{
    future::Future,
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

/// Lets at most one execution through at a time; overlapping triggers are
/// dropped, not queued. Once closed, every trigger is dropped until reopened.
#[derive(Debug, Default)]
pub struct SingleFlight {
    lock: Mutex<()>,
    closed: AtomicBool,
    executions: AtomicUsize,
    skipped: AtomicUsize,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the trigger was skipped because another execution
    /// holds the guard or the flight is closed.
    pub async fn run<Fut>(&self, fut: Fut) -> bool
    where
        Fut: Future<Output = ()>,
    {
        let Ok(_guard) = self.lock.try_lock() else {
            self.skipped.fetch_add(1, Ordering::SeqCst);
            info!("Previous cleanup is still running, skipping this trigger");
            return false;
        };
        // 在持有锁时检查，close 之后的 wait_idle 不会漏掉已经开始的执行
        if self.closed.load(Ordering::SeqCst) {
            self.skipped.fetch_add(1, Ordering::SeqCst);
            debug!("Service is stopping, dropping this trigger");
            return false;
        }
        self.executions.fetch_add(1, Ordering::SeqCst);
        fut.await;

        true
    }

    pub fn open(&self) {
        self.closed.store(false, Ordering::SeqCst);
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Waits up to `grace` for an in-flight execution to finish.
    pub async fn wait_idle(&self, grace: Duration) -> bool {
        tokio::time::timeout(grace, self.lock.lock()).await.is_ok()
    }

    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::SeqCst)
    }
}

type TaskFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
type TaskRun = Arc<dyn Fn() -> TaskFuture + Send + Sync + 'static>;

#[derive(Clone)]
pub struct Task {
    run: TaskRun,
    flight: Arc<SingleFlight>,
}

impl Task {
    pub fn new<F, Fut>(run: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            run: Arc::new(move || Box::pin(run())),
            flight: Arc::new(SingleFlight::new()),
        }
    }

    pub fn flight(&self) -> &Arc<SingleFlight> {
        &self.flight
    }

    // 定时触发和启动时的立即执行都经过这里
    pub fn invoke(&self) -> TaskFuture {
        let run = Arc::clone(&self.run);
        let flight = Arc::clone(&self.flight);

        Box::pin(async move {
            flight.run(run()).await;
        })
    }

    pub fn create_job(&self, schedule: &str) -> Result<Job> {
        let task = self.clone();
        let job = Job::new_async_tz(schedule, Local, move |_, _| task.invoke())?;

        Ok(job)
    }
}

/// Accepts both 5-field (minute) and 6-field (second) cron expressions by
/// prefixing a zero seconds field to the former.
pub fn normalize_cron(expr: &str) -> String {
    let expr = expr.trim();
    if expr.split_whitespace().count() == 5 {
        format!("0 {expr}")
    } else {
        expr.to_string()
    }
}

pub struct CleanupScheduler {
    sched: JobScheduler,
    job_id: Uuid,
}

impl CleanupScheduler {
    /// Parses `schedule` and starts firing `task` on it. A bad expression is
    /// returned as an error before anything is started.
    pub async fn start(schedule: &str, task: &Task) -> Result<Self> {
        let schedule = normalize_cron(schedule);
        let job = task.create_job(&schedule)?;

        let mut sched = JobScheduler::new().await?;
        let job_id = sched.add(job).await?;
        sched.set_shutdown_handler(Box::new(|| {
            Box::pin(async move {
                info!("Job scheduler is shutting down");
            })
        }));
        sched.start().await?;
        info!("Cleanup scheduled with cron expression: {schedule}");

        Ok(Self { sched, job_id })
    }

    pub async fn next_run(&mut self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.sched.next_tick_for_job(self.job_id).await?)
    }

    /// Stops future ticks. An execution already in flight keeps running.
    pub async fn stop(mut self) -> Result<()> {
        debug!("Stopping job scheduler");
        self.sched.shutdown().await?;

        Ok(())
    }
}
