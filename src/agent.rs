//! Service lifecycle: `Stopped → Starting → Running → Stopping → Stopped`.
//!
//! `start` schedules the cleanup and fires one run immediately; `stop` halts the
//! scheduler and gives an in-flight run a bounded grace period. Both are safe to
//! call in any state.

use crate::{
    config::RetentionConfig,
    errors::Result,
    janitor,
    scheduler::{CleanupScheduler, SingleFlight, Task},
};
use chrono::Local;
use log::{debug, error, info, warn};
use std::{sync::Arc, time::Duration};
use tokio::{
    signal,
    sync::{Mutex, watch},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::Stopped => write!(f, "stopped"),
            State::Starting => write!(f, "starting"),
            State::Running => write!(f, "running"),
            State::Stopping => write!(f, "stopping"),
        }
    }
}

#[derive(Default)]
struct Lifecycle {
    shutdown: CancellationToken,
    run_loop: Option<JoinHandle<()>>,
}

pub struct Agent {
    config: Arc<RetentionConfig>,
    task: Task,
    grace: Duration,
    state: watch::Sender<State>,
    // 串行化 start/stop
    lifecycle: Mutex<Lifecycle>,
}

impl Agent {
    /// `grace` bounds how long `stop` waits for an in-flight cleanup run.
    pub fn new(config: Arc<RetentionConfig>, grace: Duration) -> Self {
        let task = Task::new({
            let config = Arc::clone(&config);
            move || {
                let config = Arc::clone(&config);
                async move {
                    if let Err(e) = janitor::cleanup(config).await {
                        error!("Cleanup run aborted: {e}");
                    }
                }
            }
        });

        Agent {
            config,
            task,
            grace,
            state: watch::channel(State::Stopped).0,
            lifecycle: Mutex::new(Lifecycle::default()),
        }
    }

    pub fn state(&self) -> State {
        *self.state.borrow()
    }

    /// Number of cleanup runs actually executed (skipped triggers excluded).
    pub fn executions(&self) -> usize {
        self.task.flight().executions()
    }

    fn set_state(&self, state: State) {
        self.state.send_replace(state);
        debug!("Service state: {state}");
    }

    pub async fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        if self.state() != State::Stopped {
            warn!("Service is already {}, ignoring start", self.state());
            return Ok(());
        }
        self.set_state(State::Starting);
        self.task.flight().open();

        // cron 表达式无效时直接返回错误
        let mut scheduler = match CleanupScheduler::start(&self.config.time, &self.task).await {
            Ok(scheduler) => scheduler,
            Err(e) => {
                self.set_state(State::Stopped);
                return Err(e);
            }
        };
        match scheduler.next_run().await {
            Ok(Some(next)) => info!("Next scheduled cleanup at {}", next.with_timezone(&Local)),
            Ok(None) => warn!("The cron expression has no upcoming run"),
            Err(e) => warn!("Failed to get the next scheduled run: {e}"),
        }

        // 启动时立即执行一次，与定时触发共用同一个单飞保护
        tokio::spawn(self.task.invoke());

        let shutdown = CancellationToken::new();
        lifecycle.run_loop = Some(tokio::spawn(run_loop(
            scheduler,
            shutdown.clone(),
            Arc::clone(self.task.flight()),
            self.grace,
        )));
        lifecycle.shutdown = shutdown;
        self.set_state(State::Running);
        info!("Service started");

        Ok(())
    }

    pub async fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        if self.state() != State::Running {
            debug!("Service is {}, nothing to stop", self.state());
            return;
        }
        self.set_state(State::Stopping);

        lifecycle.shutdown.cancel();
        if let Some(run_loop) = lifecycle.run_loop.take() {
            if let Err(e) = run_loop.await {
                error!("Run loop terminated abnormally: {e}");
            }
        }
        self.set_state(State::Stopped);
    }

    /// Foreground entry: runs until SIGINT/SIGTERM, then stops.
    pub async fn run_until_signal(&self) -> Result<()> {
        self.start().await?;
        shutdown_signal().await?;
        info!("Stop signal received");
        self.stop().await;
        debug!("Cleanup runs executed: {}", self.executions());

        Ok(())
    }
}

async fn run_loop(
    scheduler: CleanupScheduler,
    shutdown: CancellationToken,
    flight: Arc<SingleFlight>,
    grace: Duration,
) {
    shutdown.cancelled().await;

    // 先关闭单飞保护，已派发但尚未开始的触发会被丢弃
    flight.close();
    if let Err(e) = scheduler.stop().await {
        error!("Failed to stop the scheduler: {e}");
    }
    if !flight.wait_idle(grace).await {
        warn!(
            "Cleanup still running after {}s, leaving it to finish on its own",
            grace.as_secs()
        );
    }

    info!(
        "Service stopped after {} cleanup run(s), {} skipped trigger(s)",
        flight.executions(),
        flight.skipped()
    );
}

async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            r = signal::ctrl_c() => r?,
            _ = terminate.recv() => {},
        }
    }

    #[cfg(not(unix))]
    signal::ctrl_c().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;
    use std::{
        path::{Path, PathBuf},
        time::SystemTime,
    };

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn agent(directories: Vec<PathBuf>, time: &str) -> Agent {
        let config = RetentionConfig {
            directories,
            days: 3,
            time: time.to_string(),
        };

        Agent::new(Arc::new(config), Duration::from_secs(5))
    }

    async fn wait_for(cond: impl Fn() -> bool) {
        for _ in 0..100 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("condition not reached in time");
    }

    fn touch_old(path: &Path) {
        let file = std::fs::File::create(path).unwrap();
        file.set_modified(SystemTime::now() - DAY * 5).unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_start_runs_cleanup_eagerly() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("old.log");
        touch_old(&old);
        // 每年一次，测试期间不会触发
        let agent = agent(vec![dir.path().to_path_buf()], "0 0 2 1 1 *");

        agent.start().await.unwrap();
        assert_eq!(agent.state(), State::Running);

        wait_for(|| !old.exists()).await;
        assert_eq!(agent.executions(), 1);

        agent.stop().await;
        assert_eq!(agent.state(), State::Stopped);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_lifecycle_is_idempotent() {
        let agent = agent(vec![], "0 0 2 1 1 *");

        // 未启动时停止是空操作
        agent.stop().await;
        assert_eq!(agent.state(), State::Stopped);

        agent.start().await.unwrap();
        agent.start().await.unwrap();
        assert_eq!(agent.state(), State::Running);
        wait_for(|| agent.executions() == 1).await;

        agent.stop().await;
        agent.stop().await;
        assert_eq!(agent.state(), State::Stopped);

        // 停止后可以再次启动
        agent.start().await.unwrap();
        assert_eq!(agent.state(), State::Running);
        wait_for(|| agent.executions() == 2).await;
        agent.stop().await;
        assert_eq!(agent.state(), State::Stopped);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_trigger_after_stop_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let agent = agent(vec![dir.path().to_path_buf()], "0 0 2 1 1 *");

        agent.start().await.unwrap();
        wait_for(|| agent.executions() == 1).await;
        agent.stop().await;

        // 停止前已派发、停止后才被执行的触发
        let old = dir.path().join("old.log");
        touch_old(&old);
        agent.task.invoke().await;

        assert_eq!(agent.executions(), 1);
        assert!(old.exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_invalid_cron_fails_start() {
        let agent = agent(vec![], "every day");

        assert!(matches!(agent.start().await, Err(Error::JobScheduler(_))));
        assert_eq!(agent.state(), State::Stopped);
        assert_eq!(agent.executions(), 0);
    }
}
