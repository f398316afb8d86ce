use crate::{
    agent::Agent,
    cli::{Action, Args},
    errors::Result,
    vars::{SWEEPD_SERVICE_LABEL, shutdown_grace},
};
use clap::Parser;
use log::{debug, error, info};
use std::{future::Future, path::Path, process::ExitCode, sync::Arc, time::Duration};

mod agent;
mod cli;
mod config;
mod errors;
mod janitor;
mod logger;
mod retention;
mod scheduler;
mod service;
mod vars;

// 宽限期在 Agent::stop 中已经用完，运行时退出时不再等待残留的阻塞任务
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

fn main() -> ExitCode {
    let args = Args::parse();
    // Load environment variables from .env file if it exists
    let dotenv_loaded = dotenvy::dotenv().is_ok();
    // Initialize the logger
    let _guard = match logger::init() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            return ExitCode::FAILURE;
        }
    };
    if dotenv_loaded {
        info!("loaded .env file");
    }
    info!("Args: {:?}", std::env::args().collect::<Vec<_>>());

    match block_on_with_deadline(dispatch(args), RUNTIME_SHUTDOWN_TIMEOUT) {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(e)) | Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Drives `fut` on a fresh multi-threaded runtime. Blocking tasks still
/// running when `fut` completes are abandoned after `deadline`.
fn block_on_with_deadline<F: Future>(fut: F, deadline: Duration) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let output = runtime.block_on(fut);
    runtime.shutdown_timeout(deadline);

    Ok(output)
}

async fn dispatch(args: Args) -> Result<()> {
    let config_path = args.config.as_deref();
    match args.action.unwrap_or(Action::Run) {
        Action::Run => serve(config_path).await,
        Action::Once => cli::cleanup::run(config_path).await,
        action => cli::service::run(action, config_path),
    }
}

async fn serve(config_path: Option<&Path>) -> Result<()> {
    let grace = shutdown_grace()?;
    let (_, config) = config::load(config_path)?;
    config.log_summary();
    info!("Configuration loaded");

    // 仅用于记录，服务未安装时也可以直接前台运行
    match service::native(&SWEEPD_SERVICE_LABEL).and_then(|manager| manager.status()) {
        Ok(status) => info!("Service is {status}"),
        Err(e) => debug!("Service status unavailable: {e}"),
    }

    let agent = Agent::new(Arc::new(config), grace);
    agent.run_until_signal().await
}
