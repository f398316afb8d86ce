use std::path::Path;

use log::info;

use crate::{
    cli::Action,
    config,
    errors::Result,
    fail,
    service::{self, ServiceInstall},
    vars::{SWEEPD_SERVICE_LABEL, shutdown_grace},
};

const DESCRIPTION: &str = "Deletes stale files from configured directories on a schedule";

pub fn run(action: Action, config_path: Option<&Path>) -> Result<()> {
    let manager = service::native(&SWEEPD_SERVICE_LABEL)?;
    info!("Service control: {action:?}");

    match action {
        Action::Install => manager.install(&install_context(config_path)?)?,
        Action::Uninstall => manager.uninstall()?,
        Action::Start => manager.start()?,
        Action::Stop => manager.stop()?,
        Action::Restart => manager.restart()?,
        Action::Status => {
            let status = manager.status()?;
            info!("Service is {status}");
            println!("{}: {status}", *SWEEPD_SERVICE_LABEL);
        }
        Action::Run | Action::Once => {
            return crate::err!("`{action:?}` is not a service control action");
        }
    }

    Ok(())
}

fn install_context(config_path: Option<&Path>) -> Result<ServiceInstall> {
    // 安装前先校验配置，避免服务启动后立即失败
    let (path, config) = config::load(config_path)?;
    config.log_summary();

    let mut args = vec!["run".to_string()];
    if config_path.is_some() {
        let path = path.canonicalize()?;
        let path = path
            .to_str()
            .ok_or_else(|| fail!("config path is not valid UTF-8: {}", path.display()))?;
        args.push(path.to_string());
    }

    Ok(ServiceInstall {
        label: SWEEPD_SERVICE_LABEL.to_string(),
        description: DESCRIPTION.to_string(),
        program: std::env::current_exe()?.canonicalize()?,
        args,
        stop_timeout: shutdown_grace()?,
    })
}
