//! Host service-manager integration.
//!
//! Only the lifecycle verbs are delegated here; the service body itself is
//! [`crate::agent::Agent`], started by the host through `sweepd run`.

use crate::errors::{Error, Result};
use log::{debug, info};
use std::{
    path::{Path, PathBuf},
    process::{Command, Output},
    time::Duration,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInstall {
    pub label: String,
    pub description: String,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub stop_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Running,
    Stopped,
    NotInstalled,
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceStatus::Running => write!(f, "running"),
            ServiceStatus::Stopped => write!(f, "stopped"),
            ServiceStatus::NotInstalled => write!(f, "not installed"),
        }
    }
}

pub trait ServiceManager {
    fn install(&self, ctx: &ServiceInstall) -> Result<()>;
    fn uninstall(&self) -> Result<()>;
    fn start(&self) -> Result<()>;
    fn stop(&self) -> Result<()>;
    fn restart(&self) -> Result<()>;
    fn status(&self) -> Result<ServiceStatus>;
}

/// The service manager of the running platform.
pub fn native(label: &str) -> Result<Box<dyn ServiceManager>> {
    if cfg!(target_os = "linux") {
        Ok(Box::new(Systemd::new(label)))
    } else {
        Err(Error::ServiceControl {
            action: "detect".to_string(),
            reason: format!("no supported service manager on {}", std::env::consts::OS),
        })
    }
}

pub struct Systemd {
    label: String,
    unit_dir: PathBuf,
}

impl Systemd {
    pub fn new(label: &str) -> Self {
        Systemd {
            label: label.to_string(),
            unit_dir: PathBuf::from("/etc/systemd/system"),
        }
    }

    fn unit_path(&self) -> PathBuf {
        self.unit_dir.join(format!("{}.service", self.label))
    }

    fn systemctl(&self, args: &[&str]) -> Result<Output> {
        debug!("Running: systemctl {}", args.join(" "));
        let output = Command::new("systemctl").args(args).output()?;

        Ok(output)
    }

    // 执行 systemctl 并要求成功退出
    fn checked(&self, action: &str, args: &[&str]) -> Result<()> {
        let output = self.systemctl(args)?;
        if output.status.success() {
            Ok(())
        } else {
            Err(Error::ServiceControl {
                action: action.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

impl ServiceManager for Systemd {
    fn install(&self, ctx: &ServiceInstall) -> Result<()> {
        let path = self.unit_path();
        if path.exists() {
            return Err(Error::ServiceControl {
                action: "install".to_string(),
                reason: format!("{} already exists", path.display()),
            });
        }
        std::fs::write(&path, render_unit(ctx))?;
        self.checked("install", &["daemon-reload"])?;
        self.checked("install", &["enable", &self.label])?;
        info!("Service installed: {}", path.display());

        Ok(())
    }

    fn uninstall(&self) -> Result<()> {
        let path = self.unit_path();
        if !path.exists() {
            return Err(Error::ServiceControl {
                action: "uninstall".to_string(),
                reason: format!("{} does not exist", path.display()),
            });
        }
        // 服务可能未启用，忽略 disable 的结果
        self.systemctl(&["disable", "--now", &self.label])?;
        std::fs::remove_file(&path)?;
        self.checked("uninstall", &["daemon-reload"])?;
        info!("Service uninstalled: {}", path.display());

        Ok(())
    }

    fn start(&self) -> Result<()> {
        self.checked("start", &["start", &self.label])
    }

    fn stop(&self) -> Result<()> {
        self.checked("stop", &["stop", &self.label])
    }

    fn restart(&self) -> Result<()> {
        self.checked("restart", &["restart", &self.label])
    }

    fn status(&self) -> Result<ServiceStatus> {
        if !self.unit_path().exists() {
            return Ok(ServiceStatus::NotInstalled);
        }
        // is-active 在服务未运行时以非零状态退出，只看输出
        let output = self.systemctl(&["is-active", &self.label])?;
        let status = match String::from_utf8_lossy(&output.stdout).trim() {
            "active" | "reloading" | "deactivating" => ServiceStatus::Running,
            _ => ServiceStatus::Stopped,
        };

        Ok(status)
    }
}

pub fn render_unit(ctx: &ServiceInstall) -> String {
    let exec_start = std::iter::once(quote(&ctx.program.to_string_lossy()))
        .chain(ctx.args.iter().map(|arg| quote(arg)))
        .collect::<Vec<_>>()
        .join(" ");
    let working_dir = ctx.program.parent().unwrap_or(Path::new("/"));

    format!(
        "[Unit]
Description={description}
After=local-fs.target

[Service]
Type=simple
ExecStart={exec_start}
WorkingDirectory={working_dir}
SyslogIdentifier={label}
Restart=on-failure
KillSignal=SIGTERM
TimeoutStopSec={timeout}

[Install]
WantedBy=multi-user.target
",
        description = ctx.description,
        label = ctx.label,
        working_dir = quote(&working_dir.to_string_lossy()),
        timeout = ctx.stop_timeout.as_secs() + 5,
    )
}

// systemd 的命令行引用规则：含空白或引号时加双引号，% 需要转义
fn quote(arg: &str) -> String {
    let escaped = arg.replace('%', "%%");
    if escaped.is_empty() || escaped.contains(|c: char| c.is_whitespace() || c == '"' || c == '\\') {
        format!("\"{}\"", escaped.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        escaped
    }
}
