use crate::errors::{Error, Result};
use log::{info, warn};
use serde::Deserialize;
use std::path::{Path, PathBuf};

// 未指定配置文件时，依次在可执行文件所在目录查找
const DEFAULT_FILE_NAMES: [&str; 2] = ["config.yml", "config.yaml"];

const DEFAULT_DAYS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RetentionConfig {
    // 待清理的目录，按配置顺序处理
    #[serde(default)]
    pub directories: Vec<PathBuf>,
    // 文件保留天数
    #[serde(default = "default_days")]
    pub days: u32,
    // cron 表达式
    pub time: String,
}

fn default_days() -> u32 {
    DEFAULT_DAYS
}

impl RetentionConfig {
    fn load(path: &Path) -> Result<RetentionConfig> {
        let file = std::fs::File::open(path)?;
        let config: RetentionConfig = serde_yaml::from_reader(file)?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.time.trim().is_empty() {
            return Err(Error::Config("`time` must be a cron expression".to_string()));
        }

        Ok(())
    }

    pub fn log_summary(&self) {
        info!("Time: {}", self.time);
        info!("Days: {}", self.days);
        if self.directories.is_empty() {
            warn!("Directories: none configured, cleanup runs will be no-ops");
        } else {
            info!("Directories: {:?}", self.directories);
        }
    }
}

impl std::str::FromStr for RetentionConfig {
    type Err = Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let config: RetentionConfig = serde_yaml::from_str(s)?;
        config.validate()?;

        Ok(config)
    }
}

/// Loads the configuration from `path`, or from the executable's directory when no
/// path is given.
pub fn load(path: Option<&Path>) -> Result<(PathBuf, RetentionConfig)> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => locate(&executable_dir()?)?,
    };
    info!("Loading configuration from: {}", path.display());
    let config = RetentionConfig::load(&path)?;

    Ok((path, config))
}

fn locate(dir: &Path) -> Result<PathBuf> {
    DEFAULT_FILE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
        .ok_or_else(|| {
            Error::Config(format!(
                "no {} found in {}",
                DEFAULT_FILE_NAMES.join(" or "),
                dir.display()
            ))
        })
}

// 获取当前执行程序所在的绝对路径（解析符号链接）
pub fn executable_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe()?;
    let dir = exe
        .parent()
        .ok_or_else(|| Error::Config(format!("executable has no parent: {}", exe.display())))?;

    Ok(dir.canonicalize()?)
}
