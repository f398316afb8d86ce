use crate::errors::{Error, Result};
use std::{str::FromStr, time::Duration};

macro_rules! env_config {
    ($name:ident, $env_key:expr, $default:expr) => {
        paste::paste! {
            pub static [<SWEEPD_ $name>]: ::std::sync::LazyLock<&'static str> = ::std::sync::LazyLock::new(|| {
                ::std::boxed::Box::leak(
                    ::std::env::var($env_key)
                        .unwrap_or_else(|_| $default.to_string())
                        .into_boxed_str()
                )
            });
        }
    };
    ($name:ident, $default:expr) => {
        env_config!($name, concat!("SWEEPD_", stringify!($name)), $default);
    };
}

// 为空时使用可执行文件所在目录下的 logs
env_config!(LOG_DIR, "");
env_config!(LOG_MAX_FILES, "5");
env_config!(SERVICE_LABEL, "sweepd");
env_config!(SHUTDOWN_GRACE_SECS, "30");

pub fn log_max_files() -> Result<usize> {
    parse_setting("SWEEPD_LOG_MAX_FILES", &SWEEPD_LOG_MAX_FILES)
}

pub fn shutdown_grace() -> Result<Duration> {
    parse_setting("SWEEPD_SHUTDOWN_GRACE_SECS", &SWEEPD_SHUTDOWN_GRACE_SECS).map(Duration::from_secs)
}

fn parse_setting<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| Error::Config(format!("invalid {name} value: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_setting() {
        assert_eq!(parse_setting::<u64>("SWEEPD_SHUTDOWN_GRACE_SECS", " 45 ").unwrap(), 45);
        assert!(matches!(
            parse_setting::<u64>("SWEEPD_SHUTDOWN_GRACE_SECS", "soon"),
            Err(Error::Config(msg)) if msg.contains("SWEEPD_SHUTDOWN_GRACE_SECS")
        ));
        assert!(matches!(
            parse_setting::<usize>("SWEEPD_LOG_MAX_FILES", "-1"),
            Err(Error::Config(_))
        ));
    }
}
