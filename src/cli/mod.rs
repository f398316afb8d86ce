pub mod cleanup;
pub mod service;

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about = "Deletes stale files from configured directories on a cron schedule")]
pub struct Args {
    /// Service control action, runs the cleanup service in the foreground when omitted
    #[arg(value_enum)]
    pub action: Option<Action>,
    /// Configuration file, defaults to config.yml next to the executable
    pub config: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Run the cleanup service in the foreground
    Run,
    /// Run a single cleanup pass and exit
    Once,
    Install,
    Uninstall,
    Start,
    Stop,
    Restart,
    Status,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let args = Args::try_parse_from(["sweepd"]).unwrap();
        assert_eq!(args.action, None);
        assert_eq!(args.config, None);

        let args = Args::try_parse_from(["sweepd", "install", "/etc/sweepd.yml"]).unwrap();
        assert_eq!(args.action, Some(Action::Install));
        assert_eq!(args.config, Some(PathBuf::from("/etc/sweepd.yml")));

        let args = Args::try_parse_from(["sweepd", "once"]).unwrap();
        assert_eq!(args.action, Some(Action::Once));

        assert!(Args::try_parse_from(["sweepd", "explode"]).is_err());
    }
}
