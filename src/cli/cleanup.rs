use std::{path::Path, sync::Arc};

use crate::{config, errors::Result, janitor};

pub async fn run(config_path: Option<&Path>) -> Result<()> {
    println!("Running cleanup...");
    let (_, config) = config::load(config_path)?;
    config.log_summary();

    let report = janitor::cleanup(Arc::new(config)).await?;
    println!("Cleanup completed: {report}");

    Ok(())
}
