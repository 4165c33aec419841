// ABOUTME: Pre-flight check command
// ABOUTME: Reports source access, key column and header drift without writing

use anyhow::{bail, Result};

use crate::config::SyncConfig;
use crate::preflight::run_preflight_checks;

pub async fn check(config: &SyncConfig) -> Result<()> {
    config.validate()?;

    let result = run_preflight_checks(config).await?;
    result.print();

    if !result.all_passed() {
        bail!("{} pre-flight issue(s) found", result.failed_count());
    }
    Ok(())
}
