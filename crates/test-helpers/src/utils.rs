// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use anyhow::{anyhow, Result};
use std::time::Duration;
use tokio::{sync::watch, time::timeout};
use tracing_subscriber::{fmt, EnvFilter};

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Install a test-writer subscriber filtered by `RUST_LOG`, defaulting to `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_test_writer().try_init();
}

/// Wait until the watched value satisfies `pred`, failing after a fixed timeout.
pub async fn wait_for<T: Clone>(
    rx: &mut watch::Receiver<T>,
    pred: impl FnMut(&T) -> bool,
) -> Result<T> {
    let value = timeout(WAIT_TIMEOUT, rx.wait_for(pred))
        .await
        .map_err(|_| anyhow!("Timed out waiting for state"))??;
    Ok((*value).clone())
}

/// Give spawned work a chance to run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
