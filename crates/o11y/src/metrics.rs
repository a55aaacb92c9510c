use ::metrics::{Unit, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::O11yResult;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

#[derive(Clone, Debug, Default)]
pub struct Config {
    pub enable: bool,
    /// Where [`write_snapshot`] puts the rendered metrics.
    pub snapshot_file: Option<PathBuf>,
}

impl Config {
    /// Metrics on, written to `path` at exit.
    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Self {
            enable: true,
            snapshot_file: Some(path.into()),
        }
    }
}

pub fn init(cfg: &Config) -> O11yResult<()> {
    if !cfg.enable {
        return Ok(());
    }

    if HANDLE.get().is_none() {
        let handle = PrometheusBuilder::new().install_recorder()?;
        HANDLE.set(handle).ok();
    }

    describe_metrics();
    Ok(())
}

/// Current metrics in Prometheus text format.
pub fn render() -> String {
    HANDLE
        .get()
        .map(|h| h.render())
        .unwrap_or_else(|| "# recorder not installed\n".into())
}

/// Write the current snapshot to the configured file, if any.
pub fn write_snapshot(cfg: &Config) -> O11yResult<()> {
    match (&cfg.snapshot_file, HANDLE.get()) {
        (Some(path), Some(_)) => write_to(path),
        _ => Ok(()),
    }
}

fn write_to(path: &Path) -> O11yResult<()> {
    std::fs::write(path, render())?;
    debug!(path = %path.display(), "metrics snapshot written");
    Ok(())
}

pub fn describe_metrics() {
    describe_counter!(
        "docport_batches_total",
        Unit::Count,
        "Batches processed by the import loop"
    );
    describe_counter!(
        "docport_documents_imported_total",
        Unit::Count,
        "Documents accepted by the store"
    );
    describe_counter!(
        "docport_schema_updates_total",
        Unit::Count,
        "Schema pushes to the store"
    );
    describe_counter!(
        "docport_insert_retries_total",
        Unit::Count,
        "Inserts retried after a schema evolution"
    );
    describe_counter!(
        "docport_import_failures_total",
        Unit::Count,
        "Batches that failed for good"
    );
    describe_counter!(
        "docport_panics_total",
        Unit::Count,
        "Panics captured by the panic hook"
    );
}
