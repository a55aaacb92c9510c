use once_cell::sync::OnceCell;
use tracing_log::LogTracer;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt,
};

use crate::O11yResult;

static INIT: OnceCell<()> = OnceCell::new();

#[derive(Clone, Debug)]
pub struct Config {
    /// Either a simple level like "info" or a full EnvFilter string
    /// e.g. "info,schema_inference=debug".
    pub level: Option<String>,
    /// Emit logs as JSON lines when true; otherwise plain text.
    pub json: bool,
    /// Include file/line/target info in logs.
    pub with_targets: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            level: Some("info".to_owned()),
            json: false,
            with_targets: false,
        }
    }
}

/// Install the global subscriber. Later calls are no-ops.
///
/// `RUST_LOG` wins over `cfg.level` when set. Logs go to stderr so that
/// stdout stays free for command output.
pub fn init(cfg: &Config) -> O11yResult<()> {
    INIT.get_or_try_init(|| -> O11yResult<()> {
        let _ = LogTracer::init();

        let level = cfg.level.clone().unwrap_or_else(|| "info".into());
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let fmt_layer = if cfg.json {
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(cfg.with_targets)
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .boxed()
        } else {
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(cfg.with_targets)
                .with_ansi(true)
                .boxed()
        };

        let subscriber = Registry::default().with(filter).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
        Ok(())
    })?;
    Ok(())
}
