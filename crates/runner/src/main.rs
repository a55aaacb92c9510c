use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use docport_config::{ConflictPolicy, ImportConfig, load_from_path};
use docport_core::ArcDynStore;
use runner::{ImportSession, settle, sources, spawn_reader, version};
use schema_inference::SchemaAccumulator;
use stores::FileDocumentStore;

#[derive(Parser, Debug)]
#[command(
    name = "docport",
    version = version::VERSION,
    about = "Import JSON documents into collections with inferred schemas"
)]
struct Cli {
    #[command(flatten)]
    o11y: O11yArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct O11yArgs {
    /// Log level or EnvFilter directive; RUST_LOG takes precedence
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Write a Prometheus metrics snapshot here on exit
    #[arg(long, global = true)]
    metrics_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import documents, creating or evolving the collection schema
    Import(ImportArgs),
    /// Print the schema inferred from documents without touching a store
    Infer(SchemaArgs),
}

#[derive(Args, Debug)]
struct SchemaArgs {
    /// Target collection
    collection: String,

    /// Inline JSON, file paths, or `-` for stdin (default: stdin)
    documents: Vec<String>,

    /// YAML config file; command line flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Documents per batch
    #[arg(short = 'b', long)]
    batch_size: Option<usize>,

    /// Documents at the start of each batch used to infer field types
    /// (0 means the whole batch)
    #[arg(short = 'd', long)]
    inference_depth: Option<usize>,

    /// Comma separated primary key fields (top level only)
    #[arg(short = 'p', long, value_delimiter = ',')]
    primary_key: Vec<String>,

    /// Comma separated autogenerated fields (top level only)
    #[arg(short = 'a', long, value_delimiter = ',')]
    autogenerate: Vec<String>,

    /// Detect base64 strings as byte arrays
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    detect_byte_arrays: Option<bool>,

    /// Detect UUID strings
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    detect_uuids: Option<bool>,

    /// Detect RFC 3339 date-time strings
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    detect_times: Option<bool>,

    /// Distinguish integers from floats
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    detect_integers: Option<bool>,

    /// Conflicting field types: fail or coerce-to-string
    #[arg(long)]
    on_conflict: Option<ConflictPolicy>,
}

#[derive(Args, Debug)]
struct ImportArgs {
    #[command(flatten)]
    schema: SchemaArgs,

    /// Allow adding documents to an existing collection
    #[arg(long)]
    append: bool,

    /// Do not create the collection if it does not exist
    #[arg(long)]
    no_create: bool,

    /// Evolve the schema of an existing collection from new documents
    #[arg(long)]
    update_schema: bool,

    /// Remove null values and empty arrays before retrying an insert
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    cleanup_null_values: Option<bool>,

    /// Do not evolve the schema and retry after a rejected insert
    #[arg(long)]
    no_retry: bool,

    /// Directory of the file document store
    #[arg(long, env = "DOCPORT_STORE_DIR", default_value = "./docport-data")]
    store_dir: PathBuf,
}

impl SchemaArgs {
    fn config(&self) -> Result<ImportConfig> {
        let mut cfg = match &self.config {
            Some(path) => load_from_path(path)
                .with_context(|| format!("load config {}", path.display()))?,
            None => ImportConfig::default(),
        };

        if let Some(n) = self.batch_size {
            cfg.batch_size = n;
        }
        if let Some(n) = self.inference_depth {
            cfg.inference_depth = n;
        }
        if !self.primary_key.is_empty() {
            cfg.primary_key = self.primary_key.clone();
        }
        if !self.autogenerate.is_empty() {
            cfg.autogenerate = self.autogenerate.clone();
        }
        if let Some(v) = self.detect_byte_arrays {
            cfg.detect.byte_arrays = v;
        }
        if let Some(v) = self.detect_uuids {
            cfg.detect.uuids = v;
        }
        if let Some(v) = self.detect_times {
            cfg.detect.times = v;
        }
        if let Some(v) = self.detect_integers {
            cfg.detect.integers = v;
        }
        if let Some(policy) = self.on_conflict {
            cfg.on_conflict = policy;
        }
        Ok(cfg)
    }
}

impl ImportArgs {
    fn config(&self) -> Result<ImportConfig> {
        let mut cfg = self.schema.config()?;
        cfg.append |= self.append;
        cfg.no_create |= self.no_create;
        cfg.update_schema |= self.update_schema;
        if let Some(v) = self.cleanup_null_values {
            cfg.cleanup_null_values = v;
        }
        if self.no_retry {
            cfg.retry.enabled = false;
        }
        cfg.validate().context("validate import config")?;
        Ok(cfg)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let o11y_cfg = o11y::O11yConfig {
        logging: o11y::logging::Config {
            level: cli.o11y.log_level.clone(),
            json: cli.o11y.log_json,
            with_targets: false,
        },
        metrics: match &cli.o11y.metrics_file {
            Some(path) => o11y::metrics::Config::to_file(path.clone()),
            None => o11y::metrics::Config::default(),
        },
        install_panic_hook: true,
    };
    o11y::init_all(&o11y_cfg)
        .map_err(|e| anyhow!(e))
        .context("init observability")?;

    let res = match cli.command {
        Command::Import(args) => run_import(args).await,
        Command::Infer(args) => run_infer(args).await,
    };

    if let Err(e) = o11y::metrics::write_snapshot(&o11y_cfg.metrics) {
        warn!(error = %e, "failed to write metrics snapshot");
    }

    // A failed run can leave the input reader parked in a blocking read,
    // which would hold up runtime shutdown until end of input.
    if let Err(e) = res {
        error!(error = %format!("{e:#}"), "docport failed");
        eprintln!("Error: {e:?}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run_import(args: ImportArgs) -> Result<()> {
    let cfg = args.config()?;
    let store: ArcDynStore = Arc::new(
        FileDocumentStore::open(&args.store_dir)
            .await
            .with_context(|| {
                format!("open store {}", args.store_dir.display())
            })?,
    );

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let collection = args.schema.collection.clone();
    let batch_size = cfg.batch_size;
    let mut session =
        ImportSession::start(store, collection.as_str(), cfg, cancel)
            .await
            .with_context(|| format!("start import into {collection}"))?;

    let inputs = sources(&args.schema.documents);
    let (rx, reader) = spawn_reader(inputs, batch_size);
    let summary = settle(session.run(rx).await, reader)
        .await
        .with_context(|| format!("import into {collection}"))?;

    info!(
        collection = %summary.collection,
        documents = summary.documents,
        "done"
    );
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

async fn run_infer(args: SchemaArgs) -> Result<()> {
    let cfg = args.config()?;
    cfg.validate().context("validate config")?;

    let mut acc = SchemaAccumulator::new(
        args.collection.as_str(),
        cfg.detect,
        cfg.on_conflict,
    );

    let inputs = sources(&args.documents);
    let (mut rx, reader) = spawn_reader(inputs, cfg.batch_size);
    let mut inferred = Ok(());
    while let Some(batch) = rx.recv().await {
        inferred = acc
            .evolve(
                &batch,
                &cfg.primary_key,
                &cfg.autogenerate,
                cfg.inference_depth,
            )
            .map(|_| ());
        if inferred.is_err() {
            break;
        }
    }
    settle(inferred, reader).await.context("infer schema")?;

    println!("{}", serde_json::to_string_pretty(acc.schema())?);
    Ok(())
}

fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling import");
            cancel.cancel();
        }
    });
}
