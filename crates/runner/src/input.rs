//! Document input: inline JSON arguments, files, or stdin.
//!
//! Every input is read as a stream of JSON values. A top-level array
//! contributes its elements, anything else is one document. Reading happens
//! on a blocking thread that hands fixed-size batches to the import loop
//! through a bounded channel.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde_json::value::RawValue;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use docport_core::Document;

/// Batches buffered between the reader and the import loop.
const CHANNEL_DEPTH: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Stdin,
    File(PathBuf),
    Inline(String),
}

impl InputSource {
    /// `-` is stdin, text starting with `{` or `[` is inline JSON,
    /// anything else a file path.
    pub fn parse(arg: &str) -> Self {
        let trimmed = arg.trim_start();
        if arg == "-" {
            InputSource::Stdin
        } else if trimmed.starts_with('{') || trimmed.starts_with('[') {
            InputSource::Inline(arg.to_string())
        } else {
            InputSource::File(PathBuf::from(arg))
        }
    }

    pub fn label(&self) -> String {
        match self {
            InputSource::Stdin => "<stdin>".to_string(),
            InputSource::File(path) => path.display().to_string(),
            InputSource::Inline(_) => "<argument>".to_string(),
        }
    }

    fn open(&self) -> Result<Box<dyn Read + Send>> {
        Ok(match self {
            InputSource::Stdin => Box::new(BufReader::new(io::stdin())),
            InputSource::File(path) => {
                let file = File::open(path)
                    .with_context(|| format!("open {}", path.display()))?;
                Box::new(BufReader::new(file))
            }
            InputSource::Inline(text) => {
                Box::new(io::Cursor::new(text.clone().into_bytes()))
            }
        })
    }
}

/// Map command line arguments to sources; no arguments means stdin.
pub fn sources(args: &[String]) -> Vec<InputSource> {
    if args.is_empty() {
        vec![InputSource::Stdin]
    } else {
        args.iter().map(|a| InputSource::parse(a)).collect()
    }
}

/// Read every document of `reader`, handing each to `emit`.
///
/// Documents keep the exact bytes they had in the input. Stops early
/// without error when `emit` returns `false`.
pub fn read_documents<R: Read>(
    reader: R,
    origin: &str,
    mut emit: impl FnMut(Document) -> bool,
) -> Result<()> {
    let stream = serde_json::Deserializer::from_reader(reader)
        .into_iter::<Box<RawValue>>();
    for (n, raw) in stream.enumerate() {
        let raw = raw
            .with_context(|| format!("parse JSON value {n} of {origin}"))?;
        let docs = if raw.get().starts_with('[') {
            serde_json::from_str::<Vec<Box<RawValue>>>(raw.get())
                .with_context(|| format!("split array {n} of {origin}"))?
        } else {
            vec![raw]
        };
        for doc in docs {
            if !emit(Document::from_slice(doc.get().as_bytes())) {
                return Ok(());
            }
        }
    }
    Ok(())
}

/// Resolve an import once the session has ended.
///
/// A failed session returns at once: the reader may be parked in a
/// blocking read that only ends at end of input. Reader errors are only
/// reported after a successful session.
pub async fn settle<T, E>(
    imported: Result<T, E>,
    reader: JoinHandle<Result<()>>,
) -> Result<T>
where
    E: std::error::Error + Send + Sync + 'static,
{
    let value = imported?;
    reader
        .await
        .context("input reader task failed")?
        .context("read input documents")?;
    Ok(value)
}

/// Groups documents into batches of at most `size`.
pub struct Batcher {
    size: usize,
    current: Vec<Document>,
}

impl Batcher {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            size,
            current: Vec::with_capacity(size),
        }
    }

    /// Add a document, returning a full batch when one is ready.
    pub fn push(&mut self, doc: Document) -> Option<Vec<Document>> {
        self.current.push(doc);
        if self.current.len() >= self.size {
            Some(std::mem::replace(
                &mut self.current,
                Vec::with_capacity(self.size),
            ))
        } else {
            None
        }
    }

    /// Remaining partial batch, if any.
    pub fn finish(self) -> Option<Vec<Document>> {
        (!self.current.is_empty()).then_some(self.current)
    }
}

/// Read all sources on a blocking thread and send batches to the returned
/// receiver.
///
/// The thread stops quietly when the receiver is dropped.
pub fn spawn_reader(
    sources: Vec<InputSource>,
    batch_size: usize,
) -> (mpsc::Receiver<Vec<Document>>, JoinHandle<Result<()>>) {
    let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);

    let handle = tokio::task::spawn_blocking(move || -> Result<()> {
        let mut batcher = Batcher::new(batch_size);
        let mut open = true;

        for source in &sources {
            let label = source.label();
            let reader = source.open()?;
            read_documents(reader, &label, |doc| {
                if let Some(batch) = batcher.push(doc) {
                    open = tx.blocking_send(batch).is_ok();
                }
                open
            })?;
            debug!(source = %label, "input consumed");
            if !open {
                return Ok(());
            }
        }

        if let Some(batch) = batcher.finish() {
            let _ = tx.blocking_send(batch);
        }
        Ok(())
    });

    (rx, handle)
}
