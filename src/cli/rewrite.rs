//! `cssurl rewrite`: collect stylesheets, rewrite them, write the results.
//!
//! ```text
//! paths ──jwalk──> inputs ──┬─ buffer: rayon, one read per file
//!                           └─ stream: tokio task + reader thread per file
//!                                      │
//!              out dir (relative layout kept) or stdout (input order)
//! ```

use anyhow::{Context, Result, bail};
use jwalk::WalkDir;
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;

use cssurl::config::CssurlConfig;
use cssurl::document::{Contents, Document};
use cssurl::error::RewriteError;
use cssurl::logger::{ProgressLine, report_error};
use cssurl::pipeline::{CHUNK_SIZE, ChunkSender, ContentStream, Rewriter};
use cssurl::{debug, log};

use super::RewriteArgs;

/// Chunks buffered between a reader thread and its document.
const STREAM_CAPACITY: usize = 4;

// ============================================================================
// Inputs
// ============================================================================

/// One stylesheet to process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    /// Absolute path of the file
    pub path: PathBuf,
    /// Directory the output layout is relative to
    pub base: PathBuf,
}

impl Input {
    /// Document for this input, with paths shown relative to `cwd`.
    fn document(&self, cwd: &Path) -> Document {
        let path = self.path.strip_prefix(cwd).unwrap_or(&self.path);
        let base = self.base.strip_prefix(cwd).unwrap_or(&self.base);
        Document::new(path, base, cwd)
    }
}

fn is_stylesheet(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("css"))
}

/// Expand `paths` into stylesheets.
///
/// A file is its own input with its directory as base. A directory
/// contributes every `*.css` below it, skipping anything under `skip` (the
/// output directory). Duplicates are dropped, first occurrence wins.
pub fn collect_inputs(paths: &[PathBuf], cwd: &Path, skip: Option<&Path>) -> Result<Vec<Input>> {
    let mut seen = FxHashSet::default();
    let mut inputs = Vec::new();

    for path in paths {
        let path = cwd.join(path);
        if path.is_file() {
            let base = path.parent().map(Path::to_path_buf).unwrap_or_else(|| cwd.to_path_buf());
            if seen.insert(path.clone()) {
                inputs.push(Input { path, base });
            }
        } else if path.is_dir() {
            let mut found: Vec<_> = WalkDir::new(&path)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
                .map(|e| e.path())
                .filter(|p| is_stylesheet(p))
                .filter(|p| skip.is_none_or(|dir| !p.starts_with(dir)))
                .collect();
            found.sort();
            for file in found {
                if seen.insert(file.clone()) {
                    inputs.push(Input {
                        path: file,
                        base: path.clone(),
                    });
                }
            }
        } else {
            bail!("'{}' does not exist", path.display());
        }
    }

    Ok(inputs)
}

// ============================================================================
// Outcomes
// ============================================================================

/// A processed stylesheet.
#[derive(Debug)]
struct Output {
    /// URLs rewritten
    count: usize,
    /// Contents to print, when not written to an output directory
    stdout: Option<Vec<u8>>,
}

/// A stylesheet that could not be processed.
#[derive(Debug)]
struct Failure {
    path: PathBuf,
    detail: String,
}

impl Failure {
    fn io(path: &Path, err: io::Error) -> Self {
        Self {
            path: path.to_path_buf(),
            detail: err.to_string(),
        }
    }
}

impl From<RewriteError> for Failure {
    fn from(err: RewriteError) -> Self {
        Self {
            path: err.path().to_path_buf(),
            detail: err.detail(),
        }
    }
}

/// Where one document's output goes.
enum Sink {
    File(PathBuf, BufWriter<File>),
    Memory(Vec<u8>),
}

impl Sink {
    fn open(out: Option<&Path>, relative: &Path) -> Result<Self, Failure> {
        let Some(dir) = out else {
            return Ok(Self::Memory(Vec::new()));
        };
        let target = dir.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|err| Failure::io(parent, err))?;
        }
        let file = File::create(&target).map_err(|err| Failure::io(&target, err))?;
        Ok(Self::File(target, BufWriter::new(file)))
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), Failure> {
        match self {
            Self::File(target, writer) => {
                writer.write_all(bytes).map_err(|err| Failure::io(target, err))
            }
            Self::Memory(buf) => {
                buf.extend_from_slice(bytes);
                Ok(())
            }
        }
    }

    fn finish(self) -> Result<Option<Vec<u8>>, Failure> {
        match self {
            Self::File(target, mut writer) => {
                writer.flush().map_err(|err| Failure::io(&target, err))?;
                debug!("rewrite"; "wrote {}", target.display());
                Ok(None)
            }
            Self::Memory(buf) => Ok(Some(buf)),
        }
    }
}

// ============================================================================
// Buffer mode
// ============================================================================

fn buffer_one(
    rewriter: &Rewriter,
    input: &Input,
    cwd: &Path,
    out: Option<&Path>,
) -> Result<Output, Failure> {
    let bytes = fs::read(&input.path).map_err(|err| Failure::io(&input.path, err))?;
    let mut document = input.document(cwd).with_buffer(bytes);
    let count = rewriter.rewrite_buffer(&mut document)?;

    let relative = document.relative();
    let path = document.path.clone();
    document
        .materialize()
        .map_err(|source| RewriteError::Serialize {
            path: path.clone(),
            source,
        })?;
    let Contents::Buffer(text) = document.take_contents() else {
        return Err(RewriteError::Empty(path).into());
    };

    let mut sink = Sink::open(out, &relative)?;
    sink.write(&text)?;
    Ok(Output {
        count,
        stdout: sink.finish()?,
    })
}

fn buffer_all(
    rewriter: &Rewriter,
    inputs: &[Input],
    cwd: &Path,
    out: Option<&Path>,
) -> Vec<Result<Output, Failure>> {
    let progress = ProgressLine::new(&[("buffer", inputs.len())]);
    let outcomes = inputs
        .par_iter()
        .map(|input| {
            let outcome = buffer_one(rewriter, input, cwd, out);
            progress.inc("buffer");
            outcome
        })
        .collect();
    progress.finish();
    outcomes
}

// ============================================================================
// Stream mode
// ============================================================================

/// Feed `path` into `tx` chunk by chunk from a plain thread.
fn spawn_reader(path: PathBuf, tx: ChunkSender) {
    std::thread::spawn(move || {
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(err) => return tx.blocking_fail(err),
        };
        let mut buf = vec![0; CHUNK_SIZE];
        loop {
            match file.read(&mut buf) {
                // dropping `tx` ends the stream
                Ok(0) => return,
                Ok(n) => {
                    if tx.blocking_send(&buf[..n]).is_err() {
                        return;
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return tx.blocking_fail(err),
            }
        }
    });
}

async fn stream_one(
    rewriter: Rewriter,
    input: Input,
    cwd: PathBuf,
    out: Option<PathBuf>,
) -> Result<Output, Failure> {
    let (tx, stream) = ContentStream::channel(STREAM_CAPACITY);
    spawn_reader(input.path.clone(), tx);

    let mut document = input.document(&cwd).with_stream(stream);
    let count = rewriter.rewrite(&mut document).await?;

    let relative = document.relative();
    let path = document.path.clone();
    document
        .materialize()
        .map_err(|source| RewriteError::Serialize {
            path: path.clone(),
            source,
        })?;
    let mut stream = match document.take_contents() {
        Contents::Stream(stream) => stream,
        Contents::Buffer(bytes) => ContentStream::from_bytes(bytes),
        _ => return Err(RewriteError::Empty(path).into()),
    };

    let mut sink = Sink::open(out.as_deref(), &relative)?;
    while let Some(chunk) = stream
        .next_chunk()
        .await
        .map_err(|source| RewriteError::Stream {
            path: path.clone(),
            source,
        })?
    {
        sink.write(&chunk)?;
    }
    Ok(Output {
        count,
        stdout: sink.finish()?,
    })
}

fn stream_all(
    rewriter: &Rewriter,
    inputs: &[Input],
    cwd: &Path,
    out: Option<&Path>,
) -> Result<Vec<Result<Output, Failure>>> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .build()
        .context("failed to start async runtime")?;

    let workers = std::thread::available_parallelism().map_or(4, |n| n.get());
    let permits = Arc::new(Semaphore::new(workers * 2));

    runtime.block_on(async {
        let handles: Vec<_> = inputs
            .iter()
            .map(|input| {
                let rewriter = rewriter.clone();
                let input = input.clone();
                let cwd = cwd.to_path_buf();
                let out = out.map(Path::to_path_buf);
                let permits = permits.clone();
                tokio::spawn(async move {
                    // bounds open files and reader threads
                    let _permit = permits.acquire_owned().await;
                    stream_one(rewriter, input, cwd, out).await
                })
            })
            .collect();

        let progress = ProgressLine::new(&[("stream", handles.len())]);
        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => std::panic::resume_unwind(err.into_panic()),
            }
            progress.inc("stream");
        }
        progress.finish();
        Ok(outcomes)
    })
}

// ============================================================================
// Entry
// ============================================================================

/// Run `cssurl rewrite`.
pub fn run(config: &CssurlConfig, args: &RewriteArgs) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to get current working directory")?;
    let paths = if args.paths.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        args.paths.clone()
    };

    let out = config.output.dir.as_deref();
    let inputs = collect_inputs(&paths, &cwd, out)?;
    if inputs.is_empty() {
        log!("rewrite"; "no stylesheets found");
        return Ok(());
    }

    let rewriter = config.to_rewriter();
    debug!("rewrite"; "{:?}", rewriter);
    let outcomes = if config.is_stream() {
        stream_all(&rewriter, &inputs, &cwd, out)?
    } else {
        buffer_all(&rewriter, &inputs, &cwd, out)
    };

    emit(outcomes, inputs.len())
}

/// Print stdout results in input order and report every failure.
fn emit(outcomes: Vec<Result<Output, Failure>>, total: usize) -> Result<()> {
    let mut stdout = io::stdout().lock();
    let mut urls = 0;
    let mut failed = 0;

    for outcome in outcomes {
        match outcome {
            Ok(output) => {
                urls += output.count;
                if let Some(bytes) = output.stdout {
                    stdout.write_all(&bytes).context("failed to write to stdout")?;
                }
            }
            Err(failure) => {
                failed += 1;
                report_error(
                    &format!("failed to rewrite {}", failure.path.display()),
                    &failure.detail,
                );
            }
        }
    }
    stdout.flush().context("failed to write to stdout")?;

    log!("rewrite"; "{} urls in {} stylesheets", urls, total - failed);
    if failed > 0 {
        bail!("{} of {} stylesheets failed", failed, total);
    }
    Ok(())
}
