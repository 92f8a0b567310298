//! Durable, incremental result storage.
//!
//! Three newline-delimited files per run: reachable addresses, unreachable
//! addresses and an `address: diagnostic` log. Every record is one
//! `write_all` of a complete line followed by a flush, and counters move only
//! after the flush succeeded, so a killed process leaves at most one torn
//! line behind. [`repair_tail`] removes it on resume.

use std::collections::HashSet;
use std::io::{self, SeekFrom};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::{Stream, StreamExt};
use reachr_common::{CounterSnapshot, ProbeResult, RunCounters, SinkError};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

pub const DEFAULT_REACHABLE_FILE: &str = "unblocked.txt";
pub const DEFAULT_UNREACHABLE_FILE: &str = "blocked.txt";
pub const DEFAULT_DIAGNOSTICS_FILE: &str = "errors.log";

const TAIL_CHUNK: u64 = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub reachable: PathBuf,
    pub unreachable: PathBuf,
    pub diagnostics: PathBuf,
}

impl OutputPaths {
    /// The default file names inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            reachable: dir.join(DEFAULT_REACHABLE_FILE),
            unreachable: dir.join(DEFAULT_UNREACHABLE_FILE),
            diagnostics: dir.join(DEFAULT_DIAGNOSTICS_FILE),
        }
    }

    fn all(&self) -> [&Path; 3] {
        [&self.reachable, &self.unreachable, &self.diagnostics]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Start every file empty.
    #[default]
    Truncate,
    /// Keep earlier records; used when resuming.
    Append,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SinkOptions {
    pub mode: WriteMode,
    /// `sync_data` after every record, not just a flush.
    pub sync: bool,
}

struct Output {
    path: PathBuf,
    file: File,
}

impl Output {
    async fn open(path: &Path, mode: WriteMode) -> Result<Self, SinkError> {
        let open_err = |source| SinkError::Open {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(open_err)?;
        }

        let mut options = OpenOptions::new();
        options.create(true);
        match mode {
            WriteMode::Truncate => options.write(true).truncate(true),
            WriteMode::Append => options.append(true),
        };

        let file = options.open(path).await.map_err(open_err)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    async fn append_line(&mut self, line: &str, sync: bool) -> Result<(), SinkError> {
        let write = async {
            self.file.write_all(line.as_bytes()).await?;
            self.file.flush().await?;
            if sync {
                self.file.sync_data().await?;
            }
            Ok::<(), io::Error>(())
        };

        write.await.map_err(|source| SinkError::Write {
            path: self.path.clone(),
            source,
        })
    }

    async fn close(mut self) -> Result<(), SinkError> {
        let finish = async {
            self.file.flush().await?;
            self.file.sync_all().await
        };
        finish.await.map_err(|source| SinkError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

/// Exclusive owner of one job's output files and its [`RunCounters`].
pub struct ResultSink {
    reachable: Output,
    unreachable: Output,
    diagnostics: Output,
    sync: bool,
    counters: Arc<RunCounters>,
}

impl ResultSink {
    pub async fn open(paths: &OutputPaths, options: SinkOptions) -> Result<Self, SinkError> {
        if options.mode == WriteMode::Append {
            for path in paths.all() {
                let dropped = repair_tail(path).await?;
                if dropped > 0 {
                    warn!("Dropped a torn {dropped}-byte record at the end of {}", path.display());
                }
            }
        }

        Ok(Self {
            reachable: Output::open(&paths.reachable, options.mode).await?,
            unreachable: Output::open(&paths.unreachable, options.mode).await?,
            diagnostics: Output::open(&paths.diagnostics, options.mode).await?,
            sync: options.sync,
            counters: Arc::new(RunCounters::new()),
        })
    }

    /// Read-only handle for observers.
    pub fn counters(&self) -> Arc<RunCounters> {
        Arc::clone(&self.counters)
    }

    /// Persists one result, then counts it.
    pub async fn record(&mut self, result: &ProbeResult) -> Result<(), SinkError> {
        let line = format!("{}\n", result.target);
        if result.reachable {
            self.reachable.append_line(&line, self.sync).await?;
        } else {
            self.unreachable.append_line(&line, self.sync).await?;
        }

        if let Some(diagnostic) = result.diagnostic() {
            let entry = format!("{}: {}\n", result.target, single_line(diagnostic));
            self.diagnostics.append_line(&entry, self.sync).await?;
        }

        self.counters.record(result.reachable);
        Ok(())
    }

    /// Drains `results` into the files. Stops at the first write failure.
    pub async fn consume<S>(&mut self, results: S) -> Result<CounterSnapshot, SinkError>
    where
        S: Stream<Item = ProbeResult>,
    {
        let mut results = std::pin::pin!(results);
        while let Some(result) = results.next().await {
            self.record(&result).await?;
        }
        Ok(self.counters.snapshot())
    }

    pub async fn close(self) -> Result<(), SinkError> {
        self.reachable.close().await?;
        self.unreachable.close().await?;
        self.diagnostics.close().await
    }
}

fn single_line(text: &str) -> String {
    text.split(['\r', '\n'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Truncates `path` after its last newline. Returns the number of bytes
/// removed; a missing file is left alone.
pub async fn repair_tail(path: &Path) -> Result<u64, SinkError> {
    let read_err = |source| SinkError::Read {
        path: path.to_path_buf(),
        source,
    };

    let mut file = match OpenOptions::new().read(true).write(true).open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(read_err(e)),
    };

    let len = file.metadata().await.map_err(read_err)?.len();
    let mut end = len;
    let mut buf = vec![0u8; TAIL_CHUNK as usize];

    let keep = loop {
        if end == 0 {
            break 0;
        }
        let start = end.saturating_sub(TAIL_CHUNK);
        let chunk = &mut buf[..(end - start) as usize];
        file.seek(SeekFrom::Start(start)).await.map_err(read_err)?;
        file.read_exact(chunk).await.map_err(read_err)?;

        if end == len && chunk.last() == Some(&b'\n') {
            return Ok(0);
        }
        if let Some(pos) = chunk.iter().rposition(|&b| b == b'\n') {
            break start + pos as u64 + 1;
        }
        end = start;
    };

    let truncate = async {
        file.set_len(keep).await?;
        file.sync_all().await
    };
    truncate.await.map_err(|source| SinkError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(len - keep)
}

/// Every address already present in the reachable or unreachable list.
pub async fn recorded_addresses(paths: &OutputPaths) -> Result<HashSet<IpAddr>, SinkError> {
    let mut seen = HashSet::new();

    for path in [&paths.reachable, &paths.unreachable] {
        let read_err = |source| SinkError::Read {
            path: path.clone(),
            source,
        };

        let file = match File::open(path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(read_err(e)),
        };

        let mut lines = BufReader::new(file).lines();
        while let Some(line) = lines.next_line().await.map_err(read_err)? {
            match line.trim().parse::<IpAddr>() {
                Ok(addr) => {
                    seen.insert(addr);
                }
                Err(_) if line.trim().is_empty() => {}
                Err(_) => debug!("Ignoring unparseable line in {}: {line:?}", path.display()),
            }
        }
    }

    Ok(seen)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
