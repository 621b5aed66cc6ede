//! Append-only command log
//!
//! Every mutating command that succeeds is written as one canonical line.
//! Replaying the file through the executor on startup rebuilds the key space.

use crate::error::{Error, Result};
use crate::protocol::{CommandExecutor, ExecMode, Response};
use crate::storage::Database;
use crossbeam_channel::{select, Sender};
use memchr::memchr_iter;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AofMode {
    /// Records are rejected; the file may be read for replay
    ReadOnly,
    /// Records are buffered and appended to the end of the file
    Append,
}

struct AofState {
    mode: AofMode,
    // `None` in `Append` mode after a failed write; reopened on next use
    writer: Option<BufWriter<File>>,
}

/// Open `path` for appending, first terminating a torn trailing record so it
/// cannot absorb the next one.
fn open_writer(path: &Path) -> io::Result<BufWriter<File>> {
    let mut file = OpenOptions::new().read(true).append(true).open(path)?;
    if file.metadata()?.len() > 0 {
        let mut last = [0u8; 1];
        file.seek(SeekFrom::End(-1))?;
        file.read_exact(&mut last)?;
        if last[0] != b'\n' {
            warn!("AOF {} ends mid-record, terminating it", path.display());
            file.write_all(b"\n")?;
        }
    }
    Ok(BufWriter::new(file))
}

/// Handle to the log file.
///
/// `append` and `flush` serialize on one mutex, so the flusher thread and the
/// event loop never interleave partial records.
pub struct Aof {
    path: PathBuf,
    flush_interval: Duration,
    state: Mutex<AofState>,
}

/// Outcome of replaying the log into a database
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStats {
    pub applied: usize,
    pub skipped: usize,
}

impl Aof {
    /// Open (creating if needed) the log at `path` in read-only mode
    pub fn open(path: impl AsRef<Path>, flush_interval: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::Persistence(format!("cannot open {}: {}", path.display(), e)))?;

        debug!("Opened AOF at {}", path.display());

        Ok(Self {
            path,
            flush_interval,
            state: Mutex::new(AofState {
                mode: AofMode::ReadOnly,
                writer: None,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    pub fn mode(&self) -> AofMode {
        self.lock().mode
    }

    fn lock(&self) -> MutexGuard<'_, AofState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Switch between replay and logging.
    ///
    /// Leaving `Append` flushes what is buffered and releases the writer.
    pub fn set_mode(&self, mode: AofMode) -> Result<()> {
        let mut state = self.lock();
        if state.mode == mode {
            return Ok(());
        }

        match mode {
            AofMode::Append => {
                state.writer = Some(open_writer(&self.path)?);
            }
            AofMode::ReadOnly => {
                if let Some(mut writer) = state.writer.take() {
                    writer.flush()?;
                    writer.get_ref().sync_data()?;
                }
            }
        }

        state.mode = mode;
        Ok(())
    }

    /// Every record currently in the file, in write order
    pub fn read_lines(&self) -> Result<Vec<String>> {
        {
            let mut state = self.lock();
            if let Some(writer) = state.writer.as_mut() {
                writer.flush()?;
            }
        }

        let data = fs::read(&self.path)?;
        let mut lines = Vec::new();
        let mut start = 0;
        for end in memchr_iter(b'\n', &data).chain(std::iter::once(data.len())) {
            let raw = &data[start..end.max(start)];
            start = end + 1;

            let line = std::str::from_utf8(raw).map_err(|_| {
                Error::Persistence(format!(
                    "record {} in {} is not valid UTF-8",
                    lines.len() + 1,
                    self.path.display()
                ))
            })?;
            let line = line.strip_suffix('\r').unwrap_or(line);
            if !line.trim().is_empty() {
                lines.push(line.to_string());
            }
        }
        Ok(lines)
    }

    /// Buffer one record. It reaches the disk on the next [`Aof::flush`].
    ///
    /// A failed write discards the writer along with whatever it still
    /// buffered; the next call reopens the file.
    pub fn append(&self, record: &str) -> Result<()> {
        let mut line = Vec::with_capacity(record.len() + 1);
        line.extend_from_slice(record.as_bytes());
        line.push(b'\n');

        let mut state = self.lock();
        if state.mode != AofMode::Append {
            return Err(Error::Persistence("AOF is read-only".to_string()));
        }
        let writer = self.writer(&mut state)?;
        if let Err(e) = writer.write_all(&line) {
            self.discard_writer(&mut state);
            return Err(e.into());
        }
        Ok(())
    }

    /// Push buffered records to the file and sync them
    pub fn flush(&self) -> Result<()> {
        let mut state = self.lock();
        if state.mode != AofMode::Append {
            return Ok(());
        }
        let writer = self.writer(&mut state)?;
        if let Err(e) = writer.flush().and_then(|()| writer.get_ref().sync_data()) {
            self.discard_writer(&mut state);
            return Err(e.into());
        }
        Ok(())
    }

    fn writer<'a>(&self, state: &'a mut AofState) -> Result<&'a mut BufWriter<File>> {
        if state.writer.is_none() {
            let writer = open_writer(&self.path).map_err(|e| {
                Error::Persistence(format!("cannot reopen {}: {}", self.path.display(), e))
            })?;
            debug!("Reopened AOF writer for {}", self.path.display());
            state.writer = Some(writer);
        }
        state
            .writer
            .as_mut()
            .ok_or_else(|| Error::Persistence("AOF writer unavailable".to_string()))
    }

    fn discard_writer(&self, state: &mut AofState) {
        if let Some(writer) = state.writer.take() {
            let (_, unwritten) = writer.into_parts();
            warn!(
                "Discarding AOF writer for {} after a failed write ({} buffered bytes lost)",
                self.path.display(),
                unwritten.map_or(0, |buf| buf.len())
            );
        }
    }

    /// Flush everything and stop accepting records
    pub fn close(&self) -> Result<()> {
        self.set_mode(AofMode::ReadOnly)?;
        debug!("Closed AOF at {}", self.path.display());
        Ok(())
    }

    /// Re-execute every record against `db`.
    ///
    /// Runs in replay mode, so nothing is appended while reading. A record the
    /// executor rejects is skipped with a warning.
    pub fn replay(&self, db: &mut Database, executor: &CommandExecutor) -> Result<ReplayStats> {
        self.set_mode(AofMode::ReadOnly)?;

        let mut stats = ReplayStats::default();
        for (lineno, line) in self.read_lines()?.iter().enumerate() {
            let response = executor.execute_line(db, line, ExecMode::Replay);
            if let Response::Err(msg) = response {
                warn!("Skipping AOF record {} ({:?}): {}", lineno + 1, line, msg);
                stats.skipped += 1;
            } else {
                stats.applied += 1;
            }
        }

        info!(
            "Replayed {} records from {} ({} skipped)",
            stats.applied,
            self.path.display(),
            stats.skipped
        );
        Ok(stats)
    }
}

impl Drop for Aof {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!("Failed to close AOF {}: {}", self.path.display(), e);
        }
    }
}

/// Background thread flushing an [`Aof`] on its interval
pub struct AofFlusher {
    stop: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl AofFlusher {
    pub fn spawn(aof: Arc<Aof>) -> Result<Self> {
        let (stop, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let ticker = crossbeam_channel::tick(aof.flush_interval());

        let handle = thread::Builder::new()
            .name("aof-flusher".to_string())
            .spawn(move || {
                debug!("AOF flusher started ({:?})", aof.flush_interval());
                loop {
                    select! {
                        recv(ticker) -> _ => {
                            if let Err(e) = aof.flush() {
                                error!("Failed to flush AOF {}: {}", aof.path().display(), e);
                            }
                        }
                        recv(stop_rx) -> _ => break,
                    }
                }
                debug!("AOF flusher stopped");
            })?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Stop the thread and wait for it to exit
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.stop.send(());
            let _ = handle.join();
        }
    }
}

impl Drop for AofFlusher {
    fn drop(&mut self) {
        self.shutdown();
    }
}
