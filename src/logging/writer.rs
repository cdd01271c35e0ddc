//! Bounded async writer for log streams
//!
//! This module decouples many producers from one slow sink:
//! - Non-blocking enqueue into a fixed-capacity buffer (drop newest when full)
//! - One dedicated flush thread per writer, draining every `flush_interval`
//! - Dropped records counted and reported as a `log_miss` record
//! - Sink write failures counted and swallowed
//!
//! The buffer is a bounded `tokio::sync::mpsc` channel. The consumer only
//! drains on ticks, so the channel itself is the ring buffer.

use super::record::LogRecord;
use crate::metrics;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};

/// Default number of buffered records (about 1GB at ~1KB per record)
pub const DEFAULT_CAPACITY: usize = 1_000_000;

/// Largest accepted buffer capacity
pub const MAX_CAPACITY: usize = 1 << 26;

/// Default drain period
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(100);

/// Bytes accumulated before a drain issues a sink write
const WRITE_CHUNK_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct WriterConfig {
    pub capacity: usize,
    pub flush_interval: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

/// Where a writer reports its dropped-record count
#[derive(Clone)]
pub enum MissedRoute {
    /// Append the report to this writer's own sink after each drain
    Inline,
    /// Enqueue the report into another writer
    Forward(WriterHandle),
    /// Count only; never write a report
    Discard,
}

/// Lifecycle of a writer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Stopped,
    Running,
    Draining,
}

impl WriterState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::Draining,
            _ => Self::Stopped,
        }
    }
}

/// Snapshot of a writer's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub enqueued: u64,
    pub flushed: u64,
    pub dropped: u64,
    pub write_errors: u64,
    /// Drops not yet reported by a `log_miss` record
    pub pending_missed: u64,
}

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    flushed: AtomicU64,
    dropped: AtomicU64,
    write_errors: AtomicU64,
    missed: AtomicU64,
}

/// Producer side of a writer
///
/// Cheap to clone; every clone feeds the same buffer.
#[derive(Clone)]
pub struct WriterHandle {
    name: &'static str,
    sender: mpsc::Sender<Vec<u8>>,
    counters: Arc<Counters>,
}

impl WriterHandle {
    /// Queue one encoded line (non-blocking)
    ///
    /// When the buffer is full the line is dropped and counted.
    pub fn enqueue(&self, line: Vec<u8>) {
        match self.sender.try_send(line) {
            Ok(()) => {
                self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.counters.missed.fetch_add(1, Ordering::Relaxed);
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                metrics::record_log_dropped(self.name);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// False once the writer has stopped
    pub fn is_accepting(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Number of records waiting for the next drain
    pub fn pending(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub fn stats(&self) -> WriterStats {
        WriterStats {
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            flushed: self.counters.flushed.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            write_errors: self.counters.write_errors.load(Ordering::Relaxed),
            pending_missed: self.counters.missed.load(Ordering::Relaxed),
        }
    }
}

struct Consumer {
    shutdown: oneshot::Sender<()>,
    thread: JoinHandle<()>,
}

/// A bounded buffer plus the thread that drains it into a sink
///
/// # Example
///
/// ```ignore
/// let writer = AsyncWriter::spawn("application", file, WriterConfig::default(), MissedRoute::Inline)?;
/// writer.handle().enqueue(line);  // Non-blocking
/// writer.stop();                  // Final drain, then returns
/// ```
pub struct AsyncWriter {
    handle: WriterHandle,
    state: Arc<AtomicU8>,
    consumer: Mutex<Option<Consumer>>,
}

impl AsyncWriter {
    /// Start a writer draining into `sink` on its own thread
    pub fn spawn<W>(
        name: &'static str,
        sink: W,
        config: WriterConfig,
        route: MissedRoute,
    ) -> io::Result<Self>
    where
        W: Write + Send + 'static,
    {
        let capacity = config.capacity.clamp(1, MAX_CAPACITY);
        let (sender, receiver) = mpsc::channel(capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let counters = Arc::new(Counters::default());
        let state = Arc::new(AtomicU8::new(WriterState::Running as u8));

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;

        let drain = Drain {
            name,
            sink: Box::new(sink),
            receiver,
            route,
            counters: counters.clone(),
            batch: Vec::with_capacity(WRITE_CHUNK_BYTES),
            batch_lines: 0,
            per_tick_limit: capacity,
        };

        let thread_state = state.clone();
        let flush_interval = config.flush_interval;
        let thread = std::thread::Builder::new()
            .name(format!("log-flush-{}", name))
            .spawn(move || {
                runtime.block_on(flush_loop(drain, shutdown_rx, flush_interval, thread_state));
            })?;

        tracing::debug!(
            stream = name,
            capacity = capacity,
            flush_interval_ms = flush_interval.as_millis() as u64,
            "Log writer started"
        );

        Ok(Self {
            handle: WriterHandle {
                name,
                sender,
                counters,
            },
            state,
            consumer: Mutex::new(Some(Consumer {
                shutdown: shutdown_tx,
                thread,
            })),
        })
    }

    pub fn handle(&self) -> &WriterHandle {
        &self.handle
    }

    pub fn state(&self) -> WriterState {
        WriterState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn stats(&self) -> WriterStats {
        self.handle.stats()
    }

    /// Stop accepting records, drain everything buffered and wait for the
    /// final sink write. Calling it again is a no-op.
    pub fn stop(&self) {
        let consumer = match self.consumer.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        let Some(consumer) = consumer else {
            return;
        };

        let _ = consumer.shutdown.send(());
        if consumer.thread.join().is_err() {
            tracing::error!(stream = self.handle.name, "Log flush thread panicked");
        }
        self.state.store(WriterState::Stopped as u8, Ordering::Release);
    }
}

impl Drop for AsyncWriter {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Consumer-side state, owned by the flush thread
struct Drain {
    name: &'static str,
    sink: Box<dyn Write + Send>,
    receiver: mpsc::Receiver<Vec<u8>>,
    route: MissedRoute,
    counters: Arc<Counters>,
    batch: Vec<u8>,
    batch_lines: u64,
    per_tick_limit: usize,
}

async fn flush_loop(
    mut drain: Drain,
    mut shutdown: oneshot::Receiver<()>,
    flush_interval: Duration,
    state: Arc<AtomicU8>,
) {
    // First tick one period out so records queued right after start are held
    let mut ticker = tokio::time::interval_at(Instant::now() + flush_interval, flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let limit = drain.per_tick_limit;
                drain.drain(limit);
            }
            // Resolves on stop() or when the writer is dropped
            _ = &mut shutdown => break,
        }
    }

    state.store(WriterState::Draining as u8, Ordering::Release);
    drain.receiver.close();
    drain.drain(usize::MAX);

    tracing::debug!(stream = drain.name, "Log writer stopped");
}

impl Drain {
    /// Move up to `limit` buffered lines into the sink, in arrival order
    fn drain(&mut self, limit: usize) {
        let mut taken = 0;
        while taken < limit {
            match self.receiver.try_recv() {
                Ok(line) => {
                    self.push(&line);
                    taken += 1;
                }
                Err(_) => break,
            }
        }

        self.report_missed();
        self.write_batch();
    }

    fn push(&mut self, line: &[u8]) {
        self.batch.extend_from_slice(line);
        self.batch_lines += 1;
        if self.batch.len() >= WRITE_CHUNK_BYTES {
            self.write_batch();
        }
    }

    fn report_missed(&mut self) {
        let missed = self.counters.missed.swap(0, Ordering::Relaxed);
        if missed == 0 {
            return;
        }

        let line = match LogRecord::missed(self.name, missed).encode() {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(stream = self.name, error = %e, "Failed to encode log_miss record");
                return;
            }
        };

        match &self.route {
            MissedRoute::Inline => self.push(&line),
            MissedRoute::Forward(target) => target.enqueue(line),
            MissedRoute::Discard => {}
        }
    }

    fn write_batch(&mut self) {
        if self.batch.is_empty() {
            return;
        }

        let lines = self.batch_lines;
        let result = self
            .sink
            .write_all(&self.batch)
            .and_then(|_| self.sink.flush());

        match result {
            Ok(()) => {
                self.counters.flushed.fetch_add(lines, Ordering::Relaxed);
                metrics::record_log_flushed(self.name, lines);
            }
            Err(e) => {
                self.counters.write_errors.fetch_add(1, Ordering::Relaxed);
                metrics::record_log_write_error(self.name);
                tracing::warn!(
                    stream = self.name,
                    error = %e,
                    lines = lines,
                    "Failed to write log batch"
                );
            }
        }

        self.batch.clear();
        self.batch_lines = 0;
    }
}
