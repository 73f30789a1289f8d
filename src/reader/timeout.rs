//! Timeout-bounded byte reader.
//!
//! # Responsibilities
//! - Bound every single-byte read from a blocking [`ByteSource`]
//! - Report timeouts distinctly from I/O failures and end-of-stream
//! - Keep the source's position intact across timeouts
//!
//! # Design Decisions
//! - The source lives on one worker thread for the reader's lifetime
//! - Demands are serialized: a new one is issued only when none is pending
//! - A read that times out leaves its demand pending; the next read resumes
//!   waiting on it, so the byte it produces goes to the next caller in order

use std::io;
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::lifecycle::{shutdown_requested, ShutdownSignal};
use crate::reader::source::ByteSource;

type ReadOutcome = io::Result<Option<u8>>;

/// Errors returned by [`TimeoutReader::read`].
#[derive(Debug, Error)]
pub enum ReadError {
    /// No byte arrived before the deadline.
    #[error("read timed out after {0:?}")]
    Timeout(Duration),

    /// The wrapped source failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Shutdown was signalled while waiting.
    #[error("read interrupted by shutdown")]
    Interrupted,
}

impl ReadError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ReadError::Timeout(_))
    }
}

impl From<ReadError> for io::Error {
    fn from(err: ReadError) -> Self {
        match err {
            ReadError::Timeout(after) => {
                io::Error::new(io::ErrorKind::TimedOut, format!("read timed out after {after:?}"))
            }
            ReadError::Io(e) => e,
            ReadError::Interrupted => {
                io::Error::new(io::ErrorKind::Interrupted, "read interrupted by shutdown")
            }
        }
    }
}

/// Reads single bytes from a blocking source with a per-read deadline.
///
/// The source is moved onto a dedicated worker thread. The thread exits when
/// the reader is dropped, or after the source reports end-of-stream. A worker
/// blocked inside the source exits once the source unblocks, which for a
/// socket happens when the owning transport is closed.
#[derive(Debug)]
pub struct TimeoutReader {
    timeout: Duration,
    demands: mpsc::UnboundedSender<()>,
    results: mpsc::UnboundedReceiver<ReadOutcome>,
    pending: bool,
    eof: bool,
    shutdown: Option<ShutdownSignal>,
}

impl TimeoutReader {
    /// Start a reader over `source` with an initial timeout.
    pub fn spawn<S: ByteSource>(source: S, timeout: Duration) -> io::Result<Self> {
        Self::spawn_named(source, timeout, "timeout-reader".to_string())
    }

    /// Same as [`TimeoutReader::spawn`] with a custom worker thread name.
    pub fn spawn_named<S: ByteSource>(
        source: S,
        timeout: Duration,
        name: String,
    ) -> io::Result<Self> {
        let (demand_tx, demand_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = mpsc::unbounded_channel();

        thread::Builder::new()
            .name(name)
            .spawn(move || run_worker(source, demand_rx, result_tx))?;

        Ok(Self {
            timeout,
            demands: demand_tx,
            results: result_rx,
            pending: false,
            eof: false,
            shutdown: None,
        })
    }

    /// Make reads fail with [`ReadError::Interrupted`] once `signal` fires.
    pub fn with_shutdown(mut self, signal: ShutdownSignal) -> Self {
        self.set_shutdown(signal);
        self
    }

    pub fn set_shutdown(&mut self, signal: ShutdownSignal) {
        self.shutdown = Some(signal);
    }

    /// Replace the bound for subsequent reads.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Currently configured bound.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether a demand from an earlier, abandoned read is still outstanding.
    pub fn has_pending(&self) -> bool {
        self.pending
    }

    /// Read the next byte, `Ok(None)` on end-of-stream.
    ///
    /// The deadline is taken from the timeout configured when the call starts.
    pub async fn read(&mut self) -> Result<Option<u8>, ReadError> {
        if self.eof {
            return Ok(None);
        }

        if !self.pending {
            self.demands.send(()).map_err(|_| worker_gone())?;
            self.pending = true;
        }

        let timeout = self.timeout;
        let outcome = tokio::select! {
            biased;
            _ = shutdown_requested(&mut self.shutdown) => return Err(ReadError::Interrupted),
            res = tokio::time::timeout(timeout, self.results.recv()) => res,
        };

        match outcome {
            Err(_elapsed) => Err(ReadError::Timeout(timeout)),
            Ok(None) => {
                self.pending = false;
                Err(ReadError::Io(worker_gone()))
            }
            Ok(Some(result)) => {
                self.pending = false;
                match result {
                    Ok(None) => {
                        self.eof = true;
                        Ok(None)
                    }
                    Ok(Some(byte)) => Ok(Some(byte)),
                    Err(e) => Err(ReadError::Io(e)),
                }
            }
        }
    }
}

fn worker_gone() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "reader worker exited")
}

fn run_worker<S: ByteSource>(
    mut source: S,
    mut demands: mpsc::UnboundedReceiver<()>,
    results: mpsc::UnboundedSender<ReadOutcome>,
) {
    while demands.blocking_recv().is_some() {
        let outcome = source.read_byte();
        let eof = matches!(outcome, Ok(None));
        if results.send(outcome).is_err() || eof {
            break;
        }
    }
    tracing::trace!("Reader worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use std::collections::VecDeque;
    use std::time::Instant;

    /// Yields scripted steps: a byte after an optional delay, or an error.
    struct ScriptedSource {
        steps: VecDeque<Step>,
    }

    enum Step {
        Byte(u8, Duration),
        Fail(io::ErrorKind),
    }

    impl ScriptedSource {
        fn bytes(data: &[u8]) -> Self {
            Self {
                steps: data.iter().map(|b| Step::Byte(*b, Duration::ZERO)).collect(),
            }
        }

        fn steps(steps: Vec<Step>) -> Self {
            Self {
                steps: steps.into(),
            }
        }
    }

    impl ByteSource for ScriptedSource {
        fn read_byte(&mut self) -> io::Result<Option<u8>> {
            match self.steps.pop_front() {
                Some(Step::Byte(b, delay)) => {
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                    Ok(Some(b))
                }
                Some(Step::Fail(kind)) => Err(io::Error::new(kind, "scripted failure")),
                None => Ok(None),
            }
        }
    }

    #[tokio::test]
    async fn returns_bytes_in_source_order() {
        let data: Vec<u8> = (0..=255u8).chain(b"GET / HTTP/1.1\r\n".iter().copied()).collect();
        let mut reader =
            TimeoutReader::spawn(ScriptedSource::bytes(&data), Duration::from_secs(5)).unwrap();

        let mut seen = Vec::new();
        while let Some(b) = reader.read().await.unwrap() {
            seen.push(b);
        }
        assert_eq!(seen, data);
    }

    #[tokio::test]
    async fn end_of_stream_is_sticky() {
        let mut reader =
            TimeoutReader::spawn(ScriptedSource::bytes(b"a"), Duration::from_secs(1)).unwrap();
        assert_eq!(reader.read().await.unwrap(), Some(b'a'));
        assert_eq!(reader.read().await.unwrap(), None);
        assert_eq!(reader.read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn slow_source_times_out_near_deadline() {
        let source = ScriptedSource::steps(vec![Step::Byte(b'x', Duration::from_millis(500))]);
        let mut reader = TimeoutReader::spawn(source, Duration::from_millis(50)).unwrap();

        let start = Instant::now();
        let err = reader.read().await.unwrap_err();
        let elapsed = start.elapsed();

        assert!(err.is_timeout(), "expected timeout, got {err:?}");
        assert!(elapsed >= Duration::from_millis(50), "fired early: {elapsed:?}");
        assert!(elapsed < Duration::from_millis(250), "overshoot too large: {elapsed:?}");
    }

    #[tokio::test]
    async fn fast_source_never_times_out() {
        for timeout in [
            Duration::from_millis(1),
            Duration::from_millis(10),
            Duration::from_millis(100),
            Duration::from_secs(10),
        ] {
            let mut reader = TimeoutReader::spawn(ScriptedSource::bytes(b"ok"), timeout).unwrap();
            assert_eq!(reader.read().await.unwrap(), Some(b'o'), "timeout {timeout:?}");
            assert_eq!(reader.read().await.unwrap(), Some(b'k'), "timeout {timeout:?}");
        }
    }

    #[tokio::test]
    async fn new_timeout_applies_to_next_read() {
        let source = ScriptedSource::steps(vec![
            Step::Byte(b'a', Duration::ZERO),
            Step::Byte(b'b', Duration::from_millis(200)),
            Step::Byte(b'c', Duration::ZERO),
        ]);
        let mut reader = TimeoutReader::spawn(source, Duration::from_secs(2)).unwrap();

        assert_eq!(reader.read().await.unwrap(), Some(b'a'));
        assert_eq!(reader.timeout(), Duration::from_secs(2));

        reader.set_timeout(Duration::from_millis(20));
        assert_eq!(reader.timeout(), Duration::from_millis(20));
        assert!(reader.read().await.unwrap_err().is_timeout());

        reader.set_timeout(Duration::from_secs(2));
        assert_eq!(reader.read().await.unwrap(), Some(b'b'));
        assert_eq!(reader.read().await.unwrap(), Some(b'c'));
    }

    #[tokio::test]
    async fn timed_out_byte_goes_to_next_read_without_loss() {
        let source = ScriptedSource::steps(vec![
            Step::Byte(b'1', Duration::from_millis(150)),
            Step::Byte(b'2', Duration::ZERO),
        ]);
        let mut reader = TimeoutReader::spawn(source, Duration::from_millis(30)).unwrap();

        assert!(reader.read().await.unwrap_err().is_timeout());
        assert!(reader.has_pending());
        assert!(reader.read().await.unwrap_err().is_timeout());

        reader.set_timeout(Duration::from_secs(2));
        assert_eq!(reader.read().await.unwrap(), Some(b'1'));
        assert!(!reader.has_pending());
        assert_eq!(reader.read().await.unwrap(), Some(b'2'));
        assert_eq!(reader.read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn source_failure_surfaces_as_io_error() {
        let source = ScriptedSource::steps(vec![
            Step::Fail(io::ErrorKind::ConnectionReset),
            Step::Byte(b'z', Duration::ZERO),
        ]);
        let mut reader = TimeoutReader::spawn(source, Duration::from_secs(1)).unwrap();

        match reader.read().await {
            Err(ReadError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::ConnectionReset),
            other => panic!("expected I/O error, got {other:?}"),
        }
        assert_eq!(reader.read().await.unwrap(), Some(b'z'));
    }

    #[tokio::test]
    async fn shutdown_interrupts_waiting_read() {
        let shutdown = Shutdown::new();
        let source = ScriptedSource::steps(vec![Step::Byte(b'x', Duration::from_millis(300))]);
        let mut reader = TimeoutReader::spawn(source, Duration::from_secs(5))
            .unwrap()
            .with_shutdown(shutdown.subscribe());

        let trigger = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            shutdown.trigger();
        };
        let (result, _) = tokio::join!(reader.read(), trigger);
        assert!(matches!(result, Err(ReadError::Interrupted)));
    }

    #[test]
    fn errors_map_to_io_kinds() {
        let timeout: io::Error = ReadError::Timeout(Duration::from_millis(5)).into();
        assert_eq!(timeout.kind(), io::ErrorKind::TimedOut);

        let interrupted: io::Error = ReadError::Interrupted.into();
        assert_eq!(interrupted.kind(), io::ErrorKind::Interrupted);

        let reset: io::Error =
            ReadError::Io(io::Error::from(io::ErrorKind::ConnectionReset)).into();
        assert_eq!(reset.kind(), io::ErrorKind::ConnectionReset);
    }
}
