//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use keepalive_server::net::{Close, Split, Transport};
use keepalive_server::reader::ByteSource;
use keepalive_server::{Request, Response};

/// Client end of an in-memory transport.
pub struct MemoryClient {
    tx: Option<mpsc::Sender<Vec<u8>>>,
    output: Arc<Mutex<Vec<u8>>>,
    closes: Arc<AtomicUsize>,
}

impl MemoryClient {
    pub fn send(&self, bytes: &[u8]) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(bytes.to_vec());
        }
    }

    /// Close the client's write direction; the server sees end-of-stream.
    pub fn hang_up(&mut self) {
        self.tx = None;
    }

    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.output.lock().unwrap()).into_owned()
    }

    pub fn responses(&self) -> usize {
        self.output().matches("HTTP/1.1 ").count()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Poll until `n` responses were written or `within` elapses.
    pub async fn wait_for_responses(&self, n: usize, within: Duration) -> bool {
        let deadline = Instant::now() + within;
        while Instant::now() < deadline {
            if self.responses() >= n {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.responses() >= n
    }
}

/// Server end of an in-memory transport.
pub struct MemoryTransport {
    rx: mpsc::Receiver<Vec<u8>>,
    output: Arc<Mutex<Vec<u8>>>,
    closes: Arc<AtomicUsize>,
    stall_writes: bool,
}

pub fn pipe() -> (MemoryClient, MemoryTransport) {
    new_pipe(false)
}

/// A pipe whose peer never reads: writes block until the transport closes.
pub fn stalled_pipe() -> (MemoryClient, MemoryTransport) {
    new_pipe(true)
}

fn new_pipe(stall_writes: bool) -> (MemoryClient, MemoryTransport) {
    let (tx, rx) = mpsc::channel();
    let output = Arc::new(Mutex::new(Vec::new()));
    let closes = Arc::new(AtomicUsize::new(0));
    (
        MemoryClient {
            tx: Some(tx),
            output: Arc::clone(&output),
            closes: Arc::clone(&closes),
        },
        MemoryTransport {
            rx,
            output,
            closes,
            stall_writes,
        },
    )
}

pub struct PipeSource {
    rx: mpsc::Receiver<Vec<u8>>,
    buffered: VecDeque<u8>,
    closed: Arc<AtomicBool>,
}

impl ByteSource for PipeSource {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        loop {
            if self.closed.load(Ordering::SeqCst) {
                return Ok(None);
            }
            if let Some(b) = self.buffered.pop_front() {
                return Ok(Some(b));
            }
            match self.rx.recv_timeout(Duration::from_millis(5)) {
                Ok(chunk) => self.buffered.extend(chunk),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Ok(None),
            }
        }
    }
}

pub struct SharedSink {
    output: Arc<Mutex<Vec<u8>>>,
    closed: Arc<AtomicBool>,
    stall: bool,
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.stall {
            while !self.closed.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(5));
            }
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        self.output.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Counts closes and unblocks the source.
pub struct CountingCloser {
    closes: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl Close for CountingCloser {
    fn close(&mut self) -> io::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

impl Transport for MemoryTransport {
    type Source = PipeSource;
    type Sink = SharedSink;
    type Closer = CountingCloser;

    fn peer(&self) -> String {
        "memory".to_string()
    }

    fn split(self) -> io::Result<Split<PipeSource, SharedSink, CountingCloser>> {
        let closed = Arc::new(AtomicBool::new(false));
        Ok(Split {
            source: PipeSource {
                rx: self.rx,
                buffered: VecDeque::new(),
                closed: Arc::clone(&closed),
            },
            sink: SharedSink {
                output: self.output,
                closed: Arc::clone(&closed),
                stall: self.stall_writes,
            },
            closer: CountingCloser {
                closes: self.closes,
                closed,
            },
        })
    }
}

/// Handler answering `200 OK` with method, path and body length.
pub fn describe(request: &Request) -> Response {
    Response::ok(format!(
        "{} {} {}",
        request.method,
        request.path(),
        request.body.len()
    ))
}

pub fn get(path: &str) -> Vec<u8> {
    format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n").into_bytes()
}
