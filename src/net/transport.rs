//! Transport capability consumed by sessions.
//!
//! A transport splits into a blocking read half (a [`ByteSource`]), a
//! blocking write half and a [`Close`] handle. Closing must unblock a read
//! half that is waiting for data.

use std::io::{self, BufReader, BufWriter, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};

use crate::reader::{ByteSource, StreamSource};

/// Releases a transport.
pub trait Close: Send + 'static {
    fn close(&mut self) -> io::Result<()>;
}

/// The three halves of a split transport.
pub struct Split<S, W, C> {
    pub source: S,
    pub sink: W,
    pub closer: C,
}

/// A bidirectional byte channel a session can own.
pub trait Transport: Send + 'static {
    type Source: ByteSource;
    type Sink: Write + Send + 'static;
    type Closer: Close;

    /// Human-readable peer description for logs.
    fn peer(&self) -> String;

    fn split(self) -> io::Result<Split<Self::Source, Self::Sink, Self::Closer>>;
}

/// Closes a TCP connection by shutting down both directions.
#[derive(Debug)]
pub struct TcpCloser {
    stream: TcpStream,
}

impl Close for TcpCloser {
    fn close(&mut self) -> io::Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            // Peer already gone
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Transport for TcpStream {
    type Source = StreamSource<BufReader<TcpStream>>;
    type Sink = BufWriter<TcpStream>;
    type Closer = TcpCloser;

    fn peer(&self) -> String {
        self.peer_addr()
            .map(|addr: SocketAddr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string())
    }

    fn split(self) -> io::Result<Split<Self::Source, Self::Sink, Self::Closer>> {
        // Streams handed over from tokio are non-blocking.
        self.set_nonblocking(false)?;
        self.set_nodelay(true)?;
        let read_half = self.try_clone()?;
        let closer = self.try_clone()?;

        Ok(Split {
            source: StreamSource::new(BufReader::new(read_half)),
            sink: BufWriter::new(self),
            closer: TcpCloser { stream: closer },
        })
    }
}
