//! Blocking byte sources.

use std::io::{self, Read};

/// A blocking "next byte or end-of-stream" capability.
///
/// Implementations may block indefinitely. `Ok(None)` means end-of-stream.
pub trait ByteSource: Send + 'static {
    /// Read the next byte, blocking until one is available.
    fn read_byte(&mut self) -> io::Result<Option<u8>>;
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        (**self).read_byte()
    }
}

/// Adapts any [`Read`] into a [`ByteSource`].
///
/// Wrap raw sockets in a `BufReader` first; every call reads exactly one byte
/// from the inner reader.
#[derive(Debug)]
pub struct StreamSource<R> {
    inner: R,
}

impl<R> StreamSource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Read + Send + 'static> ByteSource for StreamSource<R> {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}
