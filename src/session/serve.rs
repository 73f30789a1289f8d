//! Persistent-connection session.
//!
//! # Responsibilities
//! - Serve sequential exchanges over one transport with one reader
//! - Decide after each response whether the connection stays open
//! - Close the transport exactly once, whatever ends the session
//!
//! # Design Decisions
//! - A timeout ends the session and nothing is written after it
//! - A malformed request gets a short error response, then the session ends
//! - Writes go through `spawn_blocking`, the sink is a blocking writer

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Instant;

use crate::config::{LimitsConfig, ServerConfig};
use crate::http::{read_request, should_keep_alive, Handler, ReadTimeouts, RequestError, Response};
use crate::lifecycle::{shutdown_requested, ShutdownSignal};
use crate::net::{Close, ConnectionId, Split, Transport};
use crate::observability::metrics;
use crate::reader::TimeoutReader;
use crate::session::state::{SessionError, SessionState};

/// Per-session settings, fixed when the session opens.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub timeouts: ReadTimeouts,
    pub limits: LimitsConfig,
}

impl SessionOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            timeouts: ReadTimeouts {
                idle: config.timeouts.idle_timeout(),
                read: config.timeouts.read_timeout(),
            },
            limits: config.limits.clone(),
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&ServerConfig::default())
    }
}

/// Outcome of a session that ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    pub id: ConnectionId,
    pub exchanges: u64,
    pub state: SessionState,
}

/// Closes the transport once, on explicit request or on drop.
struct CloseGuard<C: Close> {
    closer: Option<C>,
    id: ConnectionId,
}

impl<C: Close> CloseGuard<C> {
    fn close(&mut self) {
        if let Some(mut closer) = self.closer.take() {
            if let Err(e) = closer.close() {
                tracing::debug!(connection_id = %self.id, error = %e, "Transport close failed");
            }
        }
    }
}

impl<C: Close> Drop for CloseGuard<C> {
    fn drop(&mut self) {
        self.close();
    }
}

/// One transport serving a sequence of request/response exchanges.
pub struct Session<T: Transport, H: Handler> {
    id: ConnectionId,
    peer: String,
    reader: TimeoutReader,
    sink: Option<T::Sink>,
    closer: CloseGuard<T::Closer>,
    handler: Arc<H>,
    options: SessionOptions,
    shutdown: Option<ShutdownSignal>,
    exchanges: u64,
    state: SessionState,
}

impl<T: Transport, H: Handler> Session<T, H> {
    /// Split `transport` and start its reader.
    ///
    /// If starting the reader fails the transport is closed before returning.
    pub fn open(
        id: ConnectionId,
        transport: T,
        handler: Arc<H>,
        options: SessionOptions,
    ) -> io::Result<Self> {
        let peer = transport.peer();
        let Split {
            source,
            sink,
            closer,
        } = transport.split()?;
        let closer = CloseGuard {
            closer: Some(closer),
            id,
        };

        let reader =
            TimeoutReader::spawn_named(source, options.timeouts.idle, format!("{id}-reader"))?;

        tracing::debug!(connection_id = %id, peer = %peer, "Session opened");

        Ok(Self {
            id,
            peer,
            reader,
            sink: Some(sink),
            closer,
            handler,
            options,
            shutdown: None,
            exchanges: 0,
            state: SessionState::Open,
        })
    }

    /// Interrupt pending reads and writes once `signal` fires.
    pub fn with_shutdown(mut self, signal: ShutdownSignal) -> Self {
        self.reader.set_shutdown(signal.clone());
        self.shutdown = Some(signal);
        self
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn exchanges(&self) -> u64 {
        self.exchanges
    }

    /// Serve exchanges until the session terminates, then close the transport.
    pub async fn serve(mut self) -> Result<SessionReport, SessionError> {
        let result = self.run().await;
        self.closer.close();

        self.state = match &result {
            Ok(state) => *state,
            Err(e) => e.state(),
        };
        metrics::record_session_end(self.state.as_str());

        match &result {
            Ok(_) => tracing::debug!(
                connection_id = %self.id,
                peer = %self.peer,
                exchanges = self.exchanges,
                state = %self.state,
                "Session closed"
            ),
            Err(SessionError::Timeout(after)) => {
                metrics::record_read_timeout();
                tracing::info!(
                    connection_id = %self.id,
                    peer = %self.peer,
                    exchanges = self.exchanges,
                    timeout = ?after,
                    "Session timed out"
                );
            }
            Err(SessionError::Interrupted) => tracing::info!(
                connection_id = %self.id,
                exchanges = self.exchanges,
                "Session interrupted by shutdown"
            ),
            Err(e) => tracing::warn!(
                connection_id = %self.id,
                peer = %self.peer,
                exchanges = self.exchanges,
                error = %e,
                "Session failed"
            ),
        }

        result.map(|state| SessionReport {
            id: self.id,
            exchanges: self.exchanges,
            state,
        })
    }

    async fn run(&mut self) -> Result<SessionState, SessionError> {
        let max_requests = self.options.limits.max_requests_per_connection as u64;

        loop {
            let (limits, timeouts) = (&self.options.limits, self.options.timeouts);
            let request = match read_request(&mut self.reader, limits, timeouts).await {
                Ok(Some(request)) => request,
                Ok(None) => return Ok(SessionState::ClosedByPeer),
                Err(RequestError::Parse(e)) => {
                    let reply = Response::error(e.status()).encode(false);
                    match self.write(reply).await {
                        Err(SessionError::Interrupted) => return Err(SessionError::Interrupted),
                        Err(write_err) => tracing::debug!(
                            connection_id = %self.id,
                            error = %write_err,
                            "Error response not delivered"
                        ),
                        Ok(()) => {}
                    }
                    return Err(SessionError::Protocol(e));
                }
                Err(e) => return Err(e.into()),
            };

            let start = Instant::now();
            self.exchanges += 1;
            let at_limit = max_requests > 0 && self.exchanges >= max_requests;
            let client_keep_alive = should_keep_alive(&request);
            let keep_alive = client_keep_alive && !at_limit;

            let response = self.handler.handle(&request);
            let status = response.status.as_u16();
            self.write(response.encode(keep_alive)).await?;
            metrics::record_exchange(status, start);

            tracing::debug!(
                connection_id = %self.id,
                method = %request.method,
                target = %request.target,
                status,
                exchange = self.exchanges,
                keep_alive,
                "Exchange complete"
            );

            if !client_keep_alive {
                return Ok(SessionState::ClosedByPeer);
            }
            if at_limit {
                return Ok(SessionState::ClosedByLimit);
            }
        }
    }

    /// Write on the blocking pool. On shutdown the transport is closed, which
    /// fails a write stuck on a peer that stopped reading.
    async fn write(&mut self, bytes: Vec<u8>) -> Result<(), SessionError> {
        let mut sink = self.sink.take().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "sink lost by an earlier write")
        })?;

        let mut writing = tokio::task::spawn_blocking(move || {
            let result = sink.write_all(&bytes).and_then(|()| sink.flush());
            (sink, result)
        });

        let (sink, result) = tokio::select! {
            joined = &mut writing => joined.map_err(io::Error::other)?,
            _ = shutdown_requested(&mut self.shutdown) => {
                self.closer.close();
                return Err(SessionError::Interrupted);
            }
        };

        self.sink = Some(sink);
        Ok(result?)
    }
}
