//! HTTP server: accept loop and per-connection sessions.
//!
//! # Responsibilities
//! - Accept connections from the bounded listener
//! - Spawn one session task per connection
//! - Apply reloaded configuration to new sessions
//! - Stop accepting on shutdown and drain live sessions

use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::mpsc;

use crate::config::ServerConfig;
use crate::http::handler::Handler;
use crate::lifecycle::ShutdownSignal;
use crate::net::{ConnectionPermit, ConnectionTracker, Listener, ListenerError};
use crate::session::{Session, SessionOptions};

/// Backoff after a failed accept, e.g. when out of file descriptors.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// HTTP/1.1 keep-alive server.
pub struct HttpServer<H: Handler> {
    config: Arc<ArcSwap<ServerConfig>>,
    handler: Arc<H>,
    tracker: ConnectionTracker,
}

impl<H: Handler> HttpServer<H> {
    pub fn new(config: ServerConfig, handler: H) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            handler: Arc::new(handler),
            tracker: ConnectionTracker::new(),
        }
    }

    /// Run until `shutdown` fires, then wait for live sessions to finish.
    pub async fn run(
        self,
        listener: Listener,
        mut config_updates: mpsc::UnboundedReceiver<ServerConfig>,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown requested, no longer accepting connections");
                    break;
                }
                Some(config) = config_updates.recv() => {
                    tracing::info!(
                        read_timeout_ms = config.timeouts.read_timeout_ms,
                        idle_timeout_ms = config.timeouts.idle_timeout_ms,
                        "Applying new configuration to future sessions"
                    );
                    self.config.store(Arc::new(config));
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        self.spawn_session(stream, peer, permit, shutdown.clone());
                    }
                    Err(ListenerError::Accept(e)) => {
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Listener unusable");
                        return Err(std::io::Error::other(e));
                    }
                },
            }
        }

        drop(listener);
        let grace = self.config.load().timeouts.shutdown_grace();
        if self.tracker.drain(grace).await {
            tracing::info!("All sessions closed");
        } else {
            tracing::warn!(
                remaining = self.tracker.active_count(),
                grace = ?grace,
                "Shutdown grace period elapsed with live sessions"
            );
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    fn spawn_session(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        permit: ConnectionPermit,
        shutdown: ShutdownSignal,
    ) {
        let guard = self.tracker.track();
        let options = SessionOptions::from_config(&self.config.load());
        let handler = Arc::clone(&self.handler);

        tokio::spawn(async move {
            let _permit = permit;
            let id = guard.id();

            let session = match Session::open(id, stream, handler, options) {
                Ok(session) => session.with_shutdown(shutdown),
                Err(e) => {
                    tracing::warn!(
                        connection_id = %id,
                        peer = %peer,
                        error = %e,
                        "Failed to open session"
                    );
                    return;
                }
            };

            // Outcome is logged by the session itself.
            let _ = session.serve().await;
            drop(guard);
        });
    }
}
