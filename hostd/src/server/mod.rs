//! Listener and accept loop.
//!
//! The server owns one listening socket for its lifetime. Each accepted
//! connection is drained by [`handle_connection`]: inline in
//! [`ServeMode::Serial`], on its own task in [`ServeMode::Concurrent`].

mod connection;
mod framing;
mod listener;

pub use connection::handle_connection;
pub use framing::{Frame, LineFramer, MAX_LINE_LEN, READ_BUFFER_SIZE};
pub use listener::{BoundAddr, Listener, Stream};

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::{ListenAddr, ServeMode};
use crate::error::Result;
use crate::protocol::Dispatcher;
use crate::registry::RegistryHandle;
use crate::shutdown::{Shutdown, ShutdownSignal};

/// Pause after a failed accept before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub struct Server {
    listener: Listener,
    dispatcher: Arc<Dispatcher>,
    shutdown: Shutdown,
    mode: ServeMode,
}

impl Server {
    /// Bind the listening socket. Failures here are fatal startup errors.
    pub async fn bind(
        addr: &ListenAddr,
        registry: RegistryHandle,
        shutdown: Shutdown,
        mode: ServeMode,
    ) -> Result<Self> {
        let listener = Listener::bind(addr).await?;
        let dispatcher = Arc::new(Dispatcher::new(registry, shutdown.clone()));
        Ok(Self {
            listener,
            dispatcher,
            shutdown,
            mode,
        })
    }

    pub fn local_addr(&self) -> io::Result<BoundAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until shutdown is requested.
    ///
    /// Per-connection errors are logged and never end the loop. In concurrent
    /// mode, open connections are allowed to finish before returning.
    pub async fn run(self) -> Result<()> {
        let mut signal = self.shutdown.subscribe();
        let mut connections = JoinSet::new();
        let mut next_conn_id: u64 = 0;

        info!(addr = %self.listener.local_addr()?, mode = ?self.mode, "Accepting connections");

        while !signal.is_triggered() {
            let accepted = tokio::select! {
                _ = signal.recv() => break,
                accepted = self.listener.accept() => accepted,
            };

            let stream = match accepted {
                Ok(stream) => stream,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    // Errors like EMFILE leave the listener readable.
                    warn!(error = %e, "Accept failed, backing off");
                    tokio::select! {
                        _ = signal.recv() => break,
                        _ = tokio::time::sleep(ACCEPT_BACKOFF) => continue,
                    }
                }
            };

            next_conn_id += 1;
            let conn = serve_stream(
                stream,
                next_conn_id,
                self.dispatcher.clone(),
                self.shutdown.subscribe(),
            );
            match self.mode {
                ServeMode::Serial => conn.await,
                ServeMode::Concurrent => {
                    connections.spawn(conn);
                }
            }

            while connections.try_join_next().is_some() {}
        }

        if !connections.is_empty() {
            debug!(open = connections.len(), "Waiting for open connections");
        }
        while connections.join_next().await.is_some() {}

        info!("Listener stopped");
        Ok(())
    }
}

async fn serve_stream(
    stream: Stream,
    conn_id: u64,
    dispatcher: Arc<Dispatcher>,
    signal: ShutdownSignal,
) {
    let result = match stream {
        Stream::Unix(stream) => {
            debug!(conn = conn_id, "Client connected (unix)");
            handle_connection(stream, &dispatcher, signal).await
        }
        Stream::Tcp(stream, peer) => {
            debug!(conn = conn_id, peer = %peer, "Client connected (tcp)");
            handle_connection(stream, &dispatcher, signal).await
        }
    };

    match result {
        Ok(()) => debug!(conn = conn_id, "Client disconnected"),
        Err(e) => warn!(conn = conn_id, error = %e, "Connection closed with error"),
    }
}
