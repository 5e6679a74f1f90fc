//! Test helpers for hostd integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use hostd::server::BoundAddr;
use hostd::{ListenAddr, Registry, RegistryService, ServeMode, Server, Shutdown};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::net::{TcpStream, UnixStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;

pub const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// In-process hostd server on a private socket.
pub struct TestServer {
    pub addr: BoundAddr,
    pub shutdown: Shutdown,
    handle: Option<JoinHandle<hostd::error::Result<()>>>,
    // Keeps the socket directory alive for the server's lifetime.
    _dir: TempDir,
}

impl TestServer {
    pub async fn unix(mode: ServeMode, capacity: usize) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let listen = ListenAddr::Unix(dir.path().join("hostd.sock"));
        Self::start(listen, mode, capacity, dir).await
    }

    pub async fn tcp(mode: ServeMode, capacity: usize) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let listen = ListenAddr::Tcp {
            host: "127.0.0.1".to_string(),
            port: 0,
        };
        Self::start(listen, mode, capacity, dir).await
    }

    async fn start(listen: ListenAddr, mode: ServeMode, capacity: usize, dir: TempDir) -> Self {
        let shutdown = Shutdown::new();
        let registry = RegistryService::spawn(Registry::new(capacity));
        let server = Server::bind(&listen, registry, shutdown.clone(), mode)
            .await
            .expect("Failed to bind server");
        let addr = server.local_addr().expect("Failed to get local addr");
        let handle = tokio::spawn(server.run());

        Self {
            addr,
            shutdown,
            handle: Some(handle),
            _dir: dir,
        }
    }

    pub fn socket_path(&self) -> &Path {
        match &self.addr {
            BoundAddr::Unix(path) => path,
            BoundAddr::Tcp(_) => panic!("not a unix server"),
        }
    }

    pub async fn connect(&self) -> TestClient {
        match &self.addr {
            BoundAddr::Unix(path) => TestClient::unix(path).await,
            BoundAddr::Tcp(addr) => TestClient::tcp(*addr).await,
        }
    }

    /// Wait for the accept loop to return.
    pub async fn wait(&mut self) -> hostd::error::Result<()> {
        let handle = self.handle.take().expect("server already awaited");
        timeout(IO_TIMEOUT, handle)
            .await
            .expect("server did not stop in time")
            .expect("server task panicked")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Line-oriented protocol client.
pub struct TestClient {
    lines: Lines<BufReader<Box<dyn AsyncRead + Unpin + Send>>>,
    writer: Box<dyn AsyncWrite + Unpin + Send>,
}

impl TestClient {
    pub async fn unix(path: &Path) -> Self {
        let stream = UnixStream::connect(path)
            .await
            .expect("Failed to connect to unix socket");
        let (read, write) = stream.into_split();
        Self::new(Box::new(read), Box::new(write))
    }

    pub async fn tcp(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr)
            .await
            .expect("Failed to connect to tcp socket");
        let (read, write) = stream.into_split();
        Self::new(Box::new(read), Box::new(write))
    }

    fn new(
        read: Box<dyn AsyncRead + Unpin + Send>,
        writer: Box<dyn AsyncWrite + Unpin + Send>,
    ) -> Self {
        Self {
            lines: BufReader::new(read).lines(),
            writer,
        }
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.expect("write failed");
        self.writer.flush().await.expect("flush failed");
    }

    /// Half-close the write side so the server sees end of input.
    pub async fn shutdown_write(&mut self) {
        self.writer.shutdown().await.expect("shutdown failed");
    }

    /// Next response line without its newline; `None` once the server closed.
    pub async fn next_line(&mut self) -> Option<String> {
        timeout(IO_TIMEOUT, self.lines.next_line())
            .await
            .expect("timed out waiting for response")
            .expect("read failed")
    }

    /// Send one request line and return the response line.
    pub async fn request(&mut self, line: &str) -> String {
        self.send_raw(format!("{line}\n").as_bytes()).await;
        self.next_line().await.expect("connection closed")
    }
}
