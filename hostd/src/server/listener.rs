//! Listening socket setup for UNIX and TCP transports.

use std::fmt;
use std::fs::{self, Permissions};
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::os::fd::OwnedFd;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use socket2::{Domain, SockAddr, Socket, Type};
use tokio::net::{TcpListener, TcpSocket, TcpStream, UnixListener, UnixStream};
use tracing::{debug, info};

use crate::config::ListenAddr;
use crate::error::{Result, ServerError};

const UNIX_BACKLOG: i32 = 16;
const TCP_BACKLOG: u32 = 64;

/// The daemon's single listening socket.
///
/// A UNIX socket file is removed again when the listener is dropped.
#[derive(Debug)]
pub enum Listener {
    Unix { listener: UnixListener, path: PathBuf },
    Tcp(TcpListener),
}

/// An accepted client connection.
#[derive(Debug)]
pub enum Stream {
    Unix(UnixStream),
    Tcp(TcpStream, SocketAddr),
}

/// Address a [`Listener`] is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundAddr {
    Unix(PathBuf),
    Tcp(SocketAddr),
}

impl fmt::Display for BoundAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundAddr::Unix(path) => write!(f, "unix:{}", path.display()),
            BoundAddr::Tcp(addr) => write!(f, "tcp:{addr}"),
        }
    }
}

impl Listener {
    pub async fn bind(addr: &ListenAddr) -> Result<Self> {
        match addr {
            ListenAddr::Unix(path) => {
                let listener = bind_unix(path).map_err(|source| ServerError::BindUnix {
                    path: path.clone(),
                    source,
                })?;
                info!(path = %path.display(), "Listening (unix)");
                Ok(Listener::Unix {
                    listener,
                    path: path.clone(),
                })
            }
            ListenAddr::Tcp { host, port } => {
                let addr = resolve(host, *port).await?;
                let listener = bind_tcp(addr).map_err(|source| ServerError::BindTcp {
                    addr: addr.to_string(),
                    source,
                })?;
                info!(addr = %listener.local_addr()?, "Listening (tcp)");
                Ok(Listener::Tcp(listener))
            }
        }
    }

    pub fn local_addr(&self) -> io::Result<BoundAddr> {
        match self {
            Listener::Unix { path, .. } => Ok(BoundAddr::Unix(path.clone())),
            Listener::Tcp(listener) => Ok(BoundAddr::Tcp(listener.local_addr()?)),
        }
    }

    pub async fn accept(&self) -> io::Result<Stream> {
        match self {
            Listener::Unix { listener, .. } => {
                let (stream, _) = listener.accept().await?;
                Ok(Stream::Unix(stream))
            }
            Listener::Tcp(listener) => {
                let (stream, peer) = listener.accept().await?;
                Ok(Stream::Tcp(stream, peer))
            }
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Listener::Unix { path, .. } = self {
            let _ = fs::remove_file(path);
        }
    }
}

/// Bind a UNIX stream socket, replacing any stale file, owner-only access.
fn bind_unix(path: &Path) -> io::Result<UnixListener> {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Removed stale socket"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let socket = Socket::new(Domain::UNIX, Type::STREAM, None)?;
    socket.bind(&SockAddr::unix(path)?)?;

    // From here on the socket file exists and must not outlive a failure.
    remove_on_error(path, listen_unix(socket, path))
}

fn listen_unix(socket: Socket, path: &Path) -> io::Result<UnixListener> {
    socket.listen(UNIX_BACKLOG)?;
    fs::set_permissions(path, Permissions::from_mode(0o600))?;
    socket.set_nonblocking(true)?;

    let listener = std::os::unix::net::UnixListener::from(OwnedFd::from(socket));
    UnixListener::from_std(listener)
}

fn remove_on_error<T>(path: &Path, result: io::Result<T>) -> io::Result<T> {
    if result.is_err() {
        let _ = fs::remove_file(path);
    }
    result
}

fn bind_tcp(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(TCP_BACKLOG)
}

/// Resolve a bind host: empty means any, then numeric, then DNS
/// (preferring an IPv4 result).
async fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    if host.is_empty() {
        return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port));
    }
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }

    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|_| ServerError::InvalidHost(host.to_string()))?
        .collect();

    addrs
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| ServerError::InvalidHost(host.to_string()))
}
