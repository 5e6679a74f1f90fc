//! Daemon configuration: CLI flags, optional TOML file, resolved settings.

use std::fmt;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;
use tracing::debug;

use crate::error::ConfigError;
use crate::registry::DEFAULT_CAPACITY;

/// Default UNIX socket path.
pub const DEFAULT_SOCKET: &str = "/tmp/hostd.sock";

/// Default log file used when daemonized.
pub const DEFAULT_LOG_FILE: &str = "/tmp/hostd.log";

/// Command line arguments of the `hostd` binary.
#[derive(Parser, Debug, Default)]
#[command(name = "hostd")]
#[command(version)]
#[command(about = "Strawman host control-plane daemon")]
pub struct Args {
    /// Run in foreground (do not daemonize)
    #[arg(short, long)]
    pub foreground: bool,

    /// UNIX socket path [default: /tmp/hostd.sock]
    #[arg(short = 'S', long, conflicts_with = "tcp")]
    pub socket: Option<PathBuf>,

    /// Listen on TCP host:port instead of a UNIX socket (":port" binds any)
    #[arg(short = 'T', long)]
    pub tcp: Option<String>,

    /// Log file path when daemonized [default: /tmp/hostd.log]
    #[arg(short, long)]
    pub log_file: Option<PathBuf>,

    /// Write PID to this file
    #[arg(short, long)]
    pub pid_file: Option<PathBuf>,

    /// Verbose logging (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// TOML config file; command line flags take precedence
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Maximum number of VM records [default: 128]
    #[arg(long)]
    pub capacity: Option<usize>,

    /// Serve one connection at a time
    #[arg(long)]
    pub serial: bool,
}

/// Settings read from a TOML config file.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub socket: Option<PathBuf>,
    pub tcp: Option<String>,
    pub log_file: Option<PathBuf>,
    pub pid_file: Option<PathBuf>,
    pub foreground: Option<bool>,
    pub capacity: Option<usize>,
    pub serial: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }
}

/// Where the daemon listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenAddr {
    Unix(PathBuf),
    /// An empty host binds every interface.
    Tcp { host: String, port: u16 },
}

impl ListenAddr {
    /// Parse `host:port`, `[v6]:port` or `:port`.
    pub fn parse_tcp(s: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidTcpAddress(s.to_string());
        let (host, port) = s.rsplit_once(':').ok_or_else(invalid)?;
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        Ok(ListenAddr::Tcp {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for ListenAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenAddr::Unix(path) => write!(f, "unix:{}", path.display()),
            ListenAddr::Tcp { host, port } if host.is_empty() => write!(f, "tcp:0.0.0.0:{port}"),
            ListenAddr::Tcp { host, port } if host.contains(':') => {
                write!(f, "tcp:[{host}]:{port}")
            }
            ListenAddr::Tcp { host, port } => write!(f, "tcp:{host}:{port}"),
        }
    }
}

/// Connection scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServeMode {
    /// One task per connection.
    #[default]
    Concurrent,
    /// Drain each connection before accepting the next.
    Serial,
}

/// Fully resolved daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub listen: ListenAddr,
    pub log_file: PathBuf,
    pub pid_file: Option<PathBuf>,
    pub foreground: bool,
    pub verbosity: u8,
    pub capacity: usize,
    pub serve_mode: ServeMode,
}

impl Config {
    /// Resolve CLI arguments, loading the config file they name.
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(args, file)
    }

    /// Merge CLI arguments over file settings over defaults.
    pub fn resolve(args: Args, file: FileConfig) -> Result<Self, ConfigError> {
        let listen = if let Some(path) = args.socket {
            ListenAddr::Unix(path)
        } else if let Some(tcp) = args.tcp {
            ListenAddr::parse_tcp(&tcp)?
        } else {
            match (file.socket, file.tcp) {
                (Some(_), Some(_)) => return Err(ConfigError::ConflictingTransports),
                (Some(path), None) => ListenAddr::Unix(path),
                (None, Some(tcp)) => ListenAddr::parse_tcp(&tcp)?,
                (None, None) => ListenAddr::Unix(PathBuf::from(DEFAULT_SOCKET)),
            }
        };

        let serial = args.serial || file.serial.unwrap_or(false);

        Ok(Self {
            listen,
            log_file: args
                .log_file
                .or(file.log_file)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
            pid_file: args.pid_file.or(file.pid_file),
            foreground: args.foreground || file.foreground.unwrap_or(false),
            verbosity: args.verbose,
            capacity: args
                .capacity
                .or(file.capacity)
                .unwrap_or(DEFAULT_CAPACITY),
            serve_mode: if serial {
                ServeMode::Serial
            } else {
                ServeMode::Concurrent
            },
        })
    }

    /// Make every path absolute so they survive the daemon's `chdir("/")`.
    pub fn absolutize(&mut self) -> std::io::Result<()> {
        if let ListenAddr::Unix(path) = &mut self.listen {
            *path = std::path::absolute(&*path)?;
        }
        self.log_file = std::path::absolute(&self.log_file)?;
        if let Some(pid_file) = &mut self.pid_file {
            *pid_file = std::path::absolute(&*pid_file)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::resolve(Args::default(), FileConfig::default()).unwrap();

        assert_eq!(config.listen, ListenAddr::Unix(PathBuf::from(DEFAULT_SOCKET)));
        assert_eq!(config.log_file, PathBuf::from(DEFAULT_LOG_FILE));
        assert_eq!(config.capacity, DEFAULT_CAPACITY);
        assert_eq!(config.serve_mode, ServeMode::Concurrent);
        assert!(!config.foreground);
        assert!(config.pid_file.is_none());
    }

    #[test]
    fn parse_tcp_forms() {
        assert_eq!(
            ListenAddr::parse_tcp("127.0.0.1:7000").unwrap(),
            ListenAddr::Tcp {
                host: "127.0.0.1".to_string(),
                port: 7000
            }
        );
        assert_eq!(
            ListenAddr::parse_tcp(":7000").unwrap(),
            ListenAddr::Tcp {
                host: String::new(),
                port: 7000
            }
        );
        assert_eq!(
            ListenAddr::parse_tcp("[::1]:7000").unwrap(),
            ListenAddr::Tcp {
                host: "::1".to_string(),
                port: 7000
            }
        );
        assert!(ListenAddr::parse_tcp("localhost").is_err());
        assert!(ListenAddr::parse_tcp("localhost:http").is_err());
    }

    #[test]
    fn cli_overrides_file() {
        let args = Args::parse_from(["hostd", "-f", "-T", ":9000", "--capacity", "4"]);
        let file: FileConfig = toml::from_str(
            r#"
            socket = "/run/hostd.sock"
            capacity = 16
            serial = true
            pid_file = "/run/hostd.pid"
            "#,
        )
        .unwrap();

        let config = Config::resolve(args, file).unwrap();
        assert_eq!(
            config.listen,
            ListenAddr::Tcp {
                host: String::new(),
                port: 9000
            }
        );
        assert_eq!(config.capacity, 4);
        assert_eq!(config.serve_mode, ServeMode::Serial);
        assert_eq!(config.pid_file, Some(PathBuf::from("/run/hostd.pid")));
        assert!(config.foreground);
    }

    #[test]
    fn file_with_both_transports_is_rejected() {
        let file: FileConfig = toml::from_str(
            r#"
            socket = "/run/hostd.sock"
            tcp = ":9000"
            "#,
        )
        .unwrap();

        assert!(matches!(
            Config::resolve(Args::default(), file),
            Err(ConfigError::ConflictingTransports)
        ));
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        assert!(toml::from_str::<FileConfig>("listen = \"x\"").is_err());
    }

    #[test]
    fn cli_rejects_both_transports() {
        assert!(Args::try_parse_from(["hostd", "-S", "/tmp/x.sock", "-T", ":1"]).is_err());
    }

    #[test]
    fn verbose_counts() {
        let args = Args::parse_from(["hostd", "-vv"]);
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = FileConfig::load(Path::new("/nonexistent/hostd.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn absolutize_rewrites_relative_paths() {
        let mut config = Config::resolve(
            Args::parse_from(["hostd", "-S", "rel.sock", "-l", "rel.log"]),
            FileConfig::default(),
        )
        .unwrap();
        config.absolutize().unwrap();

        match &config.listen {
            ListenAddr::Unix(path) => assert!(path.is_absolute()),
            other => panic!("unexpected listen addr {other:?}"),
        }
        assert!(config.log_file.is_absolute());
    }
}
