//! hostctl - command line client for hostd.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Parser;
use hostd::ListenAddr;
use hostd::config::DEFAULT_SOCKET;
use hostd::protocol::Response;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines, stdin,
};
use tokio::net::{TcpStream, UnixStream};

#[derive(Parser)]
#[command(name = "hostctl")]
#[command(version)]
#[command(about = "Send commands to a running hostd", long_about = None)]
struct Cli {
    /// hostd UNIX socket path
    #[arg(short = 'S', long, default_value = DEFAULT_SOCKET, conflicts_with = "tcp")]
    socket: PathBuf,

    /// Connect to hostd over TCP (host:port)
    #[arg(short = 'T', long)]
    tcp: Option<String>,

    /// Command to send, e.g. `VM.CREATE name=web mem=256`; reads stdin when omitted
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

type Reader = Lines<BufReader<Box<dyn AsyncRead + Unpin + Send>>>;
type Writer = Box<dyn AsyncWrite + Unpin + Send>;

struct Connection {
    lines: Reader,
    writer: Writer,
}

impl Connection {
    async fn open(cli: &Cli) -> Result<Self> {
        let (read, write): (Box<dyn AsyncRead + Unpin + Send>, Writer) = match &cli.tcp {
            Some(addr) => {
                let ListenAddr::Tcp { host, port } = ListenAddr::parse_tcp(addr)? else {
                    bail!("invalid TCP address: {addr}");
                };
                let host = if host.is_empty() { "127.0.0.1" } else { host.as_str() };
                let stream = TcpStream::connect((host, port))
                    .await
                    .with_context(|| format!("connect to {addr}"))?;
                let (read, write) = stream.into_split();
                (Box::new(read), Box::new(write))
            }
            None => {
                let stream = UnixStream::connect(&cli.socket)
                    .await
                    .with_context(|| format!("connect to {}", cli.socket.display()))?;
                let (read, write) = stream.into_split();
                (Box::new(read), Box::new(write))
            }
        };

        Ok(Self {
            lines: BufReader::new(read).lines(),
            writer: write,
        })
    }

    /// Send one request line and wait for its response; `None` if the daemon hung up.
    async fn request(&mut self, line: &str) -> Result<Option<String>> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(self.lines.next_line().await?)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("hostctl: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut conn = Connection::open(&cli).await?;

    if cli.command.is_empty() {
        interactive(&mut conn).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let line = request_line(&cli.command);
    let Some(reply) = conn.request(&line).await? else {
        bail!("connection closed by hostd");
    };
    println!("{reply}");

    if reply_succeeded(&reply) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Join command arguments into one protocol line.
fn request_line(args: &[String]) -> String {
    args.join(" ")
}

/// Only a well-formed `200` reply counts as success.
fn reply_succeeded(reply: &str) -> bool {
    Response::parse(reply).is_some_and(|response| response.is_ok())
}

async fn interactive(conn: &mut Connection) -> Result<()> {
    let mut input = BufReader::new(stdin()).lines();

    while let Some(line) = input.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match conn.request(line).await? {
            Some(reply) => println!("{reply}"),
            None => break,
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_are_joined_with_single_spaces() {
        let args: Vec<String> = ["VM.CREATE", "name=web", "mem=256"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(request_line(&args), "VM.CREATE name=web mem=256");
    }

    #[test]
    fn trailing_arguments_parse_into_command() {
        let cli = Cli::try_parse_from(["hostctl", "-S", "/tmp/x.sock", "ECHO", "-v", "hi"]).unwrap();
        assert_eq!(cli.socket, PathBuf::from("/tmp/x.sock"));
        assert_eq!(request_line(&cli.command), "ECHO -v hi");
    }

    #[test]
    fn exit_status_follows_reply_status() {
        assert!(reply_succeeded("200 OK PONG"));
        assert!(reply_succeeded("200 OK 0 vms"));
        assert!(!reply_succeeded("400 ERR not found"));
        assert!(!reply_succeeded("400 ERR unknown command"));
        assert!(!reply_succeeded("garbage"));
    }
}
