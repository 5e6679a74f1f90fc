//! Request parsing.

use super::args::{KeyValues, parse_int};
use crate::error::CommandError;

/// One parsed protocol request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Ping,
    Version,
    Health,
    Echo(String),
    Shutdown,
    VmList,
    VmCreate { name: String, memory_mib: i64 },
    VmInfo { id: u32 },
    VmDestroy { id: u32 },
}

impl Request {
    /// Parse one line (without its terminator).
    ///
    /// The command word is matched case-insensitively. Keyed arguments are
    /// read with [`KeyValues`]; `ECHO` takes the remainder verbatim.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let (word, rest) = split_command(line);

        match word.to_ascii_uppercase().as_str() {
            "PING" => Ok(Request::Ping),
            "VERSION" => Ok(Request::Version),
            "HEALTH" => Ok(Request::Health),
            "ECHO" => Ok(Request::Echo(rest.to_string())),
            "SHUTDOWN" => Ok(Request::Shutdown),
            "VM.LIST" => Ok(Request::VmList),
            "VM.CREATE" => {
                let args = KeyValues::parse(rest);
                match (args.get("name"), args.get("mem")) {
                    (Some(name), Some(mem)) => Ok(Request::VmCreate {
                        name: name.to_string(),
                        memory_mib: parse_int(mem),
                    }),
                    _ => Err(CommandError::Parse("missing name= or mem=".to_string())),
                }
            }
            "VM.INFO" => Ok(Request::VmInfo {
                id: parse_id(rest)?,
            }),
            "VM.DESTROY" => Ok(Request::VmDestroy {
                id: parse_id(rest)?,
            }),
            _ => Err(CommandError::UnknownCommand),
        }
    }

    /// Canonical command word, used for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Request::Ping => "PING",
            Request::Version => "VERSION",
            Request::Health => "HEALTH",
            Request::Echo(_) => "ECHO",
            Request::Shutdown => "SHUTDOWN",
            Request::VmList => "VM.LIST",
            Request::VmCreate { .. } => "VM.CREATE",
            Request::VmInfo { .. } => "VM.INFO",
            Request::VmDestroy { .. } => "VM.DESTROY",
        }
    }
}

/// Split a line into its command word and argument remainder.
fn split_command(line: &str) -> (&str, &str) {
    let line = line.trim_start_matches(|c: char| c.is_ascii_whitespace());
    let end = line
        .find(|c: char| c.is_ascii_whitespace())
        .unwrap_or(line.len());
    let rest = line[end..].trim_start_matches(|c: char| c.is_ascii_whitespace());
    (&line[..end], rest)
}

/// Ids out of range collapse to 0, which is never allocated.
fn parse_id(rest: &str) -> Result<u32, CommandError> {
    let args = KeyValues::parse(rest);
    let id = args
        .get("id")
        .ok_or_else(|| CommandError::Parse("missing id=".to_string()))?;
    Ok(u32::try_from(parse_int(id)).unwrap_or(0))
}
