//! Response line framing.

use std::fmt;

use crate::error::CommandError;

/// Largest encoded response, newline included.
pub const MAX_RESPONSE_LEN: usize = 4096;

/// Status class of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Err,
}

impl Status {
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::Err => 400,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Err => "ERR",
        }
    }
}

/// One protocol response: `<code> <tag> <message>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: Status,
    message: String,
}

impl Response {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: Status::Ok,
            message: message.into(),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            status: Status::Err,
            message: message.into(),
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// Wire form: a single line ending in `\n`, at most [`MAX_RESPONSE_LEN`]
    /// bytes. Oversized messages are cut at a character boundary.
    pub fn encode(&self) -> String {
        let mut line = self.to_string();
        if line.len() >= MAX_RESPONSE_LEN {
            let mut end = MAX_RESPONSE_LEN - 1;
            while !line.is_char_boundary(end) {
                end -= 1;
            }
            line.truncate(end);
        }
        line.push('\n');
        line
    }

    /// Parse a response line as received by a client.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let (status, rest) = if let Some(rest) = line.strip_prefix("200 OK") {
            (Status::Ok, rest)
        } else if let Some(rest) = line.strip_prefix("400 ERR") {
            (Status::Err, rest)
        } else {
            return None;
        };

        Some(Self {
            status,
            message: rest.strip_prefix(' ').unwrap_or(rest).to_string(),
        })
    }
}

impl From<CommandError> for Response {
    fn from(e: CommandError) -> Self {
        Response::err(e.to_string())
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.status.code(),
            self.status.tag(),
            self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_status_line() {
        assert_eq!(Response::ok("PONG").encode(), "200 OK PONG\n");
        assert_eq!(
            Response::from(CommandError::UnknownCommand).encode(),
            "400 ERR unknown command\n"
        );
    }

    #[test]
    fn oversized_responses_are_truncated() {
        let encoded = Response::ok("a".repeat(10_000)).encode();
        assert_eq!(encoded.len(), MAX_RESPONSE_LEN);
        assert!(encoded.starts_with("200 OK aaa"));
        assert!(encoded.ends_with("a\n"));
        assert_eq!(encoded.matches('\n').count(), 1);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let encoded = Response::ok("é".repeat(3000)).encode();
        assert!(encoded.len() <= MAX_RESPONSE_LEN);
        assert!(encoded.ends_with("é\n"));
    }

    #[test]
    fn parse_client_side() {
        let ok = Response::parse("200 OK id=1\n").unwrap();
        assert!(ok.is_ok());
        assert_eq!(ok.message(), "id=1");

        let err = Response::parse("400 ERR not found").unwrap();
        assert_eq!(err.status(), Status::Err);
        assert_eq!(err.message(), "not found");

        assert!(Response::parse("hello").is_none());
    }
}
