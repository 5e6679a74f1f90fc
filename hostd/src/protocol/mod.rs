//! Line-oriented text protocol.
//!
//! Requests are `COMMAND [arg ...]`, one per line. Responses are
//! `<status> <tag> <message>\n` with status `200`/`400` and tag `OK`/`ERR`.

pub mod args;
pub mod command;
pub mod dispatcher;
pub mod response;

pub use command::Request;
pub use dispatcher::Dispatcher;
pub use response::{MAX_RESPONSE_LEN, Response, Status};
