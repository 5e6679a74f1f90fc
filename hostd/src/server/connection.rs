//! Connection Handler - drains one accepted connection.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::framing::{Frame, LineFramer, READ_BUFFER_SIZE};
use crate::protocol::{Dispatcher, Response};
use crate::shutdown::ShutdownSignal;

/// Serve requests on `stream` until the peer closes it, a transport error
/// occurs, or shutdown is requested.
///
/// Shutdown is observed between responses: a response being written is
/// always completed first.
pub async fn handle_connection<S>(
    mut stream: S,
    dispatcher: &Dispatcher,
    mut shutdown: ShutdownSignal,
) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut framer = LineFramer::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let n = tokio::select! {
            read = stream.read(&mut buf) => read?,
            _ = shutdown.recv() => return Ok(()),
        };

        if n == 0 {
            if let Some(frame) = framer.finish() {
                respond(&mut stream, dispatcher, frame).await?;
            }
            return Ok(());
        }

        for frame in framer.push(&buf[..n]) {
            respond(&mut stream, dispatcher, frame).await?;
            if shutdown.is_triggered() {
                stream.flush().await?;
                return Ok(());
            }
        }
    }
}

async fn respond<S>(stream: &mut S, dispatcher: &Dispatcher, frame: Frame) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    let response = match frame {
        Frame::Line(line) => dispatcher.handle_line(&line).await,
        Frame::TooLong => Response::err("line too long"),
    };
    stream.write_all(response.encode().as_bytes()).await
}
