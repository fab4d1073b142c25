//! Line framing for the control protocol
//!
//! Every message is one UTF-8 JSON document terminated by `\n`:
//! ```text
//! {"target":"system","method":"ping","params":{}}\n
//! ```
//! There is no length prefix, so a message must never contain a raw newline.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::common::{Error, Result};

/// Maximum accepted line length (16 MB), screenshots included
pub const MAX_LINE_LEN: usize = 16 * 1024 * 1024;

/// Read one line from the stream, without its terminator
///
/// A trailing `\r` is stripped as well. EOF before a complete line means the
/// peer went away and is reported as [`Error::TransportClosed`].
pub async fn read_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Vec<u8>> {
    let mut line = Vec::new();
    let read = (&mut *reader)
        .take(MAX_LINE_LEN as u64 + 1)
        .read_until(b'\n', &mut line)
        .await?;

    if read == 0 {
        return Err(Error::TransportClosed);
    }

    if line.last() != Some(&b'\n') {
        if line.len() > MAX_LINE_LEN {
            return Err(Error::LineTooLong(MAX_LINE_LEN));
        }
        return Err(Error::TransportClosed);
    }

    line.pop();
    if line.last() == Some(&b'\r') {
        line.pop();
    }

    Ok(line)
}

/// Write one line to the stream, appending the terminator
pub async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &[u8]) -> Result<()> {
    if line.contains(&b'\n') {
        return Err(Error::InvalidLine(
            "message contains an unescaped newline".to_string(),
        ));
    }

    writer.write_all(line).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;

    Ok(())
}
