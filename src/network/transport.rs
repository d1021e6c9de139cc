use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt},
    sync::mpsc::{Sender, UnboundedReceiver},
};
use tracing::{debug, warn};

use crate::{common::Result, protocol::Envelope};

/// Decodes one envelope per line and feeds the node. Lines that fail to
/// decode, invalid UTF-8 included, are logged and skipped. Returns at end
/// of input, or early if the node has gone away.
pub async fn read_envelopes<R>(mut reader: R, msg_tx: Sender<Envelope>) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }

        let line = buf.trim_ascii();
        if line.is_empty() {
            continue;
        }

        let envelope = match Envelope::from_slice(line) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(
                    line = %String::from_utf8_lossy(line),
                    "Dropping malformed input: {}", err
                );
                continue;
            }
        };

        if msg_tx.send(envelope).await.is_err() {
            debug!("Node stopped, no longer reading input");
            break;
        }
    }
    Ok(())
}

/// Writes each envelope as one JSON line, flushing after every line.
/// Returns once every sender is gone.
pub async fn write_envelopes<W>(
    writer: &mut W,
    mut outbound: UnboundedReceiver<Envelope>,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(envelope) = outbound.recv().await {
        let mut line = envelope.to_line()?;
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}
