//! `relay serve`: newline-delimited JSON requests on stdin, responses on
//! stdout. Logs go to stderr.

use crate::config::RelayConfig;
use crate::protocol::Dispatcher;
use anyhow::{Context, Result};
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tracing::info;

/// Longest accepted request line.
const MAX_LINE_BYTES: usize = 1024 * 1024;

pub async fn run(config: &RelayConfig) -> Result<()> {
    let dispatcher = super::build_dispatcher(config).await?;
    let shutdown = dispatcher.shutdown_token();
    super::cancel_on_ctrl_c(shutdown.clone());

    info!("serving on stdio");
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    tokio::select! {
        result = serve_lines(&dispatcher, stdin, stdout) => result?,
        _ = shutdown.cancelled() => info!("shutting down"),
    }
    dispatcher.renderer().shutdown().await.ok();
    Ok(())
}

/// Answer each request line in order until EOF. A line longer than
/// [`MAX_LINE_BYTES`] is answered with an error and skipped without being
/// buffered.
pub async fn serve_lines<R, W>(dispatcher: &Dispatcher, mut reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let n = (&mut reader)
            .take(MAX_LINE_BYTES as u64 + 1)
            .read_until(b'\n', &mut buf)
            .await
            .context("failed to read request")?;
        if n == 0 {
            break;
        }

        let response = if buf.last() != Some(&b'\n') && buf.len() > MAX_LINE_BYTES {
            discard_line(&mut reader).await?;
            crate::protocol::format_error("unknown", "E_MESSAGE_TOO_LARGE", "request line too long")
        } else {
            let line = String::from_utf8_lossy(&buf);
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            dispatcher.handle_line(trimmed).await
        };
        writer.write_all(response.as_bytes()).await?;
        writer.flush().await?;
    }
    info!("EOF on stdin");
    Ok(())
}

/// Consume input up to and including the next newline.
async fn discard_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<()> {
    loop {
        let (used, done) = {
            let chunk = reader.fill_buf().await?;
            if chunk.is_empty() {
                return Ok(());
            }
            match chunk.iter().position(|&b| b == b'\n') {
                Some(i) => (i + 1, true),
                None => (chunk.len(), false),
            }
        };
        reader.consume(used);
        if done {
            return Ok(());
        }
    }
}
