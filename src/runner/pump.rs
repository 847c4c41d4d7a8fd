//! Output stream drains.
//!
//! Each pipe of the child gets its own task that reads until end-of-stream,
//! so a child blocked on a full stderr pipe can never stall the stdout reader
//! or the other way round.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Which pipe a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// Standard output
    Stdout,
    /// Standard error
    Stderr,
}

impl StreamKind {
    /// Stream label used in logs and errors
    pub fn as_str(self) -> &'static str {
        match self {
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of child output, forwarded to an optional observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    /// Originating stream
    pub stream: StreamKind,
    /// Line without its trailing newline
    pub line: String,
}

/// Drain `reader` to end-of-stream on a dedicated task.
///
/// Every byte read is kept, byte for byte, in the returned buffer. Complete
/// lines (and a trailing partial line at EOF) are also logged at `info` for
/// stdout and `warn` for stderr, and offered to `tap` if one is attached.
///
/// The tap never slows the drain down: a line that finds the tap channel
/// full is dropped from the tap (it is still captured), and a closed tap is
/// ignored.
pub fn drain<R>(
    reader: R,
    stream: StreamKind,
    tap: Option<mpsc::Sender<OutputLine>>,
) -> JoinHandle<Result<Vec<u8>>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut captured = Vec::new();
        let mut line = Vec::with_capacity(1024);
        let mut lagged = 0u64;

        loop {
            line.clear();
            let n = reader
                .read_until(b'\n', &mut line)
                .await
                .map_err(|source| Error::StreamIo {
                    stream: stream.as_str(),
                    source,
                })?;
            if n == 0 {
                break;
            }
            captured.extend_from_slice(&line);

            let text = String::from_utf8_lossy(trim_newline(&line)).into_owned();
            match stream {
                StreamKind::Stdout => info!(target: "playbook_bridge::runner", stream = "stdout", "{text}"),
                StreamKind::Stderr => warn!(target: "playbook_bridge::runner", stream = "stderr", "{text}"),
            }
            if let Some(tx) = &tap {
                if let Err(TrySendError::Full(_)) = tx.try_send(OutputLine { stream, line: text }) {
                    lagged += 1;
                }
            }
        }

        if lagged > 0 {
            debug!(stream = stream.as_str(), lagged, "Tap was full, lines not forwarded");
        }
        Ok(captured)
    })
}

fn trim_newline(mut buf: &[u8]) -> &[u8] {
    if let [rest @ .., b'\n'] = buf {
        buf = rest;
    }
    if let [rest @ .., b'\r'] = buf {
        buf = rest;
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_captures_bytes_and_taps_lines() {
        let (mut wr, rd) = tokio::io::duplex(64);
        let (tx, mut rx) = mpsc::channel(8);
        let task = drain(rd, StreamKind::Stderr, Some(tx));

        wr.write_all(b"one\r\ntwo\nlast").await.unwrap();
        drop(wr);

        let captured = task.await.unwrap().unwrap();
        assert_eq!(captured, b"one\r\ntwo\nlast");

        let mut lines = Vec::new();
        while let Some(tap) = rx.recv().await {
            assert_eq!(tap.stream, StreamKind::Stderr);
            lines.push(tap.line);
        }
        assert_eq!(lines, vec!["one", "two", "last"]);
    }

    #[tokio::test]
    async fn test_full_tap_does_not_stall_drain() {
        let (mut wr, rd) = tokio::io::duplex(64);
        let (tx, mut rx) = mpsc::channel(1);
        let task = drain(rd, StreamKind::Stdout, Some(tx));

        let mut expected = Vec::new();
        for i in 0..500 {
            let line = format!("line {i}\n");
            wr.write_all(line.as_bytes()).await.unwrap();
            expected.extend_from_slice(line.as_bytes());
        }
        drop(wr);

        let captured = task.await.unwrap().unwrap();
        assert_eq!(captured, expected);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.line, "line 0");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_drain_without_tap_or_newline() {
        let (mut wr, rd) = tokio::io::duplex(8);
        let task = drain(rd, StreamKind::Stdout, None);
        wr.write_all(b"{\"plays\": []}").await.unwrap();
        drop(wr);
        assert_eq!(task.await.unwrap().unwrap(), b"{\"plays\": []}");
    }
}
