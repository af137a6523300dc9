//! Line-oriented frame reader

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use super::frame::PoseFrame;
use crate::control::ControlInput;

/// Counters reported when the source ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    pub forwarded: u64,
    pub dropped: u64,
    pub malformed: u64,
}

/// Reads pose frames and forwards them to the control thread.
///
/// Frames are never queued behind a busy control thread: when the channel
/// is full the frame is dropped.
pub struct FrameReader {
    control_tx: mpsc::Sender<ControlInput>,
}

impl FrameReader {
    pub fn new(control_tx: mpsc::Sender<ControlInput>) -> Self {
        Self { control_tx }
    }

    /// Read until end of input or until the control thread goes away
    pub async fn run<R: AsyncRead + Unpin>(&self, input: R) -> Result<ReaderStats> {
        let mut stats = ReaderStats::default();
        let mut lines = BufReader::new(input).lines();

        info!("reading pose frames");

        while let Some(line) = lines.next_line().await.context("failed to read frame")? {
            if line.trim().is_empty() {
                continue;
            }

            let frame = match PoseFrame::from_json_line(&line) {
                Ok(frame) => frame,
                Err(e) => {
                    stats.malformed += 1;
                    warn!(error = %e, "skipping malformed frame");
                    continue;
                }
            };

            match self.control_tx.try_send(ControlInput::Frame(frame)) {
                Ok(()) => stats.forwarded += 1,
                Err(TrySendError::Full(_)) => {
                    stats.dropped += 1;
                    debug!(dropped = stats.dropped, "control thread busy, dropping frame");
                }
                Err(TrySendError::Closed(_)) => {
                    warn!("control thread gone, stopping frame reader");
                    break;
                }
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_forwards_and_counts() {
        let (tx, mut rx) = mpsc::channel(1);
        let reader = FrameReader::new(tx);
        let input = concat!(
            r#"{"hands_found":false,"frame_size":[640,480]}"#,
            "\n\n",
            "garbage\n",
            r#"{"hands_found":false,"frame_size":[320,240]}"#,
            "\n",
        );

        let stats = tokio_test::block_on(reader.run(input.as_bytes())).unwrap();
        assert_eq!(
            stats,
            ReaderStats {
                forwarded: 1,
                dropped: 1,
                malformed: 1,
            }
        );

        match rx.try_recv() {
            Ok(ControlInput::Frame(frame)) => assert_eq!(frame.frame_size, (640, 480)),
            other => panic!("unexpected input: {:?}", other),
        }
    }
}
