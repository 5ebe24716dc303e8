//! Terminal input plumbing.
//!
//! Stdin is read by a single background task and fanned out as lines. The
//! shell reads commands from it, and a USB keyboard-wedge QR scanner (which
//! types the decoded text followed by Enter) is consumed from the same feed.

use async_trait::async_trait;
use btc2_wallet::{CaptureSource, ScanError};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, Mutex};

/// Shared handle to the stdin line feed.
#[derive(Clone)]
pub struct Lines(Arc<Mutex<mpsc::UnboundedReceiver<String>>>);

impl Lines {
    /// Start reading stdin. Must be called after any `rpassword` prompt.
    pub fn spawn_stdin() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
        Self(Arc::new(Mutex::new(rx)))
    }

    /// Next input line, `None` on EOF.
    pub async fn next(&self) -> Option<String> {
        self.0.lock().await.recv().await
    }
}

/// Keyboard-wedge scanner: each non-blank input line is one decoded code.
pub struct WedgeScanner {
    lines: Lines,
    open: bool,
}

impl WedgeScanner {
    pub fn new(lines: Lines) -> Self {
        Self { lines, open: false }
    }
}

#[async_trait]
impl CaptureSource for WedgeScanner {
    fn open(&mut self) -> Result<(), ScanError> {
        self.open = true;
        println!("Scan a QR code now (Ctrl-C to cancel)...");
        Ok(())
    }

    async fn next_event(&mut self) -> Option<Result<String, ScanError>> {
        let line = self.lines.next().await?;
        if line.trim().is_empty() {
            Some(Err(ScanError::NoCode("blank input line".into())))
        } else {
            Some(Ok(line))
        }
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            log::debug!("scanner input released");
        }
    }
}
