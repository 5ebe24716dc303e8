//! QR address capture and display.
//!
//! Decoding is delegated to a `CaptureSource` (camera plus decoder). A scan
//! opens the source, takes the first decoded text, and closes it again.
//! The source is closed through a guard, so it is released on every exit
//! path, including when the scan future is dropped mid-flight.

use async_trait::async_trait;
use qrcode::render::{svg, unicode};
use qrcode::types::QrError;
use qrcode::{EcLevel, QrCode};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    /// The capture device could not be opened.
    #[error("camera unavailable: {0}")]
    Unavailable(String),

    /// A frame contained no readable code. Not fatal.
    #[error("no code in frame: {0}")]
    NoCode(String),
}

/// A camera-backed QR decoder.
#[async_trait]
pub trait CaptureSource: Send {
    /// Acquire the device.
    fn open(&mut self) -> Result<(), ScanError>;

    /// Next decode attempt. `None` when the source has no more frames.
    async fn next_event(&mut self) -> Option<Result<String, ScanError>>;

    /// Release the device. Must be safe to call when not open.
    fn close(&mut self);
}

/// An open capture source; closing happens on drop.
pub struct CaptureGuard<'a> {
    source: &'a mut dyn CaptureSource,
}

impl<'a> CaptureGuard<'a> {
    pub fn acquire(source: &'a mut dyn CaptureSource) -> Result<Self, ScanError> {
        source.open()?;
        log::debug!("capture started");
        Ok(Self { source })
    }

    pub async fn next_event(&mut self) -> Option<Result<String, ScanError>> {
        self.source.next_event().await
    }
}

impl Drop for CaptureGuard<'_> {
    fn drop(&mut self) {
        self.source.close();
        log::debug!("capture released");
    }
}

/// Single-shot scanner over a capture source.
pub struct QrScanner {
    source: Box<dyn CaptureSource>,
}

impl QrScanner {
    pub fn new(source: Box<dyn CaptureSource>) -> Self {
        Self { source }
    }

    /// Scan until the first decoded text, then stop. Decode misses are
    /// skipped. Returns `None` if the source runs dry first.
    pub async fn scan_once(&mut self) -> Result<Option<String>, ScanError> {
        let mut capture = CaptureGuard::acquire(self.source.as_mut())?;

        while let Some(event) = capture.next_event().await {
            match event {
                Ok(text) => {
                    let text = text.trim();
                    if text.is_empty() {
                        continue;
                    }
                    return Ok(Some(text.to_string()));
                }
                Err(e) => log::trace!("{}", e),
            }
        }

        Ok(None)
    }

    /// Run a scan and hand the decoded text to `on_decoded` exactly once.
    /// Returns whether a code was decoded.
    pub async fn start_scan<F>(&mut self, on_decoded: F) -> Result<bool, ScanError>
    where
        F: FnOnce(String) + Send,
    {
        match self.scan_once().await? {
            Some(text) => {
                on_decoded(text);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// How an address is drawn.
#[derive(Debug, Clone, Copy)]
pub struct QrRenderOptions {
    /// Minimum edge length in pixels (SVG).
    pub size: u32,
    pub ec_level: EcLevel,
}

impl Default for QrRenderOptions {
    fn default() -> Self {
        Self {
            size: 256,
            ec_level: EcLevel::H,
        }
    }
}

/// Encode `value` as an SVG document.
pub fn render_svg(value: &str, opts: &QrRenderOptions) -> Result<String, QrError> {
    let code = QrCode::with_error_correction_level(value.as_bytes(), opts.ec_level)?;
    Ok(code
        .render()
        .min_dimensions(opts.size, opts.size)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build())
}

/// Encode `value` as half-block text for a terminal.
pub fn render_terminal(value: &str, ec_level: EcLevel) -> Result<String, QrError> {
    let code = QrCode::with_error_correction_level(value.as_bytes(), ec_level)?;
    Ok(code
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .quiet_zone(true)
        .build())
}
