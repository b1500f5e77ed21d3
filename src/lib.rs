//! Viewsnap
//!
//! A capture-and-encode pipeline for live view hierarchies: renders a node
//! tree into an ARGB pixel buffer despite overflow, scrolling, and
//! hardware-composited sub-surfaces, then serializes the buffer into
//! JPEG/PNG/WebP or raw pixels delivered as base64 text, a data URI, or a
//! file.
//!
//! # Features
//!
//! - **Strategy fallback chain**: five capture strategies with ordered
//!   fallback, so a partially failing platform path degrades instead of
//!   aborting
//! - **Toolkit seam**: the UI toolkit is reached only through the
//!   [`ViewNode`]/[`Window`] traits, keeping the pipeline host-agnostic
//! - **Buffer reuse**: large pixel buffers are pooled across captures
//!
//! # Example
//!
//! ```no_run
//! use viewsnap::{capture_view, BufferPool, CaptureConfig, CaptureTarget, ImageFormat, SinkKind};
//!
//! fn snapshot(window: &dyn viewsnap::Window) -> viewsnap::Result<()> {
//!     let pool = BufferPool::new();
//!     let mut config = CaptureConfig::new(CaptureTarget::Node(42));
//!     config.format = ImageFormat::Png;
//!     config.sink = SinkKind::Base64;
//!     let output = capture_view(window, &pool, &config)?;
//!     println!("captured {}x{}", output.resolution.width, output.resolution.height);
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{Error, Result};

pub mod pool;
pub use pool::{BufferPool, PixelBuffer};

pub mod view;
pub use view::{Color, Insets, MeasureSpec, NodeKind, NodeRef, PaintMode, Rect, ViewNode, Window};

pub mod canvas;
pub use canvas::{Canvas, TransformMatrix};

pub mod compositor;
pub mod extent;

pub mod capture;
pub use capture::capture_view;

pub mod encode;

// Async-friendly capture facade (worker-thread backed)
pub mod async_api;
pub use async_api::Capturer;

/// What the capture request points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureTarget {
    /// The window's root content node
    FullScreen,
    /// A node resolved by its host-assigned tag
    Node(i64),
}

/// Output image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
    /// Interleaved ARGB samples, no compression
    Raw,
}

impl ImageFormat {
    /// Canonical MIME subtype, normalizing the informal `jpg` alias.
    /// `None` for raw pixels, which have no registered subtype.
    pub fn mime_subtype(self) -> Option<&'static str> {
        match self {
            ImageFormat::Jpeg => Some("jpeg"),
            ImageFormat::Png => Some("png"),
            ImageFormat::Webp => Some("webp"),
            ImageFormat::Raw => None,
        }
    }

    /// Parse a file extension, accepting the `jpg` alias.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            "webp" => Some(ImageFormat::Webp),
            "raw" => Some(ImageFormat::Raw),
            _ => None,
        }
    }
}

/// Where the encoded result goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SinkKind {
    /// Base64 text of the encoded payload
    Base64,
    /// Base64 text of the deflated raw payload (raw format only; other
    /// formats pass through unchanged)
    ZipBase64,
    /// `data:image/<subtype>;base64,<payload>`
    DataUri,
    /// Direct byte write; the result string is the file's URI-style path
    File(PathBuf),
}

/// Pixel dimensions actually produced by a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// The ASCII header prefixed to raw output: `"<width>:<height>|"`.
    pub fn raw_header(&self) -> String {
        format!("{}:{}|", self.width, self.height)
    }
}

/// Read-only description of one capture request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// What to capture
    pub target: CaptureTarget,
    /// Output encoding
    pub format: ImageFormat,
    /// Compression quality in [0, 1]
    pub quality: f64,
    /// Explicit output width; scaling runs only when height is also set
    pub width: Option<u32>,
    /// Explicit output height; scaling runs only when width is also set
    pub height: Option<u32>,
    /// Result sink
    pub sink: SinkKind,
    /// Snapshot the full content of a scrollable container, not just the
    /// visible viewport
    pub snapshot_content: bool,
    /// Composite GL-surface children into the result
    pub handle_gl_surface: bool,
}

impl CaptureConfig {
    /// Config with conservative defaults: PNG at full quality, base64 sink,
    /// natural size, no scroll-content expansion.
    pub fn new(target: CaptureTarget) -> Self {
        Self {
            target,
            format: ImageFormat::Png,
            quality: 1.0,
            width: None,
            height: None,
            sink: SinkKind::Base64,
            snapshot_content: false,
            handle_gl_surface: false,
        }
    }

    /// Explicit output resolution, present only when both dimensions are set.
    pub fn target_resolution(&self) -> Option<Resolution> {
        match (self.width, self.height) {
            (Some(width), Some(height)) => Some(Resolution { width, height }),
            _ => None,
        }
    }
}

/// Result of one capture: the produced resolution and the encoded payload
/// (base64 text, data URI, or file path depending on the sink).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureOutput {
    pub resolution: Resolution,
    pub data: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CaptureConfig::new(CaptureTarget::Node(7));
        assert_eq!(config.format, ImageFormat::Png);
        assert_eq!(config.quality, 1.0);
        assert_eq!(config.sink, SinkKind::Base64);
        assert!(!config.snapshot_content);
        assert!(config.target_resolution().is_none());
    }

    #[test]
    fn target_resolution_requires_both_dimensions() {
        let mut config = CaptureConfig::new(CaptureTarget::FullScreen);
        config.width = Some(100);
        assert!(config.target_resolution().is_none());
        config.height = Some(50);
        assert_eq!(
            config.target_resolution(),
            Some(Resolution {
                width: 100,
                height: 50
            })
        );
    }

    #[test]
    fn mime_subtype_normalizes_jpg() {
        assert_eq!(ImageFormat::from_extension("jpg"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::Jpeg.mime_subtype(), Some("jpeg"));
        assert_eq!(ImageFormat::Raw.mime_subtype(), None);
    }

    #[test]
    fn raw_header_format() {
        let res = Resolution {
            width: 640,
            height: 480,
        };
        assert_eq!(res.raw_header(), "640:480|");
    }
}
