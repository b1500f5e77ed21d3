//! Outbound interface to the UI toolkit
//!
//! The pipeline never owns the view hierarchy. It borrows nodes for the
//! duration of one capture through the [`ViewNode`] trait and reaches
//! platform capture primitives (window readback, per-node texture and
//! GL-surface snapshots) through the [`Window`] trait. Host toolkits
//! implement both; the crate's tests provide an in-memory implementation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::canvas::Canvas;
use crate::error::Result;
use crate::pool::PixelBuffer;

/// Shared handle to one node of the visual hierarchy.
pub type NodeRef = Arc<dyn ViewNode>;

/// Completion callback for asynchronous platform readbacks.
///
/// Must be invoked exactly once. Ownership of the destination buffer travels
/// through the callback so the platform can fill it from its own thread.
pub type CopyCallback = Box<dyn FnOnce(CopyResult) + Send + 'static>;

/// Outcome of an asynchronous pixel readback.
///
/// The buffer is always handed back, filled on success and untouched (or
/// partially written) on failure.
pub struct CopyResult {
    pub buffer: PixelBuffer,
    pub ok: bool,
}

/// Packed ARGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub const TRANSPARENT: Color = Color(0);
    pub const WHITE: Color = Color(0xFFFF_FFFF);
    pub const BLACK: Color = Color(0xFF00_0000);

    pub fn from_argb(a: u8, r: u8, g: u8, b: u8) -> Self {
        Color((a as u32) << 24 | (r as u32) << 16 | (g as u32) << 8 | b as u32)
    }

    pub fn a(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub fn r(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub fn g(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn b(self) -> u8 {
        self.0 as u8
    }
}

/// Node frame: position within the parent plus laid-out size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(left: i32, top: i32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }
}

/// Padding on each edge of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Insets {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

/// What kind of node the pipeline is looking at.
///
/// `Texture` and `Surface` nodes render through an independent hardware path
/// and must be fetched and blitted rather than painted inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    Plain,
    Container,
    Scrollable,
    Texture,
    Surface,
}

impl NodeKind {
    /// Container-like nodes the extent calculator recurses into.
    pub fn is_group(self) -> bool {
        matches!(self, NodeKind::Container | NodeKind::Scrollable)
    }
}

/// Measurement constraint passed to [`ViewNode::measure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasureSpec {
    /// The node must be exactly this many pixels
    Exactly(u32),
    /// The node may be at most this many pixels
    AtMost(u32),
    /// No constraint; the node reports its natural size
    Unspecified,
}

/// Whether an inline paint should include the node's own background.
///
/// Strategies that have already painted the background (or a solid substitute)
/// suppress it during dispatch to avoid double-compositing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaintMode {
    Full,
    SkipBackground,
}

/// One element of the visual hierarchy being captured.
///
/// Borrowed for the duration of a single capture. The pipeline never mutates
/// persistent node state through this trait except the transient scroll
/// offset, which is always restored.
pub trait ViewNode: Send + Sync {
    /// Position within the parent and laid-out size.
    fn frame(&self) -> Rect;

    fn visible(&self) -> bool;

    fn kind(&self) -> NodeKind;

    /// Declared background, if any.
    fn background(&self) -> Option<Color> {
        None
    }

    fn padding(&self) -> Insets {
        Insets::default()
    }

    /// Bottom margin declared by the node's layout params.
    fn margin_bottom(&self) -> i32 {
        0
    }

    /// Additional translation on top of the frame position.
    fn translation(&self) -> (f32, f32) {
        (0.0, 0.0)
    }

    /// Rotation in degrees about [`ViewNode::pivot`].
    fn rotation(&self) -> f32 {
        0.0
    }

    /// Scale factors about [`ViewNode::pivot`].
    fn scale(&self) -> (f32, f32) {
        (1.0, 1.0)
    }

    /// Transform pivot in node-local coordinates.
    fn pivot(&self) -> (f32, f32) {
        (0.0, 0.0)
    }

    /// Current vertical scroll offset.
    fn scroll_y(&self) -> i32 {
        0
    }

    /// Set the vertical scroll offset. Only ever called transiently, paired
    /// with a restore of the previous value.
    fn set_scroll_y(&self, _y: i32) {}

    /// Immediate children, in paint order.
    fn children(&self) -> Vec<NodeRef> {
        Vec::new()
    }

    /// Parent link, absent for detached nodes and the window root.
    fn parent(&self) -> Option<NodeRef> {
        None
    }

    /// Height from the most recent measurement pass, if one ran.
    fn measured_height(&self) -> Option<u32> {
        None
    }

    /// Width from the most recent measurement pass, if one ran.
    fn measured_width(&self) -> Option<u32> {
        None
    }

    /// Run a measurement pass with the given constraints, returning the
    /// measured (width, height).
    fn measure(&self, width: MeasureSpec, height: MeasureSpec) -> Result<(u32, u32)>;

    /// Top-left corner of the node in window coordinates.
    fn location_in_window(&self) -> (i32, i32);

    /// Toggle the opacity fill of a texture-backed node. No-op elsewhere.
    fn set_texture_opaque(&self, _opaque: bool) {}

    /// Standard recursive paint of the node and its descendants through the
    /// canvas's current transform.
    fn paint(&self, canvas: &mut Canvas<'_>, mode: PaintMode) -> Result<()>;
}

/// Platform capture capabilities of the window hosting the hierarchy.
pub trait Window: Send + Sync {
    /// The window's root content node, used for full-screen captures.
    fn root_content_node(&self) -> Option<NodeRef>;

    /// Resolve a node by its host-assigned tag.
    fn resolve_node(&self, tag: i64) -> Option<NodeRef>;

    /// Whether the platform exposes the synchronous-callback window readback.
    fn supports_pixel_copy(&self) -> bool {
        false
    }

    /// Issue an asynchronous readback of a window-relative rectangle into
    /// `dest`. The callback fires exactly once, on any thread.
    fn request_pixel_copy(&self, rect: Rect, dest: PixelBuffer, done: CopyCallback) {
        let _ = rect;
        done(CopyResult {
            buffer: dest,
            ok: false,
        });
    }

    /// Whether GL-surface nodes support asynchronous per-node readback.
    fn supports_surface_copy(&self) -> bool {
        false
    }

    /// Issue an asynchronous readback of a GL-surface node into `dest`.
    fn request_surface_copy(&self, node: &dyn ViewNode, dest: PixelBuffer, done: CopyCallback) {
        let _ = node;
        done(CopyResult {
            buffer: dest,
            ok: false,
        });
    }

    /// Synchronously snapshot a texture-backed node into `dest`.
    fn texture_snapshot(&self, node: &dyn ViewNode, dest: &mut PixelBuffer) -> Result<()>;

    /// Last cached drawing-buffer frame of a GL-surface node, used when
    /// asynchronous readback is unavailable. May be stale.
    fn cached_surface_frame(&self, _node: &dyn ViewNode) -> Option<PixelBuffer> {
        None
    }
}
