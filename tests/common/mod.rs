//! In-memory toolkit used by the integration suites.
//!
//! `TestNode` implements `ViewNode` over plain data with interior mutability
//! for the transient bits (scroll offset, measurement results), and
//! `TestWindow` implements `Window` with scriptable pixel-copy behavior so
//! tests can drive every strategy and fallback edge.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, Weak};

use viewsnap::view::{CopyCallback, CopyResult};
use viewsnap::{
    Canvas, Color, Insets, MeasureSpec, NodeKind, NodeRef, PaintMode, PixelBuffer, Rect, Result,
    ViewNode,
};

pub struct TestNode {
    pub tag: i64,
    frame: Rect,
    kind: NodeKind,
    background: Option<Color>,
    fill: Option<Color>,
    padding: Insets,
    visible: bool,
    rotation: f32,
    pivot: (f32, f32),
    natural_height: Option<u32>,
    paint_fails: bool,
    measure_fails: bool,
    scroll: Mutex<i32>,
    pub scroll_history: Mutex<Vec<i32>>,
    measured: Mutex<Option<(u32, u32)>>,
    parent: Mutex<Option<Weak<TestNode>>>,
    children: Mutex<Vec<Arc<TestNode>>>,
}

impl TestNode {
    pub fn new(tag: i64, kind: NodeKind, frame: Rect) -> Self {
        Self {
            tag,
            frame,
            kind,
            background: None,
            fill: None,
            padding: Insets::default(),
            visible: true,
            rotation: 0.0,
            pivot: (0.0, 0.0),
            natural_height: None,
            paint_fails: false,
            measure_fails: false,
            scroll: Mutex::new(0),
            scroll_history: Mutex::new(Vec::new()),
            measured: Mutex::new(None),
            parent: Mutex::new(None),
            children: Mutex::new(Vec::new()),
        }
    }

    pub fn background(mut self, color: Color) -> Self {
        self.background = Some(color);
        self
    }

    pub fn fill(mut self, color: Color) -> Self {
        self.fill = Some(color);
        self
    }

    pub fn padding(mut self, padding: Insets) -> Self {
        self.padding = padding;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn rotation(mut self, degrees: f32) -> Self {
        self.rotation = degrees;
        self
    }

    pub fn natural_height(mut self, height: u32) -> Self {
        self.natural_height = Some(height);
        self
    }

    pub fn scrolled_to(self, y: i32) -> Self {
        *self.scroll.lock().unwrap() = y;
        self
    }

    pub fn paint_fails(mut self) -> Self {
        self.paint_fails = true;
        self
    }

    pub fn measure_fails(mut self) -> Self {
        self.measure_fails = true;
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn add_child(parent: &Arc<TestNode>, child: Arc<TestNode>) {
        *child.parent.lock().unwrap() = Some(Arc::downgrade(parent));
        parent.children.lock().unwrap().push(child);
    }

    pub fn find(self: &Arc<Self>, tag: i64) -> Option<Arc<TestNode>> {
        if self.tag == tag {
            return Some(Arc::clone(self));
        }
        for child in self.children.lock().unwrap().iter() {
            if let Some(found) = child.find(tag) {
                return Some(found);
            }
        }
        None
    }

    pub fn current_scroll(&self) -> i32 {
        *self.scroll.lock().unwrap()
    }
}

impl ViewNode for TestNode {
    fn frame(&self) -> Rect {
        self.frame
    }

    fn visible(&self) -> bool {
        self.visible
    }

    fn kind(&self) -> NodeKind {
        self.kind
    }

    fn background(&self) -> Option<Color> {
        self.background
    }

    fn padding(&self) -> Insets {
        self.padding
    }

    fn rotation(&self) -> f32 {
        self.rotation
    }

    fn pivot(&self) -> (f32, f32) {
        self.pivot
    }

    fn scroll_y(&self) -> i32 {
        *self.scroll.lock().unwrap()
    }

    fn set_scroll_y(&self, y: i32) {
        *self.scroll.lock().unwrap() = y;
        self.scroll_history.lock().unwrap().push(y);
    }

    fn children(&self) -> Vec<NodeRef> {
        self.children
            .lock()
            .unwrap()
            .iter()
            .map(|c| Arc::clone(c) as NodeRef)
            .collect()
    }

    fn parent(&self) -> Option<NodeRef> {
        self.parent
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|w| w.upgrade())
            .map(|p| p as NodeRef)
    }

    fn measured_height(&self) -> Option<u32> {
        self.measured.lock().unwrap().map(|(_, h)| h)
    }

    fn measured_width(&self) -> Option<u32> {
        self.measured.lock().unwrap().map(|(w, _)| w)
    }

    fn measure(&self, width: MeasureSpec, _height: MeasureSpec) -> Result<(u32, u32)> {
        if self.measure_fails {
            return Err(viewsnap::Error::Other("measurement failed".into()));
        }
        let mw = match width {
            MeasureSpec::Exactly(w) | MeasureSpec::AtMost(w) => w,
            MeasureSpec::Unspecified => self.frame.width,
        };
        let mh = self.natural_height.unwrap_or(self.frame.height);
        *self.measured.lock().unwrap() = Some((mw, mh));
        for child in self.children.lock().unwrap().iter() {
            let _ = child.measure(MeasureSpec::Unspecified, MeasureSpec::Unspecified);
        }
        Ok((mw, mh))
    }

    fn location_in_window(&self) -> (i32, i32) {
        let (px, py) = self
            .parent()
            .map(|p| p.location_in_window())
            .unwrap_or((0, 0));
        (px + self.frame.left, py + self.frame.top)
    }

    fn paint(&self, canvas: &mut Canvas<'_>, mode: PaintMode) -> Result<()> {
        if self.paint_fails {
            return Err(viewsnap::Error::Other("paint failed".into()));
        }
        if mode == PaintMode::Full {
            if let Some(bg) = self.background {
                canvas.fill_rect(Rect::new(0, 0, self.frame.width, self.frame.height), bg);
            }
        }
        if let Some(fill) = self.fill {
            canvas.fill_rect(Rect::new(0, 0, self.frame.width, self.frame.height), fill);
        }
        let scroll = *self.scroll.lock().unwrap();
        for child in self.children.lock().unwrap().iter() {
            if !child.visible {
                continue;
            }
            // texture/surface children are fetched and blitted separately
            if matches!(child.kind, NodeKind::Texture | NodeKind::Surface) {
                continue;
            }
            let cf = child.frame;
            let save = canvas.save();
            canvas.translate(cf.left as f32, (cf.top - scroll) as f32);
            child.paint(canvas, PaintMode::Full)?;
            canvas.restore_to_count(save);
        }
        Ok(())
    }
}

/// Scriptable behavior for the asynchronous readback primitives.
pub enum CopyBehavior {
    Unsupported,
    /// Fill the destination with a solid color and report success
    Succeed(Color),
    /// Invoke the callback with a failure code
    Fail,
    /// Hold the callback forever, forcing the bounded wait to elapse
    NeverComplete,
}

pub struct TestWindow {
    pub root: Arc<TestNode>,
    pub pixel_copy: CopyBehavior,
    pub surface_copy: CopyBehavior,
    /// Color every texture snapshot is filled with; `None` makes snapshots
    /// fail
    pub texture_color: Option<Color>,
    /// Stale drawing-buffer frame returned when surface copy is unsupported
    pub cached_surface: Option<Color>,
    pending: Mutex<Vec<(CopyCallback, PixelBuffer)>>,
}

impl TestWindow {
    pub fn new(root: Arc<TestNode>) -> Self {
        Self {
            root,
            pixel_copy: CopyBehavior::Unsupported,
            surface_copy: CopyBehavior::Unsupported,
            texture_color: Some(Color::BLACK),
            cached_surface: None,
            pending: Mutex::new(Vec::new()),
        }
    }

    fn run_behavior(
        behavior: &CopyBehavior,
        mut dest: PixelBuffer,
        done: CopyCallback,
        pending: &Mutex<Vec<(CopyCallback, PixelBuffer)>>,
    ) {
        match behavior {
            CopyBehavior::Succeed(color) => {
                dest.fill(*color);
                dest.mark_valid();
                done(CopyResult {
                    buffer: dest,
                    ok: true,
                });
            }
            CopyBehavior::Fail | CopyBehavior::Unsupported => {
                done(CopyResult {
                    buffer: dest,
                    ok: false,
                });
            }
            CopyBehavior::NeverComplete => {
                // keep the callback alive so the waiter times out instead of
                // observing a dropped channel
                pending.lock().unwrap().push((done, dest));
            }
        }
    }
}

impl viewsnap::Window for TestWindow {
    fn root_content_node(&self) -> Option<NodeRef> {
        Some(Arc::clone(&self.root) as NodeRef)
    }

    fn resolve_node(&self, tag: i64) -> Option<NodeRef> {
        self.root.find(tag).map(|n| n as NodeRef)
    }

    fn supports_pixel_copy(&self) -> bool {
        !matches!(self.pixel_copy, CopyBehavior::Unsupported)
    }

    fn request_pixel_copy(&self, _rect: Rect, dest: PixelBuffer, done: CopyCallback) {
        Self::run_behavior(&self.pixel_copy, dest, done, &self.pending);
    }

    fn supports_surface_copy(&self) -> bool {
        !matches!(self.surface_copy, CopyBehavior::Unsupported)
    }

    fn request_surface_copy(&self, _node: &dyn ViewNode, dest: PixelBuffer, done: CopyCallback) {
        Self::run_behavior(&self.surface_copy, dest, done, &self.pending);
    }

    fn texture_snapshot(&self, _node: &dyn ViewNode, dest: &mut PixelBuffer) -> Result<()> {
        match self.texture_color {
            Some(color) => {
                dest.fill(color);
                dest.mark_valid();
                Ok(())
            }
            None => Err(viewsnap::Error::Other("texture snapshot unavailable".into())),
        }
    }

    fn cached_surface_frame(&self, node: &dyn ViewNode) -> Option<PixelBuffer> {
        self.cached_surface.map(|color| {
            let frame = node.frame();
            let mut buf = PixelBuffer::new(frame.width, frame.height);
            buf.fill(color);
            buf.mark_valid();
            buf
        })
    }
}

/// Route `log` output through the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Decode a base64 payload (optionally after a raw `"<w>:<h>|"` header).
pub fn decode_base64(data: &str) -> Vec<u8> {
    use base64::Engine as _;
    base64::engine::general_purpose::STANDARD
        .decode(data)
        .expect("payload is valid base64")
}
