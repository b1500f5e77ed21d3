//! Capture Strategy Engine
//!
//! Turns one node of a live hierarchy into a filled pixel buffer. Exactly one
//! of five strategies runs per capture, chosen from the target's kind, the
//! request flags, and platform capability; the pixel-copy and oversized
//! strategies can fall back internally to direct draw. After the primary
//! render, descendants that draw through an independent hardware path
//! (texture and GL-surface nodes) are fetched separately and blitted through
//! the transform compositor. Internal failures degrade and are logged; the
//! only errors that reach the caller are target resolution, invalid geometry,
//! and encoding failures.

use std::sync::mpsc;
use std::time::Duration;

use crate::canvas::Canvas;
use crate::compositor;
use crate::encode;
use crate::error::{Error, Result};
use crate::extent;
use crate::pool::{BufferPool, PixelBuffer};
use crate::view::{Color, CopyResult, NodeKind, NodeRef, PaintMode, Rect, ViewNode, Window};
use crate::{CaptureConfig, CaptureOutput, CaptureTarget};

/// Ceiling on every bounded wait for an asynchronous platform readback.
pub const COPY_TIMEOUT: Duration = Duration::from_secs(5);

/// The mutually exclusive render strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    /// Whole-window capture through the root content node
    FullScreen,
    /// Expand a scrollable container to its full content height
    ScrollContent,
    /// Synchronous-callback window readback with direct-draw fallback
    PixelCopy,
    /// Container whose content extent exceeds its laid-out height; carries
    /// the computed extent
    Oversized(u32),
    /// Standard recursive paint, the fallback of last resort
    DirectDraw,
}

/// Capture one node and serialize it per `config`.
///
/// The buffer is checked out of `pool`, filled by the chosen strategy,
/// composited with special children, encoded, and returned to the pool
/// whether encoding succeeded or not.
pub fn capture_view(
    window: &dyn Window,
    pool: &BufferPool,
    config: &CaptureConfig,
) -> Result<CaptureOutput> {
    let node = resolve_target(window, config)?;
    let frame = node.frame();
    if frame.width == 0 || frame.height == 0 {
        return Err(Error::InvalidGeometry(format!(
            "view has invalid dimensions {}x{}",
            frame.width, frame.height
        )));
    }
    log::debug!("initial view dimensions: {}x{}", frame.width, frame.height);

    let buffer = render(window, pool, config, &node);

    let result = encode::encode(
        &buffer,
        config.target_resolution(),
        config.format,
        config.quality,
        &config.sink,
    );
    pool.release(buffer);
    let (resolution, data) = result?;
    Ok(CaptureOutput { resolution, data })
}

fn resolve_target(window: &dyn Window, config: &CaptureConfig) -> Result<NodeRef> {
    match config.target {
        CaptureTarget::FullScreen => window.root_content_node().ok_or_else(|| {
            Error::TargetNotFound("no root view found for full screen capture".into())
        }),
        CaptureTarget::Node(tag) => window
            .resolve_node(tag)
            .ok_or_else(|| Error::TargetNotFound(format!("no view found with tag {}", tag))),
    }
}

/// Fill a buffer for `node`. Infallible by design: every internal failure
/// degrades to a best-effort render.
fn render(
    window: &dyn Window,
    pool: &BufferPool,
    config: &CaptureConfig,
    node: &NodeRef,
) -> PixelBuffer {
    let strategy = choose_strategy(window, config, node);
    log::debug!("capture strategy: {:?}", strategy);

    let frame = node.frame();
    let height = match strategy {
        Strategy::ScrollContent => extent::scrollable_extent(node.as_ref()),
        Strategy::Oversized(extent) => extent,
        _ => frame.height,
    };
    if height != frame.height {
        log::debug!("adjusted capture height from {} to {}", frame.height, height);
    }

    let mut buffer = pool.acquire(frame.width, height);
    match strategy {
        Strategy::FullScreen | Strategy::PixelCopy => {
            buffer = pixel_copy_or_direct(window, pool, node, buffer);
        }
        Strategy::ScrollContent => scroll_content_draw(node, &mut buffer),
        Strategy::Oversized(_) => oversized_draw(node, &mut buffer),
        Strategy::DirectDraw => direct_draw(node, &mut buffer),
    }
    buffer.mark_valid();

    composite_special_children(window, pool, config, node, &mut buffer);

    buffer
}

/// Pick the single strategy for this capture.
fn choose_strategy(window: &dyn Window, config: &CaptureConfig, node: &NodeRef) -> Strategy {
    if config.target == CaptureTarget::FullScreen {
        return Strategy::FullScreen;
    }

    let kind = node.kind();
    if config.snapshot_content && kind == NodeKind::Scrollable && !node.children().is_empty() {
        return Strategy::ScrollContent;
    }

    if kind.is_group() {
        let extent = extent::container_extent(node.as_ref());
        if extent > node.frame().height {
            return Strategy::Oversized(extent);
        }
    }

    if window.supports_pixel_copy() && kind != NodeKind::Surface {
        return Strategy::PixelCopy;
    }

    Strategy::DirectDraw
}

/// Strategy 3 (and the full-screen path): issue a window readback bound to
/// the node's window-relative rectangle and block on a single-fire channel
/// with a fixed timeout. Failure or timeout falls through to direct draw.
fn pixel_copy_or_direct(
    window: &dyn Window,
    pool: &BufferPool,
    node: &NodeRef,
    buffer: PixelBuffer,
) -> PixelBuffer {
    if !window.supports_pixel_copy() {
        let mut buffer = buffer;
        direct_draw(node, &mut buffer);
        return buffer;
    }

    let frame = node.frame();
    let (x, y) = node.location_in_window();
    let rect = Rect::new(x, y, frame.width, frame.height);

    let (tx, rx) = mpsc::sync_channel::<CopyResult>(1);
    window.request_pixel_copy(
        rect,
        buffer,
        Box::new(move |result| {
            let _ = tx.send(result);
        }),
    );

    match rx.recv_timeout(COPY_TIMEOUT) {
        Ok(result) if result.ok => result.buffer,
        Ok(result) => {
            log::error!("pixel copy reported failure, falling back to direct draw");
            let mut buffer = result.buffer;
            buffer.clear();
            direct_draw(node, &mut buffer);
            buffer
        }
        Err(_) => {
            // the callback still owns the buffer; it is lost to the pool
            log::error!(
                "pixel copy did not complete within {:?}, falling back to direct draw",
                COPY_TIMEOUT
            );
            let mut buffer = pool.acquire(frame.width, frame.height);
            direct_draw(node, &mut buffer);
            buffer
        }
    }
}

/// Strategy 5: paint the declared background and dispatch the node's own
/// recursive paint. Never propagates an error past this boundary.
fn direct_draw(node: &NodeRef, buffer: &mut PixelBuffer) {
    let mut canvas = Canvas::new(buffer);
    if let Some(bg) = node.background() {
        let full = Rect::new(0, 0, canvas.width(), canvas.height());
        canvas.fill_rect(full, bg);
    }

    // containers already had their background painted above; suppress it
    // during dispatch to avoid double-compositing
    let mode = if node.kind().is_group() {
        PaintMode::SkipBackground
    } else {
        PaintMode::Full
    };
    if let Err(err) = node.paint(&mut canvas, mode) {
        log::error!("error drawing view: {}", err);
        // last resort: the simplest paint call, leaving the buffer
        // best-effort blank if that fails too
        if let Err(err) = node.paint(&mut canvas, PaintMode::Full) {
            log::error!("fatal error drawing view: {}", err);
        }
    }
}

/// Restores a scroll offset when dropped, even if drawing panicked or bailed
/// early.
struct ScrollGuard<'a> {
    node: &'a dyn ViewNode,
    original: i32,
}

impl Drop for ScrollGuard<'_> {
    fn drop(&mut self) {
        self.node.set_scroll_y(self.original);
    }
}

/// Strategy 2: zero the scroll offset, paint a solid background, and draw
/// only the content child offset by the container's padding. The scroll
/// offset is restored unconditionally.
fn scroll_content_draw(node: &NodeRef, buffer: &mut PixelBuffer) {
    let children = node.children();
    let Some(content) = children.first() else {
        // no content child; fall back to the regular capture method
        direct_draw(node, buffer);
        return;
    };

    let _guard = ScrollGuard {
        node: node.as_ref(),
        original: node.scroll_y(),
    };
    node.set_scroll_y(0);

    let mut canvas = Canvas::new(buffer);
    canvas.draw_color(Color::WHITE);

    let padding = node.padding();
    let save = canvas.save();
    canvas.translate(padding.left as f32, padding.top as f32);

    // draw only the content, not the scroll container itself, to avoid
    // recursive double-compositing
    let mode = if content.kind().is_group() {
        PaintMode::SkipBackground
    } else {
        PaintMode::Full
    };
    if let Err(err) = content.paint(&mut canvas, mode) {
        log::error!("error drawing scroll content: {}", err);
        if let Err(err) = content.paint(&mut canvas, PaintMode::Full) {
            log::error!("error in fallback content draw: {}", err);
        }
    }

    canvas.restore_to_count(save);
}

/// Strategy 4: the container's content extends past its laid-out height.
/// Stretch the background over the full computed height, then composite the
/// children.
fn oversized_draw(node: &NodeRef, buffer: &mut PixelBuffer) {
    let mut canvas = Canvas::new(buffer);
    let full = Rect::new(0, 0, canvas.width(), canvas.height());
    if let Some(bg) = node.background() {
        canvas.fill_rect(full, bg);
    }
    composite_group(node, &mut canvas);
}

/// Direct composite draw with a per-child fallback: if the group's own paint
/// throws, draw each visible child individually under its own save/restore,
/// recursing into children that overflow the group.
fn composite_group(node: &NodeRef, canvas: &mut Canvas<'_>) {
    let save = canvas.save();
    if let Err(err) = node.paint(canvas, PaintMode::Full) {
        log::error!("error in direct group draw: {}", err);
        let group_height = node.frame().height as i32;
        for child in node.children() {
            if !child.visible() {
                continue;
            }
            let child_frame = child.frame();
            let child_save = canvas.save();
            canvas.translate(child_frame.left as f32, child_frame.top as f32);
            if let Err(err) = child.paint(canvas, PaintMode::Full) {
                log::error!("error drawing child: {}", err);
            }
            if child.kind().is_group()
                && child_frame.top + child_frame.height as i32 > group_height
            {
                composite_group(&child, canvas);
            }
            canvas.restore_to_count(child_save);
        }
    }
    canvas.restore_to_count(save);
}

/// Collect visible texture/GL-surface descendants in paint order.
fn collect_special(node: &NodeRef) -> Vec<NodeRef> {
    let mut out = Vec::new();
    for child in node.children() {
        if !child.visible() {
            continue;
        }
        match child.kind() {
            NodeKind::Texture | NodeKind::Surface => out.push(child),
            kind if kind.is_group() => out.extend(collect_special(&child)),
            _ => {}
        }
    }
    out
}

/// Fetch each special child's pixels through the platform's own primitive
/// and blit it onto the primary buffer through the composed ancestor
/// transform. Any failure skips that child, never the capture.
fn composite_special_children(
    window: &dyn Window,
    pool: &BufferPool,
    config: &CaptureConfig,
    root: &NodeRef,
    buffer: &mut PixelBuffer,
) {
    let specials = collect_special(root);
    if specials.is_empty() {
        return;
    }

    let mut canvas = Canvas::new(buffer);
    for child in specials {
        let frame = child.frame();
        if frame.width == 0 || frame.height == 0 {
            continue;
        }

        match child.kind() {
            NodeKind::Texture => {
                // switch off the opacity fill so transparent regions of the
                // texture keep the content drawn underneath
                child.set_texture_opaque(false);
                let mut snapshot = pool.acquire(frame.width, frame.height);
                match window.texture_snapshot(child.as_ref(), &mut snapshot) {
                    Ok(()) => blit_special(&mut canvas, root, &child, &snapshot),
                    Err(err) => log::error!("error getting texture snapshot: {}", err),
                }
                pool.release(snapshot);
            }
            NodeKind::Surface => {
                if !config.handle_gl_surface {
                    continue;
                }
                if window.supports_surface_copy() {
                    let snapshot = pool.acquire(frame.width, frame.height);
                    let (tx, rx) = mpsc::sync_channel::<CopyResult>(1);
                    window.request_surface_copy(
                        child.as_ref(),
                        snapshot,
                        Box::new(move |result| {
                            let _ = tx.send(result);
                        }),
                    );
                    match rx.recv_timeout(COPY_TIMEOUT) {
                        Ok(result) if result.ok => {
                            blit_special(&mut canvas, root, &child, &result.buffer);
                            pool.release(result.buffer);
                        }
                        Ok(result) => {
                            log::error!("surface copy reported failure, skipping child");
                            pool.release(result.buffer);
                        }
                        Err(_) => log::error!(
                            "surface copy did not complete within {:?}, skipping child",
                            COPY_TIMEOUT
                        ),
                    }
                } else if let Some(cached) = window.cached_surface_frame(child.as_ref()) {
                    // possibly stale, but better than a hole in the capture
                    blit_special(&mut canvas, root, &child, &cached);
                } else {
                    log::warn!("no snapshot path available for GL-surface child");
                }
            }
            _ => {}
        }
    }
}

fn blit_special(canvas: &mut Canvas<'_>, root: &NodeRef, child: &NodeRef, snapshot: &PixelBuffer) {
    let save = canvas.save();
    compositor::apply_transformations(canvas, root, child);
    canvas.blit(snapshot);
    canvas.restore_to_count(save);
}
