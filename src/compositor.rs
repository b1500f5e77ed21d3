//! Transform composition for independently rendered sub-surfaces
//!
//! Texture and GL-surface nodes are fetched as standalone buffers and must be
//! blitted at the position and orientation their ancestors give them. The
//! compositor walks up from the sub-surface to the capture root, reverses the
//! chain, and folds each node's translate/rotate/scale into both the canvas
//! transform stack and a standalone matrix. The two accumulate with identical
//! pre-concatenation order, so the returned matrix always equals the canvas
//! transform relative to the caller's save point.

use std::sync::Arc;

use crate::canvas::{Canvas, TransformMatrix};
use crate::view::NodeRef;

/// Apply the root-to-child transform chain to `canvas` and return the
/// composed matrix.
///
/// The chain runs from the capture root (inclusive) down to `child`. Strict
/// ancestors contribute their padding offset on top of position and
/// translation; the sub-surface itself does not, since its buffer already
/// starts at its own content origin. If the walk cannot reach `root` (a
/// parent link is missing or the node was detached mid-capture) the chain
/// degrades to the child's own transform; the capture continues.
pub fn apply_transformations(
    canvas: &mut Canvas<'_>,
    root: &NodeRef,
    child: &NodeRef,
) -> TransformMatrix {
    let chain = ancestor_chain(root, child);
    let mut transform = TransformMatrix::identity();

    for node in &chain {
        let is_child = Arc::ptr_eq(node, child);
        let frame = node.frame();
        let padding = node.padding();
        let (tx, ty) = node.translation();
        let dx = frame.left as f32 + if is_child { 0.0 } else { padding.left as f32 } + tx;
        let dy = frame.top as f32 + if is_child { 0.0 } else { padding.top as f32 } + ty;
        let (px, py) = node.pivot();
        let rotation = node.rotation();
        let (sx, sy) = node.scale();

        canvas.translate(dx, dy);
        canvas.rotate(rotation, px, py);
        canvas.scale(sx, sy, px, py);

        transform.pre_concat(&TransformMatrix::translation(dx, dy));
        transform.pre_concat(&TransformMatrix::rotation(rotation, px, py));
        transform.pre_concat(&TransformMatrix::scaling(sx, sy, px, py));
    }

    transform
}

/// Ordered chain from `root` (inclusive) down to `child`.
///
/// Collected by walking parent links upward and reversing. Degrades to just
/// `[child]` when the walk ends before reaching `root`.
fn ancestor_chain(root: &NodeRef, child: &NodeRef) -> Vec<NodeRef> {
    let mut chain = vec![Arc::clone(child)];

    if !Arc::ptr_eq(root, child) {
        let mut reached_root = false;
        let mut cursor = Arc::clone(child);
        while let Some(parent) = cursor.parent() {
            chain.push(Arc::clone(&parent));
            if Arc::ptr_eq(&parent, root) {
                reached_root = true;
                break;
            }
            cursor = parent;
        }

        if !reached_root {
            log::warn!(
                "sub-surface is detached from the capture root; \
                 compositing with its own transform only"
            );
            chain.truncate(1);
        }
    }

    chain.reverse();
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::pool::PixelBuffer;
    use crate::view::{MeasureSpec, NodeKind, PaintMode, Rect, ViewNode};
    use std::sync::Mutex;

    struct ChainNode {
        frame: Rect,
        rotation: f32,
        parent: Mutex<Option<NodeRef>>,
    }

    impl ChainNode {
        fn new(left: i32, top: i32, rotation: f32) -> Arc<Self> {
            Arc::new(Self {
                frame: Rect::new(left, top, 50, 50),
                rotation,
                parent: Mutex::new(None),
            })
        }

        fn set_parent(&self, parent: &NodeRef) {
            *self.parent.lock().unwrap() = Some(Arc::clone(parent));
        }
    }

    impl ViewNode for ChainNode {
        fn frame(&self) -> Rect {
            self.frame
        }

        fn visible(&self) -> bool {
            true
        }

        fn kind(&self) -> NodeKind {
            NodeKind::Container
        }

        fn rotation(&self) -> f32 {
            self.rotation
        }

        fn parent(&self) -> Option<NodeRef> {
            self.parent.lock().unwrap().clone()
        }

        fn measure(&self, _w: MeasureSpec, _h: MeasureSpec) -> Result<(u32, u32)> {
            Ok((self.frame.width, self.frame.height))
        }

        fn location_in_window(&self) -> (i32, i32) {
            (self.frame.left, self.frame.top)
        }

        fn paint(&self, _canvas: &mut Canvas<'_>, _mode: PaintMode) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn two_level_chain_composes_translate_translate_rotate() {
        let root = ChainNode::new(10, 5, 0.0);
        let mid = ChainNode::new(10, 5, 0.0);
        let leaf = ChainNode::new(0, 0, 90.0);

        let root_ref: NodeRef = root.clone();
        let mid_ref: NodeRef = mid.clone();
        let leaf_ref: NodeRef = leaf.clone();
        mid.set_parent(&root_ref);
        leaf.set_parent(&mid_ref);

        let mut buf = PixelBuffer::new(8, 8);
        let mut canvas = Canvas::new(&mut buf);
        let save = canvas.save();
        let matrix = apply_transformations(&mut canvas, &root_ref, &leaf_ref);

        let expected = TransformMatrix::translation(10.0, 5.0)
            .concat(&TransformMatrix::translation(10.0, 5.0))
            .concat(&TransformMatrix::rotation(90.0, 0.0, 0.0));
        assert!(matrix.approx_eq(&expected, 1e-4));
        // the canvas accumulated the identical transform
        assert!(canvas.matrix().approx_eq(&expected, 1e-4));
        canvas.restore_to_count(save);
    }

    #[test]
    fn broken_parent_link_degrades_to_child_transform() {
        let root = ChainNode::new(10, 5, 0.0);
        let leaf = ChainNode::new(3, 7, 0.0);
        let root_ref: NodeRef = root.clone();
        let leaf_ref: NodeRef = leaf.clone();
        // leaf never gets a parent link

        let mut buf = PixelBuffer::new(8, 8);
        let mut canvas = Canvas::new(&mut buf);
        let matrix = apply_transformations(&mut canvas, &root_ref, &leaf_ref);

        let expected = TransformMatrix::translation(3.0, 7.0);
        assert!(matrix.approx_eq(&expected, 1e-4));
    }

    #[test]
    fn strict_ancestors_contribute_padding() {
        struct Padded(Rect);
        impl ViewNode for Padded {
            fn frame(&self) -> Rect {
                self.0
            }
            fn visible(&self) -> bool {
                true
            }
            fn kind(&self) -> NodeKind {
                NodeKind::Container
            }
            fn padding(&self) -> crate::view::Insets {
                crate::view::Insets {
                    left: 4,
                    top: 6,
                    right: 0,
                    bottom: 0,
                }
            }
            fn measure(&self, _w: MeasureSpec, _h: MeasureSpec) -> Result<(u32, u32)> {
                Ok((self.0.width, self.0.height))
            }
            fn location_in_window(&self) -> (i32, i32) {
                (0, 0)
            }
            fn paint(&self, _c: &mut Canvas<'_>, _m: PaintMode) -> Result<()> {
                Ok(())
            }
        }

        let root: NodeRef = Arc::new(Padded(Rect::new(0, 0, 50, 50)));
        // the child is also padded, but its own padding must not shift it
        let child = ChainNode::new(2, 3, 0.0);
        child.set_parent(&root);
        let child_ref: NodeRef = child;

        let mut buf = PixelBuffer::new(8, 8);
        let mut canvas = Canvas::new(&mut buf);
        let matrix = apply_transformations(&mut canvas, &root, &child_ref);

        // root contributes (0+4, 0+6); child contributes (2, 3) with no padding
        let expected = TransformMatrix::translation(4.0, 6.0)
            .concat(&TransformMatrix::translation(2.0, 3.0));
        assert!(matrix.approx_eq(&expected, 1e-4));
    }
}
