//! Content-extent calculation
//!
//! Containers can hold more content than their laid-out height shows.
//! `container_extent` walks the children to find the true renderable height;
//! `scrollable_extent` re-measures a scroll container's single content child
//! instead. Both degrade to the node's current height when measurement
//! misbehaves; extent problems never fail a capture.

use crate::view::{MeasureSpec, ViewNode};

/// Minimum height that would render all descendant content of a container.
///
/// For each visible child: force a measurement pass if none ran, take the
/// child's bottom edge (top + measured height + bottom margin), and recurse
/// into container children using the child's own top plus its sub-extent.
/// The maximum across children, plus the container's own vertical padding,
/// never less than the laid-out height.
pub fn container_extent(node: &dyn ViewNode) -> u32 {
    let frame = node.frame();
    let mut total: i64 = 0;

    for child in node.children() {
        if !child.visible() {
            continue;
        }

        let measured = match child.measured_height() {
            Some(h) if h > 0 => Some(h),
            _ => match child.measure(
                MeasureSpec::AtMost(frame.width),
                MeasureSpec::Unspecified,
            ) {
                Ok((_, h)) if h > 0 => Some(h),
                Ok(_) => None,
                Err(err) => {
                    log::warn!("child measurement failed during extent walk: {}", err);
                    None
                }
            },
        };
        let Some(measured) = measured else { continue };

        let child_frame = child.frame();
        let bottom = child_frame.top as i64 + measured as i64 + child.margin_bottom() as i64;
        total = total.max(bottom);

        if child.kind().is_group() {
            total = total.max(child_frame.top as i64 + container_extent(child.as_ref()) as i64);
        }
    }

    let padding = node.padding();
    total += padding.top as i64 + padding.bottom as i64;

    total.max(frame.height as i64) as u32
}

/// Full content height of a scroll container.
///
/// Re-measures the container at its laid-out width with unconstrained height
/// and takes the single content child's measured height plus the container's
/// vertical padding. A scroll container has exactly one content child by
/// convention, so no recursive walk is needed. Falls back to the laid-out
/// height on any failure.
pub fn scrollable_extent(node: &dyn ViewNode) -> u32 {
    let frame = node.frame();
    let children = node.children();
    let Some(content) = children.first() else {
        return frame.height;
    };

    if let Err(err) = node.measure(
        MeasureSpec::Exactly(frame.width),
        MeasureSpec::Unspecified,
    ) {
        log::warn!("scroll container measurement failed: {}", err);
        return frame.height;
    }

    match content.measured_height() {
        Some(h) if h > 0 => {
            let padding = node.padding();
            let adjusted = h as i64 + padding.top as i64 + padding.bottom as i64;
            log::debug!("adjusted scroll container height to {}", adjusted);
            adjusted.max(0) as u32
        }
        _ => frame.height,
    }
}
