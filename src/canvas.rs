//! Software draw target over a pixel buffer
//!
//! Provides the small canvas surface the capture strategies need: a
//! save/restore transform stack, solid fills, and a bilinear-filtered
//! src-over blit. Transform concatenation order matches what inline painting
//! expects: operations applied later affect points first, so walking a tree
//! root-to-leaf and translating at each level positions leaf-local
//! coordinates correctly.

use crate::pool::PixelBuffer;
use crate::view::{Color, Rect};

/// Composed 2-D affine transform.
///
/// Maps `(x, y)` to `(a*x + c*y + e, b*x + d*y + f)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformMatrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Default for TransformMatrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl TransformMatrix {
    pub fn identity() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: 0.0,
            f: 0.0,
        }
    }

    pub fn translation(dx: f32, dy: f32) -> Self {
        Self {
            e: dx,
            f: dy,
            ..Self::identity()
        }
    }

    /// Rotation by `degrees` about the pivot `(px, py)`.
    pub fn rotation(degrees: f32, px: f32, py: f32) -> Self {
        let rad = degrees.to_radians();
        let (sin, cos) = rad.sin_cos();
        let rot = Self {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            e: 0.0,
            f: 0.0,
        };
        Self::translation(px, py)
            .concat(&rot)
            .concat(&Self::translation(-px, -py))
    }

    /// Scale by `(sx, sy)` about the pivot `(px, py)`.
    pub fn scaling(sx: f32, sy: f32, px: f32, py: f32) -> Self {
        let scale = Self {
            a: sx,
            d: sy,
            ..Self::identity()
        };
        Self::translation(px, py)
            .concat(&scale)
            .concat(&Self::translation(-px, -py))
    }

    /// `self ∘ rhs`: apply `rhs` to a point first, then `self`.
    pub fn concat(&self, rhs: &TransformMatrix) -> Self {
        Self {
            a: self.a * rhs.a + self.c * rhs.b,
            b: self.b * rhs.a + self.d * rhs.b,
            c: self.a * rhs.c + self.c * rhs.d,
            d: self.b * rhs.c + self.d * rhs.d,
            e: self.a * rhs.e + self.c * rhs.f + self.e,
            f: self.b * rhs.e + self.d * rhs.f + self.f,
        }
    }

    /// Append `rhs` so it applies to points before the current transform.
    pub fn pre_concat(&mut self, rhs: &TransformMatrix) {
        *self = self.concat(rhs);
    }

    pub fn map_point(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Inverse transform; `None` when degenerate (zero scale).
    pub fn invert(&self) -> Option<Self> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < f32::EPSILON {
            return None;
        }
        let inv = 1.0 / det;
        Some(Self {
            a: self.d * inv,
            b: -self.b * inv,
            c: -self.c * inv,
            d: self.a * inv,
            e: (self.c * self.f - self.d * self.e) * inv,
            f: (self.b * self.e - self.a * self.f) * inv,
        })
    }

    pub fn approx_eq(&self, other: &TransformMatrix, eps: f32) -> bool {
        (self.a - other.a).abs() <= eps
            && (self.b - other.b).abs() <= eps
            && (self.c - other.c).abs() <= eps
            && (self.d - other.d).abs() <= eps
            && (self.e - other.e).abs() <= eps
            && (self.f - other.f).abs() <= eps
    }
}

/// Draw target wrapping a checked-out [`PixelBuffer`].
pub struct Canvas<'a> {
    buf: &'a mut PixelBuffer,
    matrix: TransformMatrix,
    stack: Vec<TransformMatrix>,
}

impl<'a> Canvas<'a> {
    pub fn new(buf: &'a mut PixelBuffer) -> Self {
        Self {
            buf,
            matrix: TransformMatrix::identity(),
            stack: Vec::new(),
        }
    }

    /// Push the current transform, returning the count to restore to.
    pub fn save(&mut self) -> usize {
        self.stack.push(self.matrix);
        self.stack.len() - 1
    }

    /// Pop back to the state saved at `count`.
    pub fn restore_to_count(&mut self, count: usize) {
        while self.stack.len() > count {
            if let Some(m) = self.stack.pop() {
                self.matrix = m;
            }
        }
    }

    /// Pop one saved state.
    pub fn restore(&mut self) {
        if let Some(m) = self.stack.pop() {
            self.matrix = m;
        }
    }

    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.matrix.pre_concat(&TransformMatrix::translation(dx, dy));
    }

    pub fn rotate(&mut self, degrees: f32, px: f32, py: f32) {
        self.matrix
            .pre_concat(&TransformMatrix::rotation(degrees, px, py));
    }

    pub fn scale(&mut self, sx: f32, sy: f32, px: f32, py: f32) {
        self.matrix
            .pre_concat(&TransformMatrix::scaling(sx, sy, px, py));
    }

    pub fn matrix(&self) -> &TransformMatrix {
        &self.matrix
    }

    pub fn width(&self) -> u32 {
        self.buf.width()
    }

    pub fn height(&self) -> u32 {
        self.buf.height()
    }

    /// Blend a color over the entire target, ignoring the transform.
    pub fn draw_color(&mut self, color: Color) {
        if color.a() == 0xFF {
            self.buf.fill(color);
            return;
        }
        let w = self.buf.width() as i32;
        let h = self.buf.height() as i32;
        for y in 0..h {
            for x in 0..w {
                blend_pixel(self.buf, x, y, color);
            }
        }
    }

    /// Fill a rectangle in local coordinates through the current transform.
    pub fn fill_rect(&mut self, rect: Rect, color: Color) {
        let Some(inv) = self.matrix.invert() else {
            log::warn!("degenerate canvas transform, skipping fill");
            return;
        };
        let (x0, y0, x1, y1) = self.device_bounds(
            rect.left as f32,
            rect.top as f32,
            rect.width as f32,
            rect.height as f32,
        );
        let (rl, rt) = (rect.left as f32, rect.top as f32);
        let (rr, rb) = (rl + rect.width as f32, rt + rect.height as f32);
        for dy in y0..y1 {
            for dx in x0..x1 {
                let (lx, ly) = inv.map_point(dx as f32 + 0.5, dy as f32 + 0.5);
                if lx >= rl && lx < rr && ly >= rt && ly < rb {
                    blend_pixel(self.buf, dx, dy, color);
                }
            }
        }
    }

    /// Blit a source buffer at the local origin through the current
    /// transform with bilinear filtering and src-over blending.
    pub fn blit(&mut self, src: &PixelBuffer) {
        let Some(inv) = self.matrix.invert() else {
            log::warn!("degenerate canvas transform, skipping blit");
            return;
        };
        let sw = src.width() as f32;
        let sh = src.height() as f32;
        if sw <= 0.0 || sh <= 0.0 {
            return;
        }
        let (x0, y0, x1, y1) = self.device_bounds(0.0, 0.0, sw, sh);
        for dy in y0..y1 {
            for dx in x0..x1 {
                let (sx, sy) = inv.map_point(dx as f32 + 0.5, dy as f32 + 0.5);
                if sx < 0.0 || sy < 0.0 || sx >= sw || sy >= sh {
                    continue;
                }
                let color = sample_bilinear(src, sx - 0.5, sy - 0.5);
                blend_pixel(self.buf, dx, dy, color);
            }
        }
    }

    /// Device-space bounding box of a transformed local rectangle, clipped to
    /// the target. Returns half-open `(x0, y0, x1, y1)`.
    fn device_bounds(&self, left: f32, top: f32, width: f32, height: f32) -> (i32, i32, i32, i32) {
        let corners = [
            self.matrix.map_point(left, top),
            self.matrix.map_point(left + width, top),
            self.matrix.map_point(left, top + height),
            self.matrix.map_point(left + width, top + height),
        ];
        let mut min_x = f32::MAX;
        let mut min_y = f32::MAX;
        let mut max_x = f32::MIN;
        let mut max_y = f32::MIN;
        for (x, y) in corners {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        let x0 = (min_x.floor() as i32).max(0);
        let y0 = (min_y.floor() as i32).max(0);
        let x1 = (max_x.ceil() as i32).min(self.buf.width() as i32);
        let y1 = (max_y.ceil() as i32).min(self.buf.height() as i32);
        (x0, y0, x1, y1)
    }
}

fn blend_pixel(buf: &mut PixelBuffer, x: i32, y: i32, src: Color) {
    let sa = src.a() as f32 / 255.0;
    if sa <= 0.0 {
        return;
    }
    if sa >= 1.0 {
        buf.set_pixel(x, y, src);
        return;
    }
    let Some(dst) = buf.pixel(x, y) else { return };
    let da = dst.a() as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        buf.set_pixel(x, y, Color::TRANSPARENT);
        return;
    }
    let blend = |s: u8, d: u8| -> u8 {
        let s = s as f32;
        let d = d as f32;
        ((s * sa + d * da * (1.0 - sa)) / out_a).round().clamp(0.0, 255.0) as u8
    };
    buf.set_pixel(
        x,
        y,
        Color::from_argb(
            (out_a * 255.0).round() as u8,
            blend(src.r(), dst.r()),
            blend(src.g(), dst.g()),
            blend(src.b(), dst.b()),
        ),
    );
}

/// Bilinear sample with clamp-at-edge addressing.
fn sample_bilinear(src: &PixelBuffer, x: f32, y: f32) -> Color {
    let max_x = src.width() as i32 - 1;
    let max_y = src.height() as i32 - 1;
    let fx = x.floor();
    let fy = y.floor();
    let tx = x - fx;
    let ty = y - fy;
    let x0 = (fx as i32).clamp(0, max_x);
    let y0 = (fy as i32).clamp(0, max_y);
    let x1 = (x0 + 1).min(max_x);
    let y1 = (y0 + 1).min(max_y);

    let p00 = src.pixel(x0, y0).unwrap_or(Color::TRANSPARENT);
    let p10 = src.pixel(x1, y0).unwrap_or(Color::TRANSPARENT);
    let p01 = src.pixel(x0, y1).unwrap_or(Color::TRANSPARENT);
    let p11 = src.pixel(x1, y1).unwrap_or(Color::TRANSPARENT);

    let lerp2 = |c00: u8, c10: u8, c01: u8, c11: u8| -> u8 {
        let top = c00 as f32 * (1.0 - tx) + c10 as f32 * tx;
        let bot = c01 as f32 * (1.0 - tx) + c11 as f32 * tx;
        (top * (1.0 - ty) + bot * ty).round().clamp(0.0, 255.0) as u8
    };

    Color::from_argb(
        lerp2(p00.a(), p10.a(), p01.a(), p11.a()),
        lerp2(p00.r(), p10.r(), p01.r(), p11.r()),
        lerp2(p00.g(), p10.g(), p01.g(), p11.g()),
        lerp2(p00.b(), p10.b(), p01.b(), p11.b()),
    )
}
