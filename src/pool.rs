//! Reusable pixel buffer pool
//!
//! Captures repeatedly allocate large ARGB buffers (a full-screen capture is
//! easily several megabytes), so filled buffers are returned to a free-list
//! and handed back out to later captures with matching dimensions instead of
//! reallocating.

use std::sync::Mutex;

use crate::Resolution;

/// Bytes per interleaved ARGB sample.
pub const ARGB_SIZE: usize = 4;

/// An owned rectangular ARGB pixel buffer.
///
/// Samples are stored row-major, 4 bytes per pixel in A, R, G, B order. The
/// validity flag tracks whether the buffer currently holds rendered content;
/// a freshly acquired buffer is transparent and invalid until a strategy
/// fills it.
#[derive(Debug)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
    valid: bool,
}

impl PixelBuffer {
    /// Allocate a new transparent buffer.
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize * ARGB_SIZE;
        Self {
            width,
            height,
            data: vec![0; len],
            valid: false,
        }
    }

    /// Build a buffer from raw interleaved ARGB bytes.
    ///
    /// Returns `None` when `data` is not exactly `width * height * 4` bytes.
    pub fn from_argb(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != width as usize * height as usize * ARGB_SIZE {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
            valid: true,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn resolution(&self) -> Resolution {
        Resolution {
            width: self.width,
            height: self.height,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Mark the buffer as holding rendered content.
    pub fn mark_valid(&mut self) {
        self.valid = true;
    }

    /// Reset every sample to transparent and drop validity.
    pub fn clear(&mut self) {
        self.data.fill(0);
        self.valid = false;
    }

    /// Raw interleaved ARGB bytes, row-major.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Read one pixel; `None` outside the buffer.
    pub fn pixel(&self, x: i32, y: i32) -> Option<crate::view::Color> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * ARGB_SIZE;
        let p = &self.data[i..i + ARGB_SIZE];
        Some(crate::view::Color::from_argb(p[0], p[1], p[2], p[3]))
    }

    /// Write one pixel, ignoring out-of-bounds coordinates.
    pub fn set_pixel(&mut self, x: i32, y: i32, color: crate::view::Color) {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return;
        }
        let i = (y as usize * self.width as usize + x as usize) * ARGB_SIZE;
        self.data[i] = color.a();
        self.data[i + 1] = color.r();
        self.data[i + 2] = color.g();
        self.data[i + 3] = color.b();
    }

    /// Fill the whole buffer with a solid color.
    pub fn fill(&mut self, color: crate::view::Color) {
        for px in self.data.chunks_exact_mut(ARGB_SIZE) {
            px[0] = color.a();
            px[1] = color.r();
            px[2] = color.g();
            px[3] = color.b();
        }
    }

    /// Copy out as interleaved RGBA bytes (the order image codecs expect).
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.data.len());
        for px in self.data.chunks_exact(ARGB_SIZE) {
            out.extend_from_slice(&[px[1], px[2], px[3], px[0]]);
        }
        out
    }

    /// Build a buffer from interleaved RGBA bytes.
    pub fn from_rgba(width: u32, height: u32, rgba: &[u8]) -> Option<Self> {
        if rgba.len() != width as usize * height as usize * ARGB_SIZE {
            return None;
        }
        let mut data = Vec::with_capacity(rgba.len());
        for px in rgba.chunks_exact(ARGB_SIZE) {
            data.extend_from_slice(&[px[3], px[0], px[1], px[2]]);
        }
        Some(Self {
            width,
            height,
            data,
            valid: true,
        })
    }
}

/// Free-list of reusable pixel buffers.
///
/// `acquire` hands out a cleared buffer with exactly the requested
/// dimensions, reusing a released one when an exact match exists. The list is
/// guarded by a single mutex held only across the membership scan, so two
/// concurrent captures can never receive the same instance. Capacity is
/// unbounded; buffers only leave the set by being acquired.
#[derive(Debug, Default)]
pub struct BufferPool {
    free: Mutex<Vec<PixelBuffer>>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check out a transparent buffer of exactly `width` x `height` pixels.
    pub fn acquire(&self, width: u32, height: u32) -> PixelBuffer {
        let reused = {
            let mut free = self.free.lock().unwrap_or_else(|e| e.into_inner());
            free.iter()
                .position(|b| b.width == width && b.height == height)
                .map(|i| free.swap_remove(i))
        };

        match reused {
            Some(mut buf) => {
                buf.clear();
                buf
            }
            None => {
                log::debug!("pool miss, allocating {}x{} buffer", width, height);
                PixelBuffer::new(width, height)
            }
        }
    }

    /// Return a buffer to the free set.
    pub fn release(&self, buffer: PixelBuffer) {
        let mut free = self.free.lock().unwrap_or_else(|e| e.into_inner());
        free.push(buffer);
    }

    /// Return a buffer to the free set if one is present.
    ///
    /// Releasing `None` is a no-op.
    pub fn release_opt(&self, buffer: Option<PixelBuffer>) {
        if let Some(buf) = buffer {
            self.release(buf);
        }
    }

    /// Number of buffers currently available for reuse.
    pub fn available(&self) -> usize {
        self.free.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
