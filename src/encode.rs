//! Output encoder
//!
//! Turns a filled pixel buffer into the requested wire format and sink:
//! JPEG/PNG/WebP through the `image` codecs, raw interleaved ARGB with an
//! ASCII `"<width>:<height>|"` header where the format calls for it, optional
//! streaming deflate for the zip sink, and base64/data-URI/file delivery. An
//! explicit target resolution triggers a high-quality resample before
//! serialization.

use std::io::Write as _;

use base64::Engine as Base64Engine;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbaImage};

use crate::error::{Error, Result};
use crate::pool::{PixelBuffer, ARGB_SIZE};
use crate::{ImageFormat, Resolution, SinkKind};

/// Chunk size for the streaming deflate pass.
const DEFLATE_CHUNK: usize = 1024;

/// Serialize `buffer` into the requested format and sink.
///
/// Returns the resolution actually produced (the target resolution when a
/// resample ran, otherwise the buffer's own) together with the encoded
/// payload: base64 text, a data URI, or a `file://` path depending on the
/// sink. Every failure maps to a single [`Error::Encode`]/[`Error::Io`]
/// condition; no partial sink writes are reported as success.
pub fn encode(
    buffer: &PixelBuffer,
    target: Option<Resolution>,
    format: ImageFormat,
    quality: f64,
    sink: &SinkKind,
) -> Result<(Resolution, String)> {
    let (resolution, rgba) = resample_if_needed(buffer, target);
    let payload = serialize(&rgba, resolution, format, quality)?;
    let header = match format {
        ImageFormat::Raw => resolution.raw_header(),
        _ => String::new(),
    };

    let data = match sink {
        SinkKind::File(path) => {
            let mut file = std::fs::File::create(path)?;
            if !header.is_empty() {
                file.write_all(header.as_bytes())?;
            }
            file.write_all(&payload)?;
            file.flush()?;
            format!("file://{}", path.display())
        }
        SinkKind::Base64 => {
            format!(
                "{}{}",
                header,
                base64::engine::general_purpose::STANDARD.encode(&payload)
            )
        }
        SinkKind::ZipBase64 => {
            // deflate applies to raw pixel bytes only; compressed formats
            // pass through as plain base64
            let body = if format == ImageFormat::Raw {
                deflate(&payload)?
            } else {
                payload
            };
            format!(
                "{}{}",
                header,
                base64::engine::general_purpose::STANDARD.encode(&body)
            )
        }
        SinkKind::DataUri => {
            let subtype = format.mime_subtype().ok_or_else(|| {
                Error::Encode("raw pixels have no MIME subtype for a data URI".into())
            })?;
            format!(
                "data:image/{};base64,{}",
                subtype,
                base64::engine::general_purpose::STANDARD.encode(&payload)
            )
        }
    };

    Ok((resolution, data))
}

/// Resample to the explicit target resolution when one differs from the
/// buffer's natural size. Returns RGBA samples plus the produced resolution.
fn resample_if_needed(buffer: &PixelBuffer, target: Option<Resolution>) -> (Resolution, Vec<u8>) {
    let natural = buffer.resolution();
    let rgba = buffer.to_rgba();

    let Some(target) = target else {
        return (natural, rgba);
    };
    if target == natural {
        return (natural, rgba);
    }
    if target.width == 0 || target.height == 0 {
        log::warn!(
            "ignoring degenerate target resolution {}x{}",
            target.width,
            target.height
        );
        return (natural, rgba);
    }

    match RgbaImage::from_raw(natural.width, natural.height, rgba) {
        Some(img) => {
            let resized = image::imageops::resize(
                &img,
                target.width,
                target.height,
                image::imageops::FilterType::CatmullRom,
            );
            (target, resized.into_raw())
        }
        None => {
            // sample count mismatch should be impossible for a pool buffer;
            // degrade to the unscaled pixels
            log::error!("buffer size mismatch during resample, keeping natural size");
            (natural, buffer.to_rgba())
        }
    }
}

/// Encode RGBA samples into the chosen format's byte stream.
fn serialize(
    rgba: &[u8],
    resolution: Resolution,
    format: ImageFormat,
    quality: f64,
) -> Result<Vec<u8>> {
    let Resolution { width, height } = resolution;
    let mut out = Vec::new();

    match format {
        ImageFormat::Raw => {
            // raw output is interleaved ARGB, no recompression
            out.reserve(rgba.len());
            for px in rgba.chunks_exact(ARGB_SIZE) {
                out.extend_from_slice(&[px[3], px[0], px[1], px[2]]);
            }
        }
        ImageFormat::Jpeg => {
            // JPEG carries no alpha channel
            let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
            for px in rgba.chunks_exact(ARGB_SIZE) {
                rgb.extend_from_slice(&px[..3]);
            }
            JpegEncoder::new_with_quality(&mut out, quality_percent(quality)).write_image(
                &rgb,
                width,
                height,
                ExtendedColorType::Rgb8,
            )?;
        }
        ImageFormat::Png => {
            PngEncoder::new(&mut out).write_image(
                rgba,
                width,
                height,
                ExtendedColorType::Rgba8,
            )?;
        }
        ImageFormat::Webp => {
            WebPEncoder::new_lossless(&mut out).write_image(
                rgba,
                width,
                height,
                ExtendedColorType::Rgba8,
            )?;
        }
    }

    Ok(out)
}

/// Quality in [0, 1] mapped to the codec's 1-100 scale. The floor of 1 keeps
/// the value inside the JPEG encoder's accepted range.
fn quality_percent(quality: f64) -> u8 {
    (100.0 * quality).round().clamp(1.0, 100.0) as u8
}

/// Zlib-deflate `input` through a fixed-size chunk buffer.
fn deflate(input: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(32), Compression::default());
    for chunk in input.chunks(DEFLATE_CHUNK) {
        encoder
            .write_all(chunk)
            .map_err(|e| Error::Encode(format!("deflate failed: {}", e)))?;
    }
    encoder
        .finish()
        .map_err(|e| Error::Encode(format!("deflate failed: {}", e)))
}

/// Split a raw capture byte stream into its parsed header and pixel bytes.
///
/// The header is `"<width>:<height>|"` in US-ASCII with no padding. Returns
/// `None` when no well-formed header is present.
pub fn split_raw_header(bytes: &[u8]) -> Option<(Resolution, &[u8])> {
    let pipe = bytes.iter().position(|&b| b == b'|')?;
    let header = std::str::from_utf8(&bytes[..pipe]).ok()?;
    let (w, h) = header.split_once(':')?;
    let resolution = Resolution {
        width: w.parse().ok()?,
        height: h.parse().ok()?,
    };
    Some((resolution, &bytes[pipe + 1..]))
}
