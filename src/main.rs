use std::path::PathBuf;
use std::process;

use clap::Parser;
use serde::Serialize;

use viewsnap::encode::{encode, split_raw_header};
use viewsnap::{ImageFormat, PixelBuffer, SinkKind};

/// Convert a raw viewsnap capture file into an encoded image.
///
/// Raw capture files start with an ASCII `"<width>:<height>|"` header
/// followed by interleaved ARGB samples (the raw format + file sink output).
#[derive(Parser)]
#[command(name = "viewsnap", version, about)]
struct Args {
    /// Raw capture file to read
    input: PathBuf,

    /// Output image path
    output: PathBuf,

    /// Output format: png, jpg, jpeg, or webp
    #[arg(long, default_value = "png")]
    format: String,

    /// Compression quality in [0, 1] (JPEG only)
    #[arg(long, default_value_t = 0.9)]
    quality: f64,

    /// Print the result as a JSON object instead of a bare URI
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct ConvertReport {
    uri: String,
    width: u32,
    height: u32,
}

fn run(args: Args) -> viewsnap::Result<String> {
    let format = ImageFormat::from_extension(&args.format)
        .filter(|f| *f != ImageFormat::Raw)
        .ok_or_else(|| viewsnap::Error::Other(format!("unsupported format: {}", args.format)))?;

    let bytes = std::fs::read(&args.input)?;
    let (resolution, pixels) = split_raw_header(&bytes).ok_or_else(|| {
        viewsnap::Error::Other(format!(
            "{} is not a raw capture file (missing \"<w>:<h>|\" header)",
            args.input.display()
        ))
    })?;

    let buffer = PixelBuffer::from_argb(resolution.width, resolution.height, pixels.to_vec())
        .ok_or_else(|| {
            viewsnap::Error::Other(format!(
                "pixel data does not match header resolution {}:{}",
                resolution.width, resolution.height
            ))
        })?;

    let (resolution, uri) = encode(
        &buffer,
        None,
        format,
        args.quality,
        &SinkKind::File(args.output),
    )?;

    if args.json {
        let report = ConvertReport {
            uri,
            width: resolution.width,
            height: resolution.height,
        };
        serde_json::to_string(&report).map_err(|e| viewsnap::Error::Other(e.to_string()))
    } else {
        Ok(uri)
    }
}

fn main() {
    let args = Args::parse();
    match run(args) {
        Ok(line) => println!("{}", line),
        Err(err) => {
            eprintln!("viewsnap: {}", err);
            process::exit(1);
        }
    }
}
