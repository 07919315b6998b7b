//! cvio CLI
//!
//! A command-line interface over the image handle marshaler: inspects
//! image dimensions or converts images between encoded formats by
//! loading them through the codec engine and saving them back out.

use clap::{Parser, ValueEnum};
use cvio::{load_image_legacy, load_image_matrix, save_image, save_image_raw, ImageRef, LoadMode};
use std::path::{Path, PathBuf};

/// cvio - Inspect and convert raster images through the codec engine
#[derive(Parser, Debug)]
#[command(name = "cvio")]
#[command(version, about, long_about = None)]
struct Args {
    /// Input file(s) to process
    #[arg(required = true)]
    filenames: Vec<PathBuf>,

    /// Output filename (only valid with single input file)
    #[arg(short, long)]
    output_filename: Option<PathBuf>,

    /// Decode mode passed through to the codec
    #[arg(long, value_enum, default_value_t = ModeArg::Unchanged)]
    mode: ModeArg,

    /// Only print dimensions, do not write output files
    #[arg(long)]
    info: bool,

    /// Load through the legacy fixed-header form instead of the matrix form
    #[arg(long)]
    legacy: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum ModeArg {
    Unchanged,
    Grayscale,
    Color,
}

impl From<ModeArg> for LoadMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Unchanged => LoadMode::Unchanged,
            ModeArg::Grayscale => LoadMode::Grayscale,
            ModeArg::Color => LoadMode::Color,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Validate arguments
    if args.filenames.len() > 1 && args.output_filename.is_some() {
        eprintln!("Error: --output-filename can only be used with one input file.");
        std::process::exit(1);
    }

    // Process each file
    let mut success_count = 0;
    let mut failed_files = Vec::new();

    for input_path in &args.filenames {
        if !input_path.exists() {
            eprintln!("Error: File not found: {}", input_path.display());
            failed_files.push(input_path.clone());
            continue;
        }

        let result = if args.info {
            inspect_image(input_path, args.mode.into(), args.legacy)
        } else {
            let output_path = if let Some(ref output) = args.output_filename {
                output.clone()
            } else {
                generate_output_filename(input_path)
            };
            convert_image(input_path, &output_path, args.mode.into(), args.legacy)
        };

        match result {
            Ok(_) => success_count += 1,
            Err(e) => {
                eprintln!("Error: {}: {}", input_path.display(), e);
                failed_files.push(input_path.clone());
            }
        }
    }

    if args.filenames.len() > 1 {
        println!();
        println!("Processed: {} succeeded, {} failed", success_count, failed_files.len());
    }

    if !failed_files.is_empty() {
        std::process::exit(1);
    }

    Ok(())
}

fn inspect_image(
    input_path: &Path,
    mode: LoadMode,
    legacy: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (width, height, channels) = if legacy {
        let img = load_image_legacy(input_path, mode)?;
        (img.width(), img.height(), img.channels())
    } else {
        let img = load_image_matrix(input_path, mode)?;
        (img.width(), img.height(), img.channels())
    };
    println!(
        "{}: {}x{}, {} channel(s)",
        input_path.display(),
        width,
        height,
        channels
    );
    Ok(())
}

fn convert_image(
    input_path: &Path,
    output_path: &Path,
    mode: LoadMode,
    legacy: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if legacy {
        let img = load_image_legacy(input_path, mode)?;
        // SAFETY: img stays live until after the call returns.
        unsafe { save_image_raw(output_path, img.as_raw_ptr())? };
        img.release();
    } else {
        let img = load_image_matrix(input_path, mode)?;
        save_image(output_path, &img)?;
        img.release();
    }
    println!("{} -> {}", input_path.display(), output_path.display());
    Ok(())
}

fn generate_output_filename(input_path: &Path) -> PathBuf {
    let mut output = input_path.to_path_buf();

    // Get the file stem (name without extension)
    let stem = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");

    output.set_file_name(format!("{}-out.png", stem));

    output
}
