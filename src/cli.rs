// ============================================================================
// MaskRaster CLI: headless mask rendering via command-line arguments
// ============================================================================
//
// Usage examples:
//   maskraster -i design.json --width 1024 --height 768 -o mask.png
//   maskraster -i request.json                         (size from the envelope)
//   maskraster -i designs/*.json --image photo.png --output-dir masks/
//   maskraster -i design.json --image photo.png --erode-dilate 4 --invert --data-uri
//
// Every input is rendered independently; one failure does not stop the batch.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use image::{DynamicImage, GenericImageView};
use tracing::{debug, info};

use crate::canvas::RasterOptions;
use crate::config::RasterConfig;
use crate::error::{MaskError, Result};
use crate::io::{encode_gray_png, encode_png, load_design, load_image, to_data_uri, write_bytes};
use crate::ops::mask::rasterize_mask;
use crate::ops::refine::{self, MaskRefiner, OutpaintDirection};
use crate::ops::text::{FileFont, FontProvider};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// MaskRaster inpainting mask renderer.
///
/// Turns editor annotation designs into white-on-transparent PNG masks at
/// the source image's resolution.
#[derive(Parser, Debug)]
#[command(
    name = "maskraster",
    version,
    about = "Render inpainting annotation designs to PNG masks",
    long_about = "Rasterize pen strokes, lines, ellipses, rectangles and text drawn on a\n\
                  resized preview into a mask at the original image size.\n\n\
                  Example:\n  \
                  maskraster -i design.json --width 1024 --height 768 -o mask.png\n  \
                  maskraster -i designs/*.json --image photo.png --output-dir masks/"
)]
pub struct CliArgs {
    /// Design file(s). Glob patterns accepted (e.g. "designs/*.json").
    /// Either a bare design state or a `{designState, imageData}` envelope.
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing. Files are named `<stem>.png`.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Target mask width in pixels. Overrides the envelope's size.
    #[arg(long, requires = "height", value_name = "PX")]
    pub width: Option<u32>,

    /// Target mask height in pixels.
    #[arg(long, requires = "width", value_name = "PX")]
    pub height: Option<u32>,

    /// Original image (path or data URI); the mask takes its size.
    #[arg(long, conflicts_with = "width", value_name = "IMAGE")]
    pub image: Option<String>,

    /// JSON render configuration. Flags below override its values.
    #[arg(long, value_name = "CONFIG.json")]
    pub config: Option<PathBuf>,

    /// User-painted mask (path or data URI) merged into the rendered one.
    #[arg(long, value_name = "IMAGE")]
    pub upload_mask: Option<String>,

    /// Grow (> 0) or shrink (< 0) the mask by this many 3×3 passes.
    #[arg(long, allow_hyphen_values = true, value_name = "K")]
    pub erode_dilate: Option<i32>,

    /// Invert the mask after erode/dilate.
    #[arg(long)]
    pub invert: bool,

    /// Pad the mask for outpainting: any of top,bottom,left,right.
    #[arg(long, value_delimiter = ',', value_parser = parse_direction, value_name = "SIDES")]
    pub outpaint: Vec<OutpaintDirection>,

    /// Font file used for every Text annotation instead of system fonts.
    #[arg(long, value_name = "FONT.ttf")]
    pub font: Option<PathBuf>,

    /// Hard binary edges instead of one-pixel anti-aliasing.
    #[arg(long)]
    pub no_anti_alias: bool,

    /// Shade rows on the rayon thread pool.
    #[arg(long)]
    pub parallel: bool,

    /// Print `data:image/png;base64,...` to stdout instead of writing files.
    #[arg(long)]
    pub data_uri: bool,

    /// Per-file timing and debug logging on the terminal.
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_direction(s: &str) -> std::result::Result<OutpaintDirection, String> {
    OutpaintDirection::parse(s)
        .ok_or_else(|| format!("unknown outpaint side '{s}' (expected top, bottom, left or right)"))
}

/// Everything shared by all inputs of one invocation.
struct Session {
    options: RasterOptions,
    refiner: MaskRefiner,
    fonts: Box<dyn FontProvider>,
    upload: Option<DynamicImage>,
    /// Size forced by `--width/--height` or `--image`.
    forced_size: Option<(u32, u32)>,
}

impl Session {
    fn from_args(args: &CliArgs) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => RasterConfig::load(path)?,
            None => RasterConfig::default(),
        };
        if args.no_anti_alias {
            config.anti_alias = false;
        }
        if args.parallel {
            config.parallel = true;
        }
        if let Some(k) = args.erode_dilate {
            config.erode_or_dilate = k;
        }
        if args.invert {
            config.invert = true;
        }
        if !args.outpaint.is_empty() {
            config.outpaint = args.outpaint.clone();
        }
        debug!(?config, "effective configuration");

        let fonts: Box<dyn FontProvider> = match &args.font {
            Some(path) => Box::new(FileFont::open(path)?),
            None => Box::new(config.system_fonts()),
        };

        let upload = match &args.upload_mask {
            Some(source) => Some(load_image(source)?),
            None => None,
        };

        let forced_size = match (args.width, args.height, &args.image) {
            (Some(w), Some(h), _) => Some((w, h)),
            (_, _, Some(source)) => Some(load_image(source)?.dimensions()),
            _ => None,
        };

        Ok(Self {
            options: config.raster_options(),
            refiner: config.refiner(),
            fonts,
            upload,
            forced_size,
        })
    }

    fn refines(&self) -> bool {
        self.upload.is_some() || self.refiner != MaskRefiner::default()
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if let Err(msg) = check_single_output(inputs.len(), args.output.as_deref()) {
        eprintln!("error: {}", msg);
        return ExitCode::FAILURE;
    }

    let session = match Session::from_args(&args) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(dir) = &args.output_dir {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!(
                "error: could not create output directory '{}': {}",
                dir.display(),
                e
            );
            return ExitCode::FAILURE;
        }
    }

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if (multi || args.verbose) && !args.data_uri {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }

        let file_start = Instant::now();

        let output_path = if args.data_uri {
            None
        } else {
            match build_output_path(input_path, args.output.as_deref(), args.output_dir.as_deref()) {
                Some(p) => Some(p),
                None => {
                    eprintln!(
                        "  error: cannot determine output path for '{}'.",
                        input_path.display()
                    );
                    any_failure = true;
                    continue;
                }
            }
        };

        match run_one(input_path, output_path.as_deref(), &session) {
            Ok(()) => {
                let elapsed_ms = file_start.elapsed().as_secs_f64() * 1000.0;
                info!(input = %input_path.display(), elapsed_ms, "mask written");
                if let Some(out) = &output_path {
                    if args.verbose || multi {
                        println!("  → {} ({:.0}ms)", out.display(), elapsed_ms);
                    }
                }
            }
            Err(e) => {
                tracing::error!(input = %input_path.display(), "{}", e);
                eprintln!("  error: {}: {}", input_path.display(), e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

fn run_one(input: &Path, output: Option<&Path>, session: &Session) -> Result<()> {
    // -- Step 1: Load ----------------------------------------------------
    let document = load_design(input)?;

    // -- Step 2: Target size ---------------------------------------------
    let (width, height) = session
        .forced_size
        .or(document.target)
        .ok_or_else(|| {
            MaskError::InvalidDimensions(
                "no target size: pass --width/--height or --image, or use an envelope with imageData"
                    .into(),
            )
        })?;

    // -- Step 3: Rasterize -----------------------------------------------
    let mask = rasterize_mask(
        &document.design,
        width,
        height,
        &session.options,
        session.fonts.as_ref(),
    )?;

    // -- Step 4: Refine (optional) and encode ----------------------------
    let png = if session.refines() {
        let gray = refine::from_rgba(&mask);
        let refined = session.refiner.apply(gray, session.upload.as_ref());
        if !refine::has_content(&refined) {
            debug!(input = %input.display(), "refined mask selects no pixels");
        }
        encode_gray_png(&refined)?
    } else {
        encode_png(&mask)?
    };

    // -- Step 5: Emit ----------------------------------------------------
    match output {
        Some(path) => write_bytes(&png, path)?,
        None => println!("{}", to_data_uri(&png)),
    }
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated list, in the
/// order the patterns were given.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        // An existing file wins over glob syntax: `design[1].json` is a name,
        // not a character class.
        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                // unreadable entries are skipped
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// `--output` names one file, so a batch must go through `--output-dir` or
/// the per-input default. Rejected even when `--output-dir` is also given,
/// since every mask would otherwise land on the same path.
fn check_single_output(
    input_count: usize,
    output: Option<&Path>,
) -> std::result::Result<(), String> {
    match output {
        Some(out) if input_count > 1 => Err(format!(
            "{} input files given but --output '{}' names a single file.\n\
             Use --output-dir alone to write one mask per input.",
            input_count,
            out.display()
        )),
        _ => Ok(()),
    }
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, single-file input only)
/// 2. `--output-dir` (batch directory, `<stem>.png`)
/// 3. Fallback: next to the input as `<stem>_mask.png`
fn build_output_path(
    input: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let stem = input.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.png", stem)));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    Some(parent.join(format!("{}_mask.png", stem)))
}
