//! Rasterize inpainting annotations into a binary mask.
//!
//! A design drawn on a resized preview (pen strokes, lines, ellipses,
//! rectangles, text) is rescaled to the source image's pixel size and
//! painted white-on-transparent, ready to attach to a generation request
//! as a PNG data URI.

#![allow(clippy::too_many_arguments)]

pub mod canvas;
pub mod cli;
pub mod config;
pub mod design;
pub mod error;
pub mod io;
pub mod logger;
pub mod ops;

pub use canvas::{MaskCanvas, RasterOptions, MASK_WHITE};
pub use config::RasterConfig;
pub use design::{Annotation, DesignDocument, DesignState, Dimensions, Point, RawAnnotation};
pub use error::{MaskError, Result};
pub use io::{decode_data_uri, encode_gray_png, encode_png, to_data_uri};
pub use ops::mask::rasterize_mask;
pub use ops::refine::{MaskRefiner, OutpaintDirection};
pub use ops::text::{FileFont, FontProvider, FontSpec, SystemFonts};
