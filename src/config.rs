//! Render configuration: a JSON file with a default for every field.
//!
//! ```json
//! {
//!   "anti_alias": true,
//!   "parallel": false,
//!   "fallback_families": ["DejaVu Sans", "sans-serif"],
//!   "erode_or_dilate": 0,
//!   "invert": false,
//!   "outpaint": ["top", "left"]
//! }
//! ```
//!
//! Command-line flags override whatever the file sets.

use std::path::Path;

use serde::Deserialize;

use crate::canvas::RasterOptions;
use crate::error::{MaskError, Result};
use crate::ops::refine::{MaskRefiner, OutpaintDirection};
use crate::ops::text::SystemFonts;

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RasterConfig {
    pub anti_alias: bool,
    pub parallel: bool,
    /// Families tried when a Text annotation's own family is not installed.
    /// Empty means the platform defaults.
    pub fallback_families: Vec<String>,
    pub erode_or_dilate: i32,
    pub invert: bool,
    pub outpaint: Vec<OutpaintDirection>,
}

impl Default for RasterConfig {
    fn default() -> Self {
        let options = RasterOptions::default();
        Self {
            anti_alias: options.anti_alias,
            parallel: options.parallel,
            fallback_families: Vec::new(),
            erode_or_dilate: 0,
            invert: false,
            outpaint: Vec::new(),
        }
    }
}

impl RasterConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            MaskError::Config(format!("could not read '{}': {}", path.display(), e))
        })?;
        Self::from_json_str(&text)
            .map_err(|e| MaskError::Config(format!("'{}': {}", path.display(), e)))
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn raster_options(&self) -> RasterOptions {
        RasterOptions {
            anti_alias: self.anti_alias,
            parallel: self.parallel,
        }
    }

    pub fn refiner(&self) -> MaskRefiner {
        MaskRefiner {
            erode_or_dilate: self.erode_or_dilate,
            invert: self.invert,
            outpaint: self.outpaint.clone(),
        }
    }

    pub fn system_fonts(&self) -> SystemFonts {
        if self.fallback_families.is_empty() {
            SystemFonts::default()
        } else {
            SystemFonts::new(self.fallback_families.clone())
        }
    }

    /// True when any refinement step would change the rasterized mask.
    pub fn needs_refinement(&self) -> bool {
        self.erode_or_dilate != 0 || self.invert || !self.outpaint.is_empty()
    }
}
