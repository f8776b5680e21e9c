//! Brand height ratios.
//!
//! Each brand caps how much of the canvas height its subject may occupy after
//! Stage 1. Lookups are case-insensitive; unknown brands use the default.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Ratio used for brands without an entry.
pub const DEFAULT_RATIO: f64 = 0.67;

const BUILTIN_RATIOS: &[(&str, f64)] = &[
    ("rolex", 1.0),
    ("omega", 0.65),
    ("tudor", 0.67),
    ("iwc", 0.67),
];

/// Immutable brand → maximum height fraction table.
#[derive(Debug, Clone, PartialEq)]
pub struct BrandRatios {
    ratios: HashMap<String, f64>,
    default: f64,
}

/// On-disk override format: `{"default": 0.67, "brands": {"rolex": 1.0}}`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RatioFile {
    #[serde(default)]
    default: Option<f64>,
    #[serde(default)]
    brands: HashMap<String, f64>,
}

impl Default for BrandRatios {
    fn default() -> Self {
        Self {
            ratios: BUILTIN_RATIOS
                .iter()
                .map(|&(brand, ratio)| (brand.to_string(), ratio))
                .collect(),
            default: DEFAULT_RATIO,
        }
    }
}

impl BrandRatios {
    /// Table with no brand entries, only a default.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRatio`] if `default` is outside `(0, 1]`.
    pub fn with_default(default: f64) -> Result<Self> {
        validate("default", default)?;
        Ok(Self {
            ratios: HashMap::new(),
            default,
        })
    }

    /// Add or replace one brand's ratio.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRatio`] if `ratio` is outside `(0, 1]`.
    pub fn with_brand(mut self, brand: &str, ratio: f64) -> Result<Self> {
        validate(brand, ratio)?;
        self.ratios.insert(brand.to_lowercase(), ratio);
        Ok(self)
    }

    /// Load the built-in table and apply overrides from a JSON file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or parsed, or holds an invalid ratio.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Same as [`BrandRatios::from_json_file`] for an in-memory document.
    ///
    /// # Errors
    ///
    /// Fails if the JSON is malformed or holds an invalid ratio.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let file: RatioFile = serde_json::from_str(text)?;
        let mut table = Self::default();
        if let Some(default) = file.default {
            validate("default", default)?;
            table.default = default;
        }
        for (brand, ratio) in file.brands {
            table = table.with_brand(&brand, ratio)?;
        }
        Ok(table)
    }

    /// Ratio for `brand`, falling back to the default.
    #[must_use]
    pub fn ratio_for(&self, brand: &str) -> f64 {
        self.ratios
            .get(&brand.to_lowercase())
            .copied()
            .unwrap_or(self.default)
    }

    /// The fallback ratio.
    #[must_use]
    pub fn default_ratio(&self) -> f64 {
        self.default
    }
}

fn validate(brand: &str, ratio: f64) -> Result<()> {
    if ratio.is_finite() && ratio > 0.0 && ratio <= 1.0 {
        Ok(())
    } else {
        Err(Error::InvalidRatio {
            brand: brand.to_string(),
            ratio,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::float_cmp)]
    fn builtin_table_matches_known_brands() {
        let t = BrandRatios::default();
        assert_eq!(t.ratio_for("rolex"), 1.0);
        assert_eq!(t.ratio_for("omega"), 0.65);
        assert_eq!(t.ratio_for("tudor"), 0.67);
        assert_eq!(t.ratio_for("iwc"), 0.67);
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn lookup_is_case_insensitive() {
        let t = BrandRatios::default();
        assert_eq!(t.ratio_for("OMEGA"), 0.65);
        assert_eq!(t.ratio_for("Rolex"), 1.0);
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn unknown_brand_falls_back_to_default() {
        let t = BrandRatios::default();
        assert_eq!(t.ratio_for("SEIKO"), DEFAULT_RATIO);
        assert_eq!(t.default_ratio(), DEFAULT_RATIO);
    }

    #[test]
    fn out_of_range_ratios_are_rejected() {
        assert!(BrandRatios::with_default(0.0).is_err());
        assert!(BrandRatios::with_default(1.01).is_err());
        assert!(BrandRatios::with_default(f64::NAN).is_err());
        let err = BrandRatios::default().with_brand("seiko", -0.5).unwrap_err();
        assert!(matches!(err, Error::InvalidRatio { ref brand, .. } if brand == "seiko"));
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn json_overrides_extend_builtin_table() {
        let t = BrandRatios::from_json_str(r#"{"default": 0.5, "brands": {"Seiko": 0.8}}"#)
            .unwrap();
        assert_eq!(t.ratio_for("seiko"), 0.8);
        assert_eq!(t.ratio_for("omega"), 0.65);
        assert_eq!(t.ratio_for("casio"), 0.5);
    }

    #[test]
    fn json_with_invalid_ratio_is_rejected() {
        let err = BrandRatios::from_json_str(r#"{"brands": {"omega": 2.0}}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidRatio { .. }));
        let err = BrandRatios::from_json_str(r#"{"ratio": 1.0}"#).unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }
}
