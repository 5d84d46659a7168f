//! Bridge configuration
//!
//! Loaded from JSON handed over by the app (`MainActivity.configure`).
//! Every field is optional in the document and falls back to its default.

use std::str::FromStr;

use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Android log tag
    pub log_tag: String,
    /// One of off, error, warn, info, debug, trace
    pub log_level: String,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Odd Gaussian kernel size used by the blur operation
    pub blur_kernel: u32,
    /// Row alignment in bytes for newly allocated buffers
    pub row_alignment: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            log_tag: "FlameRnDNative".to_string(),
            log_level: "debug".to_string(),
            canny_low: 100.0,
            canny_high: 200.0,
            blur_kernel: 15,
            row_alignment: 4,
        }
    }
}

impl BridgeConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: BridgeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.log_tag.is_empty() {
            return Err(BridgeError::Config("log_tag must not be empty".into()));
        }
        self.max_level()?;
        if !(self.canny_low > 0.0 && self.canny_high > 0.0) {
            return Err(BridgeError::Config("canny thresholds must be positive".into()));
        }
        if self.canny_low > self.canny_high {
            return Err(BridgeError::Config(format!(
                "canny_low {} exceeds canny_high {}",
                self.canny_low, self.canny_high
            )));
        }
        if self.blur_kernel == 0 || self.blur_kernel % 2 == 0 {
            return Err(BridgeError::Config(format!(
                "blur_kernel must be odd, got {}",
                self.blur_kernel
            )));
        }
        if !self.row_alignment.is_power_of_two() {
            return Err(BridgeError::Config(format!(
                "row_alignment must be a power of two, got {}",
                self.row_alignment
            )));
        }
        Ok(())
    }

    pub fn max_level(&self) -> Result<LevelFilter> {
        LevelFilter::from_str(&self.log_level)
            .map_err(|_| BridgeError::Config(format!("unknown log level {:?}", self.log_level)))
    }

    /// Gaussian sigma for `blur_kernel`, derived as OpenCV does for sigma = 0.
    pub fn blur_sigma(&self) -> f32 {
        0.3 * ((self.blur_kernel as f32 - 1.0) * 0.5 - 1.0) + 0.8
    }
}
