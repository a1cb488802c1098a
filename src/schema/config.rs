//! Configuration types for a Life simulation session.

use serde::{Deserialize, Serialize};

use super::RuleSet;

fn default_padding() -> f32 {
    0.1
}

fn default_color() -> [u8; 4] {
    [0x3B, 0xC9, 0x7D, 0xFF]
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Grid width in cells.
    pub width: usize,
    /// Grid height in cells.
    pub height: usize,
    /// On-screen size of one cell in pixels.
    pub density: u32,
    /// Gap around the alive-cell circle, as a fraction of the cell size.
    #[serde(default = "default_padding")]
    pub padding: f32,
    /// RGBA color of alive cells.
    #[serde(default = "default_color")]
    pub color: [u8; 4],
    /// Birth/survive rules.
    #[serde(default)]
    pub rules: RuleSet,
    /// Target generations per second.
    pub frequency: f64,
    /// Worker count override (None = derive from available parallelism).
    #[serde(default)]
    pub workers: Option<usize>,
    /// Seed for the random patch generator (None = entropy).
    #[serde(default)]
    pub random_seed: Option<u64>,
    /// Random patches to paint when a fresh grid is created.
    #[serde(default)]
    pub initial_passes: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            width: 160,
            height: 90,
            density: 8,
            padding: default_padding(),
            color: default_color(),
            rules: RuleSet::conway(),
            frequency: 30.0,
            workers: None,
            random_seed: None,
            initial_passes: 40,
        }
    }
}

impl SimulationConfig {
    /// Derive grid dimensions from a viewport size in pixels.
    pub fn from_viewport(pixel_width: u32, pixel_height: u32, density: u32) -> Self {
        let density = density.max(1);
        Self {
            width: (pixel_width / density).max(1) as usize,
            height: (pixel_height / density).max(1) as usize,
            density,
            ..Self::default()
        }
    }

    /// Total number of cells.
    #[inline]
    pub fn grid_size(&self) -> usize {
        self.width * self.height
    }

    /// Pixel dimensions of the full drawing surface.
    pub fn frame_size(&self) -> (u32, u32) {
        (
            self.width as u32 * self.density,
            self.height as u32 * self.density,
        )
    }

    /// Pixel count of the full drawing surface, if every surface dimension
    /// and the product fit in 32 bits.
    pub fn frame_pixels(&self) -> Option<u32> {
        let width = u32::try_from(self.width).ok()?.checked_mul(self.density)?;
        let height = u32::try_from(self.height).ok()?.checked_mul(self.density)?;
        width.checked_mul(height)
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if u32::try_from(self.width).is_err() || u32::try_from(self.height).is_err() {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.density == 0 {
            return Err(ConfigError::InvalidDensity);
        }
        if self.frame_pixels().is_none() {
            return Err(ConfigError::FrameTooLarge);
        }
        if !(0.0..0.5).contains(&self.padding) {
            return Err(ConfigError::InvalidPadding(self.padding));
        }
        if self.frequency.is_nan() || self.frequency <= 0.0 {
            return Err(ConfigError::InvalidFrequency(self.frequency));
        }
        if self.workers == Some(0) {
            return Err(ConfigError::InvalidWorkerCount);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Grid dimensions (width, height) must be non-zero and fit in 32 bits")]
    InvalidDimensions,
    #[error("Density (cell pixel size) must be non-zero")]
    InvalidDensity,
    #[error("Frame of width*density by height*density pixels does not fit in 32 bits")]
    FrameTooLarge,
    #[error("Padding must be in [0, 0.5), got {0}")]
    InvalidPadding(f32),
    #[error("Frequency must be positive, got {0}")]
    InvalidFrequency(f64),
    #[error("Worker count must be non-zero")]
    InvalidWorkerCount,
}
