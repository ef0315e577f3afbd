//! Settings for sampling, patch building and baking.
//!
//! Settings are plain structs with defaults, chained `with_*` setters and a
//! `validate()` that reports the first invalid value as
//! [`Error::InvalidConfig`](crate::error::Error::InvalidConfig). With the `serde`
//! feature they can be loaded from any serde format.
use glam::Vec3;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sampling::cells::MAX_SAMPLING_LEVELS;

/// How the patch builder picks a template tile for each sample.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TileSelection {
    /// Cycle through the tiles that may be placed at the sample.
    Cycle,
    /// Draw a tile proportionally to its density weight at the sample.
    #[default]
    WeightedRandom,
    /// Pick the tile with the highest density weight at the sample.
    HighestDensity,
}

/// Per-ground meadow settings.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct MeadowSettings {
    /// Random seed for sampling and tile selection.
    pub seed: u64,
    /// Minimum distance between samples in world units.
    pub sample_distance: f32,
    /// Hard cap on the number of samples.
    pub max_samples: usize,
    /// Stratification depth; each level splits every cell into four.
    pub sampling_levels: u32,
    /// Blend of patch rotation toward world up: 0 follows the surface, 1 stays upright.
    pub slope_rotation: f32,
    /// Tile selection strategy for patches.
    pub selection: TileSelection,
}

impl Default for MeadowSettings {
    fn default() -> Self {
        Self {
            seed: 0,
            sample_distance: 1.0,
            max_samples: 1000,
            sampling_levels: 4,
            slope_rotation: 0.0,
            selection: TileSelection::WeightedRandom,
        }
    }
}

impl MeadowSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_sample_distance(mut self, sample_distance: f32) -> Self {
        self.sample_distance = sample_distance;
        self
    }

    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }

    pub fn with_sampling_levels(mut self, sampling_levels: u32) -> Self {
        self.sampling_levels = sampling_levels;
        self
    }

    pub fn with_slope_rotation(mut self, slope_rotation: f32) -> Self {
        self.slope_rotation = slope_rotation;
        self
    }

    pub fn with_selection(mut self, selection: TileSelection) -> Self {
        self.selection = selection;
        self
    }

    /// True when `other` differs in a setting that shapes the sample set.
    pub fn sampling_differs(&self, other: &MeadowSettings) -> bool {
        self.seed != other.seed
            || self.sample_distance != other.sample_distance
            || self.max_samples != other.max_samples
            || self.sampling_levels != other.sampling_levels
    }

    pub fn validate(&self) -> Result<()> {
        if !self.sample_distance.is_finite() || self.sample_distance <= 0.0 {
            return Err(Error::InvalidConfig(
                "sample_distance must be finite and > 0".into(),
            ));
        }
        if self.max_samples == 0 {
            return Err(Error::InvalidConfig("max_samples must be > 0".into()));
        }
        if self.sampling_levels > MAX_SAMPLING_LEVELS {
            return Err(Error::InvalidConfig(format!(
                "sampling_levels must be <= {MAX_SAMPLING_LEVELS}"
            )));
        }
        if !(0.0..=1.0).contains(&self.slope_rotation) {
            return Err(Error::InvalidConfig(
                "slope_rotation must be in [0, 1]".into(),
            ));
        }
        Ok(())
    }
}

/// Settings for the physics bake.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct BakeSettings {
    /// First baked frame.
    pub frame_start: i32,
    /// Last baked frame (inclusive).
    pub frame_end: i32,
    /// Frames per second of the baked animation.
    pub fps: f32,
    /// Solver steps per frame.
    pub substeps: u32,
    /// Constraint iterations per step.
    pub iterations: u32,
    /// Gravity acceleration in world units per second squared.
    pub gravity: Vec3,
    /// Velocity damping per step in [0, 1].
    pub damping: f32,
    /// How far a particle may stray from its root, in multiples of its strand length,
    /// before the solve is declared divergent.
    pub divergence_limit: f32,
}

impl Default for BakeSettings {
    fn default() -> Self {
        Self {
            frame_start: 1,
            frame_end: 48,
            fps: 24.0,
            substeps: 4,
            iterations: 8,
            gravity: Vec3::new(0.0, 0.0, -9.81),
            damping: 0.02,
            divergence_limit: 4.0,
        }
    }
}

impl BakeSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_frame_range(mut self, frame_start: i32, frame_end: i32) -> Self {
        self.frame_start = frame_start;
        self.frame_end = frame_end;
        self
    }

    pub fn with_fps(mut self, fps: f32) -> Self {
        self.fps = fps;
        self
    }

    pub fn with_substeps(mut self, substeps: u32) -> Self {
        self.substeps = substeps;
        self
    }

    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_damping(mut self, damping: f32) -> Self {
        self.damping = damping;
        self
    }

    pub fn with_divergence_limit(mut self, divergence_limit: f32) -> Self {
        self.divergence_limit = divergence_limit;
        self
    }

    /// Number of frames in the baked range.
    pub fn frame_count(&self) -> usize {
        let count = (i64::from(self.frame_end) - i64::from(self.frame_start) + 1).max(0);
        usize::try_from(count).unwrap_or(usize::MAX)
    }

    /// Length of one solver step in seconds.
    pub fn step_seconds(&self) -> f32 {
        1.0 / (self.fps * self.substeps.max(1) as f32)
    }

    pub fn validate(&self) -> Result<()> {
        if self.frame_end < self.frame_start {
            return Err(Error::InvalidConfig(
                "frame_end must be >= frame_start".into(),
            ));
        }
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(Error::InvalidConfig("fps must be > 0".into()));
        }
        if self.substeps == 0 {
            return Err(Error::InvalidConfig("substeps must be > 0".into()));
        }
        if !self.gravity.is_finite() {
            return Err(Error::InvalidConfig("gravity must be finite".into()));
        }
        if !(0.0..=1.0).contains(&self.damping) {
            return Err(Error::InvalidConfig("damping must be in [0, 1]".into()));
        }
        if !self.divergence_limit.is_finite() || self.divergence_limit <= 0.0 {
            return Err(Error::InvalidConfig(
                "divergence_limit must be finite and > 0".into(),
            ));
        }
        Ok(())
    }
}
