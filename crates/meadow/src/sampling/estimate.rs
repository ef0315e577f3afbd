//! Upper bound on the number of samples that fit a ground surface.
use std::f32::consts::PI;

use crate::error::{Error, Result};
use crate::ground::GroundSurface;

/// Estimates an upper bound for the number of samples with minimum distance `spacing`
/// that fit on `ground`.
///
/// Each sample owns a disc of radius `spacing / 2`; discs of two accepted samples
/// never overlap. All discs lie inside the surface grown by that radius, whose area is
/// at most `area + boundary_length * r + PI * r^2`, so dividing by the disc area gives
/// a bound the sampler can never exceed.
pub fn estimate_max_samples(ground: &GroundSurface, spacing: f32) -> Result<usize> {
    if !spacing.is_finite() || spacing <= 0.0 {
        return Err(Error::InvalidConfig(format!(
            "sample distance must be finite and > 0, got {spacing}"
        )));
    }

    let stats = ground.validate()?;
    let r = spacing as f64 * 0.5;
    let disc = std::f64::consts::PI * r * r;
    let grown = stats.area as f64 + stats.boundary_length as f64 * r + disc;

    let estimate = (grown / disc).floor();
    if estimate >= usize::MAX as f64 {
        return Ok(usize::MAX);
    }
    Ok((estimate as usize).max(1))
}

/// Area of the disc of radius `spacing / 2` one sample owns.
pub(crate) fn disc_area(spacing: f32) -> f32 {
    let r = spacing * 0.5;
    PI * r * r
}

/// Expected number of samples a single disc covers in `area`.
pub(crate) fn disc_count(area: f32, spacing: f32) -> f32 {
    area / disc_area(spacing)
}
