//! Sample points ("blobs") produced by the sampler.
use glam::Vec3;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One accepted sample on the ground surface.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    /// World-space position.
    pub position: Vec3,
    /// Interpolated unit surface normal.
    pub normal: Vec3,
    /// Angle between the normal and world up (+Z), in radians.
    pub slope: f32,
    /// Index of the ground triangle the sample lies on.
    pub triangle: usize,
    /// Barycentric coordinates inside that triangle.
    pub barycentric: Vec3,
    /// Density at the sample when it was accepted.
    pub density: f32,
}

impl Sample {
    /// Slope angle of `normal` against world up.
    pub fn slope_of(normal: Vec3) -> f32 {
        normal.dot(Vec3::Z).clamp(-1.0, 1.0).acos()
    }
}

/// Ordered set of samples, in acceptance order.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct SampleSet {
    pub samples: Vec<Sample>,
    /// Seed the set was generated with.
    pub seed: u64,
    /// Minimum distance between samples.
    pub spacing: f32,
}

impl SampleSet {
    pub fn new(samples: Vec<Sample>, seed: u64, spacing: f32) -> Self {
        Self {
            samples,
            seed,
            spacing,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.samples.iter().map(|s| s.position)
    }

    /// Smallest distance between any two samples, `None` with fewer than two samples.
    pub fn min_pairwise_distance(&self) -> Option<f32> {
        let mut min: Option<f32> = None;
        for (i, a) in self.samples.iter().enumerate() {
            for b in &self.samples[i + 1..] {
                let d = a.position.distance(b.position);
                min = Some(min.map_or(d, |m| m.min(d)));
            }
        }
        min
    }
}

impl<'a> IntoIterator for &'a SampleSet {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}
