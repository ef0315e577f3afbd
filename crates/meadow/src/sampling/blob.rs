//! Density-weighted stratified rejection sampling of blobs over a ground surface.
//!
//! The sampler splits the surface into cells (see [`crate::sampling::cells`]), gives
//! each cell a candidate budget proportional to its area and draws candidates in
//! passes over a shuffled cell order, one candidate per cell per pass. A candidate is
//! kept with probability equal to the local density and only if no accepted sample
//! lies closer than the sample distance. Sampling stops at the sample cap or when every
//! budget is spent.
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::events::{EventSink, MeadowEvent, MeadowEventKind};
use crate::ground::GroundSurface;
use crate::sampling::cells::{build_cells, MAX_SAMPLING_LEVELS};
use crate::sampling::estimate::{disc_area, disc_count};
use crate::sampling::sample_set::{Sample, SampleSet};
use crate::sampling::spatial_hash::SpatialHash;
use crate::sampling::{fisher_yates_shuffle, rand01};
use crate::settings::MeadowSettings;

/// Candidates drawn per disc-sized area of surface.
pub const OVERSAMPLING: f32 = 4.0;

/// A progress event is sent every this many candidates.
const PROGRESS_INTERVAL: usize = 1024;

/// Inputs of the blob sampler.
#[derive(Clone, Debug, PartialEq)]
pub struct SamplerSettings {
    /// Seed of the pseudo-random generator.
    pub seed: u64,
    /// Minimum distance between samples.
    pub spacing: f32,
    /// Hard cap on the number of samples.
    pub max_samples: usize,
    /// Stratification depth.
    pub levels: u32,
}

impl SamplerSettings {
    pub fn new(seed: u64, spacing: f32, max_samples: usize, levels: u32) -> Self {
        Self {
            seed,
            spacing,
            max_samples,
            levels,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.spacing.is_finite() || self.spacing <= 0.0 {
            return Err(Error::InvalidConfig(
                "sample spacing must be finite and > 0".into(),
            ));
        }
        if self.max_samples == 0 {
            return Err(Error::InvalidConfig("max_samples must be > 0".into()));
        }
        if self.levels > MAX_SAMPLING_LEVELS {
            return Err(Error::InvalidConfig(format!(
                "sampling levels must be <= {MAX_SAMPLING_LEVELS}"
            )));
        }
        Ok(())
    }
}

impl From<&MeadowSettings> for SamplerSettings {
    fn from(settings: &MeadowSettings) -> Self {
        Self {
            seed: settings.seed,
            spacing: settings.sample_distance,
            max_samples: settings.max_samples,
            levels: settings.sampling_levels,
        }
    }
}

/// Seeded blob sampler.
#[derive(Clone, Debug)]
pub struct BlobSampler {
    settings: SamplerSettings,
}

impl BlobSampler {
    pub fn new(settings: SamplerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SamplerSettings {
        &self.settings
    }

    /// Samples `ground`. Identical settings and ground always give an identical set.
    pub fn sample(&self, ground: &GroundSurface, sink: &mut dyn EventSink) -> Result<SampleSet> {
        let SamplerSettings {
            seed,
            spacing,
            max_samples,
            levels,
        } = self.settings;
        self.settings.validate()?;
        ground.validate()?;

        let mut rng = StdRng::seed_from_u64(seed);
        let cells = build_cells(ground, levels, disc_area(spacing));

        let mut budgets: Vec<u32> = cells
            .iter()
            .map(|cell| {
                let expected = disc_count(cell.area, spacing) * OVERSAMPLING;
                let whole = expected.floor();
                let extra = u32::from(rand01(&mut rng) < expected - whole);
                (whole.min(u32::MAX as f32) as u32).saturating_add(extra)
            })
            .collect();
        let budget_total: usize = budgets.iter().map(|&b| b as usize).sum();

        let mut active: Vec<usize> = (0..cells.len()).collect();
        fisher_yates_shuffle(&mut active, &mut rng);
        active.retain(|&c| budgets[c] > 0);

        debug!(
            "Sampling '{}': {} cells at level {}, budget {}.",
            ground.name(),
            cells.len(),
            levels,
            budget_total
        );
        if sink.wants(MeadowEventKind::SamplingStarted) {
            sink.send(MeadowEvent::SamplingStarted {
                ground: ground.name().to_string(),
                cells: cells.len(),
                candidate_budget: budget_total,
            });
        }

        let mut hash = SpatialHash::new(spacing);
        let mut samples: Vec<Sample> = Vec::new();
        let mut drawn = 0usize;

        'passes: while !active.is_empty() {
            let mut next = Vec::with_capacity(active.len());
            for &c in &active {
                if samples.len() >= max_samples {
                    break 'passes;
                }
                let cell = &cells[c];
                budgets[c] -= 1;
                drawn += 1;

                let bary = cell.random_point(&mut rng);
                let density = ground.density_at(cell.triangle, bary);
                // The acceptance roll is always drawn so the random stream does not depend
                // on the density values.
                let roll = rand01(&mut rng);
                if roll < density {
                    let position = ground.point_at(cell.triangle, bary);
                    if hash.is_free(position) {
                        hash.insert(position);
                        let normal = ground.normal_at(cell.triangle, bary);
                        samples.push(Sample {
                            position,
                            normal,
                            slope: Sample::slope_of(normal),
                            triangle: cell.triangle,
                            barycentric: bary,
                            density,
                        });
                    }
                }

                if budgets[c] > 0 {
                    next.push(c);
                }
                if drawn % PROGRESS_INTERVAL == 0 && sink.wants(MeadowEventKind::SamplingProgress)
                {
                    sink.send(MeadowEvent::SamplingProgress {
                        ground: ground.name().to_string(),
                        candidates: drawn,
                        budget: budget_total,
                        accepted: samples.len(),
                    });
                }
            }
            active = next;
        }

        if samples.is_empty() {
            return Err(Error::EmptySurface(format!(
                "ground '{}': none of {} candidates was accepted",
                ground.name(),
                drawn
            )));
        }

        info!(
            "Sampled {} blobs on '{}' from {} candidates.",
            samples.len(),
            ground.name(),
            drawn
        );
        if sink.wants(MeadowEventKind::SamplingFinished) {
            sink.send(MeadowEvent::SamplingFinished {
                ground: ground.name().to_string(),
                samples: samples.len(),
                candidates: drawn,
            });
        }

        Ok(SampleSet::new(samples, seed, spacing))
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::events::VecSink;
    use crate::sampling::estimate::estimate_max_samples;

    fn sampler(seed: u64, spacing: f32, max_samples: usize, levels: u32) -> BlobSampler {
        BlobSampler::new(SamplerSettings::new(seed, spacing, max_samples, levels))
    }

    #[test]
    fn same_seed_reproduces_sample_set() {
        let ground = GroundSurface::heightfield("hill", 10.0, 8, |x, y| 0.1 * (x * x + y * y)).unwrap();
        let a = sampler(7, 0.8, 10_000, 3).sample(&ground, &mut ()).unwrap();
        let b = sampler(7, 0.8, 10_000, 3).sample(&ground, &mut ()).unwrap();
        assert_eq!(a, b);

        let c = sampler(8, 0.8, 10_000, 3).sample(&ground, &mut ()).unwrap();
        assert_ne!(a.samples, c.samples);
    }

    #[test]
    fn samples_respect_minimum_spacing() {
        let ground = GroundSurface::heightfield("bumps", 8.0, 6, |x, y| (x * 0.7).sin() + (y * 0.5).cos()).unwrap();
        for (seed, spacing) in [(1, 0.5), (2, 1.0), (3, 1.7)] {
            let set = sampler(seed, spacing, 10_000, 2).sample(&ground, &mut ()).unwrap();
            assert!(set.len() > 1);
            let min = set.min_pairwise_distance().unwrap();
            assert!(min >= spacing - 1e-4, "min {min} < spacing {spacing}");
        }
    }

    #[test]
    fn estimate_bounds_uniform_sample_count() {
        let ground = GroundSurface::plane("field", 10.0, 4).unwrap();
        for (seed, spacing, levels) in [(1, 0.5, 0), (2, 1.0, 2), (3, 2.0, 5)] {
            let bound = estimate_max_samples(&ground, spacing).unwrap();
            let set = sampler(seed, spacing, usize::MAX, levels).sample(&ground, &mut ()).unwrap();
            assert!(
                bound >= set.len(),
                "bound {bound} < {} samples (spacing {spacing})",
                set.len()
            );
        }
    }

    #[test]
    fn samples_lie_on_the_surface_with_unit_normals() {
        let ground = GroundSurface::heightfield("ramp", 6.0, 3, |x, _| 0.5 * x).unwrap();
        let set = sampler(11, 0.5, 10_000, 1).sample(&ground, &mut ()).unwrap();
        let expected_slope = 0.5f32.atan();
        for s in &set {
            assert!((s.position.z - 0.5 * s.position.x).abs() < 1e-4);
            assert!((s.normal.length() - 1.0).abs() < 1e-4);
            assert!((s.slope - expected_slope).abs() < 1e-3);
            assert!(s.position.abs_diff_eq(ground.point_at(s.triangle, s.barycentric), 1e-5));
        }
    }

    #[test]
    fn max_samples_caps_the_set() {
        let ground = GroundSurface::plane("p", 20.0, 4).unwrap();
        let set = sampler(5, 0.5, 25, 2).sample(&ground, &mut ()).unwrap();
        assert_eq!(set.len(), 25);
    }

    #[test]
    fn samples_only_land_in_dense_region() {
        // 6x6 vertex grid, 2 units apart; only two neighbouring vertices are dense.
        let ground = GroundSurface::plane("masked", 10.0, 5).unwrap();
        let dense = [14u32, 15u32];
        let mut weights = vec![0.0; ground.vertex_count()];
        for &v in &dense {
            weights[v as usize] = 1.0;
        }
        let ground = ground
            .with_vertex_group("density", weights)
            .unwrap()
            .with_density_group("density");

        let set = sampler(3, 1.0, 10_000, 2).sample(&ground, &mut ()).unwrap();
        assert!(!set.is_empty());
        for s in &set {
            let tri = ground.triangles()[s.triangle];
            assert!(
                tri.iter().any(|v| dense.contains(v)),
                "sample on triangle {:?} away from the dense vertices",
                tri
            );
            assert!(s.density > 0.0);
        }
    }

    #[test]
    fn zero_density_everywhere_is_an_empty_surface() {
        let ground = GroundSurface::plane("bare", 4.0, 2).unwrap();
        let weights = vec![0.0; ground.vertex_count()];
        let ground = ground
            .with_vertex_group("density", weights)
            .unwrap()
            .with_density_group("density");
        let err = sampler(1, 0.5, 100, 1).sample(&ground, &mut ()).unwrap_err();
        assert!(matches!(err, Error::EmptySurface(_)));
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let ground = GroundSurface::plane("p", 4.0, 2).unwrap();
        for bad in [
            sampler(1, 0.0, 10, 1),
            sampler(1, 1.0, 0, 1),
            sampler(1, 1.0, 10, MAX_SAMPLING_LEVELS + 1),
        ] {
            assert!(matches!(
                bad.sample(&ground, &mut ()),
                Err(Error::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn reports_start_and_finish() {
        let ground = GroundSurface::plane("p", 10.0, 2).unwrap();
        let mut sink = VecSink::new();
        let set = sampler(1, 0.2, 100_000, 2).sample(&ground, &mut sink).unwrap();
        assert_eq!(sink.count(MeadowEventKind::SamplingStarted), 1);
        assert!(sink.count(MeadowEventKind::SamplingProgress) > 0);
        match sink.as_slice().last() {
            Some(MeadowEvent::SamplingFinished { samples, .. }) => assert_eq!(*samples, set.len()),
            other => panic!("unexpected last event {other:?}"),
        }
    }

    #[test]
    fn samples_follow_ground_transform() {
        let offset = Vec3::new(100.0, -50.0, 3.0);
        let ground = GroundSurface::plane("moved", 4.0, 2)
            .unwrap()
            .with_transform(glam::Affine3A::from_translation(offset));
        let set = sampler(9, 0.5, 1000, 1).sample(&ground, &mut ()).unwrap();
        for s in &set {
            assert!((s.position.z - 3.0).abs() < 1e-4);
            assert!((s.position.x - 100.0).abs() <= 2.0 + 1e-4);
            assert!((s.position.y + 50.0).abs() <= 2.0 + 1e-4);
        }
    }

    #[test]
    fn deepest_level_on_a_dense_mesh_stays_small() {
        let ground = GroundSurface::plane("wide", 48.0, 48).unwrap();
        let mut sink = VecSink::new();
        let set = sampler(4, 1.0, 100_000, MAX_SAMPLING_LEVELS)
            .sample(&ground, &mut sink)
            .unwrap();
        let cells = sink.as_slice().iter().find_map(|e| match e {
            MeadowEvent::SamplingStarted { cells, .. } => Some(*cells),
            _ => None,
        });
        // Unit-area quads are already smaller than a blob, so no triangle is split.
        assert_eq!(cells, Some(ground.triangle_count()));
        assert!(set.len() > 100);
        assert!(set.len() <= estimate_max_samples(&ground, 1.0).unwrap());
    }
}
