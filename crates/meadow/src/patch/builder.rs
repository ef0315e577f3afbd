//! Builds patch placements from a sample set and a blob grid template.
use glam::{Affine3A, Quat, Vec3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::events::{EventSink, MeadowEvent, MeadowEventKind};
use crate::ground::GroundSurface;
use crate::patch::selection::{pick_cycle, pick_highest_density, pick_weighted_random, tile_weights};
use crate::patch::template::{BlobGridTemplate, StrandSpec};
use crate::sampling::{derive_seed, Sample, SampleSet};
use crate::settings::{MeadowSettings, TileSelection};

/// Random stream used for tile selection, kept apart from the sampler's stream.
const SELECTION_STREAM: u64 = 1;

/// Where and which tile to instance for one sample.
#[derive(Clone, Debug, PartialEq)]
pub struct PatchPlacement {
    pub tile: usize,
    pub tile_name: String,
    pub sample_index: usize,
    pub transform: Affine3A,
    pub strands: StrandSpec,
}

/// Turns samples into patch placements.
#[derive(Clone, Debug)]
pub struct PatchBuilder {
    slope_rotation: f32,
    selection: TileSelection,
    seed: u64,
}

impl PatchBuilder {
    pub fn new(slope_rotation: f32, selection: TileSelection, seed: u64) -> Self {
        Self {
            slope_rotation,
            selection,
            seed,
        }
    }

    pub fn from_settings(settings: &MeadowSettings) -> Self {
        Self::new(settings.slope_rotation, settings.selection, settings.seed)
    }

    /// Orientation of a patch on a surface with normal `normal`.
    ///
    /// `slope_rotation` 0 aligns the patch's +Z with the normal, 1 keeps it world aligned.
    pub fn orientation(&self, normal: Vec3) -> Quat {
        let normal = normal.normalize_or_zero();
        if normal == Vec3::ZERO {
            return Quat::IDENTITY;
        }
        Quat::from_rotation_arc(Vec3::Z, normal).slerp(Quat::IDENTITY, self.slope_rotation)
    }

    /// One placement per sample with a placeable tile, in sample order.
    pub fn build(
        &self,
        template: &BlobGridTemplate,
        ground: &GroundSurface,
        samples: Option<&SampleSet>,
        sink: &mut dyn EventSink,
    ) -> Result<Vec<PatchPlacement>> {
        if !(0.0..=1.0).contains(&self.slope_rotation) {
            return Err(Error::InvalidConfig(
                "slope_rotation must be in [0, 1]".into(),
            ));
        }
        template.validate()?;
        let samples = match samples {
            Some(samples) if !samples.is_empty() => samples,
            _ => {
                return Err(Error::NoSamples {
                    ground: ground.name().to_string(),
                })
            }
        };

        let mut rng = StdRng::seed_from_u64(derive_seed(self.seed, SELECTION_STREAM));
        let mut placements = Vec::with_capacity(samples.len());
        let mut skipped = 0usize;

        for (sample_index, sample) in samples.iter().enumerate() {
            let weights = tile_weights(template, ground, sample);
            let selected = match self.selection {
                TileSelection::Cycle => pick_cycle(&weights, sample_index),
                TileSelection::WeightedRandom => pick_weighted_random(&weights, &mut rng),
                TileSelection::HighestDensity => pick_highest_density(&weights),
            };
            let Some(tile) = selected else {
                skipped += 1;
                continue;
            };
            placements.push(self.place(template, tile, sample_index, sample));
        }

        if skipped > 0 {
            warn!(
                "{} of {} samples on '{}' have no placeable tile in '{}'; skipping them.",
                skipped,
                samples.len(),
                ground.name(),
                template.name
            );
            if sink.wants(MeadowEventKind::Warning) {
                sink.send(MeadowEvent::Warning {
                    context: format!("ground:{} blob_grid:{}", ground.name(), template.name),
                    message: format!("{skipped} samples have no placeable tile"),
                });
            }
        }

        info!(
            "Built {} patches on '{}' from {} samples.",
            placements.len(),
            ground.name(),
            samples.len()
        );
        if sink.wants(MeadowEventKind::PatchesBuilt) {
            sink.send(MeadowEvent::PatchesBuilt {
                ground: ground.name().to_string(),
                patches: placements.len(),
                skipped,
            });
        }

        Ok(placements)
    }

    fn place(
        &self,
        template: &BlobGridTemplate,
        tile: usize,
        sample_index: usize,
        sample: &Sample,
    ) -> PatchPlacement {
        let t = &template.tiles[tile];
        let rotation = self.orientation(sample.normal);
        let mut transform = Affine3A::from_rotation_translation(rotation, sample.position);
        if t.use_centered {
            transform = transform * Affine3A::from_translation(-t.origin);
        }
        debug!(
            "Sample {} -> tile '{}' at {:?}.",
            sample_index, t.name, sample.position
        );
        PatchPlacement {
            tile,
            tile_name: t.name.clone(),
            sample_index,
            transform,
            strands: t.strands.clone(),
        }
    }
}
