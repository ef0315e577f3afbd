//! Scene registry tying grounds, blob grids, samples and patches together.
//!
//! A [`MeadowScene`] owns every object the pipeline works on. Grounds and blob grids
//! are addressed by ids allocated in increasing order; each ground carries its
//! settings, its current sample set and the patches built from it. All operations
//! take `&mut self`, so a scene is used from one thread at a time.
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::events::{EventSink, MeadowEvent, MeadowEventKind};
use crate::ground::GroundSurface;
use crate::patch::{BlobGridTemplate, Patch, PatchBuilder, PatchId};
use crate::physics::cache;
use crate::physics::controller::{self, BakeReport, FreeReport, PhysicsBakeController};
use crate::physics::solver::{PatchSolver, StrandSolver};
use crate::sampling::{self, BlobSampler, SampleSet, SamplerSettings};
use crate::settings::{BakeSettings, MeadowSettings};

/// Identifier of a ground in a [`MeadowScene`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroundId(pub u64);

/// Identifier of a blob grid in a [`MeadowScene`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlobGridId(pub u64);

impl fmt::Display for GroundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ground#{}", self.0)
    }
}

impl fmt::Display for BlobGridId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "blob_grid#{}", self.0)
    }
}

/// A ground registered in a scene with everything built on it.
#[derive(Clone, Debug)]
pub struct Ground {
    surface: GroundSurface,
    settings: MeadowSettings,
    samples: Option<SampleSet>,
    patches: Vec<Patch>,
}

impl Ground {
    pub fn surface(&self) -> &GroundSurface {
        &self.surface
    }

    pub fn settings(&self) -> &MeadowSettings {
        &self.settings
    }

    pub fn samples(&self) -> Option<&SampleSet> {
        self.samples.as_ref()
    }

    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }
}

/// Counts produced by [`MeadowScene::make_meadow`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MeadowSummary {
    pub samples: usize,
    pub patches: usize,
}

#[derive(Debug, Default)]
pub struct MeadowScene {
    grounds: BTreeMap<GroundId, Ground>,
    blob_grids: BTreeMap<BlobGridId, BlobGridTemplate>,
    next_ground: u64,
    next_blob_grid: u64,
    next_patch: u64,
    cache_dir: Option<PathBuf>,
}

impl MeadowScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores baked patches under `dir` as well as in memory.
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn set_cache_dir(&mut self, dir: Option<PathBuf>) {
        self.cache_dir = dir;
    }

    pub fn cache_dir(&self) -> Option<&Path> {
        self.cache_dir.as_deref()
    }

    /// Registers `surface` with default settings.
    pub fn add_ground(&mut self, surface: GroundSurface) -> GroundId {
        self.insert_ground(surface, MeadowSettings::default())
    }

    pub fn add_ground_with(
        &mut self,
        surface: GroundSurface,
        settings: MeadowSettings,
    ) -> Result<GroundId> {
        settings.validate()?;
        Ok(self.insert_ground(surface, settings))
    }

    fn insert_ground(&mut self, surface: GroundSurface, settings: MeadowSettings) -> GroundId {
        let id = GroundId(self.next_ground);
        self.next_ground += 1;
        self.grounds.insert(
            id,
            Ground {
                surface,
                settings,
                samples: None,
                patches: Vec::new(),
            },
        );
        id
    }

    /// Removes a ground together with its samples, patches and their cache files.
    pub fn remove_ground(&mut self, id: GroundId) -> Result<GroundSurface> {
        let ground = self.grounds.remove(&id).ok_or_else(|| no_ground(id))?;
        self.remove_cache_files(&ground.patches)?;
        Ok(ground.surface)
    }

    pub fn add_blob_grid(&mut self, template: BlobGridTemplate) -> BlobGridId {
        let id = BlobGridId(self.next_blob_grid);
        self.next_blob_grid += 1;
        self.blob_grids.insert(id, template);
        id
    }

    pub fn remove_blob_grid(&mut self, id: BlobGridId) -> Result<BlobGridTemplate> {
        self.blob_grids.remove(&id).ok_or_else(|| no_blob_grid(id))
    }

    pub fn ground(&self, id: GroundId) -> Result<&Ground> {
        self.grounds.get(&id).ok_or_else(|| no_ground(id))
    }

    pub fn blob_grid(&self, id: BlobGridId) -> Result<&BlobGridTemplate> {
        self.blob_grids.get(&id).ok_or_else(|| no_blob_grid(id))
    }

    /// Mutable access to a ground's surface. Rejected while samples exist.
    pub fn surface_mut(&mut self, id: GroundId) -> Result<&mut GroundSurface> {
        let ground = self.grounds.get_mut(&id).ok_or_else(|| no_ground(id))?;
        if ground.samples.is_some() {
            return Err(Error::SamplesExist {
                ground: ground.surface.name().to_string(),
            });
        }
        Ok(&mut ground.surface)
    }

    pub fn grounds(&self) -> impl Iterator<Item = (GroundId, &Ground)> + '_ {
        self.grounds.iter().map(|(&id, g)| (id, g))
    }

    pub fn blob_grids(&self) -> impl Iterator<Item = (BlobGridId, &BlobGridTemplate)> + '_ {
        self.blob_grids.iter().map(|(&id, t)| (id, t))
    }

    pub fn find_ground_by_name(&self, name: &str) -> Option<GroundId> {
        self.grounds
            .iter()
            .find(|(_, g)| g.surface.name() == name)
            .map(|(&id, _)| id)
    }

    pub fn find_blob_grid_by_name(&self, name: &str) -> Option<BlobGridId> {
        self.blob_grids
            .iter()
            .find(|(_, t)| t.name == name)
            .map(|(&id, _)| id)
    }

    /// All patches of all grounds, in ground order.
    pub fn patches(&self) -> impl Iterator<Item = &Patch> + '_ {
        self.grounds.values().flat_map(|g| g.patches.iter())
    }

    pub fn patch(&self, id: PatchId) -> Option<&Patch> {
        self.patches().find(|p| p.id == id)
    }

    /// Replaces a ground's settings.
    ///
    /// Changing a setting that shapes the sample set fails with
    /// [`Error::SamplesExist`] while the ground has samples.
    pub fn set_ground_settings(&mut self, id: GroundId, settings: MeadowSettings) -> Result<()> {
        settings.validate()?;
        let ground = self.grounds.get_mut(&id).ok_or_else(|| no_ground(id))?;
        if ground.samples.is_some() && ground.settings.sampling_differs(&settings) {
            return Err(Error::SamplesExist {
                ground: ground.surface.name().to_string(),
            });
        }
        ground.settings = settings;
        Ok(())
    }

    /// Estimates how many samples fit the ground and stores it as its `max_samples`.
    pub fn estimate_max_samples(&mut self, id: GroundId) -> Result<usize> {
        let ground = self.grounds.get_mut(&id).ok_or_else(|| no_ground(id))?;
        if ground.samples.is_some() {
            return Err(Error::SamplesExist {
                ground: ground.surface.name().to_string(),
            });
        }
        let estimate =
            sampling::estimate_max_samples(&ground.surface, ground.settings.sample_distance)?;
        ground.settings.max_samples = estimate;
        info!(
            "Estimated {} samples for '{}'.",
            estimate,
            ground.surface.name()
        );
        Ok(estimate)
    }

    /// Samples the ground, replacing any previous sample set. Returns the sample count.
    pub fn make_blobs(
        &mut self,
        ground: GroundId,
        blob_grid: BlobGridId,
        sink: &mut dyn EventSink,
    ) -> Result<usize> {
        let entry = self.grounds.get_mut(&ground).ok_or_else(|| no_ground(ground))?;
        if !self.blob_grids.contains_key(&blob_grid) {
            return Err(no_blob_grid(blob_grid));
        }

        release_samples(entry, sink);
        let sampler = BlobSampler::new(SamplerSettings::from(&entry.settings));
        let samples = sampler.sample(&entry.surface, sink)?;
        let count = samples.len();
        entry.samples = Some(samples);
        Ok(count)
    }

    /// Releases the ground's sample set; patches already built stay. Returns the number
    /// of samples released.
    pub fn delete_blobs(&mut self, ground: GroundId, sink: &mut dyn EventSink) -> Result<usize> {
        let entry = self.grounds.get_mut(&ground).ok_or_else(|| no_ground(ground))?;
        Ok(release_samples(entry, sink))
    }

    /// Builds patches from the ground's samples, replacing its previous patches.
    /// Returns the number of patches.
    pub fn make_patches(
        &mut self,
        ground: GroundId,
        blob_grid: BlobGridId,
        sink: &mut dyn EventSink,
    ) -> Result<usize> {
        let entry = self.grounds.get(&ground).ok_or_else(|| no_ground(ground))?;
        let template = self
            .blob_grids
            .get(&blob_grid)
            .ok_or_else(|| no_blob_grid(blob_grid))?;

        let placements = PatchBuilder::from_settings(&entry.settings).build(
            template,
            &entry.surface,
            entry.samples.as_ref(),
            sink,
        )?;

        // Old patches stay on the ground until their cache files are gone.
        self.remove_cache_files(&self.ground(ground)?.patches)?;
        let stale = self
            .grounds
            .get_mut(&ground)
            .map(|g| std::mem::take(&mut g.patches))
            .unwrap_or_default();

        let first = self.next_patch;
        self.next_patch += placements.len() as u64;
        let entry = self.grounds.get_mut(&ground).ok_or_else(|| no_ground(ground))?;
        if !stale.is_empty() && sink.wants(MeadowEventKind::PatchesRemoved) {
            sink.send(MeadowEvent::PatchesRemoved {
                ground: entry.surface.name().to_string(),
                patches: stale.len(),
            });
        }

        let name = entry.surface.name().to_string();
        entry.patches = placements
            .into_iter()
            .zip(first..)
            .map(|(placement, id)| Patch::from_placement(PatchId(id), &name, placement))
            .collect();
        Ok(entry.patches.len())
    }

    /// Samples the ground and builds its patches, stopping at the first failure.
    pub fn make_meadow(
        &mut self,
        ground: GroundId,
        blob_grid: BlobGridId,
        sink: &mut dyn EventSink,
    ) -> Result<MeadowSummary> {
        let samples = self.make_blobs(ground, blob_grid, sink)?;
        let patches = self.make_patches(ground, blob_grid, sink)?;
        Ok(MeadowSummary { samples, patches })
    }

    /// Bakes every patch with the default [`StrandSolver`].
    pub fn bake_physics(
        &mut self,
        settings: &BakeSettings,
        sink: &mut dyn EventSink,
    ) -> Result<BakeReport> {
        self.bake_physics_with(settings, &StrandSolver, sink)
    }

    pub fn bake_physics_with(
        &mut self,
        settings: &BakeSettings,
        solver: &dyn PatchSolver,
        sink: &mut dyn EventSink,
    ) -> Result<BakeReport> {
        let controller =
            PhysicsBakeController::new(settings, solver).with_cache_dir(self.cache_dir.as_deref());
        controller.bake(
            self.grounds.values_mut().flat_map(|g| g.patches.iter_mut()),
            sink,
        )
    }

    /// Releases the baked state of every patch.
    pub fn free_physics(&mut self, sink: &mut dyn EventSink) -> Result<FreeReport> {
        controller::free_physics(
            self.grounds.values_mut().flat_map(|g| g.patches.iter_mut()),
            self.cache_dir.as_deref(),
            sink,
        )
    }

    fn remove_cache_files(&self, patches: &[Patch]) -> Result<()> {
        let Some(dir) = self.cache_dir.as_deref() else {
            return Ok(());
        };
        for patch in patches {
            cache::remove_bake_file(&cache::bake_file_path(dir, &patch.cache_stem()))?;
        }
        Ok(())
    }
}

fn release_samples(ground: &mut Ground, sink: &mut dyn EventSink) -> usize {
    let Some(samples) = ground.samples.take() else {
        return 0;
    };
    if !ground.patches.is_empty() {
        warn!(
            "Deleted samples of '{}'; its {} patches are kept until the next rebuild.",
            ground.surface.name(),
            ground.patches.len()
        );
    }
    if sink.wants(MeadowEventKind::SamplesDeleted) {
        sink.send(MeadowEvent::SamplesDeleted {
            ground: ground.surface.name().to_string(),
            samples: samples.len(),
        });
    }
    samples.len()
}

fn no_ground(id: GroundId) -> Error {
    Error::NoGround { id: id.to_string() }
}

fn no_blob_grid(id: BlobGridId) -> Error {
    Error::NoBlobGrid { id: id.to_string() }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::events::VecSink;
    use crate::patch::TemplateTile;
    use crate::physics::cache::tests::scratch_dir;
    use crate::physics::solver::{Divergence, PatchSimulation};
    use crate::physics::BakeStatus;

    fn settings() -> MeadowSettings {
        MeadowSettings::default()
            .with_seed(11)
            .with_sample_distance(1.0)
            .with_max_samples(10_000)
            .with_sampling_levels(2)
    }

    fn scene() -> (MeadowScene, GroundId, BlobGridId) {
        let mut scene = MeadowScene::new();
        let ground = scene
            .add_ground_with(GroundSurface::plane("field", 10.0, 10).unwrap(), settings())
            .unwrap();
        let grid = scene.add_blob_grid(BlobGridTemplate::grid("grass", 2, 2, 1.0));
        (scene, ground, grid)
    }

    fn short_bake() -> BakeSettings {
        BakeSettings::default().with_frame_range(1, 4)
    }

    #[test]
    fn ids_are_monotonic_and_lookup_fails_cleanly() {
        let (mut scene, ground, grid) = scene();
        let other = scene.add_ground(GroundSurface::plane("other", 2.0, 1).unwrap());
        assert!(other > ground);
        assert_eq!(scene.find_ground_by_name("other"), Some(other));
        assert_eq!(scene.find_blob_grid_by_name("grass"), Some(grid));

        scene.remove_ground(other).unwrap();
        let again = scene.add_ground(GroundSurface::plane("again", 2.0, 1).unwrap());
        assert!(again > other);

        let missing = GroundId(99);
        assert!(matches!(scene.ground(missing), Err(Error::NoGround { .. })));
        assert!(matches!(
            scene.make_blobs(missing, grid, &mut ()),
            Err(Error::NoGround { .. })
        ));
        assert!(matches!(
            scene.make_blobs(ground, BlobGridId(99), &mut ()),
            Err(Error::NoBlobGrid { .. })
        ));
    }

    #[test]
    fn estimate_is_stored_and_locked_by_samples() {
        let (mut scene, ground, grid) = scene();
        let estimate = scene.estimate_max_samples(ground).unwrap();
        assert_eq!(scene.ground(ground).unwrap().settings().max_samples, estimate);

        let count = scene.make_blobs(ground, grid, &mut ()).unwrap();
        assert!(count <= estimate);
        assert!(matches!(
            scene.estimate_max_samples(ground),
            Err(Error::SamplesExist { .. })
        ));
        assert!(matches!(
            scene.set_ground_settings(ground, settings().with_seed(12)),
            Err(Error::SamplesExist { .. })
        ));
        // Patch-only settings stay editable.
        let patch_only = scene
            .ground(ground)
            .unwrap()
            .settings()
            .clone()
            .with_slope_rotation(0.5);
        scene.set_ground_settings(ground, patch_only).unwrap();

        scene.delete_blobs(ground, &mut ()).unwrap();
        scene.set_ground_settings(ground, settings().with_seed(12)).unwrap();
    }

    #[test]
    fn make_blobs_replaces_the_previous_set() {
        let (mut scene, ground, grid) = scene();
        let mut sink = VecSink::new();
        let first = scene.make_blobs(ground, grid, &mut sink).unwrap();
        assert_eq!(sink.count(MeadowEventKind::SamplesDeleted), 0);
        let second = scene.make_blobs(ground, grid, &mut sink).unwrap();
        assert_eq!(first, second);
        assert!(sink.as_slice().contains(&MeadowEvent::SamplesDeleted {
            ground: "field".into(),
            samples: first,
        }));
    }

    #[test]
    fn patches_need_samples() {
        let (mut scene, ground, grid) = scene();
        assert!(matches!(
            scene.make_patches(ground, grid, &mut ()),
            Err(Error::NoSamples { .. })
        ));
        scene.make_blobs(ground, grid, &mut ()).unwrap();
        scene.delete_blobs(ground, &mut ()).unwrap();
        assert_eq!(scene.delete_blobs(ground, &mut ()).unwrap(), 0);
        assert!(matches!(
            scene.make_patches(ground, grid, &mut ()),
            Err(Error::NoSamples { .. })
        ));
    }

    #[test]
    fn rebuilding_patches_is_idempotent() {
        let (mut scene, ground, grid) = scene();
        let summary = scene.make_meadow(ground, grid, &mut ()).unwrap();
        assert_eq!(summary.patches, summary.samples);
        let first: Vec<_> = scene
            .patches()
            .map(|p| (p.name.clone(), p.tile, p.transform))
            .collect();

        let mut sink = VecSink::new();
        scene.make_patches(ground, grid, &mut sink).unwrap();
        let second: Vec<_> = scene
            .patches()
            .map(|p| (p.name.clone(), p.tile, p.transform))
            .collect();
        assert_eq!(first, second);
        assert_eq!(scene.patches().count(), summary.patches);
        assert!(sink.as_slice().contains(&MeadowEvent::PatchesRemoved {
            ground: "field".into(),
            patches: summary.patches,
        }));
    }

    #[test]
    fn density_mask_keeps_samples_in_the_painted_half() {
        let surface = GroundSurface::plane("masked", 10.0, 10).unwrap();
        let mask: Vec<f32> = surface
            .world_positions()
            .iter()
            .map(|p| if p.x <= 0.0 { 1.0 } else { 0.0 })
            .collect();
        let surface = surface
            .with_vertex_group("mask", mask)
            .unwrap()
            .with_density_group("mask");

        let mut scene = MeadowScene::new();
        let ground = scene.add_ground_with(surface, settings()).unwrap();
        let grid = scene.add_blob_grid(BlobGridTemplate::grid("grass", 1, 1, 1.0));
        scene.make_blobs(ground, grid, &mut ()).unwrap();

        let samples = scene.ground(ground).unwrap().samples().unwrap();
        assert!(samples.len() > 10);
        // One grid cell past the painted edge is the furthest interpolation reaches.
        assert!(samples.positions().all(|p| p.x < 1.0 + 1e-4));
    }

    #[test]
    fn bake_free_bake_through_the_scene() {
        let (mut scene, ground, grid) = scene();
        scene.make_meadow(ground, grid, &mut ()).unwrap();
        let count = scene.patches().count();

        let report = scene.bake_physics(&short_bake(), &mut ()).unwrap();
        assert_eq!(report.baked.len(), count);
        assert!(scene.patches().all(|p| p.status() == BakeStatus::Baked));

        let freed = scene.free_physics(&mut ()).unwrap();
        assert_eq!(freed.freed, count);
        assert!(scene.patches().all(|p| p.status() == BakeStatus::Unbaked));

        scene.bake_physics(&short_bake(), &mut ()).unwrap();
        assert!(scene.patches().all(|p| p.status() == BakeStatus::Baked));
    }

    struct FailsOnSample {
        sample_index: usize,
    }

    struct AlwaysDiverges;

    impl PatchSimulation for AlwaysDiverges {
        fn step_frame(&mut self, _frame: i32) -> std::result::Result<Vec<Vec3>, Divergence> {
            Err(Divergence::new("unstable"))
        }
    }

    impl PatchSolver for FailsOnSample {
        fn prepare(&self, patch: &Patch, settings: &BakeSettings) -> Box<dyn PatchSimulation> {
            if patch.sample_index == self.sample_index {
                Box::new(AlwaysDiverges)
            } else {
                StrandSolver.prepare(patch, settings)
            }
        }
    }

    #[test]
    fn ten_patches_with_one_divergence() {
        let mut scene = MeadowScene::new();
        let ground = scene
            .add_ground_with(
                GroundSurface::plane("field", 10.0, 10).unwrap(),
                settings().with_max_samples(10),
            )
            .unwrap();
        let grid = scene.add_blob_grid(BlobGridTemplate::new("g").with_tile(TemplateTile::new("t")));
        let summary = scene.make_meadow(ground, grid, &mut ()).unwrap();
        assert_eq!(summary.patches, 10);

        let err = scene
            .bake_physics_with(&short_bake(), &FailsOnSample { sample_index: 4 }, &mut ())
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::SolverDivergence);
        let Error::BakeFailed { report } = err else {
            panic!("expected BakeFailed");
        };
        assert_eq!(report.baked.len(), 9);
        assert_eq!(report.failures.len(), 1);

        let statuses: Vec<_> = scene.patches().map(|p| p.status()).collect();
        for (i, status) in statuses.into_iter().enumerate() {
            let expected = if i == 4 {
                BakeStatus::Unbaked
            } else {
                BakeStatus::Baked
            };
            assert_eq!(status, expected);
        }
    }

    #[test]
    fn cache_files_are_removed_with_stale_patches() {
        let dir = scratch_dir("scene-cache");
        let (scene, ground, grid) = scene();
        let mut scene = scene.with_cache_dir(&dir);
        scene.make_meadow(ground, grid, &mut ()).unwrap();
        scene.bake_physics(&short_bake(), &mut ()).unwrap();

        let stems: Vec<_> = scene.patches().map(Patch::cache_stem).collect();
        assert!(stems
            .iter()
            .all(|s| cache::bake_file_path(&dir, s).exists()));

        scene.make_patches(ground, grid, &mut ()).unwrap();
        assert!(stems
            .iter()
            .all(|s| !cache::bake_file_path(&dir, s).exists()));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn failed_rebuild_keeps_the_old_patches() {
        let dir = scratch_dir("scene-stuck-cache");
        let (scene, ground, grid) = scene();
        let mut scene = scene.with_cache_dir(&dir);
        scene.make_meadow(ground, grid, &mut ()).unwrap();
        scene.bake_physics(&short_bake(), &mut ()).unwrap();
        let before: Vec<_> = scene.patches().map(|p| p.id).collect();

        let stuck = cache::bake_file_path(&dir, &scene.patches().next().unwrap().cache_stem());
        std::fs::remove_file(&stuck).unwrap();
        std::fs::create_dir(&stuck).unwrap();

        let mut sink = VecSink::new();
        let err = scene.make_patches(ground, grid, &mut sink).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Resource);
        let after: Vec<_> = scene.patches().map(|p| p.id).collect();
        assert_eq!(before, after);
        assert!(scene.patches().all(|p| p.status() == BakeStatus::Baked));
        assert_eq!(sink.count(MeadowEventKind::PatchesRemoved), 0);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
