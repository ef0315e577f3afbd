//! Bakes and frees patch physics.
//!
//! A bake walks the patches in order. Each patch is simulated over the configured
//! frame range by a [`PatchSolver`]; a patch whose solve diverges is reset to
//! `Unbaked`, recorded in the [`BakeReport`] and the bake moves on. Cancellation
//! requested through the sink rolls back every patch the bake touched.
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::events::{EventSink, MeadowEvent, MeadowEventKind};
use crate::patch::Patch;
use crate::physics::cache;
use crate::physics::solver::PatchSolver;
use crate::physics::BakeFrame;
use crate::settings::BakeSettings;

/// A patch that failed to bake.
#[derive(Clone, Debug, PartialEq)]
pub struct BakeFailure {
    pub patch: String,
    pub frame: i32,
    pub reason: String,
}

/// Outcome of a bake over many patches.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BakeReport {
    /// Names of the patches baked successfully.
    pub baked: Vec<String>,
    pub failures: Vec<BakeFailure>,
}

impl BakeReport {
    pub fn total(&self) -> usize {
        self.baked.len() + self.failures.len()
    }

    pub fn failed_names(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.patch.as_str()).collect()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Outcome of freeing physics state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FreeReport {
    /// Patches that held state.
    pub freed: usize,
    /// Cache files deleted.
    pub files_removed: usize,
}

/// Drives a [`PatchSolver`] over patches.
pub struct PhysicsBakeController<'a> {
    settings: BakeSettings,
    solver: &'a dyn PatchSolver,
    cache_dir: Option<PathBuf>,
}

impl<'a> PhysicsBakeController<'a> {
    pub fn new(settings: &BakeSettings, solver: &'a dyn PatchSolver) -> Self {
        Self {
            settings: settings.clone(),
            solver,
            cache_dir: None,
        }
    }

    /// Writes every baked patch to `dir` as well.
    pub fn with_cache_dir(mut self, dir: Option<&Path>) -> Self {
        self.cache_dir = dir.map(Path::to_path_buf);
        self
    }

    pub fn settings(&self) -> &BakeSettings {
        &self.settings
    }

    /// Bakes `patches` in order.
    ///
    /// Returns the report when every patch baked, [`Error::BakeFailed`] carrying the
    /// same report when some did not, and [`Error::Cancelled`] when the sink asked to
    /// stop (all patches touched so far are back to `Unbaked` then).
    pub fn bake<'p>(
        &self,
        patches: impl IntoIterator<Item = &'p mut Patch>,
        sink: &mut dyn EventSink,
    ) -> Result<BakeReport> {
        self.settings.validate()?;
        if let Some(dir) = &self.cache_dir {
            cache::verify_cache_dir(dir)?;
        }

        let mut patches: Vec<&mut Patch> = patches.into_iter().collect();
        let BakeSettings {
            frame_start,
            frame_end,
            ..
        } = self.settings;

        info!(
            "Baking {} patches, frames {}..={}.",
            patches.len(),
            frame_start,
            frame_end
        );
        if sink.wants(MeadowEventKind::BakeStarted) {
            sink.send(MeadowEvent::BakeStarted {
                patches: patches.len(),
                frame_start,
                frame_end,
            });
        }

        let mut report = BakeReport::default();
        for index in 0..patches.len() {
            if sink.is_cancelled() {
                return Err(self.roll_back(&mut patches[..index]));
            }

            let patch = &mut *patches[index];
            match self.bake_patch(patch, sink) {
                Ok(Some(frames)) => {
                    debug!("Baked patch '{}' ({} frames).", patch.name, frames);
                    report.baked.push(patch.name.clone());
                    if sink.wants(MeadowEventKind::PatchBaked) {
                        sink.send(MeadowEvent::PatchBaked {
                            index,
                            patch: patch.name.clone(),
                            frames,
                        });
                    }
                }
                Ok(None) => return Err(self.roll_back(&mut patches[..=index])),
                Err(failure) => {
                    let error = Error::SolverDivergence {
                        patch: failure.patch.clone(),
                        frame: failure.frame,
                        reason: failure.reason.clone(),
                    };
                    warn!("{error}; continuing with the next patch.");
                    if sink.wants(MeadowEventKind::PatchBakeFailed) {
                        sink.send(MeadowEvent::PatchBakeFailed {
                            index,
                            patch: failure.patch.clone(),
                            frame: failure.frame,
                            message: failure.reason.clone(),
                        });
                    }
                    report.failures.push(failure);
                }
            }
        }

        info!(
            "Bake finished: {} baked, {} failed.",
            report.baked.len(),
            report.failures.len()
        );
        if sink.wants(MeadowEventKind::BakeFinished) {
            sink.send(MeadowEvent::BakeFinished {
                report: report.clone(),
            });
        }

        if report.is_success() {
            Ok(report)
        } else {
            Err(Error::BakeFailed { report })
        }
    }

    /// Bakes one patch. `Ok(None)` means cancelled mid-patch.
    fn bake_patch(
        &self,
        patch: &mut Patch,
        sink: &mut dyn EventSink,
    ) -> std::result::Result<Option<usize>, BakeFailure> {
        patch.bake.free();
        patch.bake.begin();
        let cache_path = self
            .cache_dir
            .as_deref()
            .map(|dir| cache::bake_file_path(dir, &patch.cache_stem()));

        let fail = |patch: &mut Patch, frame: i32, reason: String| {
            patch.bake.free();
            if let Some(path) = &cache_path {
                // A stale file from an earlier bake must not outlive the failed one.
                let _ = cache::remove_bake_file(path);
            }
            BakeFailure {
                patch: patch.name.clone(),
                frame,
                reason,
            }
        };

        let mut simulation = self.solver.prepare(patch, &self.settings);
        let mut frames = Vec::with_capacity(self.settings.frame_count().min(1 << 12));
        for frame in self.settings.frame_start..=self.settings.frame_end {
            if sink.is_cancelled() {
                return Ok(None);
            }
            match simulation.step_frame(frame) {
                Ok(positions) => frames.push(BakeFrame { frame, positions }),
                Err(divergence) => return Err(fail(patch, frame, divergence.reason)),
            }
        }

        if let Some(path) = &cache_path {
            if let Err(e) = cache::write_bake_file(path, &frames) {
                let last = self.settings.frame_end;
                return Err(fail(patch, last, format!("could not write bake cache: {e}")));
            }
        }

        let count = frames.len();
        patch.bake.finish(frames);
        Ok(Some(count))
    }

    fn roll_back(&self, touched: &mut [&mut Patch]) -> Error {
        for patch in touched.iter_mut() {
            patch.bake.free();
            if let Some(dir) = &self.cache_dir {
                let _ = cache::remove_bake_file(&cache::bake_file_path(dir, &patch.cache_stem()));
            }
        }
        info!(
            "Bake cancelled; reset {} patches to unbaked.",
            touched.len()
        );
        Error::Cancelled
    }
}

/// Releases the physics state of `patches` and deletes their cache files.
///
/// Every patch is freed even when some cache files cannot be deleted; those are
/// reported together as [`Error::Resource`] afterwards.
pub fn free_physics<'p>(
    patches: impl IntoIterator<Item = &'p mut Patch>,
    cache_dir: Option<&Path>,
    sink: &mut dyn EventSink,
) -> Result<FreeReport> {
    let mut report = FreeReport::default();
    let mut stems = Vec::new();
    for patch in patches {
        if patch.bake.free() {
            report.freed += 1;
        }
        stems.push(patch.cache_stem());
    }

    let mut leftovers = Vec::new();
    if let Some(dir) = cache_dir {
        for stem in &stems {
            let path = cache::bake_file_path(dir, stem);
            match cache::remove_bake_file(&path) {
                Ok(true) => report.files_removed += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!("Could not remove bake cache {}: {e}", path.display());
                    leftovers.push(path.display().to_string());
                }
            }
        }
    }

    info!(
        "Freed physics state of {} patches ({} cache files removed).",
        report.freed, report.files_removed
    );
    if sink.wants(MeadowEventKind::PhysicsFreed) {
        sink.send(MeadowEvent::PhysicsFreed {
            patches: report.freed,
        });
    }

    if leftovers.is_empty() {
        Ok(report)
    } else {
        Err(Error::Resource(format!(
            "could not remove {} bake cache files: {}",
            leftovers.len(),
            leftovers.join(", ")
        )))
    }
}
