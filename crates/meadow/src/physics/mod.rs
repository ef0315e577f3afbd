//! Physics baking for patches.
//!
//! Every [`crate::patch::Patch`] owns a [`PhysicsBakeState`]; its lifecycle is
//! `Unbaked -> Baking -> Baked`, and `Baked -> Unbaked` when the state is freed.
//! - [`solver`]: the simulation seam ([`PatchSolver`]) and the default strand solver.
//! - [`controller`]: bakes and frees every patch of a scene with per-patch failure
//!   isolation.
//! - [`cache`]: the external on-disk bake cache.
use glam::Vec3;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod cache;
pub mod controller;
pub mod solver;

pub use controller::{BakeFailure, BakeReport, FreeReport, PhysicsBakeController};
pub use solver::{Divergence, PatchSimulation, PatchSolver, StrandSolver};

/// Bake lifecycle of a patch.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BakeStatus {
    #[default]
    Unbaked,
    Baking,
    Baked,
}

/// Simulated particle positions of one frame.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct BakeFrame {
    pub frame: i32,
    pub positions: Vec<Vec3>,
}

/// Baked per-frame state of one patch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PhysicsBakeState {
    status: BakeStatus,
    frames: Vec<BakeFrame>,
}

impl PhysicsBakeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> BakeStatus {
        self.status
    }

    pub fn frames(&self) -> &[BakeFrame] {
        &self.frames
    }

    /// Frame `frame`, if it was baked.
    pub fn frame(&self, frame: i32) -> Option<&BakeFrame> {
        let first = self.frames.first()?.frame;
        let index = usize::try_from(frame.checked_sub(first)?).ok()?;
        self.frames.get(index).filter(|f| f.frame == frame)
    }

    pub fn is_baked(&self) -> bool {
        self.status == BakeStatus::Baked
    }

    /// Releases stored frames; the next bake starts from a clean state.
    pub(crate) fn begin(&mut self) {
        self.frames = Vec::new();
        self.status = BakeStatus::Baking;
    }

    pub(crate) fn finish(&mut self, frames: Vec<BakeFrame>) {
        self.frames = frames;
        self.status = BakeStatus::Baked;
    }

    /// Resets to `Unbaked`, returning whether anything was held.
    pub(crate) fn free(&mut self) -> bool {
        let held = self.status != BakeStatus::Unbaked || !self.frames.is_empty();
        self.frames = Vec::new();
        self.status = BakeStatus::Unbaked;
        held
    }
}
