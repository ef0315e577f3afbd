//! Patches: template tiles instanced at samples.
//!
//! - [`template`]: blob grid templates and their tiles.
//! - [`selection`]: per-sample tile weighting and selection strategies.
//! - [`builder`]: turns a sample set into patch placements.
use std::fmt;

use glam::Affine3A;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::physics::{BakeStatus, PhysicsBakeState};

pub mod builder;
pub mod selection;
pub mod template;

pub use builder::{PatchBuilder, PatchPlacement};
pub use template::{BlobGridTemplate, StrandSpec, TemplateTile};

/// Scene-unique patch identifier.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PatchId(pub u64);

impl fmt::Display for PatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A tile instance placed at one sample, owning its bake state.
#[derive(Clone, Debug)]
pub struct Patch {
    pub id: PatchId,
    pub name: String,
    /// Index of the tile in the blob grid template.
    pub tile: usize,
    pub tile_name: String,
    /// Index of the sample the patch sits on.
    pub sample_index: usize,
    pub transform: Affine3A,
    pub strands: StrandSpec,
    pub(crate) bake: PhysicsBakeState,
}

impl Patch {
    pub fn new(
        id: PatchId,
        name: impl Into<String>,
        tile: usize,
        tile_name: impl Into<String>,
        sample_index: usize,
        transform: Affine3A,
        strands: StrandSpec,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            tile,
            tile_name: tile_name.into(),
            sample_index,
            transform,
            strands,
            bake: PhysicsBakeState::new(),
        }
    }

    pub(crate) fn from_placement(id: PatchId, ground: &str, placement: PatchPlacement) -> Self {
        let name = format!("{ground}.{}.{:04}", placement.tile_name, placement.sample_index);
        Self::new(
            id,
            name,
            placement.tile,
            placement.tile_name,
            placement.sample_index,
            placement.transform,
            placement.strands,
        )
    }

    pub fn status(&self) -> BakeStatus {
        self.bake.status()
    }

    pub fn bake_state(&self) -> &PhysicsBakeState {
        &self.bake
    }

    /// File stem of the patch's bake cache file.
    pub fn cache_stem(&self) -> String {
        format!("patch_{:08}", self.id.0)
    }
}
