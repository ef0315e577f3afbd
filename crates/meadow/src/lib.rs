#![forbid(unsafe_code)]
//! meadow: Procedural meadows on ground meshes.
//!
//! The pipeline samples blobs over a ground surface, instances template tiles as
//! patches at the samples and bakes strand physics for every patch.
//!
//! Modules:
//! - ground: triangle-mesh grounds with vertex groups
//! - sampling: sample-count estimate and density-weighted blob sampling
//! - patch: blob grid templates, tile selection and patch building
//! - physics: strand solver, bake controller and on-disk bake cache
//! - scene: registry of grounds, blob grids, samples and patches
//! - command: request/outcome surface for hosts
//! - events: progress events, sinks and cancellation
//! - settings: per-ground and bake settings
pub mod command;
pub mod error;
pub mod events;
pub mod ground;
pub mod patch;
pub mod physics;
pub mod sampling;
pub mod scene;
pub mod settings;

/// Convenient re-exports for common types. Import with `use meadow::prelude::*;`.
pub mod prelude {
    pub use crate::command::{execute, Command, CommandOutcome, Status};
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::events::{
        CancelAfter, EventSink, FnSink, MeadowEvent, MeadowEventKind, MultiSink, TracingSink,
        VecSink,
    };
    pub use crate::ground::{GroundSurface, SurfaceStats};
    pub use crate::patch::{
        BlobGridTemplate, Patch, PatchBuilder, PatchId, PatchPlacement, StrandSpec, TemplateTile,
    };
    pub use crate::physics::{
        BakeFrame, BakeReport, BakeStatus, FreeReport, PatchSolver, PhysicsBakeController,
        StrandSolver,
    };
    pub use crate::sampling::{
        derive_seed, estimate_max_samples, BlobSampler, Sample, SampleSet, SamplerSettings,
    };
    pub use crate::scene::{BlobGridId, Ground, GroundId, MeadowScene, MeadowSummary};
    pub use crate::settings::{BakeSettings, MeadowSettings, TileSelection};
}
