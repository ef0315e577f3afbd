//! Request/response surface over a [`MeadowScene`].
//!
//! Hosts that drive the pipeline from buttons or scripts send a [`Command`] and get a
//! [`CommandOutcome`] back: `Finished` with a summary, or `Cancelled` with the error
//! message and its [`ErrorKind`].
use tracing::warn;

use crate::error::{Error, ErrorKind, Result};
use crate::events::EventSink;
use crate::scene::{BlobGridId, GroundId, MeadowScene};
use crate::settings::BakeSettings;

/// One pipeline step.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum Command {
    EstimateMaxSamples { ground: GroundId },
    MakeBlobs { ground: GroundId, blob_grid: BlobGridId },
    DeleteBlobs { ground: GroundId },
    MakePatches { ground: GroundId, blob_grid: BlobGridId },
    MakeMeadow { ground: GroundId, blob_grid: BlobGridId },
    BakePhysics { settings: BakeSettings },
    FreePhysics,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Finished,
    Cancelled,
}

/// Result of [`execute`].
#[derive(Clone, Debug, PartialEq)]
pub struct CommandOutcome {
    pub status: Status,
    pub message: String,
    /// Set when the command failed.
    pub error_kind: Option<ErrorKind>,
}

impl CommandOutcome {
    pub fn is_finished(&self) -> bool {
        self.status == Status::Finished
    }

    fn finished(message: String) -> Self {
        Self {
            status: Status::Finished,
            message,
            error_kind: None,
        }
    }

    fn failed(error: &Error) -> Self {
        Self {
            status: Status::Cancelled,
            message: error.to_string(),
            error_kind: Some(error.kind()),
        }
    }
}

/// Runs `command` against `scene`. Failures become a `Cancelled` outcome.
pub fn execute(
    scene: &mut MeadowScene,
    command: Command,
    sink: &mut dyn EventSink,
) -> CommandOutcome {
    match run(scene, command, sink) {
        Ok(message) => CommandOutcome::finished(message),
        Err(e) => {
            warn!("{e}");
            CommandOutcome::failed(&e)
        }
    }
}

fn run(scene: &mut MeadowScene, command: Command, sink: &mut dyn EventSink) -> Result<String> {
    Ok(match command {
        Command::EstimateMaxSamples { ground } => {
            let n = scene.estimate_max_samples(ground)?;
            format!("Estimated maximum of {n} samples")
        }
        Command::MakeBlobs { ground, blob_grid } => {
            let n = scene.make_blobs(ground, blob_grid, sink)?;
            format!("Created {n} samples")
        }
        Command::DeleteBlobs { ground } => {
            let n = scene.delete_blobs(ground, sink)?;
            format!("Deleted {n} samples")
        }
        Command::MakePatches { ground, blob_grid } => {
            let n = scene.make_patches(ground, blob_grid, sink)?;
            format!("Created {n} patches")
        }
        Command::MakeMeadow { ground, blob_grid } => {
            let summary = scene.make_meadow(ground, blob_grid, sink)?;
            format!(
                "Created {} samples and {} patches",
                summary.samples, summary.patches
            )
        }
        Command::BakePhysics { settings } => {
            let report = scene.bake_physics(&settings, sink)?;
            format!("Baked {} patches", report.baked.len())
        }
        Command::FreePhysics => {
            let report = scene.free_physics(sink)?;
            format!("Freed physics of {} patches", report.freed)
        }
    })
}
