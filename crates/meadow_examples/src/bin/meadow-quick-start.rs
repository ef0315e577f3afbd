use meadow::prelude::*;
use meadow_examples::{init_tracing, render_meadow_to_png, RenderConfig};

fn main() -> anyhow::Result<()> {
    init_tracing();

    let mut scene = MeadowScene::new();
    let ground = scene.add_ground_with(
        GroundSurface::plane("lawn", 30.0, 16)?,
        MeadowSettings::default()
            .with_seed(7)
            .with_sample_distance(1.5)
            .with_sampling_levels(3)
            .with_selection(TileSelection::Cycle),
    )?;
    let blob_grid = scene.add_blob_grid(BlobGridTemplate::grid("grass", 3, 1, 1.0));

    let estimate = execute(&mut scene, Command::EstimateMaxSamples { ground }, &mut TracingSink);
    println!("{}", estimate.message);

    let mut sink = TracingSink;
    for command in [
        Command::MakeMeadow { ground, blob_grid },
        Command::BakePhysics {
            settings: BakeSettings::default().with_frame_range(1, 24),
        },
    ] {
        let outcome = execute(&mut scene, command, &mut sink);
        println!("{:?}: {}", outcome.status, outcome.message);
        anyhow::ensure!(outcome.is_finished(), "{}", outcome.message);
    }

    let entry = scene.ground(ground)?;
    render_meadow_to_png(
        entry.surface(),
        entry.samples(),
        entry.patches(),
        &RenderConfig::default(),
        "meadow-quick-start.png",
    )?;

    let outcome = execute(&mut scene, Command::FreePhysics, &mut sink);
    println!("{}", outcome.message);
    Ok(())
}
