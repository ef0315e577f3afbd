use meadow::prelude::*;
use meadow_examples::{init_tracing, load_meadow_config, render_meadow_to_png, RenderConfig};

fn main() -> anyhow::Result<()> {
    init_tracing();

    let path = std::env::args().nth(1).unwrap_or_else(|| {
        format!("{}/assets/meadow.ron", env!("CARGO_MANIFEST_DIR"))
    });
    let config = load_meadow_config(&path)?;

    let mut scene = MeadowScene::new();
    if let Some(dir) = &config.cache_dir {
        scene.set_cache_dir(Some(dir.into()));
    }
    let ground = scene.add_ground_with(config.ground.build()?, config.meadow.clone())?;
    let blob_grid = scene.add_blob_grid(config.blob_grid.clone());

    let mut sink = TracingSink;
    let summary = scene.make_meadow(ground, blob_grid, &mut sink)?;
    println!("{} samples, {} patches", summary.samples, summary.patches);

    match scene.bake_physics(&config.bake, &mut sink) {
        Ok(report) => println!("baked {} patches", report.baked.len()),
        Err(Error::BakeFailed { report }) => {
            println!(
                "baked {} patches, {} failed: {}",
                report.baked.len(),
                report.failures.len(),
                report.failed_names().join(", ")
            );
        }
        Err(e) => return Err(e.into()),
    }

    let entry = scene.ground(ground)?;
    render_meadow_to_png(
        entry.surface(),
        entry.samples(),
        entry.patches(),
        &RenderConfig::default(),
        "meadow-settings-from-ron.png",
    )?;
    Ok(())
}
