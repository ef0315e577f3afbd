use std::path::Path;

use anyhow::Context;
use meadow::ground::GroundSurface;
use meadow::patch::BlobGridTemplate;
use meadow::settings::{BakeSettings, MeadowSettings};
use serde::Deserialize;

/// Rolling heightfield ground.
#[derive(Clone, Debug, Deserialize)]
pub struct GroundConfig {
    pub name: String,
    pub size: f32,
    pub subdivisions: u32,
    #[serde(default)]
    pub hill_height: f32,
    #[serde(default = "default_hill_scale")]
    pub hill_scale: f32,
}

fn default_hill_scale() -> f32 {
    0.2
}

impl GroundConfig {
    pub fn build(&self) -> meadow::error::Result<GroundSurface> {
        let (height, scale) = (self.hill_height, self.hill_scale);
        GroundSurface::heightfield(&self.name, self.size, self.subdivisions, |x, y| {
            height * (x * scale).sin() * (y * scale).cos()
        })
    }
}

/// Everything a meadow run needs, as stored in a `.ron` file.
#[derive(Clone, Debug, Deserialize)]
pub struct MeadowConfig {
    pub ground: GroundConfig,
    #[serde(default)]
    pub meadow: MeadowSettings,
    #[serde(default)]
    pub bake: BakeSettings,
    pub blob_grid: BlobGridTemplate,
    #[serde(default)]
    pub cache_dir: Option<String>,
}

pub fn load_meadow_config(path: impl AsRef<Path>) -> anyhow::Result<MeadowConfig> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let config: MeadowConfig =
        ron::de::from_bytes(&bytes).with_context(|| format!("parsing {}", path.display()))?;
    config.meadow.validate()?;
    config.bake.validate()?;
    config.blob_grid.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use meadow::settings::TileSelection;

    use super::*;

    #[test]
    fn bundled_config_loads() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/assets/meadow.ron");
        let config = load_meadow_config(path).unwrap();
        assert_eq!(config.ground.name, "hillside");
        assert_eq!(config.meadow.selection, TileSelection::HighestDensity);
        assert_eq!(config.blob_grid.len(), 3);
        assert_eq!(config.bake.frame_end, 24);
        assert!(config.ground.build().is_ok());
    }

    #[test]
    fn omitted_settings_fall_back_to_defaults() {
        let text = r#"(
            ground: (name: "g", size: 4.0, subdivisions: 2),
            blob_grid: (name: "b", tiles: []),
        )"#;
        let config: MeadowConfig = ron::de::from_str(text).unwrap();
        assert_eq!(config.meadow, MeadowSettings::default());
        assert_eq!(config.bake, BakeSettings::default());
        assert!(config.blob_grid.validate().is_err());
    }
}
