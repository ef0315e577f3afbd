//! Blob grid templates: the palette of tiles patches are instanced from.
use std::f32::consts::PI;

use glam::Vec3;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Simulated strands carried by a tile (grass blades, stalks).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, PartialEq)]
pub struct StrandSpec {
    /// Number of strands rooted on the tile.
    pub count: u32,
    /// Rest length of each strand.
    pub length: f32,
    /// Segments per strand.
    pub segments: u32,
    /// Radius of the disc the roots are spread over.
    pub spread: f32,
    /// Pull back toward the rest shape per solver step, in [0, 1].
    pub stiffness: f32,
}

impl Default for StrandSpec {
    fn default() -> Self {
        Self {
            count: 8,
            length: 0.5,
            segments: 4,
            spread: 0.25,
            stiffness: 0.3,
        }
    }
}

impl StrandSpec {
    /// Tile without simulated strands.
    pub fn none() -> Self {
        Self {
            count: 0,
            ..Default::default()
        }
    }

    /// Root positions in tile space, laid out on a Fibonacci spiral within `spread`.
    pub fn roots(&self) -> Vec<Vec3> {
        let golden_angle = PI * (3.0 - 5.0f32.sqrt());
        let n = self.count as f32;
        (0..self.count)
            .map(|i| {
                let r = self.spread * ((i as f32 + 0.5) / n).sqrt();
                let theta = i as f32 * golden_angle;
                Vec3::new(r * theta.cos(), r * theta.sin(), 0.0)
            })
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.count == 0 {
            return Ok(());
        }
        if !self.length.is_finite() || self.length <= 0.0 {
            return Err(Error::InvalidConfig("strand length must be > 0".into()));
        }
        if self.segments == 0 {
            return Err(Error::InvalidConfig("strand segments must be > 0".into()));
        }
        if !self.spread.is_finite() || self.spread < 0.0 {
            return Err(Error::InvalidConfig("strand spread must be >= 0".into()));
        }
        if !(0.0..=1.0).contains(&self.stiffness) {
            return Err(Error::InvalidConfig(
                "strand stiffness must be in [0, 1]".into(),
            ));
        }
        Ok(())
    }
}

/// One template tile of a blob grid.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct TemplateTile {
    pub name: String,
    /// Location of the tile inside the blob grid.
    pub origin: Vec3,
    /// Ground vertex group weighting this tile's selection.
    pub density_group: Option<String>,
    /// Re-centre the tile on the sample instead of keeping its blob grid offset.
    pub use_centered: bool,
    pub strands: StrandSpec,
}

impl TemplateTile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            origin: Vec3::ZERO,
            density_group: None,
            use_centered: true,
            strands: StrandSpec::default(),
        }
    }

    pub fn with_origin(mut self, origin: Vec3) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_density_group(mut self, group: impl Into<String>) -> Self {
        self.density_group = Some(group.into());
        self
    }

    pub fn with_centered(mut self, use_centered: bool) -> Self {
        self.use_centered = use_centered;
        self
    }

    pub fn with_strands(mut self, strands: StrandSpec) -> Self {
        self.strands = strands;
        self
    }
}

/// Ordered palette of template tiles.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct BlobGridTemplate {
    pub name: String,
    pub tiles: Vec<TemplateTile>,
}

impl BlobGridTemplate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tiles: Vec::new(),
        }
    }

    pub fn with_tile(mut self, tile: TemplateTile) -> Self {
        self.tiles.push(tile);
        self
    }

    pub fn with_tiles(mut self, tiles: impl IntoIterator<Item = TemplateTile>) -> Self {
        self.tiles.extend(tiles);
        self
    }

    /// `columns x rows` tiles spaced `tile_size` apart in the XY plane, named
    /// `<name>.<column>.<row>`.
    pub fn grid(name: impl Into<String>, columns: u32, rows: u32, tile_size: f32) -> Self {
        let name = name.into();
        let tiles = (0..rows)
            .flat_map(|j| (0..columns).map(move |i| (i, j)))
            .map(|(i, j)| {
                TemplateTile::new(format!("{name}.{i}.{j}"))
                    .with_origin(Vec3::new(i as f32 * tile_size, j as f32 * tile_size, 0.0))
            })
            .collect();
        Self { name, tiles }
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn validate(&self) -> Result<()> {
        if self.tiles.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "blob grid '{}' has no tiles",
                self.name
            )));
        }
        for tile in &self.tiles {
            tile.strands
                .validate()
                .map_err(|e| Error::InvalidConfig(format!("tile '{}': {e}", tile.name)))?;
        }
        Ok(())
    }
}
