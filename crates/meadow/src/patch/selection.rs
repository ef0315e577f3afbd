//! Tile selection for patches.
//!
//! Every tile gets a weight at a sample: the ground's value of the tile's density
//! group there, or `1.0` when the tile has no group (or the ground lacks it). Tiles
//! with zero weight are never placed at that sample.
//! - [pick_weighted_random]: draws proportionally to the weights.
//! - [pick_highest_density]: picks the tile with the largest weight.
//! - [pick_cycle]: cycles through the placeable tiles by sample index.
use rand::Rng;

use crate::ground::GroundSurface;
use crate::patch::template::BlobGridTemplate;
use crate::sampling::Sample;

/// Weight of one tile at a sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileWeight {
    /// Index into the template's tiles.
    pub tile: usize,
    pub weight: f32,
}

pub fn tile_weights(
    template: &BlobGridTemplate,
    ground: &GroundSurface,
    sample: &Sample,
) -> Vec<TileWeight> {
    template
        .tiles
        .iter()
        .enumerate()
        .map(|(tile, t)| {
            let weight = t
                .density_group
                .as_deref()
                .and_then(|group| ground.attribute_at(group, sample.triangle, sample.barycentric))
                .unwrap_or(1.0);
            TileWeight { tile, weight }
        })
        .collect()
}

pub fn pick_weighted_random<R: Rng>(weights: &[TileWeight], rng: &mut R) -> Option<usize> {
    let placeable: Vec<_> = weights.iter().filter(|w| w.weight > 0.0).collect();
    if placeable.is_empty() {
        return None;
    }

    let total_weight: f32 = placeable.iter().map(|w| w.weight).sum();
    let mut roll = crate::sampling::rand01(rng) * total_weight;
    for w in &placeable {
        roll -= w.weight;
        if roll <= 0.0 {
            return Some(w.tile);
        }
    }

    placeable.last().map(|w| w.tile)
}

pub fn pick_highest_density(weights: &[TileWeight]) -> Option<usize> {
    weights
        .iter()
        .filter(|w| w.weight > 0.0)
        .max_by(|a, b| a.weight.total_cmp(&b.weight).then(b.tile.cmp(&a.tile)))
        .map(|w| w.tile)
}

pub fn pick_cycle(weights: &[TileWeight], sample_index: usize) -> Option<usize> {
    let placeable: Vec<usize> = weights
        .iter()
        .filter(|w| w.weight > 0.0)
        .map(|w| w.tile)
        .collect();
    if placeable.is_empty() {
        None
    } else {
        Some(placeable[sample_index % placeable.len()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::tests::FixedRng;

    fn weights(values: &[f32]) -> Vec<TileWeight> {
        values
            .iter()
            .enumerate()
            .map(|(tile, &weight)| TileWeight { tile, weight })
            .collect()
    }

    #[test]
    fn weighted_random_selects_by_weight() {
        let w = weights(&[0.7, 0.3]);

        let mut rng_first = FixedRng { value: 0 };
        assert_eq!(pick_weighted_random(&w, &mut rng_first), Some(0));

        let mut rng_second = FixedRng {
            value: (0.8 * u32::MAX as f32) as u32,
        };
        assert_eq!(pick_weighted_random(&w, &mut rng_second), Some(1));
    }

    #[test]
    fn zero_weights_are_never_picked() {
        let w = weights(&[0.0, 0.0]);
        let mut rng = FixedRng { value: 0 };
        assert_eq!(pick_weighted_random(&w, &mut rng), None);
        assert_eq!(pick_highest_density(&w), None);
        assert_eq!(pick_cycle(&w, 3), None);
    }

    #[test]
    fn highest_density_prefers_first_on_ties() {
        assert_eq!(pick_highest_density(&weights(&[0.2, 0.8, 0.8])), Some(1));
    }

    #[test]
    fn cycle_skips_blocked_tiles() {
        let w = weights(&[1.0, 0.0, 0.5]);
        let picks: Vec<_> = (0..4).map(|i| pick_cycle(&w, i)).collect();
        assert_eq!(picks, vec![Some(0), Some(2), Some(0), Some(2)]);
    }
}
