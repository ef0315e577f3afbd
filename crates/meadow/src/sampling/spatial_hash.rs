//! Uniform grid over 3D space for minimum-distance rejection.
use std::collections::HashMap;

use glam::{IVec3, Vec3};

/// Sparse uniform grid with cells of edge `radius`.
///
/// With the cell edge equal to the rejection radius, any point closer than the radius
/// lies in the 27-cell neighbourhood of the query cell.
pub(crate) struct SpatialHash {
    radius: f32,
    radius_squared: f32,
    cells: HashMap<IVec3, Vec<Vec3>>,
}

impl SpatialHash {
    pub fn new(radius: f32) -> Self {
        debug_assert!(radius > 0.0);
        Self {
            radius,
            radius_squared: radius * radius,
            cells: HashMap::new(),
        }
    }

    #[inline]
    fn cell_of(&self, point: Vec3) -> IVec3 {
        (point / self.radius).floor().as_ivec3()
    }

    /// True when no stored point lies closer than the radius.
    pub fn is_free(&self, point: Vec3) -> bool {
        let c = self.cell_of(point);
        for dz in -1..=1 {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let Some(bucket) = self.cells.get(&(c + IVec3::new(dx, dy, dz))) else {
                        continue;
                    };
                    if bucket
                        .iter()
                        .any(|p| p.distance_squared(point) < self.radius_squared)
                    {
                        return false;
                    }
                }
            }
        }
        true
    }

    pub fn insert(&mut self, point: Vec3) {
        let c = self.cell_of(point);
        self.cells.entry(c).or_default().push(point);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_close_neighbors_across_cells() {
        let mut hash = SpatialHash::new(1.0);
        hash.insert(Vec3::new(0.95, 0.0, 0.0));

        assert!(!hash.is_free(Vec3::new(1.05, 0.0, 0.0)));
        assert!(!hash.is_free(Vec3::new(0.5, 0.5, 0.0)));
        assert!(hash.is_free(Vec3::new(2.5, 0.0, 0.0)));
        assert!(hash.is_free(Vec3::new(0.95, 0.0, 1.5)));
    }

    #[test]
    fn exact_radius_is_allowed() {
        let mut hash = SpatialHash::new(1.0);
        hash.insert(Vec3::ZERO);
        assert!(hash.is_free(Vec3::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn handles_negative_coordinates() {
        let mut hash = SpatialHash::new(0.5);
        hash.insert(Vec3::new(-0.1, -0.1, -0.1));
        assert!(!hash.is_free(Vec3::new(0.1, 0.1, 0.1)));
    }
}
