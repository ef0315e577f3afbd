//! Hierarchical stratification of a ground surface into triangular cells.
//!
//! Every usable triangle is split by midpoint subdivision, up to `levels` times, into
//! congruent cells. A triangle stops splitting once its cells are no larger than
//! `min_area`, so deep levels only refine triangles that are large next to a blob.
//! Cells remember their corners as barycentric coordinates of the parent triangle,
//! so points drawn inside a cell map straight back onto the surface.
use glam::Vec3;
use rand::Rng;

use crate::ground::{topology, GroundSurface};
use crate::sampling::rand01;

/// Deepest supported subdivision level (65536 cells per triangle).
pub const MAX_SAMPLING_LEVELS: u32 = 8;

/// One stratification cell.
#[derive(Clone, Debug)]
pub struct Cell {
    /// Index of the parent triangle.
    pub triangle: usize,
    /// Corners as barycentric coordinates of the parent triangle.
    pub corners: [Vec3; 3],
    /// World-space area.
    pub area: f32,
}

impl Cell {
    /// Draws a uniformly distributed point in the cell, as parent barycentrics.
    pub fn random_point(&self, rng: &mut dyn Rng) -> Vec3 {
        let r1 = rand01(rng).sqrt();
        let r2 = rand01(rng);
        let (u, v, w) = (1.0 - r1, r1 * (1.0 - r2), r1 * r2);
        let bary = self.corners[0] * u + self.corners[1] * v + self.corners[2] * w;
        // Guard against drift so interpolation stays inside the triangle.
        let bary = bary.max(Vec3::ZERO);
        bary / (bary.x + bary.y + bary.z)
    }
}

/// Subdivides every usable triangle of `ground` up to `levels` times, stopping once
/// cells are no larger than `min_area`.
pub fn build_cells(ground: &GroundSurface, levels: u32, min_area: f32) -> Vec<Cell> {
    let levels = levels.min(MAX_SAMPLING_LEVELS);
    let mut cells = Vec::new();
    let unit = [Vec3::X, Vec3::Y, Vec3::Z];

    for t in 0..ground.triangle_count() {
        if !topology::is_usable(ground, t) {
            continue;
        }
        let area = ground.triangle_area(t);
        let depth = split_depth(area, levels, min_area);
        let sub_area = area / 4u32.pow(depth) as f32;
        subdivide(t, unit, depth, sub_area, &mut cells);
    }

    cells
}

fn split_depth(area: f32, levels: u32, min_area: f32) -> u32 {
    let mut depth = 0;
    let mut cell_area = area;
    while depth < levels && cell_area > min_area {
        cell_area *= 0.25;
        depth += 1;
    }
    depth
}

fn subdivide(triangle: usize, corners: [Vec3; 3], depth: u32, area: f32, out: &mut Vec<Cell>) {
    if depth == 0 {
        out.push(Cell {
            triangle,
            corners,
            area,
        });
        return;
    }
    let [a, b, c] = corners;
    let ab = (a + b) * 0.5;
    let bc = (b + c) * 0.5;
    let ca = (c + a) * 0.5;
    subdivide(triangle, [a, ab, ca], depth - 1, area, out);
    subdivide(triangle, [ab, b, bc], depth - 1, area, out);
    subdivide(triangle, [ca, bc, c], depth - 1, area, out);
    subdivide(triangle, [ab, bc, ca], depth - 1, area, out);
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn each_level_quadruples_cells() {
        let ground = GroundSurface::plane("p", 2.0, 1).unwrap();
        assert_eq!(build_cells(&ground, 0, 0.0).len(), 2);
        assert_eq!(build_cells(&ground, 1, 0.0).len(), 8);
        assert_eq!(build_cells(&ground, 3, 0.0).len(), 2 * 64);
    }

    #[test]
    fn cell_areas_sum_to_surface_area() {
        let ground = GroundSurface::heightfield("h", 4.0, 3, |x, y| 0.3 * x - 0.2 * y).unwrap();
        let total: f32 = build_cells(&ground, 2, 0.0).iter().map(|c| c.area).sum();
        let area = ground.validate().unwrap().area;
        assert!((total - area).abs() < 1e-3 * area);
    }

    #[test]
    fn random_points_stay_inside_cell() {
        let ground = GroundSurface::plane("p", 2.0, 1).unwrap();
        let cells = build_cells(&ground, 2, 0.0);
        let mut rng = StdRng::seed_from_u64(5);
        for cell in &cells {
            let lo = cell.corners.iter().fold(Vec3::splat(1.0), |m, c| m.min(*c));
            let hi = cell.corners.iter().fold(Vec3::ZERO, |m, c| m.max(*c));
            for _ in 0..8 {
                let p = cell.random_point(&mut rng);
                assert!((p.x + p.y + p.z - 1.0).abs() < 1e-5);
                assert!(p.cmpge(lo - 1e-5).all() && p.cmple(hi + 1e-5).all());
            }
        }
    }

    #[test]
    fn levels_are_capped() {
        let ground = GroundSurface::plane("p", 1.0, 1).unwrap();
        let capped = build_cells(&ground, MAX_SAMPLING_LEVELS + 3, 0.0).len();
        assert_eq!(capped, 2 * 4usize.pow(MAX_SAMPLING_LEVELS));
    }

    #[test]
    fn deep_levels_stop_at_small_cells() {
        let ground = GroundSurface::plane("p", 48.0, 48).unwrap();
        let triangles = ground.triangle_count();
        // Unit quads: 0.5 per triangle, split twice to get below 0.05.
        let cells = build_cells(&ground, MAX_SAMPLING_LEVELS, 0.05);
        assert_eq!(cells.len(), triangles * 16);
        assert!(cells.iter().all(|c| c.area <= 0.05));

        let coarse = build_cells(&ground, MAX_SAMPLING_LEVELS, 1.0);
        assert_eq!(coarse.len(), triangles);
    }
}
