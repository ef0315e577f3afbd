//! Surface validation: degenerate triangle repair, manifold check, area statistics.
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::ground::GroundSurface;

/// Triangles with a smaller world area are treated as degenerate and skipped.
pub const DEGENERATE_AREA: f32 = 1e-10;

/// Area statistics of a validated surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceStats {
    /// Total world-space area of the non-degenerate triangles.
    pub area: f32,
    /// Total length of edges used by exactly one triangle.
    pub boundary_length: f32,
    /// Number of non-degenerate triangles.
    pub triangles_used: usize,
    /// Number of degenerate triangles that were skipped.
    pub degenerate_triangles: usize,
}

pub(crate) fn analyze(surface: &GroundSurface) -> Result<SurfaceStats> {
    let mut edge_use: BTreeMap<(u32, u32), u32> = BTreeMap::new();
    let mut area = 0.0f32;
    let mut used = 0usize;
    let mut degenerate = 0usize;

    for (t, &[a, b, c]) in surface.triangles().iter().enumerate() {
        let tri_area = surface.triangle_area(t);
        if tri_area <= DEGENERATE_AREA || a == b || b == c || a == c {
            degenerate += 1;
            continue;
        }
        area += tri_area;
        used += 1;
        for (u, v) in [(a, b), (b, c), (c, a)] {
            *edge_use.entry((u.min(v), u.max(v))).or_insert(0) += 1;
        }
    }

    // Edges are ordered, so the reported edge and the boundary sum are stable.
    if let Some(((u, v), count)) = edge_use.iter().find(|(_, &count)| count > 2) {
        return Err(Error::InvalidSurface(format!(
            "ground '{}' is non-manifold: edge ({u}, {v}) is shared by {count} triangles",
            surface.name()
        )));
    }

    if used == 0 || area <= 0.0 {
        return Err(Error::InvalidSurface(format!(
            "ground '{}' has zero area",
            surface.name()
        )));
    }

    let world = surface.world_positions();
    let boundary_length = edge_use
        .iter()
        .filter(|(_, &count)| count == 1)
        .map(|(&(u, v), _)| world[u as usize].distance(world[v as usize]))
        .sum();

    Ok(SurfaceStats {
        area,
        boundary_length,
        triangles_used: used,
        degenerate_triangles: degenerate,
    })
}

/// True when triangle `t` takes part in sampling.
pub(crate) fn is_usable(surface: &GroundSurface, t: usize) -> bool {
    let [a, b, c] = surface.triangles()[t];
    a != b && b != c && a != c && surface.triangle_area(t) > DEGENERATE_AREA
}
