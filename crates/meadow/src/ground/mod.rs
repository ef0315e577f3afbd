//! Ground surfaces: triangle meshes with named per-vertex attributes.
//!
//! A [`GroundSurface`] is the mesh the meadow grows on. It stores local vertex
//! positions plus an object transform, and answers every geometric query in world
//! space. Named vertex groups carry scalar weights in `[0, 1]`; the group selected
//! with [`GroundSurface::with_density_group`] is the density field used by the
//! sampler, and tiles of a blob grid can refer to other groups to weight their
//! selection.
use std::collections::HashMap;

use glam::{Affine3A, Vec3};

use crate::error::{Error, Result};

pub mod topology;

pub use topology::SurfaceStats;

/// Triangle mesh with an object transform and named vertex groups.
#[derive(Clone, Debug)]
pub struct GroundSurface {
    name: String,
    positions: Vec<Vec3>,
    triangles: Vec<[u32; 3]>,
    transform: Affine3A,
    world_positions: Vec<Vec3>,
    vertex_normals: Vec<Vec3>,
    vertex_groups: HashMap<String, Vec<f32>>,
    density_group: Option<String>,
}

impl GroundSurface {
    /// Creates a ground from local vertex positions and triangle indices.
    ///
    /// Positions accept anything convertible into [`mint::Vector3<f32>`], e.g. `[f32; 3]`
    /// or `glam::Vec3`. Fails when a position is non-finite or an index is out of range.
    pub fn new<P>(
        name: impl Into<String>,
        positions: impl IntoIterator<Item = P>,
        triangles: Vec<[u32; 3]>,
    ) -> Result<Self>
    where
        P: Into<mint::Vector3<f32>>,
    {
        let name = name.into();
        let positions: Vec<Vec3> = positions
            .into_iter()
            .map(|p| {
                let v: mint::Vector3<f32> = p.into();
                Vec3::from(v)
            })
            .collect();

        if let Some(i) = positions.iter().position(|p| !p.is_finite()) {
            return Err(Error::InvalidSurface(format!(
                "ground '{name}': vertex {i} is not finite"
            )));
        }
        let vertex_count = positions.len();
        for (t, tri) in triangles.iter().enumerate() {
            if let Some(&bad) = tri.iter().find(|&&v| v as usize >= vertex_count) {
                return Err(Error::InvalidSurface(format!(
                    "ground '{name}': triangle {t} references vertex {bad}, but the mesh has {vertex_count} vertices"
                )));
            }
        }

        let mut surface = Self {
            name,
            positions,
            triangles,
            transform: Affine3A::IDENTITY,
            world_positions: Vec::new(),
            vertex_normals: Vec::new(),
            vertex_groups: HashMap::new(),
            density_group: None,
        };
        surface.refresh_world_cache();
        Ok(surface)
    }

    /// Flat square in the XY plane centred on the origin, `subdivisions` quads per side.
    pub fn plane(name: impl Into<String>, size: f32, subdivisions: u32) -> Result<Self> {
        Self::heightfield(name, size, subdivisions, |_, _| 0.0)
    }

    /// Square grid in the XY plane whose Z coordinate is given by `height(x, y)`.
    pub fn heightfield(
        name: impl Into<String>,
        size: f32,
        subdivisions: u32,
        height: impl Fn(f32, f32) -> f32,
    ) -> Result<Self> {
        if !size.is_finite() || size <= 0.0 {
            return Err(Error::InvalidConfig("ground size must be > 0".into()));
        }
        let n = subdivisions.max(1);
        let row = n + 1;
        let step = size / n as f32;
        let half = size * 0.5;

        let mut positions = Vec::with_capacity((row * row) as usize);
        for j in 0..row {
            for i in 0..row {
                let x = -half + i as f32 * step;
                let y = -half + j as f32 * step;
                positions.push(Vec3::new(x, y, height(x, y)));
            }
        }

        let mut triangles = Vec::with_capacity((n * n * 2) as usize);
        for j in 0..n {
            for i in 0..n {
                let a = j * row + i;
                let b = a + 1;
                let c = a + row;
                let d = c + 1;
                triangles.push([a, b, d]);
                triangles.push([a, d, c]);
            }
        }

        Self::new(name, positions, triangles)
    }

    /// Sets the object transform.
    pub fn with_transform(mut self, transform: Affine3A) -> Self {
        self.set_transform(transform);
        self
    }

    pub fn set_transform(&mut self, transform: Affine3A) {
        self.transform = transform;
        self.refresh_world_cache();
    }

    /// Adds (or replaces) a named vertex group. Weights are clamped into `[0, 1]`.
    pub fn with_vertex_group(mut self, name: impl Into<String>, weights: Vec<f32>) -> Result<Self> {
        self.set_vertex_group(name, weights)?;
        Ok(self)
    }

    pub fn set_vertex_group(&mut self, name: impl Into<String>, weights: Vec<f32>) -> Result<()> {
        let name = name.into();
        if weights.len() != self.positions.len() {
            return Err(Error::InvalidConfig(format!(
                "vertex group '{}' has {} weights, ground '{}' has {} vertices",
                name,
                weights.len(),
                self.name,
                self.positions.len()
            )));
        }
        let weights = weights
            .into_iter()
            .map(|w| if w.is_finite() { w.clamp(0.0, 1.0) } else { 0.0 })
            .collect();
        self.vertex_groups.insert(name, weights);
        Ok(())
    }

    /// Selects the vertex group used as the density field.
    pub fn with_density_group(mut self, name: impl Into<String>) -> Self {
        self.density_group = Some(name.into());
        self
    }

    pub fn set_density_group(&mut self, name: Option<String>) {
        self.density_group = name;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transform(&self) -> Affine3A {
        self.transform
    }

    pub fn density_group(&self) -> Option<&str> {
        self.density_group.as_deref()
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    /// World-space vertex positions.
    pub fn world_positions(&self) -> &[Vec3] {
        &self.world_positions
    }

    pub fn vertex_group(&self, name: &str) -> Option<&[f32]> {
        self.vertex_groups.get(name).map(Vec::as_slice)
    }

    /// World-space corners of triangle `t`.
    pub fn triangle_vertices(&self, t: usize) -> [Vec3; 3] {
        let [a, b, c] = self.triangles[t];
        [
            self.world_positions[a as usize],
            self.world_positions[b as usize],
            self.world_positions[c as usize],
        ]
    }

    /// World-space area of triangle `t`.
    pub fn triangle_area(&self, t: usize) -> f32 {
        let [a, b, c] = self.triangle_vertices(t);
        0.5 * (b - a).cross(c - a).length()
    }

    /// Unit face normal of triangle `t`, zero for degenerate triangles.
    pub fn face_normal(&self, t: usize) -> Vec3 {
        let [a, b, c] = self.triangle_vertices(t);
        (b - a).cross(c - a).normalize_or_zero()
    }

    /// World position at barycentric coordinates `bary` inside triangle `t`.
    pub fn point_at(&self, t: usize, bary: Vec3) -> Vec3 {
        let [a, b, c] = self.triangle_vertices(t);
        a * bary.x + b * bary.y + c * bary.z
    }

    /// Interpolated unit normal at `bary` inside triangle `t`.
    pub fn normal_at(&self, t: usize, bary: Vec3) -> Vec3 {
        let [a, b, c] = self.triangles[t];
        let n = self.vertex_normals[a as usize] * bary.x
            + self.vertex_normals[b as usize] * bary.y
            + self.vertex_normals[c as usize] * bary.z;
        let n = n.normalize_or_zero();
        if n == Vec3::ZERO {
            let face = self.face_normal(t);
            if face == Vec3::ZERO {
                Vec3::Z
            } else {
                face
            }
        } else {
            n
        }
    }

    /// Interpolated value of vertex group `name`, `None` when the group does not exist.
    pub fn attribute_at(&self, name: &str, t: usize, bary: Vec3) -> Option<f32> {
        let weights = self.vertex_groups.get(name)?;
        let [a, b, c] = self.triangles[t];
        let v = weights[a as usize] * bary.x + weights[b as usize] * bary.y + weights[c as usize] * bary.z;
        Some(v.clamp(0.0, 1.0))
    }

    /// Density at `bary` inside triangle `t`; uniform `1.0` without a density group.
    pub fn density_at(&self, t: usize, bary: Vec3) -> f32 {
        self.density_group
            .as_deref()
            .and_then(|name| self.attribute_at(name, t, bary))
            .unwrap_or(1.0)
    }

    /// Checks the surface and returns its area statistics.
    pub fn validate(&self) -> Result<SurfaceStats> {
        topology::analyze(self)
    }

    fn refresh_world_cache(&mut self) {
        self.world_positions = self
            .positions
            .iter()
            .map(|&p| self.transform.transform_point3(p))
            .collect();

        let mut normals = vec![Vec3::ZERO; self.positions.len()];
        for &[a, b, c] in &self.triangles {
            let pa = self.world_positions[a as usize];
            let pb = self.world_positions[b as usize];
            let pc = self.world_positions[c as usize];
            // Unnormalised cross product weights each face by its area.
            let weighted = (pb - pa).cross(pc - pa);
            normals[a as usize] += weighted;
            normals[b as usize] += weighted;
            normals[c as usize] += weighted;
        }
        self.vertex_normals = normals.into_iter().map(Vec3::normalize_or_zero).collect();
    }
}
