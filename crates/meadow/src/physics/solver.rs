//! Patch simulation: the solver seam and the default strand solver.
//!
//! [`StrandSolver`] simulates the strands of a patch as particle chains rooted on the
//! patch. Roots are pinned; free particles are integrated with position Verlet
//! under gravity and damping, then projected onto structural and bending distance
//! constraints and pulled back toward their rest shape.
use glam::Vec3;

use crate::patch::Patch;
use crate::settings::BakeSettings;

/// Reason a simulation stopped being trustworthy.
#[derive(Clone, Debug, PartialEq)]
pub struct Divergence {
    pub reason: String,
}

impl Divergence {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Creates simulations for patches.
pub trait PatchSolver {
    fn prepare(&self, patch: &Patch, settings: &BakeSettings) -> Box<dyn PatchSimulation>;
}

/// A running simulation of one patch.
pub trait PatchSimulation {
    /// Advances to `frame` and returns the particle positions there.
    fn step_frame(&mut self, frame: i32) -> Result<Vec<Vec3>, Divergence>;
}

/// Default mass-spring strand solver.
#[derive(Clone, Copy, Debug, Default)]
pub struct StrandSolver;

impl PatchSolver for StrandSolver {
    fn prepare(&self, patch: &Patch, settings: &BakeSettings) -> Box<dyn PatchSimulation> {
        Box::new(StrandSimulation::new(patch, settings))
    }
}

#[derive(Clone, Copy, Debug)]
struct Particle {
    position: Vec3,
    previous: Vec3,
    rest: Vec3,
    pinned: bool,
    /// Index of the strand root particle.
    root: usize,
}

#[derive(Clone, Copy, Debug)]
struct Link {
    a: usize,
    b: usize,
    rest_length: f32,
    /// Fraction of the violation corrected per iteration.
    strength: f32,
}

/// Strength of the second-neighbour links that keep strands from folding.
const BENDING_STRENGTH: f32 = 0.5;

struct StrandSimulation {
    particles: Vec<Particle>,
    links: Vec<Link>,
    strand_length: f32,
    stiffness: f32,
    started: bool,
    dt: f32,
    substeps: u32,
    iterations: u32,
    gravity: Vec3,
    damping: f32,
    divergence_limit: f32,
}

impl StrandSimulation {
    fn new(patch: &Patch, settings: &BakeSettings) -> Self {
        let spec = &patch.strands;
        let up = patch.transform.transform_vector3(Vec3::Z).normalize_or_zero();
        let up = if up == Vec3::ZERO { Vec3::Z } else { up };
        let segments = spec.segments.max(1);
        let segment_length = spec.length / segments as f32;

        let mut particles = Vec::new();
        let mut links = Vec::new();
        for local_root in spec.roots() {
            let root_position = patch.transform.transform_point3(local_root);
            let root = particles.len();
            for k in 0..=segments {
                let rest = root_position + up * (segment_length * k as f32);
                particles.push(Particle {
                    position: rest,
                    previous: rest,
                    rest,
                    pinned: k == 0,
                    root,
                });
                if k >= 1 {
                    let i = particles.len() - 1;
                    links.push(Link {
                        a: i - 1,
                        b: i,
                        rest_length: segment_length,
                        strength: 1.0,
                    });
                }
                if k >= 2 {
                    let i = particles.len() - 1;
                    links.push(Link {
                        a: i - 2,
                        b: i,
                        rest_length: 2.0 * segment_length,
                        strength: BENDING_STRENGTH,
                    });
                }
            }
        }

        Self {
            particles,
            links,
            strand_length: spec.length,
            stiffness: spec.stiffness,
            started: false,
            dt: settings.step_seconds(),
            substeps: settings.substeps.max(1),
            iterations: settings.iterations,
            gravity: settings.gravity,
            damping: settings.damping,
            divergence_limit: settings.divergence_limit,
        }
    }

    fn step(&mut self) {
        let acceleration = self.gravity * (self.dt * self.dt);
        let keep = 1.0 - self.damping;
        for p in self.particles.iter_mut().filter(|p| !p.pinned) {
            let velocity = (p.position - p.previous) * keep;
            p.previous = p.position;
            p.position += velocity + acceleration;
        }

        for _ in 0..self.iterations {
            for link in &self.links {
                let pa = self.particles[link.a];
                let pb = self.particles[link.b];
                let delta = pb.position - pa.position;
                let distance = delta.length();
                if distance <= f32::EPSILON {
                    continue;
                }
                let correction = delta * ((distance - link.rest_length) / distance) * link.strength;
                match (pa.pinned, pb.pinned) {
                    (true, true) => {}
                    (true, false) => self.particles[link.b].position -= correction,
                    (false, true) => self.particles[link.a].position += correction,
                    (false, false) => {
                        self.particles[link.a].position += correction * 0.5;
                        self.particles[link.b].position -= correction * 0.5;
                    }
                }
            }
        }

        if self.stiffness > 0.0 {
            for p in self.particles.iter_mut().filter(|p| !p.pinned) {
                p.position += (p.rest - p.position) * self.stiffness;
            }
        }
    }

    fn check(&self) -> Result<(), Divergence> {
        let limit = self.divergence_limit * self.strand_length;
        for (i, p) in self.particles.iter().enumerate() {
            if !p.position.is_finite() {
                return Err(Divergence::new(format!("particle {i} is not finite")));
            }
            let distance = p.position.distance(self.particles[p.root].position);
            if distance > limit {
                return Err(Divergence::new(format!(
                    "particle {i} is {distance:.3} from its root (limit {limit:.3})"
                )));
            }
        }
        Ok(())
    }
}

impl PatchSimulation for StrandSimulation {
    fn step_frame(&mut self, _frame: i32) -> Result<Vec<Vec3>, Divergence> {
        // The first baked frame is the rest state.
        if self.started {
            for _ in 0..self.substeps {
                self.step();
            }
        }
        self.started = true;
        self.check()?;
        Ok(self.particles.iter().map(|p| p.position).collect())
    }
}
