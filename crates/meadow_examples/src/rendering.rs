use std::path::Path;

use glam::{Vec2, Vec3};
use image::{Rgb, RgbImage};
use meadow::ground::GroundSurface;
use meadow::patch::Patch;
use meadow::sampling::SampleSet;

/// Sets up `env_logger` for the `tracing` output of the library (default level `info`).
pub fn init_tracing() {
    let env = env_logger::Env::default().default_filter_or("info");
    if let Err(e) = env_logger::Builder::from_env(env).try_init() {
        eprintln!("Warning: could not initialize logger: {e}");
    }
}

/// Top-down PNG rendering options.
#[derive(Clone, Debug)]
pub struct RenderConfig {
    /// Width of the longer image side in pixels.
    pub size: u32,
    /// Ground color at density 0 and at density 1.
    pub ground_low: [u8; 3],
    pub ground_high: [u8; 3],
    /// Color of samples without a patch.
    pub sample_color: [u8; 3],
    /// Colors cycled by patch tile index.
    pub tile_palette: Vec<[u8; 3]>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            size: 768,
            ground_low: [58, 46, 36],
            ground_high: [92, 128, 64],
            sample_color: [235, 235, 220],
            tile_palette: vec![
                [247, 220, 111],
                [236, 112, 99],
                [175, 122, 197],
                [93, 173, 226],
                [88, 214, 141],
                [245, 176, 65],
            ],
        }
    }
}

struct Frame {
    min: Vec2,
    scale: f32,
    height: u32,
}

impl Frame {
    fn to_pixel(&self, p: Vec3) -> Vec2 {
        let v = (p.truncate() - self.min) * self.scale;
        // Image rows grow downward, world Y grows upward.
        Vec2::new(v.x, self.height as f32 - v.y)
    }
}

/// Renders the ground's density, its samples and (when given) the tiles of its patches.
pub fn render_meadow_to_png(
    ground: &GroundSurface,
    samples: Option<&SampleSet>,
    patches: &[Patch],
    config: &RenderConfig,
    path: impl AsRef<Path>,
) -> anyhow::Result<()> {
    let positions = ground.world_positions();
    anyhow::ensure!(!positions.is_empty(), "ground '{}' has no vertices", ground.name());
    let (min, max) = positions.iter().fold(
        (Vec2::splat(f32::MAX), Vec2::splat(f32::MIN)),
        |(lo, hi), p| (lo.min(p.truncate()), hi.max(p.truncate())),
    );
    let extent = (max - min).max(Vec2::splat(1e-3));
    let scale = config.size.max(1) as f32 / extent.max_element();
    let width = ((extent.x * scale).ceil() as u32).max(1);
    let height = ((extent.y * scale).ceil() as u32).max(1);
    let frame = Frame { min, scale, height };

    let mut img = RgbImage::from_pixel(width, height, Rgb([0, 0, 0]));
    draw_ground(&mut img, ground, &frame, config);

    if let Some(samples) = samples {
        let radius = (samples.spacing * 0.5 * scale).max(1.5);
        let mut tile_of = vec![None; samples.len()];
        for patch in patches {
            if let Some(slot) = tile_of.get_mut(patch.sample_index) {
                *slot = Some(patch.tile);
            }
        }
        for (sample, tile) in samples.iter().zip(tile_of) {
            let color = match tile {
                Some(t) if !config.tile_palette.is_empty() => {
                    config.tile_palette[t % config.tile_palette.len()]
                }
                _ => config.sample_color,
            };
            fill_disc(&mut img, frame.to_pixel(sample.position), radius, color);
        }
    }

    img.save(path.as_ref())?;
    tracing::info!("Wrote {}.", path.as_ref().display());
    Ok(())
}

fn draw_ground(img: &mut RgbImage, ground: &GroundSurface, frame: &Frame, config: &RenderConfig) {
    let (w, h) = img.dimensions();
    for t in 0..ground.triangle_count() {
        let [a, b, c] = ground.triangle_vertices(t).map(|v| frame.to_pixel(v));
        let denom = (b.y - c.y) * (a.x - c.x) + (c.x - b.x) * (a.y - c.y);
        if denom.abs() < 1e-6 {
            continue;
        }
        let lo = a.min(b).min(c).floor().max(Vec2::ZERO);
        let hi = a.max(b).max(c).ceil().min(Vec2::new(w as f32, h as f32));
        for y in lo.y as u32..hi.y as u32 {
            for x in lo.x as u32..hi.x as u32 {
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let u = ((b.y - c.y) * (p.x - c.x) + (c.x - b.x) * (p.y - c.y)) / denom;
                let v = ((c.y - a.y) * (p.x - c.x) + (a.x - c.x) * (p.y - c.y)) / denom;
                let bary = Vec3::new(u, v, 1.0 - u - v);
                if bary.min_element() < -1e-4 {
                    continue;
                }
                let d = ground.density_at(t, bary);
                img.put_pixel(x, y, Rgb(lerp_color(config.ground_low, config.ground_high, d)));
            }
        }
    }
}

fn fill_disc(img: &mut RgbImage, center: Vec2, radius: f32, color: [u8; 3]) {
    let (w, h) = img.dimensions();
    let r2 = radius * radius;
    let x0 = (center.x - radius).floor().max(0.0) as u32;
    let y0 = (center.y - radius).floor().max(0.0) as u32;
    let x1 = ((center.x + radius).ceil().max(0.0) as u32).min(w);
    let y1 = ((center.y + radius).ceil().max(0.0) as u32).min(h);
    for y in y0..y1 {
        for x in x0..x1 {
            let d = Vec2::new(x as f32 + 0.5, y as f32 + 0.5) - center;
            if d.length_squared() <= r2 {
                img.put_pixel(x, y, Rgb(color));
            }
        }
    }
}

fn lerp_color(a: [u8; 3], b: [u8; 3], t: f32) -> [u8; 3] {
    let t = t.clamp(0.0, 1.0);
    std::array::from_fn(|i| (a[i] as f32 + (b[i] as f32 - a[i] as f32) * t).round() as u8)
}
