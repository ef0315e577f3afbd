//! On-disk bake cache.
//!
//! Each baked patch is stored as `<dir>/<stem>.bake`, little-endian:
//!
//! | field          | type                  |
//! |----------------|-----------------------|
//! | magic          | `b"MDWB"`             |
//! | version        | `u32` (= 1)           |
//! | frame count    | `u32`                 |
//! | particle count | `u32`                 |
//! | per frame      | `i32` frame, then `particle count * 3` `f32` |
use std::fs;
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use glam::Vec3;
use tracing::debug;

use crate::error::{Error, Result};
use crate::physics::BakeFrame;

pub const BAKE_MAGIC: [u8; 4] = *b"MDWB";
pub const BAKE_VERSION: u32 = 1;
pub const BAKE_EXTENSION: &str = "bake";

/// Makes sure `dir` is a usable directory, creating it when missing.
pub fn verify_cache_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        if !dir.is_dir() {
            return Err(Error::Resource(format!(
                "cache path {} is not a directory",
                dir.display()
            )));
        }
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|e| {
        Error::Resource(format!(
            "could not create cache directory {}: {e}",
            dir.display()
        ))
    })?;
    debug!("Created bake cache directory {}.", dir.display());
    Ok(())
}

pub fn bake_file_path(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{stem}.{BAKE_EXTENSION}"))
}

pub fn write_bake_file(path: &Path, frames: &[BakeFrame]) -> Result<()> {
    let particles = frames.first().map_or(0, |f| f.positions.len());
    if frames.iter().any(|f| f.positions.len() != particles) {
        return Err(Error::Other(
            "bake frames have differing particle counts".into(),
        ));
    }

    let mut buf = Vec::with_capacity(16 + frames.len() * (4 + particles * 12));
    buf.extend_from_slice(&BAKE_MAGIC);
    buf.extend_from_slice(&BAKE_VERSION.to_le_bytes());
    buf.extend_from_slice(&count_u32(frames.len())?.to_le_bytes());
    buf.extend_from_slice(&count_u32(particles)?.to_le_bytes());
    for frame in frames {
        buf.extend_from_slice(&frame.frame.to_le_bytes());
        for p in &frame.positions {
            for c in p.to_array() {
                buf.extend_from_slice(&c.to_le_bytes());
            }
        }
    }

    let mut file = fs::File::create(path)?;
    file.write_all(&buf)?;
    Ok(())
}

pub fn read_bake_file(path: &Path) -> Result<Vec<BakeFrame>> {
    let mut file = BufReader::new(fs::File::open(path)?);
    let mut magic = [0u8; 4];
    file.read_exact(&mut magic)?;
    if magic != BAKE_MAGIC {
        return Err(Error::Other(format!(
            "{} is not a bake file",
            path.display()
        )));
    }
    let version = read_u32(&mut file)?;
    if version != BAKE_VERSION {
        return Err(Error::Other(format!(
            "{}: unsupported bake version {version}",
            path.display()
        )));
    }
    let frame_count = read_u32(&mut file)? as usize;
    let particles = read_u32(&mut file)? as usize;

    let mut frames = Vec::with_capacity(frame_count.min(1 << 16));
    for _ in 0..frame_count {
        let frame = read_u32(&mut file)? as i32;
        let mut positions = Vec::with_capacity(particles.min(1 << 20));
        for _ in 0..particles {
            let x = read_f32(&mut file)?;
            let y = read_f32(&mut file)?;
            let z = read_f32(&mut file)?;
            positions.push(Vec3::new(x, y, z));
        }
        frames.push(BakeFrame { frame, positions });
    }
    Ok(frames)
}

/// Deletes the file at `path`, returning whether it existed.
pub fn remove_bake_file(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn count_u32(n: usize) -> Result<u32> {
    u32::try_from(n).map_err(|_| Error::Other(format!("count {n} does not fit the bake format")))
}

fn read_u32(r: &mut impl Read) -> io::Result<u32> {
    let mut b = [0u8; 4];
    r.read_exact(&mut b)?;
    Ok(u32::from_le_bytes(b))
}

fn read_f32(r: &mut impl Read) -> io::Result<f32> {
    let mut b = [0u8; 4];
    r.read_exact(&mut b)?;
    Ok(f32::from_le_bytes(b))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Fresh, empty directory under the system temp dir.
    pub(crate) fn scratch_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("meadow-{label}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn frames_survive_the_file_format() {
        let dir = scratch_dir("cache-format");
        verify_cache_dir(&dir).unwrap();
        let frames = vec![
            BakeFrame {
                frame: -2,
                positions: vec![Vec3::new(1.0, 2.0, 3.0), Vec3::splat(-0.5)],
            },
            BakeFrame {
                frame: -1,
                positions: vec![Vec3::ZERO, Vec3::X],
            },
        ];
        let path = bake_file_path(&dir, "patch_00000001");
        write_bake_file(&path, &frames).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 16 + 2 * (4 + 2 * 12));
        assert_eq!(read_bake_file(&path).unwrap(), frames);

        assert!(remove_bake_file(&path).unwrap());
        assert!(!remove_bake_file(&path).unwrap());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn file_in_place_of_directory_is_a_resource_error() {
        let dir = scratch_dir("cache-not-dir");
        fs::write(&dir, b"x").unwrap();
        assert!(matches!(verify_cache_dir(&dir), Err(Error::Resource(_))));
        fs::remove_file(&dir).unwrap();
    }

    #[test]
    fn foreign_files_are_rejected() {
        let dir = scratch_dir("cache-foreign");
        verify_cache_dir(&dir).unwrap();
        let path = dir.join("junk.bake");
        fs::write(&path, b"JUNK\x01\0\0\0").unwrap();
        assert!(matches!(read_bake_file(&path), Err(Error::Other(_))));
        fs::remove_dir_all(&dir).unwrap();
    }
}
