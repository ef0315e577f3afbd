//! Sample estimation and density-weighted blob sampling over ground surfaces.
//!
//! - [`estimate`]: upper bound on the number of samples that fit a surface.
//! - [`blob`]: the seeded, stratified rejection sampler producing a [`SampleSet`].
//! - [`cells`]: hierarchical triangle subdivision used for stratification.
//! - [`spatial_hash`]: uniform grid accelerating minimum-distance queries.
use rand::Rng;

pub mod blob;
pub mod cells;
pub mod estimate;
pub mod sample_set;
pub mod spatial_hash;

pub use blob::{BlobSampler, SamplerSettings};
pub use estimate::estimate_max_samples;
pub use sample_set::{Sample, SampleSet};

/// Generate a random float in the range [0, 1].
#[inline]
pub(crate) fn rand01(rng: &mut dyn Rng) -> f32 {
    (rng.next_u32() as f32) / ((u32::MAX as f32) + 1.0)
}

/// In-place Fisher–Yates shuffle using the provided RNG.
pub(crate) fn fisher_yates_shuffle<T>(arr: &mut [T], rng: &mut dyn Rng) {
    let mut n = arr.len();
    while n > 1 {
        let k = (rng.next_u32() as usize) % n;
        n -= 1;
        arr.swap(n, k);
    }
}

/// Derives an independent, deterministic seed from a base seed and a stream index.
pub fn derive_seed(base_seed: u64, stream: u64) -> u64 {
    mix_u64(base_seed ^ stream.wrapping_mul(0x9E3779B97F4A7C15))
}

#[inline]
fn mix_u64(mut x: u64) -> u64 {
    x ^= x >> 30;
    x = x.wrapping_mul(0xBF58476D1CE4E5B9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94D049BB133111EB);
    x ^ (x >> 31)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) struct FixedRng {
        pub(crate) value: u32,
    }

    impl rand::TryRng for FixedRng {
        type Error = core::convert::Infallible;

        fn try_next_u32(&mut self) -> Result<u32, Self::Error> {
            Ok(self.value)
        }

        fn try_next_u64(&mut self) -> Result<u64, Self::Error> {
            Ok(self.value as u64)
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Self::Error> {
            let bytes = self.value.to_le_bytes();
            for (i, b) in dest.iter_mut().enumerate() {
                *b = bytes[i % 4];
            }
            Ok(())
        }
    }

    #[test]
    fn rand01_returns_zero_for_zero_input() {
        let mut rng = FixedRng { value: 0 };
        assert_eq!(rand01(&mut rng), 0.0);
    }

    #[test]
    fn rand01_values_in_range() {
        for value in [0, 1, 100, u32::MAX / 2, u32::MAX - 1, u32::MAX] {
            let mut rng = FixedRng { value };
            let result = rand01(&mut rng);
            assert!(
                (0.0..=1.0).contains(&result),
                "rand01({value}) = {result} is out of range [0,1]"
            );
        }
    }

    #[test]
    fn shuffle_keeps_all_elements() {
        let mut rng = FixedRng { value: 7 };
        let mut v: Vec<usize> = (0..10).collect();
        fisher_yates_shuffle(&mut v, &mut rng);
        let mut sorted = v.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn derived_seeds_differ_per_stream() {
        assert_eq!(derive_seed(1, 2), derive_seed(1, 2));
        assert_ne!(derive_seed(1, 2), derive_seed(1, 3));
        assert_ne!(derive_seed(1, 2), derive_seed(2, 2));
    }
}
