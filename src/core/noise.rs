//! Seeded Coherent Value Noise
//!
//! Octave-stacked value noise over a 2D lattice, used by the world generator
//! for height and precipitation fields. Lattice values come from a SplitMix64
//! style integer hash of `(seed, x, y)`, so the field is a pure function of
//! its inputs and identical on every platform.

use serde::{Deserialize, Serialize};

/// Parameters for one noise field.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct NoiseParams {
    /// Base sampling frequency (lattice cells per unit).
    pub frequency: f64,
    /// Output amplitude before clamping.
    pub amplitude: f64,
    /// Number of octaves to stack.
    pub octaves: u32,
    /// Amplitude falloff per octave.
    pub persistence: f64,
    /// Output bounds, applied after octave summation.
    pub min: f64,
    /// Upper output bound.
    pub max: f64,
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self {
            frequency: 0.12,
            amplitude: 1.0,
            octaves: 4,
            persistence: 0.5,
            min: 0.0,
            max: 1.0,
        }
    }
}

/// A seeded 2D value-noise field.
#[derive(Clone, Copy, Debug)]
pub struct NoiseField {
    seed: u64,
    params: NoiseParams,
}

impl NoiseField {
    /// Create a field from a seed and parameters.
    pub fn new(seed: u64, params: NoiseParams) -> Self {
        Self { seed, params }
    }

    /// Sample the field at `(x, y)`, clamped to `[min, max]`.
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        let mut total = 0.0;
        let mut freq = self.params.frequency;
        let mut amp = self.params.amplitude;
        let mut norm = 0.0;

        for octave in 0..self.params.octaves.max(1) {
            // Each octave hashes with a shifted seed so layers decorrelate
            let layer_seed = self.seed.wrapping_add(octave as u64).wrapping_mul(0x9E3779B97F4A7C15);
            total += amp * value_noise(layer_seed, x * freq, y * freq);
            norm += amp;
            freq *= 2.0;
            amp *= self.params.persistence;
        }

        let unit = if norm > 0.0 { total / norm } else { 0.0 };
        let scaled = self.params.min + unit * (self.params.max - self.params.min);
        scaled.clamp(self.params.min, self.params.max)
    }
}

/// Single-octave value noise in [0, 1): bilinear interpolation of hashed
/// lattice corners with smoothstep easing.
fn value_noise(seed: u64, x: f64, y: f64) -> f64 {
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let v00 = lattice(seed, x0, y0);
    let v10 = lattice(seed, x0 + 1, y0);
    let v01 = lattice(seed, x0, y0 + 1);
    let v11 = lattice(seed, x0 + 1, y0 + 1);

    let sx = smoothstep(fx);
    let sy = smoothstep(fy);

    let a = lerp(v00, v10, sx);
    let b = lerp(v01, v11, sx);
    lerp(a, b, sy)
}

/// Hash a lattice point into [0, 1).
fn lattice(seed: u64, x: i64, y: i64) -> f64 {
    let mut z = seed
        .wrapping_add((x as u64).wrapping_mul(0xBF58476D1CE4E5B9))
        .wrapping_add((y as u64).wrapping_mul(0x94D049BB133111EB));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^= z >> 31;
    (z >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
}

#[inline]
fn smoothstep(t: f64) -> f64 {
    t * t * (3.0 - 2.0 * t)
}

#[inline]
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}
