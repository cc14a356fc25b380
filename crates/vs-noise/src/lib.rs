//! # vs-noise
//!
//! Sparse, color-neutral pixel perturbation of decoded RGB frames.
//!
//! Each frame gets an independent random subset of pixels (probability
//! [`SELECTION_PROBABILITY`] per pixel). Every selected pixel receives a
//! uniform integer offset in `[-intensity, intensity]` per channel; the
//! offsets of each channel are then shifted by their rounded mean so the
//! frame's average color does not drift. Results are clipped to `0..=255`.
//!
//! Randomness is freshly seeded from the operating system on every call, so
//! two runs over the same frames never produce the same output.
//!
//! This crate does no I/O.

use image::RgbImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

/// Probability that any given pixel is perturbed.
pub const SELECTION_PROBABILITY: f64 = 0.003;

/// The perturbation planned for one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FramePlan {
    /// Selected pixel indices in row-major order, ascending.
    pub positions: Vec<usize>,
    /// Per-channel offsets for each selected pixel, after the neutrality
    /// correction.
    pub deltas: Vec<[i16; 3]>,
}

impl FramePlan {
    /// Mean offset of one channel over the selected pixels.
    pub fn channel_mean(&self, channel: usize) -> f64 {
        if self.deltas.is_empty() {
            return 0.0;
        }
        let sum: i64 = self.deltas.iter().map(|d| i64::from(d[channel])).sum();
        sum as f64 / self.deltas.len() as f64
    }
}

/// Choose pixels of a `pixel_count`-pixel frame, each independently with
/// `probability`.
///
/// Walks the frame by geometric gaps, which selects exactly the same
/// distribution as one Bernoulli trial per pixel at a fraction of the cost.
fn select_positions<R: Rng>(rng: &mut R, pixel_count: usize, probability: f64) -> Vec<usize> {
    let mut positions = Vec::with_capacity((pixel_count as f64 * probability * 1.5) as usize + 1);
    if probability <= 0.0 || pixel_count == 0 {
        return positions;
    }
    if probability >= 1.0 {
        positions.extend(0..pixel_count);
        return positions;
    }

    let ln_q = (1.0 - probability).ln();
    let mut index: usize = 0;
    loop {
        // gen::<f64>() is in [0, 1); flip it so ln() never sees 0.
        let u = 1.0 - rng.gen::<f64>();
        let gap = (u.ln() / ln_q).floor();
        if !gap.is_finite() || gap >= (pixel_count - index) as f64 {
            break;
        }
        index += gap as usize;
        positions.push(index);
        index += 1;
        if index >= pixel_count {
            break;
        }
    }
    positions
}

/// Plan the perturbation of one `width`×`height` frame.
pub fn plan_frame<R: Rng>(rng: &mut R, width: u32, height: u32, intensity: u8) -> FramePlan {
    let pixel_count = width as usize * height as usize;
    let positions = select_positions(rng, pixel_count, SELECTION_PROBABILITY);

    let bound = i16::from(intensity);
    let mut deltas: Vec<[i16; 3]> = positions
        .iter()
        .map(|_| {
            [
                rng.gen_range(-bound..=bound),
                rng.gen_range(-bound..=bound),
                rng.gen_range(-bound..=bound),
            ]
        })
        .collect();

    if !deltas.is_empty() {
        let n = deltas.len() as f64;
        for channel in 0..3 {
            let sum: i64 = deltas.iter().map(|d| i64::from(d[channel])).sum();
            let shift = (sum as f64 / n).round() as i16;
            if shift != 0 {
                for d in &mut deltas {
                    d[channel] -= shift;
                }
            }
        }
    }

    FramePlan { positions, deltas }
}

/// Apply a plan to a frame in place, clipping each channel to `0..=255`.
pub fn apply_plan(frame: &mut RgbImage, plan: &FramePlan) {
    let raw: &mut [u8] = frame;
    for (&pos, delta) in plan.positions.iter().zip(&plan.deltas) {
        let base = pos * 3;
        let Some(pixel) = raw.get_mut(base..base + 3) else {
            continue;
        };
        for (value, d) in pixel.iter_mut().zip(delta) {
            *value = (i16::from(*value) + d).clamp(0, 255) as u8;
        }
    }
}

/// Perturb one frame in place using `rng`.
pub fn perturb_frame<R: Rng>(rng: &mut R, frame: &mut RgbImage, intensity: u8) {
    let plan = plan_frame(rng, frame.width(), frame.height(), intensity);
    apply_plan(frame, &plan);
}

fn os_seeded() -> StdRng {
    StdRng::from_entropy()
}

/// Perturb a sequence of frames on the current thread. Order is preserved.
pub fn apply(mut frames: Vec<RgbImage>, intensity: u8) -> Vec<RgbImage> {
    let mut rng = os_seeded();
    for frame in &mut frames {
        perturb_frame(&mut rng, frame, intensity);
    }
    frames
}

/// Perturb a sequence of frames on `pool`. Order is preserved.
///
/// Each worker thread seeds its own generator from the OS.
pub fn apply_parallel(
    pool: &rayon::ThreadPool,
    frames: Vec<RgbImage>,
    intensity: u8,
) -> Vec<RgbImage> {
    pool.install(|| {
        frames
            .into_par_iter()
            .map_init(os_seeded, |rng, mut frame| {
                perturb_frame(rng, &mut frame, intensity);
                frame
            })
            .collect()
    })
}

/// Build a pool with exactly `workers` threads (at least one).
pub fn build_pool(workers: usize) -> Result<rayon::ThreadPool, rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("vs-noise-{i}"))
        .build()
}
