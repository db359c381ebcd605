//! Privacy blur applied to snapshots of sensitive screens.
//!
//! The default filter reproduces the classic "light" image effect: a box
//! filter iterated to approximate a Gaussian, a saturation boost, then a
//! translucent white tint drawn over the result.

use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

use crate::capture::{Rgba, Snapshot};

/// Blur parameters. Also the `[blur]` section of the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlurParams {
    /// Gaussian-equivalent radius in screen pixels.
    pub radius: f32,
    /// RGBA tint drawn over the blurred image (values 0.0–1.0).
    pub tint: [f32; 4],
    /// Saturation multiplier. 1.0 leaves colors unchanged, 0.0 is grayscale.
    pub saturation_delta: f32,
    /// Number of box convolutions. Three is visually Gaussian. Capped at
    /// [`MAX_PASSES`].
    pub passes: u32,
}

impl Default for BlurParams {
    fn default() -> Self {
        Self {
            radius: 10.0,
            tint: [1.0, 1.0, 1.0, 0.3],
            saturation_delta: 1.8,
            passes: 3,
        }
    }
}

/// Upper bound on box convolutions per snapshot.
pub const MAX_PASSES: u32 = 8;

/// Applies a blur to an image.
pub trait BlurFilter {
    fn apply(&self, image: &Snapshot, params: &BlurParams) -> Snapshot;
}

/// Iterated box blur (separable, edge-clamped).
#[derive(Debug, Clone, Copy, Default)]
pub struct BoxBlur;

impl BlurFilter for BoxBlur {
    fn apply(&self, image: &Snapshot, params: &BlurParams) -> Snapshot {
        let mut out = image.clone();
        if image.is_empty() {
            return out;
        }

        let width = image.width() as usize;
        let height = image.height() as usize;
        let mut buf: Vec<[f32; 4]> = image.pixels().iter().map(|p| p.map(f32::from)).collect();

        // Past the longest side the window only re-averages clamped edge
        // pixels, so the cost stays bounded whatever the configured radius.
        let half = ((box_kernel_size(params.radius) / 2) as usize).min(width.max(height));
        if half > 0 {
            let mut scratch = buf.clone();
            for _ in 0..params.passes.min(MAX_PASSES) {
                for y in 0..height {
                    let row = y * width;
                    blur_line(width, half, |i| buf[row + i], |i, v| scratch[row + i] = v);
                }
                for x in 0..width {
                    blur_line(height, half, |i| scratch[i * width + x], |i, v| {
                        buf[i * width + x] = v
                    });
                }
            }
        }

        let matrix = saturation_matrix(params.saturation_delta);
        for (dst, src) in out.pixels_mut().iter_mut().zip(&buf) {
            *dst = tint(saturate(*src, &matrix), params.tint);
        }
        out
    }
}

/// Box width for a Gaussian-equivalent radius. Always odd so the box is
/// centered on the pixel.
pub fn box_kernel_size(radius: f32) -> u32 {
    if !radius.is_finite() || radius <= 0.0 {
        return 1;
    }
    let size = (radius * 3.0 * (2.0 * PI).sqrt() / 4.0 + 0.5).floor() as u32;
    if size % 2 == 0 { size + 1 } else { size }
}

/// One sliding-window box pass along a line of `len` samples.
fn blur_line(
    len: usize,
    half: usize,
    get: impl Fn(usize) -> [f32; 4],
    mut put: impl FnMut(usize, [f32; 4]),
) {
    let last = len - 1;
    let at = |i: isize| get(i.clamp(0, last as isize) as usize);
    let k = (2 * half + 1) as f32;
    let half = half as isize;

    let mut acc = [0.0f32; 4];
    for i in -half..=half {
        add(&mut acc, at(i), 1.0);
    }
    for x in 0..len as isize {
        put(x as usize, acc.map(|c| c / k));
        add(&mut acc, at(x - half), -1.0);
        add(&mut acc, at(x + half + 1), 1.0);
    }
}

fn add(acc: &mut [f32; 4], v: [f32; 4], sign: f32) {
    for (a, c) in acc.iter_mut().zip(v) {
        *a += sign * c;
    }
}

// Rec. 709 luma
const LUMA: [f32; 3] = [0.2126, 0.7152, 0.0722];

fn saturation_matrix(s: f32) -> [[f32; 3]; 3] {
    let mut m = [[0.0; 3]; 3];
    for (row, out) in m.iter_mut().enumerate() {
        for (col, w) in out.iter_mut().enumerate() {
            *w = LUMA[col] * (1.0 - s) + if row == col { s } else { 0.0 };
        }
    }
    m
}

fn saturate(px: [f32; 4], m: &[[f32; 3]; 3]) -> [f32; 4] {
    let mut out = px;
    for (row, o) in m.iter().zip(out.iter_mut()) {
        *o = row[0] * px[0] + row[1] * px[1] + row[2] * px[2];
    }
    out
}

/// Source-over of the tint color on top of `px`.
fn tint(px: [f32; 4], tint: [f32; 4]) -> Rgba {
    let a = tint[3].clamp(0.0, 1.0);
    let mut out = [0u8; 4];
    for c in 0..3 {
        let v = px[c] * (1.0 - a) + tint[c] * 255.0 * a;
        out[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    let alpha = px[3] / 255.0;
    out[3] = ((alpha + a * (1.0 - alpha)) * 255.0).round().clamp(0.0, 255.0) as u8;
    out
}
