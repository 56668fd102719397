//! Peak-gain compensation table for the state-variable band-pass
//!
//! Built once per sample rate from the frequency response of the quantized
//! filter, so the per-block lookup is two index computations.

use super::svf::{quantized_coefficients, MAX_Q, MIN_Q, SWEEP_MAX_HZ, SWEEP_MIN_HZ};
use crate::fixed::{q26_to_float, q30_to_float};

pub const FREQ_BINS: usize = 16;
pub const Q_BINS: usize = 16;

/// Detune factors around the bin cutoff searched for the response peak
const SWEEP_POINTS: i32 = 6;
const SWEEP_STEP_OCTAVES: f64 = 1.0 / 24.0;

#[derive(Debug, Clone, Copy)]
struct Complex {
    re: f64,
    im: f64,
}

impl Complex {
    fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }

    fn add(self, o: Self) -> Self {
        Self::new(self.re + o.re, self.im + o.im)
    }

    fn sub(self, o: Self) -> Self {
        Self::new(self.re - o.re, self.im - o.im)
    }

    fn mul(self, o: Self) -> Self {
        Self::new(self.re * o.re - self.im * o.im, self.re * o.im + self.im * o.re)
    }

    fn scale(self, k: f64) -> Self {
        Self::new(self.re * k, self.im * k)
    }

    fn div(self, o: Self) -> Self {
        let d = o.re * o.re + o.im * o.im;
        Self::new(
            (self.re * o.re + self.im * o.im) / d,
            (self.im * o.re - self.re * o.im) / d,
        )
    }

    fn norm(self) -> f64 {
        self.re.hypot(self.im)
    }
}

/// |H(e^jw)| of the band-pass output for coefficients g, r, h.
///
/// State space of the recursion with k = r + g:
/// A = [[1 - 2ghk, -2gh], [2g(1 - ghk), 1 - 2g²h]], B = [2gh, 2g²h],
/// C = [1 - ghk, -gh], D = gh.
fn bandpass_magnitude(g: f64, r: f64, h: f64, omega: f64) -> f64 {
    let k = r + g;
    let (a11, a12) = (1.0 - 2.0 * g * h * k, -2.0 * g * h);
    let (a21, a22) = (2.0 * g * (1.0 - g * h * k), 1.0 - 2.0 * g * g * h);
    let (b1, b2) = (2.0 * g * h, 2.0 * g * g * h);
    let (c1, c2) = (1.0 - g * h * k, -g * h);
    let d = g * h;

    let z = Complex::new(omega.cos(), omega.sin());
    let za = z.sub(Complex::new(a11, 0.0));
    let zd = z.sub(Complex::new(a22, 0.0));
    let det = za.mul(zd).sub(Complex::new(a12 * a21, 0.0));
    if det.norm() < 1e-30 {
        return 0.0;
    }

    let v1 = zd.scale(b1).add(Complex::new(a12 * b2, 0.0)).div(det);
    let v2 = za.scale(b2).add(Complex::new(a21 * b1, 0.0)).div(det);
    v1.scale(c1).add(v2.scale(c2)).add(Complex::new(d, 0.0)).norm()
}

fn log_spaced(lo: f32, hi: f32, i: usize, n: usize) -> f32 {
    let t = i as f32 / (n - 1) as f32;
    (lo.ln() + t * (hi.ln() - lo.ln())).exp()
}

/// Nearest bin on a log axis
fn log_index(value: f32, lo: f32, hi: f32, n: usize) -> usize {
    if !(value > lo) {
        return 0;
    }
    let t = (value.ln() - lo.ln()) / (hi.ln() - lo.ln());
    ((t * (n - 1) as f32).round() as usize).min(n - 1)
}

/// Q15 gain per (Q bin, cutoff bin) that brings the peak response to unity
#[derive(Debug, Clone)]
pub struct GainTable {
    gains: [[u16; FREQ_BINS]; Q_BINS],
}

impl GainTable {
    pub fn build(sample_rate: f32) -> Self {
        let mut gains = [[0u16; FREQ_BINS]; Q_BINS];

        for (qi, row) in gains.iter_mut().enumerate() {
            let q = log_spaced(MIN_Q, MAX_Q, qi, Q_BINS);
            for (fi, gain) in row.iter_mut().enumerate() {
                let fc = log_spaced(SWEEP_MIN_HZ, SWEEP_MAX_HZ, fi, FREQ_BINS);
                let (g_q26, r_q30, h_q30) = quantized_coefficients(fc, q, sample_rate);
                let g = q26_to_float(g_q26) as f64;
                let r = q30_to_float(r_q30) as f64;
                let h = q30_to_float(h_q30) as f64;

                // Bilinear prewarp puts the peak at the clamped cutoff
                let centre = 2.0 * (g.atan());
                let mut peak: f64 = 0.0;
                for step in -SWEEP_POINTS..=SWEEP_POINTS {
                    let omega = centre * (step as f64 * SWEEP_STEP_OCTAVES).exp2();
                    if omega > 0.0 && omega < std::f64::consts::PI {
                        peak = peak.max(bandpass_magnitude(g, r, h, omega));
                    }
                }

                *gain = if peak > 0.0 {
                    (32768.0 / peak).round().clamp(1.0, u16::MAX as f64) as u16
                } else {
                    u16::MAX
                };
            }
        }

        Self { gains }
    }

    /// Gain for the bins nearest to `cutoff_hz` and `q`
    pub fn lookup(&self, cutoff_hz: f32, q: f32) -> u16 {
        let fi = log_index(cutoff_hz, SWEEP_MIN_HZ, SWEEP_MAX_HZ, FREQ_BINS);
        let qi = log_index(q, MIN_Q, MAX_Q, Q_BINS);
        self.gains[qi][fi]
    }
}
