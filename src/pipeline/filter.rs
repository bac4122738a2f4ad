use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

use crate::pipeline::error::{PipelineError, Result};

// Design frequencies are kept this far inside (0, nyquist).
const EDGE_HZ: f32 = 0.01;

/// Lowest sample rate that leaves room between the design edges.
pub const MIN_SAMPLE_RATE_HZ: f32 = 8.0 * EDGE_HZ;

/// Pure filtering primitive applied to one channel at a time.
pub trait SignalFilter {
    fn filter(&self, samples: &[f32]) -> Vec<f32>;
}

/// Filter stage description, as it appears in the training configuration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterKind {
    Notch { freq_hz: f32, q: f32 },
    Highpass { cutoff_hz: f32, q: f32 },
    Lowpass { cutoff_hz: f32, q: f32 },
    Bandpass { low_hz: f32, high_hz: f32, q: f32 },
    Bandstop { low_hz: f32, high_hz: f32, q: f32 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct BiquadCoeffs {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl BiquadCoeffs {
    // Transposed direct form II over a whole slice, starting from rest.
    fn run(&self, samples: &mut [f32]) {
        let (mut z1, mut z2) = (0.0f32, 0.0f32);
        for value in samples.iter_mut() {
            let input = *value;
            let y = self.b0 * input + z1;
            z1 = self.b1 * input - self.a1 * y + z2;
            z2 = self.b2 * input - self.a2 * y;
            *value = y;
        }
    }
}

/// Cascade of biquad sections designed once for a fixed sample rate.
///
/// Coefficients are immutable; every [`SignalFilter::filter`] call starts from
/// zeroed state, so the same chain can be shared across channels and threads.
#[derive(Clone, Debug, Default)]
pub struct FilterChain {
    sections: Vec<BiquadCoeffs>,
}

impl FilterChain {
    pub fn empty() -> Self {
        Self { sections: vec![] }
    }

    pub fn from_kinds(sample_rate_hz: f32, kinds: &[FilterKind]) -> Result<Self> {
        if !kinds.is_empty() && !(sample_rate_hz >= MIN_SAMPLE_RATE_HZ) {
            return Err(PipelineError::InvalidConfig(format!(
                "sample rate {sample_rate_hz} Hz is too low to design filters (minimum {MIN_SAMPLE_RATE_HZ} Hz)"
            )));
        }
        let sections = kinds
            .iter()
            .map(|kind| design_section(sample_rate_hz, *kind))
            .collect();
        Ok(Self { sections })
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }
}

impl SignalFilter for FilterChain {
    fn filter(&self, samples: &[f32]) -> Vec<f32> {
        let mut out = samples.to_vec();
        for section in &self.sections {
            section.run(&mut out);
        }
        out
    }
}

fn design_section(sample_rate_hz: f32, kind: FilterKind) -> BiquadCoeffs {
    let nyquist = sample_rate_hz * 0.5;
    match kind {
        FilterKind::Notch { freq_hz, q } => {
            notch(nyquist_clamp(freq_hz, nyquist), sample_rate_hz, q)
        }
        FilterKind::Highpass { cutoff_hz, q } => {
            highpass(nyquist_clamp(cutoff_hz, nyquist), sample_rate_hz, q)
        }
        FilterKind::Lowpass { cutoff_hz, q } => {
            lowpass(nyquist_clamp(cutoff_hz, nyquist), sample_rate_hz, q)
        }
        FilterKind::Bandpass { low_hz, high_hz, q } => {
            let (center, q_val) = band_center(low_hz, high_hz, q, nyquist);
            bandpass(center, sample_rate_hz, q_val)
        }
        FilterKind::Bandstop { low_hz, high_hz, q } => {
            let (center, q_val) = band_center(low_hz, high_hz, q, nyquist);
            notch(center, sample_rate_hz, q_val)
        }
    }
}

fn nyquist_clamp(freq_hz: f32, nyquist: f32) -> f32 {
    freq_hz.clamp(EDGE_HZ, nyquist - EDGE_HZ)
}

// Geometric band center and a Q no wider than the requested band.
fn band_center(low_hz: f32, high_hz: f32, q: f32, nyquist: f32) -> (f32, f32) {
    let low = nyquist_clamp(low_hz.min(high_hz), nyquist);
    let high = nyquist_clamp(low_hz.max(high_hz), nyquist);
    let center = (low * high).sqrt();
    let width = (high - low).max(f32::EPSILON);
    let q_val = q.clamp(0.1, 100.0).min(center / width);
    (center, q_val)
}

struct Prototype {
    cos_w0: f32,
    alpha: f32,
}

fn prototype(freq_hz: f32, sample_rate_hz: f32, q: f32) -> Prototype {
    let w0 = 2.0 * PI * freq_hz / sample_rate_hz;
    Prototype {
        cos_w0: w0.cos(),
        alpha: w0.sin() / (2.0 * q.max(1e-3)),
    }
}

fn lowpass(freq_hz: f32, sample_rate_hz: f32, q: f32) -> BiquadCoeffs {
    let p = prototype(freq_hz, sample_rate_hz, q);
    let b0 = (1.0 - p.cos_w0) * 0.5;
    normalize(b0, 1.0 - p.cos_w0, b0, 1.0 + p.alpha, -2.0 * p.cos_w0, 1.0 - p.alpha)
}

fn highpass(freq_hz: f32, sample_rate_hz: f32, q: f32) -> BiquadCoeffs {
    let p = prototype(freq_hz, sample_rate_hz, q);
    let b0 = (1.0 + p.cos_w0) * 0.5;
    normalize(b0, -(1.0 + p.cos_w0), b0, 1.0 + p.alpha, -2.0 * p.cos_w0, 1.0 - p.alpha)
}

fn bandpass(center_hz: f32, sample_rate_hz: f32, q: f32) -> BiquadCoeffs {
    let p = prototype(center_hz, sample_rate_hz, q);
    // Constant 0 dB peak gain.
    let b0 = p.alpha;
    normalize(b0, 0.0, -b0, 1.0 + p.alpha, -2.0 * p.cos_w0, 1.0 - p.alpha)
}

fn notch(center_hz: f32, sample_rate_hz: f32, q: f32) -> BiquadCoeffs {
    let p = prototype(center_hz, sample_rate_hz, q);
    normalize(1.0, -2.0 * p.cos_w0, 1.0, 1.0 + p.alpha, -2.0 * p.cos_w0, 1.0 - p.alpha)
}

fn normalize(b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) -> BiquadCoeffs {
    let a0_inv = 1.0 / a0;
    BiquadCoeffs {
        b0: b0 * a0_inv,
        b1: b1 * a0_inv,
        b2: b2 * a0_inv,
        a1: a1 * a0_inv,
        a2: a2 * a0_inv,
    }
}
