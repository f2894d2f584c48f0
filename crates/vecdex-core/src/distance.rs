//! Similarity spaces and the distance kernels behind them.
//!
//! A [`Space`] is what callers pick; a [`Metric`] is what the engine
//! computes. [`Space::engine_metric`] is the translation between the two:
//! cosine has no kernel of its own and runs as inner product over
//! normalized vectors.
//!
//! Kernels use `wide::f32x8` for explicit 8-lane SIMD with a scalar tail.

use serde::{Deserialize, Serialize};
use wide::f32x8;

/// Logical similarity space of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Space {
    /// Squared Euclidean distance.
    #[default]
    L2,
    /// Inner product, reported as `1 - dot(a, b)`.
    #[serde(rename = "ip")]
    InnerProduct,
    /// Cosine distance, `1 - cos(a, b)`.
    Cosine,
}

/// Kernel configuration understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineMetric {
    /// Distance kernel.
    pub metric: Metric,
    /// Whether vectors are normalized before they reach the kernel.
    pub normalize: bool,
}

/// Distance kernel implemented by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    /// Squared L2.
    SquaredL2,
    /// `1 - dot(a, b)`.
    InnerProduct,
}

impl Space {
    /// Maps the logical space onto the engine's kernel configuration.
    #[must_use]
    pub const fn engine_metric(self) -> EngineMetric {
        match self {
            Self::L2 => EngineMetric {
                metric: Metric::SquaredL2,
                normalize: false,
            },
            Self::InnerProduct => EngineMetric {
                metric: Metric::InnerProduct,
                normalize: false,
            },
            Self::Cosine => EngineMetric {
                metric: Metric::InnerProduct,
                normalize: true,
            },
        }
    }

    /// Returns the inverse of [`Space::engine_metric`].
    #[must_use]
    pub const fn from_engine_metric(engine: EngineMetric) -> Self {
        match (engine.metric, engine.normalize) {
            (Metric::SquaredL2, _) => Self::L2,
            (Metric::InnerProduct, false) => Self::InnerProduct,
            (Metric::InnerProduct, true) => Self::Cosine,
        }
    }
}

impl Metric {
    /// Computes the distance between two vectors of equal length.
    ///
    /// Lower is always closer.
    #[inline]
    #[must_use]
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::SquaredL2 => squared_l2(a, b),
            Self::InnerProduct => 1.0 - dot(a, b),
        }
    }
}

/// Dot product over 8-wide lanes.
#[inline]
#[must_use]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    let mut sum = f32x8::ZERO;
    let chunks_a = a.chunks_exact(8);
    let chunks_b = b.chunks_exact(8);
    let tail: f32 = chunks_a
        .remainder()
        .iter()
        .zip(chunks_b.remainder())
        .map(|(x, y)| x * y)
        .sum();

    for (ca, cb) in chunks_a.zip(chunks_b) {
        sum = lane(ca).mul_add(lane(cb), sum);
    }

    sum.reduce_add() + tail
}

/// Squared L2 distance over 8-wide lanes.
#[inline]
#[must_use]
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    let mut sum = f32x8::ZERO;
    let chunks_a = a.chunks_exact(8);
    let chunks_b = b.chunks_exact(8);
    let tail: f32 = chunks_a
        .remainder()
        .iter()
        .zip(chunks_b.remainder())
        .map(|(x, y)| (x - y) * (x - y))
        .sum();

    for (ca, cb) in chunks_a.zip(chunks_b) {
        let diff = lane(ca) - lane(cb);
        sum = diff.mul_add(diff, sum);
    }

    sum.reduce_add() + tail
}

/// Scales `v` to unit length in place. Zero vectors are left untouched.
pub fn normalize_in_place(v: &mut [f32]) {
    let norm = dot(v, v).sqrt();
    if norm > f32::EPSILON {
        let inv = 1.0 / norm;
        for x in v.iter_mut() {
            *x *= inv;
        }
    }
}

#[inline]
fn lane(chunk: &[f32]) -> f32x8 {
    let mut buf = [0.0f32; 8];
    buf.copy_from_slice(chunk);
    f32x8::from(buf)
}
