//! Geometric predicates on 2D points.
//!
//! Only the *sign* of each predicate is meaningful. [`ExactPredicates`] runs a
//! floating-point filter first and recomputes in exact rational arithmetic
//! (`rug::Rational`) whenever the rounding error could flip the sign, so
//! collinear and cocircular configurations are classified exactly.

use rug::Rational;
use std::cmp::Ordering;

/// Sign-exact geometric oracles consumed by the coarsening engine.
///
/// Implementations must be pure; the engine calls them concurrently from the
/// per-vertex phases.
pub trait Predicates: Sync {
    /// Positive if `a, b, c` turn counter-clockwise, negative if clockwise,
    /// zero if collinear.
    fn orient2d(&self, a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64;

    /// Positive if `d` lies strictly inside the circle through the
    /// counter-clockwise triangle `a, b, c`, negative outside, zero on it.
    fn incircle(&self, a: [f64; 2], b: [f64; 2], c: [f64; 2], d: [f64; 2]) -> f64;

    /// Whether `p` lies strictly inside the diametral circle of segment `ab`.
    fn encroaches(&self, a: [f64; 2], b: [f64; 2], p: [f64; 2]) -> bool {
        (a[0] - p[0]) * (b[0] - p[0]) + (a[1] - p[1]) * (b[1] - p[1]) < 0.0
    }
}

const EPSILON: f64 = f64::EPSILON * 0.5;
const CCW_ERR_BOUND: f64 = (3.0 + 16.0 * EPSILON) * EPSILON;
const ICC_ERR_BOUND: f64 = (10.0 + 96.0 * EPSILON) * EPSILON;

/// Filtered predicates with an exact rational fallback.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExactPredicates;

/// Plain floating-point predicates without any robustness guarantee.
///
/// Useful for benchmarking the filter; do not use on meshes with collinear
/// boundary vertices.
#[derive(Clone, Copy, Debug, Default)]
pub struct FastPredicates;

fn rational(v: f64) -> Rational {
    // Connectivity rejects non-finite coordinates, so this never falls back.
    Rational::from_f64(v).unwrap_or_default()
}

fn sign(o: Ordering) -> f64 {
    match o {
        Ordering::Less => -1.0,
        Ordering::Equal => 0.0,
        Ordering::Greater => 1.0,
    }
}

fn diff(a: f64, b: f64) -> Rational {
    rational(a) - rational(b)
}

fn orient2d_exact(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    let left = diff(a[0], c[0]) * diff(b[1], c[1]);
    let right = diff(a[1], c[1]) * diff(b[0], c[0]);
    sign((left - right).cmp0())
}

fn incircle_exact(a: [f64; 2], b: [f64; 2], c: [f64; 2], d: [f64; 2]) -> f64 {
    let (adx, ady) = (diff(a[0], d[0]), diff(a[1], d[1]));
    let (bdx, bdy) = (diff(b[0], d[0]), diff(b[1], d[1]));
    let (cdx, cdy) = (diff(c[0], d[0]), diff(c[1], d[1]));
    let alift = adx.clone() * &adx + ady.clone() * &ady;
    let blift = bdx.clone() * &bdx + bdy.clone() * &bdy;
    let clift = cdx.clone() * &cdx + cdy.clone() * &cdy;
    let ta = alift * (bdx.clone() * &cdy - cdx.clone() * &bdy);
    let tb = blift * (cdx * &ady - adx.clone() * &cdy);
    let tc = clift * (adx * &bdy - bdx * &ady);
    sign((ta + tb + tc).cmp0())
}

fn dot_exact(a: [f64; 2], b: [f64; 2], p: [f64; 2]) -> Ordering {
    let x = diff(a[0], p[0]) * diff(b[0], p[0]);
    let y = diff(a[1], p[1]) * diff(b[1], p[1]);
    (x + y).cmp0()
}

fn orient2d_fast(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> (f64, f64) {
    let left = (a[0] - c[0]) * (b[1] - c[1]);
    let right = (a[1] - c[1]) * (b[0] - c[0]);
    (left - right, left.abs() + right.abs())
}

fn incircle_fast(a: [f64; 2], b: [f64; 2], c: [f64; 2], d: [f64; 2]) -> (f64, f64) {
    let (adx, ady) = (a[0] - d[0], a[1] - d[1]);
    let (bdx, bdy) = (b[0] - d[0], b[1] - d[1]);
    let (cdx, cdy) = (c[0] - d[0], c[1] - d[1]);

    let (bdxcdy, cdxbdy) = (bdx * cdy, cdx * bdy);
    let alift = adx * adx + ady * ady;
    let (cdxady, adxcdy) = (cdx * ady, adx * cdy);
    let blift = bdx * bdx + bdy * bdy;
    let (adxbdy, bdxady) = (adx * bdy, bdx * ady);
    let clift = cdx * cdx + cdy * cdy;

    let det = alift * (bdxcdy - cdxbdy) + blift * (cdxady - adxcdy) + clift * (adxbdy - bdxady);
    let permanent = (bdxcdy.abs() + cdxbdy.abs()) * alift
        + (cdxady.abs() + adxcdy.abs()) * blift
        + (adxbdy.abs() + bdxady.abs()) * clift;
    (det, permanent)
}

impl Predicates for ExactPredicates {
    fn orient2d(&self, a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
        let (det, detsum) = orient2d_fast(a, b, c);
        if det.abs() > CCW_ERR_BOUND * detsum {
            return det;
        }
        orient2d_exact(a, b, c)
    }

    fn incircle(&self, a: [f64; 2], b: [f64; 2], c: [f64; 2], d: [f64; 2]) -> f64 {
        let (det, permanent) = incircle_fast(a, b, c, d);
        if det.abs() > ICC_ERR_BOUND * permanent {
            return det;
        }
        incircle_exact(a, b, c, d)
    }

    fn encroaches(&self, a: [f64; 2], b: [f64; 2], p: [f64; 2]) -> bool {
        let x = (a[0] - p[0]) * (b[0] - p[0]);
        let y = (a[1] - p[1]) * (b[1] - p[1]);
        let dot = x + y;
        if dot.abs() > CCW_ERR_BOUND * (x.abs() + y.abs()) {
            return dot < 0.0;
        }
        dot_exact(a, b, p) == Ordering::Less
    }
}

impl Predicates for FastPredicates {
    fn orient2d(&self, a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
        orient2d_fast(a, b, c).0
    }

    fn incircle(&self, a: [f64; 2], b: [f64; 2], c: [f64; 2], d: [f64; 2]) -> f64 {
        incircle_fast(a, b, c, d).0
    }
}
