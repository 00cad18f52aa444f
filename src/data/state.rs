//! Per-vertex physical state.
//!
//! Coarsening never interprets the state: it only forms area-weighted linear
//! combinations so that integrated quantities survive a topology change. Any
//! fixed-size vector of conserved quantities (density, momenta, energy, ...)
//! works through [`StateVector`].

use std::fmt::Debug;

/// A fixed-size vector of conserved quantities attached to a vertex.
pub trait StateVector: Copy + Send + Sync + Debug {
    /// The additive identity.
    fn zero() -> Self;
    /// `self += a * x`, component-wise.
    fn add_scaled(&mut self, a: f64, x: &Self);
    /// `self *= a`, component-wise.
    fn scale(&mut self, a: f64);
    /// Component view, mostly for diagnostics and tests.
    fn components(&self) -> &[f64];
}

impl StateVector for f64 {
    #[inline]
    fn zero() -> Self {
        0.0
    }
    #[inline]
    fn add_scaled(&mut self, a: f64, x: &Self) {
        *self += a * *x;
    }
    #[inline]
    fn scale(&mut self, a: f64) {
        *self *= a;
    }
    fn components(&self) -> &[f64] {
        std::slice::from_ref(self)
    }
}

impl<const N: usize> StateVector for [f64; N] {
    #[inline]
    fn zero() -> Self {
        [0.0; N]
    }
    #[inline]
    fn add_scaled(&mut self, a: f64, x: &Self) {
        for (s, v) in self.iter_mut().zip(x.iter()) {
            *s += a * v;
        }
    }
    #[inline]
    fn scale(&mut self, a: f64) {
        for s in self.iter_mut() {
            *s *= a;
        }
    }
    fn components(&self) -> &[f64] {
        self.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_state_is_componentwise() {
        let mut s = [1.0, 2.0, 3.0, 4.0];
        s.add_scaled(2.0, &[1.0, 0.0, -1.0, 0.5]);
        assert_eq!(s, [3.0, 2.0, 1.0, 5.0]);
        s.scale(0.5);
        assert_eq!(s.components(), &[1.5, 1.0, 0.5, 2.5]);
        assert_eq!(<[f64; 4]>::zero(), [0.0; 4]);
    }

    #[test]
    fn scalar_state() {
        let mut s = 2.0_f64;
        s.add_scaled(3.0, &1.5);
        s.scale(2.0);
        assert_eq!(s, 13.0);
        assert_eq!(s.components(), &[13.0]);
    }
}
