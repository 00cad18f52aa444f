//! Mesh parameters and domain geometry.
//!
//! [`MeshParameter`] mirrors the simulator's mesh parameter file: one
//! `key value` pair per line, keys in any order, unknown keys ignored, every
//! known key required except the periodicity flags, which default to off.
//! Periodic domains are rejected by validation. The resolution bound used to reject oversized
//! triangles during coarsening is derived from it.

use crate::mesh_error::MeshError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Axis-aligned rectangle bounding the computational domain.
///
/// Vertices lying exactly on one of its sides are treated as fixed outer
/// boundary by the coarsening candidate selector.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DomainBounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl DomainBounds {
    pub fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Result<Self, MeshError> {
        let b = Self {
            min_x,
            max_x,
            min_y,
            max_y,
        };
        b.check_validity()?;
        Ok(b)
    }

    /// Fails unless the rectangle is finite and has positive extent.
    pub fn check_validity(&self) -> Result<(), MeshError> {
        let finite = [self.min_x, self.max_x, self.min_y, self.max_y]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return Err(MeshError::InvalidParameter(format!(
                "domain bounds must be finite, got {self:?}"
            )));
        }
        if self.max_x <= self.min_x || self.max_y <= self.min_y {
            return Err(MeshError::InvalidParameter(format!(
                "domain bounds must have positive extent, got {self:?}"
            )));
        }
        Ok(())
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Whether `p` lies exactly on one of the four sides.
    pub fn on_boundary(&self, p: [f64; 2]) -> bool {
        p[0] == self.min_x || p[0] == self.max_x || p[1] == self.min_y || p[1] == self.max_y
    }
}

/// Mesh parameters as read from a parameter file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshParameter {
    /// Number of points along x of the equivalent uniform mesh.
    pub equivalent_points_x: u32,
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    /// Maximum refinement level relative to the base resolution.
    pub max_refine_factor: u32,
    /// Triangles with an error estimate below this want coarsening.
    pub min_error: f64,
    /// Triangles with an error estimate above this want refinement.
    pub max_error: f64,
    pub adaptive_mesh_flag: bool,
    /// Number of time steps between coarsening passes.
    pub n_step_skip_coarsen: u32,
    /// Periodic in x. Optional in files; only `false` passes validation.
    #[serde(default)]
    pub periodic_flag_x: bool,
    /// Periodic in y. Optional in files; only `false` passes validation.
    #[serde(default)]
    pub periodic_flag_y: bool,
}

/// Leading entries of `KEYS` that must appear; the rest default to `0`.
const REQUIRED_KEYS: usize = 10;

const KEYS: [&str; 12] = [
    "equivalentPointsX",
    "minX",
    "maxX",
    "minY",
    "maxY",
    "maxRefineFactor",
    "minError",
    "maxError",
    "adaptiveMeshFlag",
    "nStepSkipCoarsen",
    "periodicFlagX",
    "periodicFlagY",
];

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, MeshError> {
    value
        .parse::<T>()
        .map_err(|_| MeshError::InvalidParameter(format!("`{key}` has invalid value `{value}`")))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, MeshError> {
    match value {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(MeshError::InvalidParameter(format!(
            "`{key}` must be 0 or 1, got `{value}`"
        ))),
    }
}

impl MeshParameter {
    /// Reads and validates a parameter file.
    pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Self, MeshError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| MeshError::ParameterIo {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::parse(&text)
    }

    /// Parses the `key value` format and validates the result.
    ///
    /// Lines whose first word is not a known key are skipped, so comments
    /// and parameters belonging to other subsystems may share the file.
    pub fn parse(text: &str) -> Result<Self, MeshError> {
        let mut values: [Option<&str>; KEYS.len()] = [None; KEYS.len()];
        for line in text.lines() {
            let mut words = line.split_whitespace();
            let (Some(key), Some(value)) = (words.next(), words.next()) else {
                continue;
            };
            if let Some(slot) = KEYS.iter().position(|k| *k == key) {
                values[slot] = Some(value);
            }
        }
        let get = |i: usize| match values[i] {
            Some(value) => Ok(value),
            None if i >= REQUIRED_KEYS => Ok("0"),
            None => Err(MeshError::InvalidParameter(format!(
                "missing parameter `{}`",
                KEYS[i]
            ))),
        };

        let param = Self {
            equivalent_points_x: parse_value(KEYS[0], get(0)?)?,
            min_x: parse_value(KEYS[1], get(1)?)?,
            max_x: parse_value(KEYS[2], get(2)?)?,
            min_y: parse_value(KEYS[3], get(3)?)?,
            max_y: parse_value(KEYS[4], get(4)?)?,
            max_refine_factor: parse_value(KEYS[5], get(5)?)?,
            min_error: parse_value(KEYS[6], get(6)?)?,
            max_error: parse_value(KEYS[7], get(7)?)?,
            adaptive_mesh_flag: parse_flag(KEYS[8], get(8)?)?,
            n_step_skip_coarsen: parse_value(KEYS[9], get(9)?)?,
            periodic_flag_x: parse_flag(KEYS[10], get(10)?)?,
            periodic_flag_y: parse_flag(KEYS[11], get(11)?)?,
        };
        param.check_validity()?;
        Ok(param)
    }

    /// Validates ranges and mutual consistency of the parameters.
    pub fn check_validity(&self) -> Result<(), MeshError> {
        if self.equivalent_points_x < 2 {
            return Err(MeshError::InvalidParameter(format!(
                "equivalentPointsX must be at least 2, got {}",
                self.equivalent_points_x
            )));
        }
        self.domain()?;
        if self.max_refine_factor < 1 {
            return Err(MeshError::InvalidParameter(
                "maxRefineFactor must be at least 1".into(),
            ));
        }
        if !(self.min_error.is_finite() && self.max_error.is_finite()) {
            return Err(MeshError::InvalidParameter(
                "error thresholds must be finite".into(),
            ));
        }
        if self.min_error > self.max_error {
            return Err(MeshError::InvalidParameter(format!(
                "minError ({}) exceeds maxError ({})",
                self.min_error, self.max_error
            )));
        }
        if self.periodic_flag_x || self.periodic_flag_y {
            return Err(MeshError::InvalidParameter(
                "periodic domains are not supported".into(),
            ));
        }
        Ok(())
    }

    /// Domain rectangle described by the parameters.
    pub fn domain(&self) -> Result<DomainBounds, MeshError> {
        DomainBounds::new(self.min_x, self.max_x, self.min_y, self.max_y)
    }

    /// Largest triangle area wanted on the unrefined mesh.
    pub fn base_resolution(&self) -> f64 {
        let dx = (self.max_x - self.min_x) / f64::from(self.equivalent_points_x - 1);
        0.565 * dx * dx
    }

    /// Smallest triangle area reachable by refinement.
    pub fn max_resolution(&self) -> f64 {
        let f = f64::from(self.max_refine_factor);
        self.base_resolution() / (f * f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_boundary_is_exact() {
        let b = DomainBounds::new(0.0, 1.0, -1.0, 1.0).unwrap();
        assert!(b.on_boundary([0.0, 0.3]));
        assert!(b.on_boundary([0.5, 1.0]));
        assert!(!b.on_boundary([1e-16, 0.3]));
        assert_eq!(b.width(), 1.0);
        assert_eq!(b.height(), 2.0);
    }

    #[test]
    fn degenerate_domain_is_rejected() {
        assert!(matches!(
            DomainBounds::new(1.0, 1.0, 0.0, 1.0),
            Err(MeshError::InvalidParameter(_))
        ));
        assert!(DomainBounds::new(0.0, f64::NAN, 0.0, 1.0).is_err());
    }
}
