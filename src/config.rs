//! Sampling ranges, magnitude guards and tolerances used by the analyzers.

use serde::Serialize;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Guard for generic sampling (sequences). Display-safety clamp, not a
/// mathematical truncation: anything larger would blow up plot axes.
pub const GENERIC_MAGNITUDE_GUARD: f64 = 100_000.0;
/// Guard for function-sequence curves, which are drawn on a tighter viewport.
pub const FUNCTION_MAGNITUDE_GUARD: f64 = 10_000.0;

pub const SEQUENCE_FIRST_INDEX: u32 = 1;
pub const SEQUENCE_LAST_INDEX: u32 = 50;

pub const DOMAIN_START: f64 = 0.0;
pub const DOMAIN_END: f64 = 1.0;
pub const DOMAIN_INTERVALS: usize = 50;
pub const UNIFORM_THRESHOLD: f64 = 0.1;

pub const RATIO_INDEX: u32 = 10_000;
pub const WORKED_EXAMPLE_INDEX: u32 = 100;
pub const ZERO_TOLERANCE: f64 = 1e-15;
pub const SNAP_TOLERANCE: f64 = 0.001;
pub const ROUND_DECIMALS: i32 = 4;
pub const LADDER_FACTOR: u32 = 10;
pub const LADDER_FLOOR: u32 = 10;
pub const DRIFT_EXPONENT_LIMIT: f64 = 0.5;

// =============================================================================
// SEQUENCE ANALYZER
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SequenceConfig {
    pub first_index: u32,
    pub last_index: u32,
    pub magnitude_guard: f64,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            first_index: SEQUENCE_FIRST_INDEX,
            last_index: SEQUENCE_LAST_INDEX,
            magnitude_guard: GENERIC_MAGNITUDE_GUARD,
        }
    }
}

impl SequenceConfig {
    pub fn with_range(mut self, first_index: u32, last_index: u32) -> Self {
        self.first_index = first_index;
        self.last_index = last_index;
        self
    }

    pub fn with_magnitude_guard(mut self, guard: f64) -> Self {
        self.magnitude_guard = guard;
        self
    }

    /// Integer indices `first..=last` as sample inputs. Empty when reversed.
    pub fn indices(&self) -> Vec<f64> {
        (self.first_index..=self.last_index).map(f64::from).collect()
    }
}

// =============================================================================
// FUNCTION-SEQUENCE ANALYZER
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UniformityConfig {
    pub domain_start: f64,
    pub domain_end: f64,
    /// Number of equal sub-intervals; the domain gets `intervals + 1` samples.
    pub intervals: usize,
    pub magnitude_guard: f64,
    /// `max_diff` strictly below this counts as evidence of uniform convergence.
    pub uniform_threshold: f64,
}

impl Default for UniformityConfig {
    fn default() -> Self {
        Self {
            domain_start: DOMAIN_START,
            domain_end: DOMAIN_END,
            intervals: DOMAIN_INTERVALS,
            magnitude_guard: FUNCTION_MAGNITUDE_GUARD,
            uniform_threshold: UNIFORM_THRESHOLD,
        }
    }
}

impl UniformityConfig {
    pub fn with_domain(mut self, start: f64, end: f64) -> Self {
        self.domain_start = start;
        self.domain_end = end;
        self
    }

    pub fn with_intervals(mut self, intervals: usize) -> Self {
        self.intervals = intervals;
        self
    }

    pub fn with_uniform_threshold(mut self, threshold: f64) -> Self {
        self.uniform_threshold = threshold;
        self
    }

    pub fn with_magnitude_guard(mut self, guard: f64) -> Self {
        self.magnitude_guard = guard;
        self
    }

    /// Evenly spaced sample points, endpoints included.
    pub fn domain_samples(&self) -> Vec<f64> {
        linspace(self.domain_start, self.domain_end, self.intervals + 1)
    }
}

/// Generate linearly spaced sample points
pub fn linspace(start: f64, end: f64, num: usize) -> Vec<f64> {
    if num == 0 {
        return Vec::new();
    }
    if num == 1 {
        return vec![start];
    }
    let steps = (num - 1) as f64;
    // i / steps keeps the grid exact at the endpoints (0.0, 0.02, ..., 1.0)
    (0..num)
        .map(|i| start + (end - start) * (i as f64 / steps))
        .collect()
}

// =============================================================================
// RADIUS ESTIMATOR
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RadiusConfig {
    /// The "large n" at which the ratio test is sampled.
    pub ratio_index: u32,
    /// Smaller index used for the narrative walk-through.
    pub worked_example_index: u32,
    pub zero_tolerance: f64,
    pub snap_tolerance: f64,
    pub round_decimals: i32,
    /// Each retreat divides the index by this factor.
    pub ladder_factor: u32,
    /// The ladder never goes below this index.
    pub ladder_floor: u32,
    /// If the ratio scales like `n^d` between two rungs with `|d|` above this,
    /// it is still drifting towards 0 or infinity.
    pub drift_exponent_limit: f64,
}

impl Default for RadiusConfig {
    fn default() -> Self {
        Self {
            ratio_index: RATIO_INDEX,
            worked_example_index: WORKED_EXAMPLE_INDEX,
            zero_tolerance: ZERO_TOLERANCE,
            snap_tolerance: SNAP_TOLERANCE,
            round_decimals: ROUND_DECIMALS,
            ladder_factor: LADDER_FACTOR,
            ladder_floor: LADDER_FLOOR,
            drift_exponent_limit: DRIFT_EXPONENT_LIMIT,
        }
    }
}

impl RadiusConfig {
    pub fn with_ratio_index(mut self, index: u32) -> Self {
        self.ratio_index = index;
        self
    }

    pub fn with_worked_example_index(mut self, index: u32) -> Self {
        self.worked_example_index = index;
        self
    }

    /// Indices below `ratio_index` visited when the primary samples leave
    /// floating-point range, largest first.
    pub fn retreat_ladder(&self) -> Vec<u32> {
        let factor = self.ladder_factor.max(2);
        let mut rungs = Vec::new();
        let mut index = self.ratio_index / factor;
        while index >= self.ladder_floor.max(1) {
            rungs.push(index);
            index /= factor;
        }
        rungs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sequence_range_is_one_to_fifty() {
        let idx = SequenceConfig::default().indices();
        assert_eq!(idx.len(), 50);
        assert_eq!(idx[0], 1.0);
        assert_eq!(idx[49], 50.0);
    }

    #[test]
    fn default_domain_has_51_points_on_unit_interval() {
        let xs = UniformityConfig::default().domain_samples();
        assert_eq!(xs.len(), 51);
        assert_eq!(xs[0], 0.0);
        assert_eq!(xs[25], 0.5);
        assert_eq!(xs[50], 1.0);
    }

    #[test]
    fn linspace_degenerate_counts() {
        assert!(linspace(0.0, 1.0, 0).is_empty());
        assert_eq!(linspace(2.0, 3.0, 1), vec![2.0]);
    }

    #[test]
    fn magnitude_guard_builders_override_defaults() {
        let seq = SequenceConfig::default().with_magnitude_guard(10.0);
        assert_eq!(seq.magnitude_guard, 10.0);
        assert_eq!(seq.last_index, SEQUENCE_LAST_INDEX);
        let uni = UniformityConfig::default().with_magnitude_guard(1.0);
        assert_eq!(uni.magnitude_guard, 1.0);
        assert_eq!(uni.intervals, DOMAIN_INTERVALS);
    }

    #[test]
    fn retreat_ladder_stops_at_floor() {
        assert_eq!(RadiusConfig::default().retreat_ladder(), vec![1000, 100, 10]);
        let shallow = RadiusConfig::default().with_ratio_index(50);
        assert!(shallow.retreat_ladder().is_empty());
    }
}
