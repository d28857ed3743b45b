use hex_geometry::HexGeometry;
use thiserror::Error;

/// Fixed-point scale applied to the floating point distance profiles.
pub const EVAL_SCALE: f64 = 64.0;

/// A non-linear cost of a token's distance from its goal cell, indexed by
/// distance. Far tokens cost disproportionately more, biasing the search
/// toward moving them first.
pub const CONVEX_PROFILE: [f64; 27] = [
    0.00, 1.00, 2.65, 4.87, 7.48, 10.52, 14.02, 17.76, 22.39, 27.20, 32.94, 39.65, 46.25, 53.36,
    62.44, 71.91, 83.09, 95.10, 109.35, 125.79, 143.01, 164.29, 187.83, 211.52, 238.50, 265.16,
    293.62,
];

/// The pluggable evaluation of a search state. The cost of a state is the sum
/// of `token_cost` over every non-hole token, plus `direction_penalty` while
/// the two chirality bits disagree. Costs are maintained incrementally, so
/// `token_cost` is queried only for the tokens a move touches.
pub trait Heuristic: Sync {
    /// The cost of a token sitting on `src_pos` whose counterpart in the
    /// target state sits on `tgt_pos`. Must be zero exactly when the two
    /// positions are equal, and positive otherwise.
    fn token_cost(&self, src_pos: usize, tgt_pos: usize) -> i64;

    /// Added to the cost while the chirality bits of the two states differ.
    fn direction_penalty(&self) -> i64 {
        1
    }

    /// The number of token features, not counting the trailing chirality
    /// feature.
    fn num_features(&self) -> usize;

    /// The feature a token at `src_pos` with goal `tgt_pos` counts toward.
    fn token_feature(&self, src_pos: usize, tgt_pos: usize) -> usize;
}

#[derive(Error, Debug, PartialEq)]
pub enum HeuristicError {
    #[error("A distance profile must not be empty")]
    EmptyProfile,
    #[error("The weight of distance zero must be zero, got {0}")]
    NonZeroAtZero(i64),
    #[error("The weight of distance {distance} must be positive, got {weight}")]
    NonPositiveWeight { distance: usize, weight: i64 },
}

/// Token costs that depend only on the distance between the token and its
/// goal cell. The table is precomputed over every pair of cells.
#[derive(Debug, Clone)]
pub struct DistanceWeights {
    size: usize,
    by_distance: Box<[i64]>,
    cost: Box<[i64]>,
    feature: Box<[u32]>,
}

impl DistanceWeights {
    /// Weights from a cost per distance. Distances past the end of the profile
    /// reuse its last entry.
    ///
    /// # Errors
    ///
    /// If the profile is empty, charges for a token on its goal cell, or
    /// charges nothing for a misplaced token.
    pub fn from_distance_weights(
        geometry: &HexGeometry,
        by_distance: &[i64],
    ) -> Result<Self, HeuristicError> {
        let (&at_zero, rest) = by_distance
            .split_first()
            .ok_or(HeuristicError::EmptyProfile)?;
        if at_zero != 0 {
            return Err(HeuristicError::NonZeroAtZero(at_zero));
        }
        if let Some((i, &weight)) = rest.iter().enumerate().find(|&(_, &weight)| weight <= 0) {
            return Err(HeuristicError::NonPositiveWeight {
                distance: i + 1,
                weight,
            });
        }

        let max_distance = geometry.diameter() as usize;
        let by_distance = (0..=max_distance)
            .map(|d| by_distance[d.min(by_distance.len() - 1)])
            .collect::<Box<[_]>>();

        let size = geometry.size();
        let mut cost = vec![0; size * size].into_boxed_slice();
        let mut feature = vec![0; size * size].into_boxed_slice();
        for a in 0..size {
            for b in 0..size {
                let d = geometry.dist(a, b);
                cost[a * size + b] = by_distance[d as usize];
                feature[a * size + b] = d;
            }
        }

        Ok(Self {
            size,
            by_distance,
            cost,
            feature,
        })
    }

    /// Weights from a floating point profile multiplied by `scale` and
    /// rounded.
    ///
    /// # Errors
    ///
    /// See [`DistanceWeights::from_distance_weights`].
    pub fn from_profile(
        geometry: &HexGeometry,
        profile: &[f64],
        scale: f64,
    ) -> Result<Self, HeuristicError> {
        let by_distance = profile
            .iter()
            .map(|&w| (w * scale).round() as i64)
            .collect::<Vec<_>>();
        Self::from_distance_weights(geometry, &by_distance)
    }

    /// Each token costs `scale` times its distance.
    ///
    /// # Panics
    ///
    /// If `scale` is not positive.
    #[must_use]
    pub fn linear(geometry: &HexGeometry, scale: i64) -> Self {
        assert!(scale > 0, "linear weights need a positive scale");
        let by_distance = (0..=i64::from(geometry.diameter()))
            .map(|d| d * scale)
            .collect::<Vec<_>>();
        // A positive scale always yields a valid profile
        match Self::from_distance_weights(geometry, &by_distance) {
            Ok(weights) => weights,
            Err(e) => unreachable!("{e}"),
        }
    }

    /// The default profile, [`CONVEX_PROFILE`] at [`EVAL_SCALE`].
    #[must_use]
    pub fn convex(geometry: &HexGeometry) -> Self {
        match Self::from_profile(geometry, &CONVEX_PROFILE, EVAL_SCALE) {
            Ok(weights) => weights,
            Err(e) => unreachable!("{e}"),
        }
    }

    /// The weight charged for each distance, from zero up to the board's
    /// diameter.
    #[must_use]
    pub fn by_distance(&self) -> &[i64] {
        &self.by_distance
    }
}

impl Heuristic for DistanceWeights {
    #[inline(always)]
    fn token_cost(&self, src_pos: usize, tgt_pos: usize) -> i64 {
        self.cost[src_pos * self.size + tgt_pos]
    }

    fn num_features(&self) -> usize {
        self.by_distance.len()
    }

    #[inline(always)]
    fn token_feature(&self, src_pos: usize, tgt_pos: usize) -> usize {
        self.feature[src_pos * self.size + tgt_pos] as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_weights() {
        let geometry = HexGeometry::new(4).unwrap();
        let weights = DistanceWeights::linear(&geometry, 10);
        assert_eq!(weights.by_distance(), &[0, 10, 20, 30]);
        for a in 0..geometry.size() {
            for b in 0..geometry.size() {
                assert_eq!(
                    weights.token_cost(a, b),
                    10 * i64::from(geometry.dist(a, b))
                );
                assert_eq!(weights.token_feature(a, b), geometry.dist(a, b) as usize);
            }
        }
    }

    #[test]
    fn test_convex_weights_increase() {
        let geometry = HexGeometry::new(6).unwrap();
        let weights = DistanceWeights::convex(&geometry);
        assert_eq!(weights.by_distance()[0], 0);
        assert_eq!(weights.by_distance()[1], 64);
        assert!(weights.by_distance().windows(2).all(|w| w[0] < w[1]));
        assert_eq!(weights.num_features(), 6);
    }

    #[test]
    fn test_short_profile_extends_last_entry() {
        let geometry = HexGeometry::new(5).unwrap();
        let weights = DistanceWeights::from_distance_weights(&geometry, &[0, 3]).unwrap();
        assert_eq!(weights.by_distance(), &[0, 3, 3, 3, 3]);
    }

    #[test]
    fn test_rejects_invalid_profiles() {
        let geometry = HexGeometry::new(3).unwrap();
        assert_eq!(
            DistanceWeights::from_distance_weights(&geometry, &[]).unwrap_err(),
            HeuristicError::EmptyProfile
        );
        assert_eq!(
            DistanceWeights::from_distance_weights(&geometry, &[1, 2]).unwrap_err(),
            HeuristicError::NonZeroAtZero(1)
        );
        assert_eq!(
            DistanceWeights::from_distance_weights(&geometry, &[0, 2, 0]).unwrap_err(),
            HeuristicError::NonPositiveWeight {
                distance: 2,
                weight: 0
            }
        );
        assert!(DistanceWeights::from_profile(&geometry, &[0.0, 0.001], 64.0).is_err());
    }
}
