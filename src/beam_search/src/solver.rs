use super::{
    canonical_fsm::{CanonicalFSM, CanonicalFSMState},
    euler_tour::{Edge, EulerTour, TreePool},
    hash_table::{self, FingerprintTable},
    heuristic::Heuristic,
    histogram::{BoundaryAcceptor, Cutoff, Histogram},
    puzzle::Move,
    search_state::SearchState,
};
use crate::{start, success, working};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::{
    mem,
    num::NonZeroUsize,
    panic,
    sync::{Mutex, PoisonError},
    thread,
    time::{Duration, Instant},
};
use thiserror::Error;

/// Bytes an output tour must have left before a frontier node is expanded:
/// twelve children written as push/pop pairs and the root's closing pop, on
/// top of two bytes per level of the path.
const FLUSH_MARGIN: usize = 32;

/// The smallest tour buffer a search can start with.
pub const MIN_TREE_CAPACITY: usize = 4 * FLUSH_MARGIN;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeamSearchConfig {
    /// Expected number of frontier nodes kept at each depth.
    pub width: u64,
    /// Worker threads per depth. Zero uses every available core.
    pub threads: usize,
    /// Longest solution searched for.
    pub max_steps: usize,
    /// Log2 of the number of fingerprint slots. `None` scales the table to
    /// the board.
    pub hash_table_bits: Option<u32>,
    /// Bytes per Euler tour buffer at the start of a search.
    pub min_tree_capacity: usize,
    /// Frontiers fragmented into more buffers than this double the buffer
    /// capacity.
    pub max_frontier_trees: usize,
    /// Chance that a kept frontier node records its features.
    pub features_save_probability: f64,
    pub seed: u64,
}

impl Default for BeamSearchConfig {
    fn default() -> Self {
        Self {
            width: 1 << 14,
            threads: 0,
            max_steps: 10_000,
            hash_table_bits: None,
            min_tree_capacity: 1 << 17,
            max_frontier_trees: 128,
            features_save_probability: 0.0,
            seed: 0,
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BeamSearchError {
    #[error("The beam width must be positive")]
    ZeroWidth,
    #[error(
        "Tour buffers of {capacity} bytes are too small; at least {} are needed",
        MIN_TREE_CAPACITY
    )]
    TreeCapacityTooSmall { capacity: usize },
    #[error(
        "A fingerprint table of 2^{bits} slots is too large; at most 2^{} are supported",
        hash_table::MAX_BITS
    )]
    HashTableTooLarge { bits: u32 },
    #[error("No solution found within {max_steps} steps")]
    StepLimitExceeded { max_steps: usize },
    #[error("Every child at step {step} was a duplicate, leaving an empty frontier")]
    FrontierExhausted { step: usize },
    #[error("A solved state was counted at step {step} but is missing from the frontier")]
    SolutionNotExtracted { step: usize },
}

/// The feature vector of a frontier node, recorded for training.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeatureSnapshot {
    pub step: usize,
    pub features: Vec<u32>,
}

/// What one depth of the search looked like.
#[derive(Clone, Debug, PartialEq)]
pub struct DepthStats {
    pub step: usize,
    /// Frontier nodes kept and expanded.
    pub leaves: u64,
    /// Novel children produced.
    pub children: u64,
    /// Smallest and largest child values.
    pub low: i64,
    pub high: i64,
    /// The threshold the children will be filtered by at the next depth.
    pub cutoff: Cutoff,
    pub num_trees: usize,
    pub tree_bytes: usize,
    pub elapsed: Duration,
}

#[derive(Clone, Debug, Default)]
pub struct BeamSearchSolution {
    /// Moves to apply to the root in order. Source and target moves are
    /// interleaved as the search found them.
    pub moves: Vec<Move>,
    pub saved_features: Vec<FeatureSnapshot>,
    pub stats: Vec<DepthStats>,
}

/// A reusable beam searcher. The fingerprint table survives between calls to
/// [`BeamSearch::solve`] and is wiped at the start of each.
pub struct BeamSearch {
    config: BeamSearchConfig,
    table: Option<FingerprintTable>,
}

/// State shared by the workers of one depth.
struct Expansion<'s, 'a, H> {
    root: &'s SearchState<'a, H>,
    pool: &'s TreePool,
    table: &'s FingerprintTable,
    queue: Mutex<Vec<EulerTour>>,
    step: usize,
    cutoff: Cutoff,
    features_save_probability: f64,
}

#[derive(Default)]
struct WorkerOutput {
    histogram: Histogram,
    trees: Vec<EulerTour>,
    leaves: u64,
    snapshots: Vec<FeatureSnapshot>,
}

impl<H: Heuristic> Expansion<'_, '_, H> {
    fn next_tour(&self) -> Option<EulerTour> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
    }

    /// Drain the queue, replaying each tour from the root. Every frontier
    /// node that survives the cutoff is expanded by one move, and its novel
    /// children are appended to this worker's output tours.
    fn run(&self, seed: u64) -> WorkerOutput {
        let canonical_fsm = CanonicalFSM;
        let mut rng = fastrand::Rng::with_seed(seed);
        let mut acceptor = BoundaryAcceptor::new(self.cutoff, BoundaryAcceptor::EAGER_PHASE);
        let mut output = WorkerOutput::default();

        let mut state = self.root.clone();
        let mut moves: Vec<Move> = Vec::with_capacity(self.step + 1);
        let mut fsm_states = Vec::with_capacity(self.step + 2);
        fsm_states.push(CanonicalFSMState::default());

        let mut current = self.pool.acquire();
        // Number of moves of the current path already written to `current`
        let mut committed = 0;

        while let Some(tour) = self.next_tour() {
            for edge in tour.edges() {
                match edge {
                    Edge::Push(move_) => {
                        state.do_move(move_);
                        fsm_states.push(canonical_fsm.transition(fsm_states[moves.len()], move_));
                        moves.push(move_);
                    }
                    Edge::Pop => {
                        if moves.len() == self.step && acceptor.accept(state.value()) {
                            if current.remaining() < 2 * self.step + FLUSH_MARGIN {
                                for _ in 0..=committed {
                                    current.push_pop();
                                }
                                output
                                    .trees
                                    .push(mem::replace(&mut current, self.pool.acquire()));
                                committed = 0;
                            }
                            self.expand(
                                &mut state,
                                &moves,
                                fsm_states[moves.len()],
                                &mut current,
                                &mut committed,
                                &mut output,
                                &mut rng,
                            );
                        }

                        let Some(move_) = moves.pop() else {
                            break;
                        };
                        if committed > moves.len() {
                            current.push_pop();
                            committed -= 1;
                        }
                        fsm_states.pop();
                        state.undo_move(move_);
                    }
                }
            }
            debug_assert!(moves.is_empty());
            debug_assert_eq!(&state, self.root);
            self.pool.release(tour);
        }

        if current.is_empty() {
            self.pool.release(current);
        } else {
            current.push_pop();
            output.trees.push(current);
        }
        output
    }

    #[allow(clippy::too_many_arguments)]
    #[inline(always)]
    fn expand(
        &self,
        state: &mut SearchState<'_, H>,
        path: &[Move],
        fsm_state: CanonicalFSMState,
        current: &mut EulerTour,
        committed: &mut usize,
        output: &mut WorkerOutput,
        rng: &mut fastrand::Rng,
    ) {
        output.leaves += 1;
        if self.features_save_probability > 0.0 && rng.f64() < self.features_save_probability {
            output.snapshots.push(FeatureSnapshot {
                step: self.step,
                features: state.features(),
            });
        }

        let allowed = CanonicalFSM.allowed_moves(fsm_state);
        debug_assert!(!allowed.is_empty());
        for move_ in allowed.iter() {
            let plan = state.plan_move(move_);
            if !self.table.insert_if_new(plan.hash) {
                continue;
            }
            output.histogram.record(plan.value);
            // Ancestors are only written once they have a child to hold
            while *committed < path.len() {
                current.push_move(path[*committed]);
                *committed += 1;
            }
            current.push_move(move_);
            current.push_pop();
        }
    }
}

impl BeamSearch {
    #[must_use]
    pub fn new(config: BeamSearchConfig) -> Self {
        Self {
            config,
            table: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &BeamSearchConfig {
        &self.config
    }

    fn validate(&self) -> Result<(), BeamSearchError> {
        let config = &self.config;
        if config.width == 0 {
            return Err(BeamSearchError::ZeroWidth);
        }
        if config.min_tree_capacity < MIN_TREE_CAPACITY {
            return Err(BeamSearchError::TreeCapacityTooSmall {
                capacity: config.min_tree_capacity,
            });
        }
        if let Some(bits) = config
            .hash_table_bits
            .filter(|&bits| bits > hash_table::MAX_BITS)
        {
            return Err(BeamSearchError::HashTableTooLarge { bits });
        }
        Ok(())
    }

    fn num_threads(&self) -> usize {
        if self.config.threads != 0 {
            return self.config.threads;
        }
        match thread::available_parallelism() {
            Ok(threads) => threads.get(),
            Err(e) => {
                warn!("Failed to get available parallelism; defaulting to 1: {e}");
                NonZeroUsize::MIN.get()
            }
        }
    }

    /// Search for a sequence of moves that joins the source and target
    /// layouts of `root`.
    ///
    /// # Errors
    ///
    /// If the configuration is unusable, if the frontier dies out, or if no
    /// solution is found within the configured number of steps. See
    /// [`BeamSearchError`].
    pub fn solve<H: Heuristic>(
        &mut self,
        root: &SearchState<'_, H>,
    ) -> Result<BeamSearchSolution, BeamSearchError> {
        self.validate()?;
        let threads = self.num_threads();
        let config = &self.config;
        info!(
            start!("Beam searching {} cells with width {} on {} threads"),
            root.geometry().size(),
            config.width,
            threads
        );
        let start = Instant::now();

        if root.is_solved() {
            info!(success!("Already solved"));
            return Ok(BeamSearchSolution::default());
        }

        let mut rng = fastrand::Rng::with_seed(config.seed);
        let bits = config
            .hash_table_bits
            .unwrap_or_else(|| FingerprintTable::default_bits(root.geometry().size()));
        let fill = rng.u64(..);
        let table = match self.table.take() {
            Some(mut table) if table.bits() == bits => {
                table.reset(fill);
                table
            }
            stale => {
                drop(stale);
                FingerprintTable::new(bits, fill)
            }
        };
        let table = &*self.table.insert(table);

        let pool = TreePool::new(config.min_tree_capacity);
        let mut frontier = vec![pool.acquire()];
        frontier[0].push_pop();
        let mut cutoff = Cutoff::KEEP_ALL;
        let mut saved_features = vec![];
        let mut stats = vec![];

        for step in 0..config.max_steps {
            let depth_start = Instant::now();
            if frontier.len() > config.max_frontier_trees
                || pool.capacity() < 4 * (2 * step + FLUSH_MARGIN)
            {
                pool.grow();
            }
            // Workers pop from the back, so the largest trees go first
            frontier.sort_by_key(EulerTour::len);

            let expansion = Expansion {
                root,
                pool: &pool,
                table,
                queue: Mutex::new(mem::take(&mut frontier)),
                step,
                cutoff,
                features_save_probability: config.features_save_probability,
            };
            let outputs = thread::scope(|s| {
                let handles = (0..threads)
                    .map(|_| {
                        let seed = rng.u64(..);
                        let expansion = &expansion;
                        s.spawn(move || expansion.run(seed))
                    })
                    .collect::<Vec<_>>();
                handles
                    .into_iter()
                    .map(|handle| handle.join().unwrap_or_else(|e| panic::resume_unwind(e)))
                    .collect::<Vec<_>>()
            });

            let mut histogram = Histogram::new();
            let mut leaves = 0;
            for output in outputs {
                histogram.merge(&output.histogram);
                leaves += output.leaves;
                frontier.extend(output.trees);
                saved_features.extend(output.snapshots);
            }

            let (Some(low), Some(high)) = (histogram.low(), histogram.high()) else {
                debug!(working!("Step {}: no novel children"), step);
                return Err(BeamSearchError::FrontierExhausted { step });
            };
            cutoff = histogram.cutoff(config.width);
            let depth_stats = DepthStats {
                step,
                leaves,
                children: histogram.total(),
                low,
                high,
                cutoff,
                num_trees: frontier.len(),
                tree_bytes: frontier.iter().map(EulerTour::len).sum(),
                elapsed: depth_start.elapsed(),
            };
            debug!(
                working!("Step {}: {} leaves, {} children valued {}..{}, cutoff {} (p = {:.3}), {} trees of {} bytes in {:.3}s"),
                step,
                depth_stats.leaves,
                depth_stats.children,
                depth_stats.low,
                depth_stats.high,
                depth_stats.cutoff.threshold,
                depth_stats.cutoff.keep_probability,
                depth_stats.num_trees,
                depth_stats.tree_bytes,
                depth_stats.elapsed.as_secs_f64()
            );
            stats.push(depth_stats);

            if low == 0 {
                let moves = extract_solution(root, &frontier, step + 1)
                    .ok_or(BeamSearchError::SolutionNotExtracted { step: step + 1 })?;
                info!(
                    success!("Solution of {} moves found in {:.3}s"),
                    moves.len(),
                    start.elapsed().as_secs_f64()
                );
                debug!("");
                return Ok(BeamSearchSolution {
                    moves,
                    saved_features,
                    stats,
                });
            }
        }

        Err(BeamSearchError::StepLimitExceeded {
            max_steps: config.max_steps,
        })
    }
}

/// Replay the frontier looking for a solved node at `depth`, and return the
/// path to it.
fn extract_solution<H: Heuristic>(
    root: &SearchState<'_, H>,
    frontier: &[EulerTour],
    depth: usize,
) -> Option<Vec<Move>> {
    let mut state = root.clone();
    let mut moves = Vec::with_capacity(depth);
    for tour in frontier {
        for edge in tour.edges() {
            match edge {
                Edge::Push(move_) => {
                    state.do_move(move_);
                    moves.push(move_);
                }
                Edge::Pop => {
                    if moves.len() == depth && state.is_solved() {
                        return Some(moves);
                    }
                    let Some(move_) = moves.pop() else {
                        break;
                    };
                    state.undo_move(move_);
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        heuristic::DistanceWeights,
        puzzle::{PuzzleState, Side},
    };
    use hex_geometry::HexGeometry;

    fn small_config() -> BeamSearchConfig {
        BeamSearchConfig {
            width: 64,
            threads: 1,
            max_steps: 8,
            hash_table_bits: Some(16),
            min_tree_capacity: 1 << 10,
            ..Default::default()
        }
    }

    #[test]
    fn test_extract_solution_finds_solved_leaf() {
        let geometry = HexGeometry::new(3).unwrap();
        let weights = DistanceWeights::linear(&geometry, 1);
        let mut src = PuzzleState::solved(&geometry, false);
        src.do_move(&geometry, 4);
        let root = SearchState::new(
            &geometry,
            &weights,
            src,
            PuzzleState::solved(&geometry, false),
        )
        .unwrap();

        let pool = TreePool::new(64);
        let mut tour = pool.acquire();
        for move_ in [Move::on(Side::Source, 0), Move::on(Side::Source, 2)] {
            tour.push_move(move_);
            tour.push_pop();
        }
        let solving = Move::on(Side::Source, 4).inverse();
        tour.push_move(solving);
        tour.push_pop();
        tour.push_pop();

        assert_eq!(extract_solution(&root, &[tour], 1), Some(vec![solving]));
    }

    #[test]
    fn test_zero_width_is_rejected() {
        let geometry = HexGeometry::new(2).unwrap();
        let weights = DistanceWeights::convex(&geometry);
        let root = SearchState::new(
            &geometry,
            &weights,
            PuzzleState::solved(&geometry, false),
            PuzzleState::solved(&geometry, false),
        )
        .unwrap();
        let mut search = BeamSearch::new(BeamSearchConfig {
            width: 0,
            ..small_config()
        });
        assert_eq!(search.solve(&root).unwrap_err(), BeamSearchError::ZeroWidth);
    }

    #[test]
    fn test_unusable_config_is_rejected() {
        let geometry = HexGeometry::new(2).unwrap();
        let weights = DistanceWeights::convex(&geometry);
        let mut src = PuzzleState::solved(&geometry, false);
        src.do_move(&geometry, 1);
        let root = SearchState::new(
            &geometry,
            &weights,
            src,
            PuzzleState::solved(&geometry, false),
        )
        .unwrap();

        let mut search = BeamSearch::new(BeamSearchConfig {
            min_tree_capacity: 0,
            ..small_config()
        });
        assert_eq!(
            search.solve(&root).unwrap_err(),
            BeamSearchError::TreeCapacityTooSmall { capacity: 0 }
        );

        let config: BeamSearchConfig = toml::from_str("hash_table_bits = 64").unwrap();
        let mut search = BeamSearch::new(BeamSearchConfig {
            hash_table_bits: config.hash_table_bits,
            ..small_config()
        });
        assert_eq!(
            search.solve(&root).unwrap_err(),
            BeamSearchError::HashTableTooLarge { bits: 64 }
        );

        // The smallest accepted buffers still solve
        let mut search = BeamSearch::new(BeamSearchConfig {
            min_tree_capacity: MIN_TREE_CAPACITY,
            ..small_config()
        });
        assert_eq!(search.solve(&root).unwrap().moves.len(), 1);
    }

    #[test]
    fn test_single_move_scramble() {
        let geometry = HexGeometry::new(3).unwrap();
        let weights = DistanceWeights::convex(&geometry);
        let mut src = PuzzleState::solved(&geometry, false);
        src.do_move(&geometry, 2);
        let root = SearchState::new(
            &geometry,
            &weights,
            src,
            PuzzleState::solved(&geometry, false),
        )
        .unwrap();

        let mut search = BeamSearch::new(small_config());
        let solution = search.solve(&root).unwrap();
        assert_eq!(solution.moves.len(), 1);
        assert_eq!(solution.stats.len(), 1);
        assert_eq!(solution.stats[0].leaves, 1);
        assert_eq!(solution.stats[0].low, 0);

        let mut state = root.clone();
        for &move_ in &solution.moves {
            state.do_move(move_);
        }
        assert!(state.is_solved());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: BeamSearchConfig = toml::from_str("").unwrap();
        assert_eq!(config, BeamSearchConfig::default());
    }
}
