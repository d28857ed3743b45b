use beam_search::{
    heuristic::{DistanceWeights, Heuristic},
    puzzle::{Move, PuzzleState, Side},
    search_state::SearchState,
    solver::{BeamSearch, BeamSearchConfig, BeamSearchError},
};
use hex_geometry::HexGeometry;
use log::info;

fn config(width: u64, threads: usize, max_steps: usize) -> BeamSearchConfig {
    BeamSearchConfig {
        width,
        threads,
        max_steps,
        hash_table_bits: Some(16),
        min_tree_capacity: 1 << 12,
        seed: 1,
        ..Default::default()
    }
}

fn scrambled(geometry: &HexGeometry, rotations: &[usize]) -> PuzzleState {
    let mut state = PuzzleState::solved(geometry, false);
    for &rotation in rotations {
        state.do_move(geometry, rotation);
    }
    state
}

/// Replays `moves` on both sides and checks that they meet, then undoes the
/// target moves on the source to check that it lands on the starting target.
fn assert_solves(geometry: &HexGeometry, src: &PuzzleState, tgt: &PuzzleState, moves: &[Move]) {
    let mut src_after = src.clone();
    let mut tgt_after = tgt.clone();
    for &move_ in moves {
        match move_.side() {
            Side::Source => src_after.do_move(geometry, move_.rotation()),
            Side::Target => tgt_after.do_move(geometry, move_.rotation()),
        }
    }
    assert_eq!(src_after, tgt_after);

    for move_ in moves.iter().rev().filter(|m| m.side() == Side::Target) {
        src_after.undo_move(geometry, move_.rotation());
    }
    assert_eq!(&src_after, tgt);
}

#[test_log::test]
fn test_three_move_scramble() {
    let geometry = HexGeometry::new(3).unwrap();
    let weights = DistanceWeights::convex(&geometry);
    let src = scrambled(&geometry, &[0, 1, 2]);
    let tgt = PuzzleState::solved(&geometry, false);
    let root = SearchState::new(&geometry, &weights, src.clone(), tgt.clone()).unwrap();

    let mut search = BeamSearch::new(config(64, 1, 3));
    let solution = search.solve(&root).unwrap();
    info!("Solved with {:?}", solution.moves);

    assert!(!solution.moves.is_empty());
    assert!(solution.moves.len() <= 3);
    assert_eq!(solution.stats.len(), solution.moves.len());
    assert_solves(&geometry, &src, &tgt, &solution.moves);
}

#[test_log::test]
fn test_four_move_scramble_on_two_threads() {
    let geometry = HexGeometry::new(3).unwrap();
    let weights = DistanceWeights::convex(&geometry);
    let src = scrambled(&geometry, &[0, 1, 2, 1]);
    let tgt = PuzzleState::solved(&geometry, false);
    let root = SearchState::new(&geometry, &weights, src.clone(), tgt.clone()).unwrap();

    let mut search = BeamSearch::new(config(1024, 2, 12));
    let solution = search.solve(&root).unwrap();
    assert_solves(&geometry, &src, &tgt, &solution.moves);

    let mut state = root.clone();
    for &move_ in &solution.moves {
        state.do_move(move_);
    }
    assert!(state.is_solved());
    assert!(state.is_consistent());
}

#[test_log::test]
fn test_already_solved() {
    let geometry = HexGeometry::new(3).unwrap();
    let weights = DistanceWeights::linear(&geometry, 1);
    let root = SearchState::new(
        &geometry,
        &weights,
        PuzzleState::solved(&geometry, true),
        PuzzleState::solved(&geometry, true),
    )
    .unwrap();

    let solution = BeamSearch::new(config(16, 1, 4)).solve(&root).unwrap();
    assert!(solution.moves.is_empty());
    assert!(solution.stats.is_empty());
}

#[test_log::test]
fn test_step_limit() {
    let geometry = HexGeometry::new(4).unwrap();
    let weights = DistanceWeights::convex(&geometry);
    let mut rng = fastrand::Rng::with_seed(11);
    let root = SearchState::new(
        &geometry,
        &weights,
        PuzzleState::random(&geometry, false, &mut rng),
        PuzzleState::solved(&geometry, false),
    )
    .unwrap();

    let error = BeamSearch::new(config(8, 1, 3)).solve(&root).unwrap_err();
    assert_eq!(error, BeamSearchError::StepLimitExceeded { max_steps: 3 });
}

#[test_log::test]
fn test_fragmented_frontier() {
    let geometry = HexGeometry::new(3).unwrap();
    let weights = DistanceWeights::convex(&geometry);
    let src = scrambled(&geometry, &[0, 1, 2, 4, 0, 2, 3, 5]);
    let tgt = PuzzleState::solved(&geometry, false);
    let root = SearchState::new(&geometry, &weights, src.clone(), tgt.clone()).unwrap();

    let width = 1024;
    let threads = 4;
    // Tiny buffers force frequent flushes and several rounds of growth
    let mut search = BeamSearch::new(BeamSearchConfig {
        min_tree_capacity: 256,
        max_frontier_trees: 4,
        ..config(width, threads, 40)
    });
    let solution = search.solve(&root).unwrap();
    assert_solves(&geometry, &src, &tgt, &solution.moves);

    for stats in &solution.stats {
        assert!(stats.leaves <= width + threads as u64);
        assert!(stats.tree_bytes >= 2 * stats.children as usize);
        assert!(stats.low <= stats.high);
    }
    assert_eq!(solution.stats[0].leaves, 1);
    assert_eq!(solution.stats[0].children, Move::COUNT as u64);
}

#[test_log::test]
fn test_feature_snapshots() {
    let geometry = HexGeometry::new(3).unwrap();
    let weights = DistanceWeights::convex(&geometry);
    let src = scrambled(&geometry, &[3, 4, 5]);
    let root = SearchState::new(
        &geometry,
        &weights,
        src,
        PuzzleState::solved(&geometry, false),
    )
    .unwrap();

    let mut search = BeamSearch::new(BeamSearchConfig {
        features_save_probability: 1.0,
        ..config(64, 1, 6)
    });
    let solution = search.solve(&root).unwrap();

    let leaves = solution.stats.iter().map(|stats| stats.leaves).sum::<u64>();
    assert_eq!(solution.saved_features.len() as u64, leaves);
    assert_eq!(solution.saved_features[0].features, root.features());
    for snapshot in &solution.saved_features {
        assert_eq!(snapshot.features.len(), weights.num_features() + 1);
        let tokens = snapshot.features[..weights.num_features()]
            .iter()
            .sum::<u32>();
        assert_eq!(tokens as usize, geometry.size() - 1);
    }
    assert!(
        solution
            .saved_features
            .windows(2)
            .all(|pair| pair[0].step <= pair[1].step)
    );
}

#[test_log::test]
fn test_search_is_reusable() {
    let geometry = HexGeometry::new(3).unwrap();
    let weights = DistanceWeights::convex(&geometry);
    let tgt = PuzzleState::solved(&geometry, false);
    let mut search = BeamSearch::new(config(256, 2, 10));

    for rotations in [[0, 1, 2], [5, 4, 3], [1, 1, 1]] {
        let src = scrambled(&geometry, &rotations);
        let root = SearchState::new(&geometry, &weights, src.clone(), tgt.clone()).unwrap();
        let solution = search.solve(&root).unwrap();
        assert_solves(&geometry, &src, &tgt, &solution.moves);
    }
}

#[test_log::test]
fn test_config_from_toml() {
    let config: BeamSearchConfig = toml::from_str(
        r"
        width = 500
        threads = 3
        hash_table_bits = 20
        features_save_probability = 0.25
        ",
    )
    .unwrap();
    assert_eq!(config.width, 500);
    assert_eq!(config.threads, 3);
    assert_eq!(config.hash_table_bits, Some(20));
    assert_eq!(config.max_frontier_trees, BeamSearchConfig::default().max_frontier_trees);

    let text = toml::to_string(&config).unwrap();
    assert_eq!(toml::from_str::<BeamSearchConfig>(&text).unwrap(), config);
}
