mod layout;
mod notation;

use std::{fs, path::PathBuf};

use beam_search::{
    heuristic::{DistanceWeights, EVAL_SCALE},
    puzzle::PuzzleState,
    search_state::SearchState,
    solver::{BeamSearch, BeamSearchConfig},
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::WrapErr;
use env_logger::TimestampPrecision;
use hex_geometry::HexGeometry;
use itertools::Itertools;
use log::{LevelFilter, debug, info};

/// Solves sliding-token puzzles on wrapped hexagonal boards with a parallel
/// beam search
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// The search configuration file to use, in TOML format. Flags override
    /// its fields.
    #[arg(long, short = 'c', value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scramble a board and search for a solution.
    Solve {
        /// Board size parameter; the board has 3n^2 - 3n + 1 cells.
        #[arg(short, long, default_value_t = 3)]
        n: usize,
        /// Scramble with this many random moves instead of a uniformly
        /// random layout.
        #[arg(long, conflicts_with = "layout")]
        scramble_moves: Option<usize>,
        /// Start from the layout in this file: one token per cell in row
        /// order, whitespace separated, 0 for the hole.
        #[arg(long, value_name = "FILE")]
        layout: Option<PathBuf>,
        /// Seed of the scramble.
        #[arg(long, default_value_t = 0)]
        scramble_seed: u64,
        /// Chirality bit of the starting state before scrambling.
        #[arg(long)]
        src_direction: bool,
        /// Chirality bit of the target state.
        #[arg(long)]
        tgt_direction: bool,
        #[arg(long, value_enum, default_value_t = Weights::Convex)]
        weights: Weights,
        #[command(flatten)]
        overrides: SearchOverrides,
    },
    /// Print the solved layout of a board, one row per line.
    Board {
        #[arg(short, long, default_value_t = 3)]
        n: usize,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Weights {
    /// Cost proportional to each token's distance from its goal.
    Linear,
    /// Far tokens cost disproportionately more.
    Convex,
}

#[derive(Args)]
struct SearchOverrides {
    /// Expected number of states kept per depth.
    #[arg(long)]
    width: Option<u64>,
    /// Worker threads; zero uses every core.
    #[arg(long)]
    threads: Option<usize>,
    /// Seed of the search.
    #[arg(long)]
    seed: Option<u64>,
    /// Longest solution searched for.
    #[arg(long)]
    max_steps: Option<usize>,
}

impl SearchOverrides {
    fn apply(self, config: &mut BeamSearchConfig) {
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(max_steps) = self.max_steps {
            config.max_steps = max_steps;
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> color_eyre::Result<BeamSearchConfig> {
    let Some(path) = path else {
        return Ok(BeamSearchConfig::default());
    };
    let text = fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
    toml::from_str(&text).wrap_err("Failed to parse search configuration file")
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        })
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    let mut config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Solve {
            n,
            scramble_moves,
            layout,
            scramble_seed,
            src_direction,
            tgt_direction,
            weights,
            overrides,
        } => {
            overrides.apply(&mut config);
            let geometry = HexGeometry::new(n)?;
            let weights = match weights {
                Weights::Linear => DistanceWeights::linear(&geometry, EVAL_SCALE as i64),
                Weights::Convex => DistanceWeights::convex(&geometry),
            };

            let mut rng = fastrand::Rng::with_seed(scramble_seed);
            let src = match (layout, scramble_moves) {
                (Some(path), _) => layout::load(&geometry, &path, src_direction)?,
                (None, Some(num_moves)) => {
                    let (src, rotations) =
                        PuzzleState::scramble(&geometry, src_direction, num_moves, &mut rng);
                    debug!("Scrambled with rotations {}", rotations.iter().join(" "));
                    src
                }
                (None, None) => PuzzleState::random(&geometry, src_direction, &mut rng),
            };
            let tgt = PuzzleState::solved(&geometry, tgt_direction);
            let root = SearchState::new(&geometry, &weights, src, tgt)?;
            info!("Initial value {}", root.value());

            let mut search = BeamSearch::new(config);
            let solution = search.solve(&root)?;
            debug!("Moves: {}", solution.moves.iter().map(|m| format!("{m:?}")).join(" "));
            println!(
                "{}",
                notation::solution_line(
                    geometry.n(),
                    root.src().direction(),
                    root.tgt().direction(),
                    &solution.moves
                )
            );
        }
        Commands::Board { n } => {
            let geometry = HexGeometry::new(n)?;
            let width = geometry.size().to_string().len();
            for row in geometry.rows() {
                let indent = (2 * geometry.n() - 1 - row.len()) * (width + 1) / 2;
                println!(
                    "{:indent$}{}",
                    "",
                    row.iter()
                        .map(|&cell| format!("{:>width$}", geometry.target_pos_to_tok()[cell]))
                        .join(" ")
                );
            }
        }
    }
    Ok(())
}
