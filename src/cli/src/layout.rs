//! Starting layouts read from text files: the token on each cell in row
//! order, separated by whitespace, with `0` for the hole.

use std::{fs, path::Path};

use beam_search::puzzle::PuzzleState;
use color_eyre::eyre::{WrapErr, eyre};
use hex_geometry::HexGeometry;

pub fn parse(text: &str) -> color_eyre::Result<Vec<u32>> {
    text.split_whitespace()
        .enumerate()
        .map(|(cell, word)| {
            word.parse()
                .map_err(|e| eyre!("Invalid token {word:?} on cell {cell}: {e}"))
        })
        .collect()
}

/// Read and validate the layout in `path` for this board.
pub fn load(
    geometry: &HexGeometry,
    path: &Path,
    direction: bool,
) -> color_eyre::Result<PuzzleState> {
    let text = fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
    let pos_to_tok = parse(&text)?;
    PuzzleState::from_layout(geometry, pos_to_tok, direction)
        .wrap_err_with(|| format!("Invalid layout in {}", path.display()))
}
