//! The text form of a solution. Each character names one move relative to
//! the chirality of the side it is applied to: source moves are written in
//! order, target moves are written reversed after them, so the string reads
//! as a single path from the scramble to the target layout.

use beam_search::puzzle::{Move, Side};

fn shifted(base: u8, offset: usize) -> char {
    char::from(base + offset as u8)
}

/// The characters for `moves`, starting from the given chirality bits.
#[must_use]
pub fn encode(src_direction: bool, tgt_direction: bool, moves: &[Move]) -> String {
    let mut src_direction = src_direction;
    let mut tgt_direction = tgt_direction;
    let mut forward = String::with_capacity(moves.len());
    let mut backward = Vec::new();
    for move_ in moves {
        let rotation = move_.rotation();
        match move_.side() {
            Side::Source => {
                forward.push(if src_direction {
                    shifted(b'A', rotation)
                } else {
                    shifted(b'1', (rotation + 1) % 6)
                });
                src_direction = !src_direction;
            }
            Side::Target => {
                backward.push(if tgt_direction {
                    shifted(b'1', (rotation + 4) % 6)
                } else {
                    shifted(b'A', (rotation + 3) % 6)
                });
                tgt_direction = !tgt_direction;
            }
        }
    }
    forward.extend(backward.into_iter().rev());
    forward
}

/// `n:<moves>`, the line printed for a solved board.
#[must_use]
pub fn solution_line(n: usize, src_direction: bool, tgt_direction: bool, moves: &[Move]) -> String {
    format!("{n}:{}", encode(src_direction, tgt_direction, moves))
}
