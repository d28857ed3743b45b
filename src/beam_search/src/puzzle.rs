use hex_geometry::HexGeometry;
use std::fmt;
use thiserror::Error;

/// Which of the two puzzle states of a search a move rotates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    /// The scrambled state being solved forward.
    Source,
    /// The goal state being unsolved backward.
    Target,
}

/// One of the twelve moves of a search. Indices below six rotate the source
/// state around its hole in that direction, the rest rotate the target state
/// in direction `index - 6`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move(u8);

impl Move {
    pub const COUNT: usize = 12;

    #[must_use]
    pub fn new(index: u8) -> Option<Self> {
        (usize::from(index) < Self::COUNT).then_some(Self(index))
    }

    /// # Panics
    ///
    /// If `rotation` is not a direction.
    #[must_use]
    pub fn on(side: Side, rotation: usize) -> Self {
        assert!(rotation < 6, "rotation {rotation} is not a direction");
        match side {
            Side::Source => Self(rotation as u8),
            Side::Target => Self(6 + rotation as u8),
        }
    }

    pub(crate) const fn from_index_unchecked(index: u8) -> Self {
        debug_assert!((index as usize) < Self::COUNT);
        Self(index)
    }

    #[inline(always)]
    #[must_use]
    pub fn index(self) -> u8 {
        self.0
    }

    #[inline(always)]
    #[must_use]
    pub fn side(self) -> Side {
        if self.0 < 6 { Side::Source } else { Side::Target }
    }

    /// The direction of the move around the hole, in `0..6`.
    #[inline(always)]
    #[must_use]
    pub fn rotation(self) -> usize {
        usize::from(self.0 % 6)
    }

    /// The move that cancels this one when applied right after it.
    #[inline(always)]
    #[must_use]
    pub fn inverse(self) -> Self {
        Self(6 * (self.0 / 6) + (self.0 + 3) % 6)
    }

    pub fn all() -> impl Iterator<Item = Self> {
        (0..Self::COUNT as u8).map(Self)
    }
}

impl fmt::Debug for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.side() {
            Side::Source => write!(f, "S{}", self.rotation()),
            Side::Target => write!(f, "T{}", self.rotation()),
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PuzzleStateError {
    #[error("Expected a layout of {expected} cells but got {actual}")]
    WrongSize { expected: usize, actual: usize },
    #[error("Token {token} is out of range for a board of {size} cells")]
    TokenOutOfRange { token: u32, size: usize },
    #[error("Token {token} appears more than once in the layout")]
    DuplicateToken { token: u32 },
    #[error("The layout has the wrong permutation parity and cannot reach the target")]
    ParityMismatch,
}

/// The three cells a move cycles: the hole and its two neighbors spanning a
/// triangle with it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Triangle {
    pub hole: usize,
    pub lead: usize,
    pub trail: usize,
}

/// A permutation of tokens over the cells of a board together with its
/// chirality bit. Token 0 is the hole.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PuzzleState {
    pos_to_tok: Box<[u32]>,
    tok_to_pos: Box<[u32]>,
    direction: bool,
}

/// Parity of a permutation given as an array, `true` if odd.
pub(crate) fn permutation_parity(perm: &[u32]) -> bool {
    let mut visited = vec![false; perm.len()];
    let mut odd = false;
    for start in 0..perm.len() {
        if visited[start] {
            continue;
        }
        let mut len = 0;
        let mut i = start;
        while !visited[i] {
            visited[i] = true;
            i = perm[i] as usize;
            len += 1;
        }
        odd ^= len % 2 == 0;
    }
    odd
}

impl PuzzleState {
    /// The target layout with the given chirality.
    #[must_use]
    pub fn solved(geometry: &HexGeometry, direction: bool) -> Self {
        Self {
            pos_to_tok: geometry.target_pos_to_tok().into(),
            tok_to_pos: geometry.target_tok_to_pos().into(),
            direction,
        }
    }

    /// Build a state from an explicit layout, where `pos_to_tok[cell]` is the
    /// token on that cell.
    ///
    /// # Errors
    ///
    /// If the layout is not a permutation of the board's tokens, or if its
    /// parity differs from the target layout's, which no sequence of moves
    /// can change.
    pub fn from_layout(
        geometry: &HexGeometry,
        pos_to_tok: Vec<u32>,
        direction: bool,
    ) -> Result<Self, PuzzleStateError> {
        let size = geometry.size();
        if pos_to_tok.len() != size {
            return Err(PuzzleStateError::WrongSize {
                expected: size,
                actual: pos_to_tok.len(),
            });
        }
        let mut tok_to_pos = vec![u32::MAX; size];
        for (pos, &token) in pos_to_tok.iter().enumerate() {
            let slot = tok_to_pos
                .get_mut(token as usize)
                .ok_or(PuzzleStateError::TokenOutOfRange { token, size })?;
            if *slot != u32::MAX {
                return Err(PuzzleStateError::DuplicateToken { token });
            }
            *slot = pos as u32;
        }
        if permutation_parity(&pos_to_tok) != permutation_parity(geometry.target_pos_to_tok()) {
            return Err(PuzzleStateError::ParityMismatch);
        }
        Ok(Self {
            pos_to_tok: pos_to_tok.into_boxed_slice(),
            tok_to_pos: tok_to_pos.into_boxed_slice(),
            direction,
        })
    }

    /// A uniformly random layout with the target's permutation parity.
    #[must_use]
    pub fn random(geometry: &HexGeometry, direction: bool, rng: &mut fastrand::Rng) -> Self {
        let target_parity = permutation_parity(geometry.target_pos_to_tok());
        let mut pos_to_tok = (0..geometry.size() as u32).collect::<Box<[_]>>();
        loop {
            rng.shuffle(&mut pos_to_tok);
            if permutation_parity(&pos_to_tok) == target_parity {
                break;
            }
        }
        let mut tok_to_pos = vec![0; geometry.size()].into_boxed_slice();
        for (pos, &token) in pos_to_tok.iter().enumerate() {
            tok_to_pos[token as usize] = pos as u32;
        }
        Self {
            pos_to_tok,
            tok_to_pos,
            direction,
        }
    }

    /// Apply `num_moves` random rotations to the target layout, never
    /// undoing the previous rotation. Returns the state and the rotations
    /// applied.
    #[must_use]
    pub fn scramble(
        geometry: &HexGeometry,
        direction: bool,
        num_moves: usize,
        rng: &mut fastrand::Rng,
    ) -> (Self, Vec<usize>) {
        let mut state = Self::solved(geometry, direction);
        let mut rotations: Vec<usize> = Vec::with_capacity(num_moves);
        while rotations.len() < num_moves {
            let rotation = rng.usize(0..6);
            if rotations.last().is_some_and(|&last| (last + 3) % 6 == rotation) {
                continue;
            }
            state.do_move(geometry, rotation);
            rotations.push(rotation);
        }
        (state, rotations)
    }

    #[inline(always)]
    #[must_use]
    pub fn pos_to_tok(&self) -> &[u32] {
        &self.pos_to_tok
    }

    #[inline(always)]
    #[must_use]
    pub fn tok_to_pos(&self) -> &[u32] {
        &self.tok_to_pos
    }

    #[inline(always)]
    #[must_use]
    pub fn token_at(&self, pos: usize) -> u32 {
        self.pos_to_tok[pos]
    }

    #[inline(always)]
    #[must_use]
    pub fn position_of(&self, token: u32) -> usize {
        self.tok_to_pos[token as usize] as usize
    }

    #[inline(always)]
    #[must_use]
    pub fn hole(&self) -> usize {
        self.tok_to_pos[0] as usize
    }

    #[inline(always)]
    #[must_use]
    pub fn direction(&self) -> bool {
        self.direction
    }

    /// `true` if the layout is an odd permutation.
    #[must_use]
    pub fn parity(&self) -> bool {
        permutation_parity(&self.pos_to_tok)
    }

    /// Whether the two lookup arrays are mutual inverses.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.pos_to_tok.len() == self.tok_to_pos.len()
            && self
                .tok_to_pos
                .iter()
                .enumerate()
                .all(|(token, &pos)| self.pos_to_tok.get(pos as usize) == Some(&(token as u32)))
    }

    /// The cells moved by rotating in `rotation` from the current hole. The
    /// chirality bit picks which neighbor trails, so that repeating a
    /// rotation keeps turning the same way.
    #[inline(always)]
    pub(crate) fn triangle(&self, geometry: &HexGeometry, rotation: usize) -> Triangle {
        let hole = self.hole();
        let trail_rotation = if self.direction {
            (rotation + 5) % 6
        } else {
            (rotation + 1) % 6
        };
        Triangle {
            hole,
            lead: geometry.neighbor(hole, rotation),
            trail: geometry.neighbor(hole, trail_rotation),
        }
    }

    /// Cycle `hole -> lead -> trail -> hole` and flip the chirality bit.
    #[inline(always)]
    pub(crate) fn apply_triangle(&mut self, triangle: Triangle) {
        let Triangle { hole, lead, trail } = triangle;
        let lead_token = self.pos_to_tok[lead];
        let trail_token = self.pos_to_tok[trail];

        self.pos_to_tok[hole] = trail_token;
        self.pos_to_tok[lead] = 0;
        self.pos_to_tok[trail] = lead_token;
        self.tok_to_pos[0] = lead as u32;
        self.tok_to_pos[lead_token as usize] = trail as u32;
        self.tok_to_pos[trail_token as usize] = hole as u32;

        self.direction = !self.direction;
    }

    /// Rotate around the hole in `rotation`.
    pub fn do_move(&mut self, geometry: &HexGeometry, rotation: usize) {
        let triangle = self.triangle(geometry, rotation);
        self.apply_triangle(triangle);
    }

    /// Cancel a previous `do_move` with the same rotation.
    pub fn undo_move(&mut self, geometry: &HexGeometry, rotation: usize) {
        self.do_move(geometry, (rotation + 3) % 6);
    }

    /// The same layout with the tokens of two cells exchanged, which flips
    /// the parity.
    #[cfg(test)]
    pub(crate) fn with_cells_swapped(mut self, a: usize, b: usize) -> Self {
        self.pos_to_tok.swap(a, b);
        let (token_a, token_b) = (self.pos_to_tok[a], self.pos_to_tok[b]);
        self.tok_to_pos[token_a as usize] = a as u32;
        self.tok_to_pos[token_b as usize] = b as u32;
        self
    }
}
