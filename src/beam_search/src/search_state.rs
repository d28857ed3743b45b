use super::heuristic::Heuristic;
use super::puzzle::{Move, PuzzleState, Side};
use hex_geometry::HexGeometry;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SearchStateError {
    #[error("The board has {expected} cells but the source has {src} and the target has {tgt}")]
    SizeMismatch {
        expected: usize,
        src: usize,
        tgt: usize,
    },
    #[error("The source and target layouts have different permutation parity")]
    ParityMismatch,
}

/// Fingerprint term of one token sitting on `src_pos` in the source and on
/// `tgt_pos` in the target.
#[inline(always)]
fn hash_pos(src_pos: usize, tgt_pos: usize) -> u64 {
    let mut x = (((src_pos as u64) << 32) | tgt_pos as u64).wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

/// The outcome of evaluating a move without keeping it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Plan {
    pub value: i64,
    pub hash: u64,
    pub solved: bool,
}

/// A pair of puzzle states searched toward each other. Moves may rotate
/// either side; the pair is solved once both layouts and both chirality bits
/// agree. The heuristic cost and the fingerprint are kept up to date on
/// every move by touching only the two tokens the move displaces.
pub struct SearchState<'a, H> {
    geometry: &'a HexGeometry,
    heuristic: &'a H,
    src: PuzzleState,
    tgt: PuzzleState,
    cost: i64,
    hash: u64,
}

impl<'a, H: Heuristic> SearchState<'a, H> {
    /// # Errors
    ///
    /// If either layout does not fit the board, or if the two layouts have
    /// different parity, in which case no sequence of moves joins them.
    pub fn new(
        geometry: &'a HexGeometry,
        heuristic: &'a H,
        src: PuzzleState,
        tgt: PuzzleState,
    ) -> Result<Self, SearchStateError> {
        let expected = geometry.size();
        if src.pos_to_tok().len() != expected || tgt.pos_to_tok().len() != expected {
            return Err(SearchStateError::SizeMismatch {
                expected,
                src: src.pos_to_tok().len(),
                tgt: tgt.pos_to_tok().len(),
            });
        }
        if src.parity() != tgt.parity() {
            return Err(SearchStateError::ParityMismatch);
        }

        let mut state = Self {
            geometry,
            heuristic,
            src,
            tgt,
            cost: 0,
            hash: 0,
        };
        (state.cost, state.hash) = state.recompute();
        Ok(state)
    }

    /// Cost and fingerprint computed from scratch.
    #[must_use]
    pub fn recompute(&self) -> (i64, u64) {
        (1..self.geometry.size() as u32).fold((0, 0), |(cost, hash), token| {
            let src_pos = self.src.position_of(token);
            let tgt_pos = self.tgt.position_of(token);
            (
                cost + self.heuristic.token_cost(src_pos, tgt_pos),
                hash ^ hash_pos(src_pos, tgt_pos),
            )
        })
    }

    /// Whether the maintained cost and fingerprint match a full recount.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.src.is_consistent()
            && self.tgt.is_consistent()
            && self.recompute() == (self.cost, self.hash)
    }

    #[must_use]
    pub fn geometry(&self) -> &'a HexGeometry {
        self.geometry
    }

    #[must_use]
    pub fn src(&self) -> &PuzzleState {
        &self.src
    }

    #[must_use]
    pub fn tgt(&self) -> &PuzzleState {
        &self.tgt
    }

    /// The summed token costs, without the chirality term.
    #[inline(always)]
    #[must_use]
    pub fn cost(&self) -> i64 {
        self.cost
    }

    #[inline(always)]
    #[must_use]
    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// The value the beam ranks states by. Zero exactly when solved.
    #[inline(always)]
    #[must_use]
    pub fn value(&self) -> i64 {
        if self.src.direction() == self.tgt.direction() {
            self.cost
        } else {
            self.cost + self.heuristic.direction_penalty()
        }
    }

    #[inline(always)]
    #[must_use]
    pub fn is_solved(&self) -> bool {
        self.value() == 0
    }

    /// One count per heuristic feature over the non-hole tokens, followed by
    /// a final entry that is one while the chirality bits disagree.
    #[must_use]
    pub fn features(&self) -> Vec<u32> {
        let mut features = vec![0; self.heuristic.num_features() + 1];
        for token in 1..self.geometry.size() as u32 {
            let feature = self
                .heuristic
                .token_feature(self.src.position_of(token), self.tgt.position_of(token));
            features[feature] += 1;
        }
        if self.src.direction() != self.tgt.direction() {
            let last = features.len() - 1;
            features[last] = 1;
        }
        features
    }

    #[inline(always)]
    fn toggle_token(&mut self, token: u32, sign: i64) {
        let src_pos = self.src.position_of(token);
        let tgt_pos = self.tgt.position_of(token);
        self.cost += sign * self.heuristic.token_cost(src_pos, tgt_pos);
        self.hash ^= hash_pos(src_pos, tgt_pos);
    }

    #[inline(always)]
    pub fn do_move(&mut self, move_: Move) {
        let side = match move_.side() {
            Side::Source => &self.src,
            Side::Target => &self.tgt,
        };
        let triangle = side.triangle(self.geometry, move_.rotation());
        let lead_token = side.token_at(triangle.lead);
        let trail_token = side.token_at(triangle.trail);

        self.toggle_token(lead_token, -1);
        self.toggle_token(trail_token, -1);
        match move_.side() {
            Side::Source => self.src.apply_triangle(triangle),
            Side::Target => self.tgt.apply_triangle(triangle),
        }
        self.toggle_token(lead_token, 1);
        self.toggle_token(trail_token, 1);
    }

    /// Cancel a previous `do_move(move_)`.
    #[inline(always)]
    pub fn undo_move(&mut self, move_: Move) {
        self.do_move(move_.inverse());
    }

    /// Value, fingerprint and solvedness after `move_`. The state is left
    /// exactly as it was.
    #[inline(always)]
    pub fn plan_move(&mut self, move_: Move) -> Plan {
        self.do_move(move_);
        let plan = Plan {
            value: self.value(),
            hash: self.hash,
            solved: self.is_solved(),
        };
        self.undo_move(move_);
        plan
    }
}

impl<H> Clone for SearchState<'_, H> {
    fn clone(&self) -> Self {
        Self {
            geometry: self.geometry,
            heuristic: self.heuristic,
            src: self.src.clone(),
            tgt: self.tgt.clone(),
            cost: self.cost,
            hash: self.hash,
        }
    }
}

impl<H> PartialEq for SearchState<'_, H> {
    fn eq(&self, other: &Self) -> bool {
        self.src == other.src
            && self.tgt == other.tgt
            && self.cost == other.cost
            && self.hash == other.hash
    }
}

impl<H> fmt::Debug for SearchState<'_, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchState")
            .field("src", &self.src)
            .field("tgt", &self.tgt)
            .field("cost", &self.cost)
            .field("hash", &format_args!("{:#018x}", self.hash))
            .finish_non_exhaustive()
    }
}
