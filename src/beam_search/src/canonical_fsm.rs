//! A finite state machine over the last rotation applied to each side. It
//! forbids the one move per side that would immediately cancel the previous
//! move on that side, trimming the trivial backtracking branch from every
//! node without looking at the rest of the path.

use super::puzzle::Move;

/// Marks a side that has not been moved yet.
const NO_MOVE: u8 = 6;
const NUM_STATES: usize = 7 * 7;

// Bit N is set when `Move` N is allowed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MoveMask(u16);

impl MoveMask {
    pub const ALL: Self = Self((1 << Move::COUNT) - 1);

    #[inline(always)]
    #[must_use]
    pub fn contains(self, move_: Move) -> bool {
        (self.0 >> move_.index()) & 1 != 0
    }

    #[must_use]
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline(always)]
    pub fn iter(self) -> impl Iterator<Item = Move> {
        Move::all().filter(move |&move_| self.contains(move_))
    }
}

/// The pair (last source rotation, last target rotation), each possibly
/// [`NO_MOVE`], packed as `src * 7 + tgt`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CanonicalFSMState(u8);

impl Default for CanonicalFSMState {
    fn default() -> Self {
        Self(NO_MOVE * 7 + NO_MOVE)
    }
}

impl CanonicalFSMState {
    #[must_use]
    pub fn last_src_rotation(self) -> Option<usize> {
        let src = self.0 / 7;
        (src != NO_MOVE).then_some(usize::from(src))
    }

    #[must_use]
    pub fn last_tgt_rotation(self) -> Option<usize> {
        let tgt = self.0 % 7;
        (tgt != NO_MOVE).then_some(usize::from(tgt))
    }
}

const NEXT_STATE_LOOKUP: [[u8; Move::COUNT]; NUM_STATES] = {
    let mut table = [[0; Move::COUNT]; NUM_STATES];
    let mut src = 0;
    while src < 7 {
        let mut tgt = 0;
        while tgt < 7 {
            let mut rotation = 0;
            while rotation < 6 {
                table[src * 7 + tgt][rotation] = (rotation * 7 + tgt) as u8;
                table[src * 7 + tgt][6 + rotation] = (src * 7 + rotation) as u8;
                rotation += 1;
            }
            tgt += 1;
        }
        src += 1;
    }
    table
};

const ALLOWED_MOVES: [u16; NUM_STATES] = {
    let mut table = [(1 << Move::COUNT) - 1; NUM_STATES];
    let mut src = 0;
    while src < 7 {
        let mut tgt = 0;
        while tgt < 7 {
            if src != NO_MOVE as usize {
                table[src * 7 + tgt] ^= 1 << ((src + 3) % 6);
            }
            if tgt != NO_MOVE as usize {
                table[src * 7 + tgt] ^= 1 << (6 + (tgt + 3) % 6);
            }
            tgt += 1;
        }
        src += 1;
    }
    table
};

/// The move-legality automaton. All of its tables are computed at compile
/// time, so it is a zero-sized handle.
#[derive(Clone, Copy, Debug, Default)]
pub struct CanonicalFSM;

impl CanonicalFSM {
    /// The state after applying `move_`, or `None` if `move_` would cancel
    /// the previous move on its side.
    #[inline(always)]
    #[must_use]
    pub fn next_state(
        self,
        current_fsm_state: CanonicalFSMState,
        move_: Move,
    ) -> Option<CanonicalFSMState> {
        self.allowed_moves(current_fsm_state)
            .contains(move_)
            .then(|| self.transition(current_fsm_state, move_))
    }

    /// The state after applying `move_`, whether or not it was allowed.
    #[inline(always)]
    #[must_use]
    pub fn transition(self, current_fsm_state: CanonicalFSMState, move_: Move) -> CanonicalFSMState {
        CanonicalFSMState(
            NEXT_STATE_LOOKUP[usize::from(current_fsm_state.0)][usize::from(move_.index())],
        )
    }

    #[inline(always)]
    #[must_use]
    pub fn allowed_moves(self, current_fsm_state: CanonicalFSMState) -> MoveMask {
        MoveMask(ALLOWED_MOVES[usize::from(current_fsm_state.0)])
    }
}
