// Licensed under the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Build LALR(1) parse tables from a [`Grammar`](lalrgrammar::Grammar). Table construction
//! runs in stages, each usable on its own: [`lr0_stategraph`] builds the LR(0) collection,
//! [`Lookaheads`] computes per-reduction lookahead sets relationally, [`StateTable`] resolves
//! conflicts into one action per state and symbol, and [`PackedTables`] squeezes the result
//! into row-displacement arrays. [`from_grammar`] runs all four.

mod closure;
mod digraph;
mod lookahead;
pub mod pack;
pub mod stategraph;
pub mod statetable;

use lalrgrammar::Grammar;

pub use crate::lookahead::Lookaheads;
pub use crate::pack::PackedTables;
pub use crate::stategraph::{lr0_stategraph, StateGraph};
pub use crate::statetable::{Action, ActionKind, StateTable, Suppressed};

/// StIdx is a wrapper for a 32-bit state index.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StIdx(u32);

impl From<usize> for StIdx {
    fn from(v: usize) -> Self {
        if v > u32::MAX as usize {
            panic!("Overflow");
        }
        StIdx(v as u32)
    }
}

impl From<u32> for StIdx {
    fn from(v: u32) -> Self {
        StIdx(v)
    }
}

impl From<StIdx> for usize {
    fn from(st: StIdx) -> Self {
        st.0 as usize
    }
}

impl From<StIdx> for u32 {
    fn from(st: StIdx) -> Self {
        st.0
    }
}

/// Build all table stages for `grm`.
pub fn from_grammar(grm: &Grammar) -> (StateGraph, StateTable, PackedTables) {
    let sg = stategraph::lr0_stategraph(grm);
    let la = lookahead::Lookaheads::new(grm, &sg);
    let st = StateTable::new(grm, &sg, &la);
    let pt = PackedTables::new(grm, &st, &la);
    (sg, st, pt)
}
