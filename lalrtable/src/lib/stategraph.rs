// Licensed under the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use fnv::FnvHashMap;
use lalrgrammar::{Grammar, ItIdx, Item, RIdx, SymIdx};

use crate::{closure::Closure, StIdx};

#[derive(Debug)]
struct CoreState {
    accessing_symbol: SymIdx,
    kernel: Vec<ItIdx>,
    /// Destination states, in ascending order of their accessing symbols.
    shifts: Vec<StIdx>,
    /// Rules completed in this state, in item order.
    reductions: Vec<RIdx>,
}

/// The LR(0) collection: per state, its kernel items, its shift edges and the rules it can
/// reduce. State 0 is the start state; every other state is identified by the symbol it is
/// reached on (its "accessing symbol") and its kernel.
#[derive(Debug)]
pub struct StateGraph {
    states: Vec<CoreState>,
}

impl StateGraph {
    /// How many states does this `StateGraph` contain?
    pub fn all_states_len(&self) -> usize {
        self.states.len()
    }

    /// Return this state graph's start state.
    pub fn start_state(&self) -> StIdx {
        StIdx(0)
    }

    /// Return the symbol `stidx` is reached on. For the start state this is symbol 0.
    pub fn accessing_symbol(&self, stidx: StIdx) -> SymIdx {
        self.states[usize::from(stidx)].accessing_symbol
    }

    /// Return the kernel items of `stidx`, in ascending order.
    pub fn kernel(&self, stidx: StIdx) -> &[ItIdx] {
        &self.states[usize::from(stidx)].kernel
    }

    /// Return the states reachable from `stidx` by a shift or goto, in ascending order of
    /// their accessing symbols.
    pub fn shifts(&self, stidx: StIdx) -> &[StIdx] {
        &self.states[usize::from(stidx)].shifts
    }

    /// Return the rules which can be reduced in `stidx`.
    pub fn reductions(&self, stidx: StIdx) -> &[RIdx] {
        &self.states[usize::from(stidx)].reductions
    }

    /// Return the state reached from `stidx` on `sym`, if any.
    pub fn edge(&self, stidx: StIdx, sym: SymIdx) -> Option<StIdx> {
        self.shifts(stidx)
            .iter()
            .find(|&&dst| self.accessing_symbol(dst) == sym)
            .copied()
    }

    /// How many edges does this `StateGraph` contain?
    pub fn all_edges_len(&self) -> usize {
        self.states.iter().fold(0, |a, x| a + x.shifts.len())
    }

    /// Return the state reached from the start state on the goal symbol. A parser accepts when
    /// it is in this state and the lookahead is the end-of-input token.
    pub fn final_state(&self, grm: &Grammar) -> StIdx {
        self.edge(self.start_state(), grm.goal_sym()).unwrap()
    }

    /// Pretty print this stategraph as a `String`.
    pub fn pp(&self, grm: &Grammar) -> String {
        let mut o = String::new();
        for (i, state) in self.states.iter().enumerate() {
            if i > 0 {
                o.push('\n');
            }
            o.push_str(&format!(
                "{}: accessed by {}\n",
                i,
                grm.sym_name(state.accessing_symbol)
            ));
            for &itidx in &state.kernel {
                let (ridx, dot) = item_rule(grm, itidx);
                o.push_str(&format!(
                    "   {} :",
                    grm.sym_name(grm.rule_lhs(ridx))
                ));
                for (j, it) in grm.rule_rhs(ridx).iter().enumerate() {
                    if j == dot {
                        o.push_str(" .");
                    }
                    if let Item::Symbol(sym) = *it {
                        o.push(' ');
                        o.push_str(grm.sym_name(sym));
                    }
                }
                if dot == grm.rule_len(ridx) {
                    o.push_str(" .");
                }
                o.push('\n');
            }
            for &dst in &state.shifts {
                o.push_str(&format!(
                    "   {} -> {}\n",
                    grm.sym_name(self.accessing_symbol(dst)),
                    usize::from(dst)
                ));
            }
            for &ridx in &state.reductions {
                o.push_str(&format!("   reduce by {}\n", grm.pp_rule(ridx)));
            }
        }
        o
    }
}

/// Map an item back to its rule and dot position by scanning forward to the rule's `End` slot.
fn item_rule(grm: &Grammar, itidx: ItIdx) -> (RIdx, usize) {
    let mut i = usize::from(itidx);
    loop {
        if let Item::End(ridx) = grm.item(ItIdx::from(i)) {
            let dot = usize::from(itidx) - usize::from(grm.rule_start(ridx));
            return (ridx, dot);
        }
        i += 1;
    }
}

/// Build the LR(0) collection for `grm`. States are discovered breadth first; within a state,
/// outgoing edges are created in ascending symbol order, so the numbering is deterministic.
pub fn lr0_stategraph(grm: &Grammar) -> StateGraph {
    let mut cl = Closure::new(grm);
    let mut states = vec![CoreState {
        accessing_symbol: grm.eof_sym(),
        kernel: vec![grm.rule_start(grm.start_rule())],
        shifts: Vec::new(),
        reductions: Vec::new(),
    }];
    // States with the same first kernel item hash to the same chain; a chain scan compares
    // full kernels.
    let mut kernel_index: FnvHashMap<ItIdx, Vec<StIdx>> = FnvHashMap::default();
    kernel_index.insert(grm.rule_start(grm.start_rule()), vec![StIdx(0)]);

    // Per-symbol kernel buffers, reused across states.
    let mut next: FnvHashMap<SymIdx, Vec<ItIdx>> = FnvHashMap::default();
    let mut stidx = 0;
    while stidx < states.len() {
        let closed = cl.close(grm, &states[stidx].kernel).to_vec();
        let mut reductions = Vec::new();
        let mut syms = Vec::new();
        for &itidx in &closed {
            match grm.item(itidx) {
                Item::End(ridx) => reductions.push(ridx),
                Item::Symbol(sym) => {
                    // No shift is recorded on $end: acceptance is handled via the final
                    // state, not a transition on symbol 0.
                    if sym == grm.eof_sym() {
                        continue;
                    }
                    let buf = next.entry(sym).or_default();
                    if buf.is_empty() {
                        syms.push(sym);
                    }
                    buf.push(ItIdx::from(usize::from(itidx) + 1));
                }
            }
        }
        syms.sort_unstable();
        let mut shifts = Vec::with_capacity(syms.len());
        for sym in syms {
            let kernel = std::mem::take(next.get_mut(&sym).unwrap());
            shifts.push(get_state(&mut states, &mut kernel_index, sym, kernel));
        }
        states[stidx].shifts = shifts;
        states[stidx].reductions = reductions;
        stidx += 1;
    }
    StateGraph { states }
}

fn get_state(
    states: &mut Vec<CoreState>,
    kernel_index: &mut FnvHashMap<ItIdx, Vec<StIdx>>,
    sym: SymIdx,
    kernel: Vec<ItIdx>,
) -> StIdx {
    let chain = kernel_index.entry(kernel[0]).or_default();
    for &cand in chain.iter() {
        if states[usize::from(cand)].kernel == kernel {
            return cand;
        }
    }
    let new = StIdx::from(states.len());
    chain.push(new);
    states.push(CoreState {
        accessing_symbol: sym,
        kernel,
        shifts: Vec::new(),
        reductions: Vec::new(),
    });
    new
}

#[cfg(test)]
mod test {
    use super::lr0_stategraph;
    use lalrgrammar::{GrammarBuilder, RIdx};

    #[test]
    fn test_single_rule() {
        let grm = GrammarBuilder::new()
            .token("'a'")
            .rule("S", &["'a'"])
            .start("S")
            .build()
            .unwrap();
        let sg = lr0_stategraph(&grm);
        // Start state, the state after 'a', and the final state reached on S.
        assert_eq!(sg.all_states_len(), 3);
        let s1 = sg.edge(sg.start_state(), grm.sym_idx("'a'").unwrap()).unwrap();
        let s2 = sg.edge(sg.start_state(), grm.sym_idx("S").unwrap()).unwrap();
        assert_eq!(sg.reductions(s1), &[RIdx(3)]);
        assert!(sg.shifts(s1).is_empty());
        assert!(sg.reductions(s2).is_empty());
        assert!(sg.shifts(s2).is_empty());
        assert_eq!(sg.final_state(&grm), s2);
        assert_eq!(sg.accessing_symbol(s1), grm.sym_idx("'a'").unwrap());
    }

    #[test]
    fn test_brackets() {
        // Taken from p13 of https://link.springer.com/article/10.1007/s00236-010-0115-6
        // (without state merging, the LR(0) collection has 7 states).
        let grm = GrammarBuilder::new()
            .token("OPEN_BRACKET")
            .token("CLOSE_BRACKET")
            .token("'a'")
            .token("'b'")
            .rule("A", &["OPEN_BRACKET", "A", "CLOSE_BRACKET"])
            .rule("A", &["'a'"])
            .rule("A", &["'b'"])
            .start("A")
            .build()
            .unwrap();
        let sg = lr0_stategraph(&grm);
        assert_eq!(sg.all_states_len(), 7);
        assert_eq!(sg.all_edges_len(), 9);

        let open = grm.sym_idx("OPEN_BRACKET").unwrap();
        let close = grm.sym_idx("CLOSE_BRACKET").unwrap();
        let a = grm.sym_idx("'a'").unwrap();
        let b = grm.sym_idx("'b'").unwrap();
        let rule_a = grm.sym_idx("A").unwrap();

        let s0 = sg.start_state();
        let s2 = sg.edge(s0, a).unwrap();
        let s3 = sg.edge(s0, b).unwrap();
        let s5 = sg.edge(s0, open).unwrap();
        // Identical kernels are deduplicated, so bracketed positions loop back.
        assert_eq!(s2, sg.edge(s5, a).unwrap());
        assert_eq!(s3, sg.edge(s5, b).unwrap());
        assert_eq!(s5, sg.edge(s5, open).unwrap());
        let s4 = sg.edge(s5, rule_a).unwrap();
        let s6 = sg.edge(s4, close).unwrap();
        assert_eq!(sg.reductions(s2), &[RIdx(4)]);
        assert_eq!(sg.reductions(s3), &[RIdx(5)]);
        assert_eq!(sg.reductions(s6), &[RIdx(3)]);
        assert_eq!(sg.final_state(&grm), sg.edge(s0, rule_a).unwrap());
    }

    #[test]
    fn test_pp() {
        let grm = GrammarBuilder::new()
            .token("'a'")
            .rule("S", &["'a'"])
            .start("S")
            .build()
            .unwrap();
        let sg = lr0_stategraph(&grm);
        let pp = sg.pp(&grm);
        assert!(pp.contains("0: accessed by $end"));
        assert!(pp.contains("$accept : . S $end"));
        assert!(pp.contains("reduce by S : 'a'"));
    }
}
