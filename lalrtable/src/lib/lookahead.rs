// Licensed under the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use lalrgrammar::{Grammar, Item, SymIdx};
use vob::Vob;

use crate::{
    digraph::{digraph, transpose},
    stategraph::StateGraph,
    StIdx,
};

/// LALR(1) lookahead sets, computed relationally: the nonterminal transitions of the LR(0)
/// automaton are numbered densely ("goto edges"), each gets a follow row F, and F is closed
/// first under the `reads` relation (nullable gotos out of an edge's target) and then under
/// the transposed `includes` relation (rules whose body ends in this edge's nonterminal,
/// modulo a nullable tail). Each reduction's lookahead row is the union of F over the goto
/// edges recorded for it by `lookback`.
pub struct Lookaheads {
    tokens_len: usize,
    la: Vec<Vob>,
    /// Per state, where its reductions' rows start in `la`.
    offsets: Vec<usize>,
    /// Goto edges grouped by nonterminal: the edges of nonterminal offset `v` are
    /// `from_to[goto_map[v]..goto_map[v + 1]]`, sorted by source state.
    goto_map: Vec<usize>,
    from_to: Vec<(StIdx, StIdx)>,
    default_gotos: Vec<StIdx>,
}

fn map_goto(goto_map: &[usize], from_to: &[(StIdx, StIdx)], var: usize, st: StIdx) -> usize {
    let range = &from_to[goto_map[var]..goto_map[var + 1]];
    goto_map[var] + range.binary_search_by_key(&st, |x| x.0).unwrap()
}

impl Lookaheads {
    pub fn new(grm: &Grammar, sg: &StateGraph) -> Self {
        let nstates = sg.all_states_len();
        let ntokens = grm.tokens_len();
        let nvars = grm.vars_len();

        let mut offsets = Vec::with_capacity(nstates + 1);
        let mut nreds = 0;
        for i in 0..nstates {
            offsets.push(nreds);
            nreds += sg.reductions(StIdx::from(i)).len();
        }
        offsets.push(nreds);

        // Number the goto edges, grouped by nonterminal. Within a group the source states are
        // ascending, which map_goto's binary search relies on.
        let mut counts = vec![0_usize; nvars];
        for i in 0..nstates {
            for &dst in sg.shifts(StIdx::from(i)) {
                let sym = sg.accessing_symbol(dst);
                if !grm.is_token(sym) {
                    counts[grm.var_offset(sym)] += 1;
                }
            }
        }
        let mut goto_map = vec![0_usize; nvars + 1];
        for v in 0..nvars {
            goto_map[v + 1] = goto_map[v] + counts[v];
        }
        let ngotos = goto_map[nvars];
        let mut from_to = vec![(StIdx(0), StIdx(0)); ngotos];
        let mut fill = goto_map[..nvars].to_vec();
        for i in 0..nstates {
            let st = StIdx::from(i);
            for &dst in sg.shifts(st) {
                let sym = sg.accessing_symbol(dst);
                if !grm.is_token(sym) {
                    let v = grm.var_offset(sym);
                    from_to[fill[v]] = (st, dst);
                    fill[v] += 1;
                }
            }
        }

        // F starts as the terminals shiftable straight out of each edge's target; gotos on
        // nullable nonterminals out of the target are `reads` edges.
        let mut f = vec![Vob::from_elem(false, ntokens); ngotos];
        let mut reads: Vec<Vec<usize>> = vec![Vec::new(); ngotos];
        for (e, &(_, dst)) in from_to.iter().enumerate() {
            for &j in sg.shifts(dst) {
                let sym = sg.accessing_symbol(j);
                if grm.is_token(sym) {
                    f[e].set(usize::from(sym), true);
                } else if grm.nullable(sym) {
                    reads[e].push(map_goto(&goto_map, &from_to, grm.var_offset(sym), dst));
                }
            }
        }
        // End-of-input follows the goal goto out of the start state.
        let goal_e = map_goto(
            &goto_map,
            &from_to,
            grm.var_offset(grm.goal_sym()),
            sg.start_state(),
        );
        f[goal_e].set(0, true);
        digraph(&mut f, &reads);

        // Walk every rule body along the shift chain from each edge of its lhs: the end of the
        // walk names the reduction this edge is a lookback of; walking backwards over the
        // nullable tail yields the `includes` edges.
        let mut includes: Vec<Vec<usize>> = vec![Vec::new(); ngotos];
        let mut lookback: Vec<Vec<usize>> = vec![Vec::new(); nreds];
        let mut trail: Vec<StIdx> = Vec::new();
        for (e, &(from, dst)) in from_to.iter().enumerate() {
            let lhs = sg.accessing_symbol(dst);
            for &ridx in grm.derives(lhs) {
                let rhs = grm.rule_rhs(ridx);
                trail.clear();
                let mut st = from;
                for it in rhs {
                    if let Item::Symbol(sym) = *it {
                        trail.push(st);
                        st = sg.edge(st, sym).unwrap();
                    }
                }
                let pos = sg.reductions(st).iter().position(|&r| r == ridx).unwrap();
                lookback[offsets[usize::from(st)] + pos].push(e);
                for (k, it) in rhs.iter().enumerate().rev() {
                    if let Item::Symbol(sym) = *it {
                        if grm.is_token(sym) {
                            break;
                        }
                        includes[e].push(map_goto(
                            &goto_map,
                            &from_to,
                            grm.var_offset(sym),
                            trail[k],
                        ));
                        if !grm.nullable(sym) {
                            break;
                        }
                    }
                }
            }
        }
        digraph(&mut f, &transpose(&includes));

        let mut la = vec![Vob::from_elem(false, ntokens); nreds];
        for (r, es) in lookback.iter().enumerate() {
            for &e in es {
                la[r].or(&f[e]);
            }
        }

        // Per nonterminal, the destination most of its gotos lead to; the lowest state wins
        // ties. Nonterminals without gotos (at least $accept) keep state 0.
        let mut default_gotos = vec![StIdx(0); nvars];
        let mut state_count = vec![0_usize; nstates];
        for v in 0..nvars {
            let range = &from_to[goto_map[v]..goto_map[v + 1]];
            if range.is_empty() {
                continue;
            }
            for c in state_count.iter_mut() {
                *c = 0;
            }
            for &(_, to) in range {
                state_count[usize::from(to)] += 1;
            }
            let mut max = 0;
            for (s, &c) in state_count.iter().enumerate() {
                if c > max {
                    max = c;
                    default_gotos[v] = StIdx::from(s);
                }
            }
        }

        Lookaheads {
            tokens_len: ntokens,
            la,
            offsets,
            goto_map,
            from_to,
            default_gotos,
        }
    }

    /// Return the lookahead rows for `stidx`'s reductions, in the same order as the state
    /// graph lists them.
    pub fn state_lookaheads(&self, stidx: StIdx) -> &[Vob] {
        let i = usize::from(stidx);
        &self.la[self.offsets[i]..self.offsets[i + 1]]
    }

    /// Return the goto edges of nonterminal `sym` as `(from, to)` pairs, sorted by source
    /// state.
    pub fn gotos(&self, sym: SymIdx) -> &[(StIdx, StIdx)] {
        let v = usize::from(sym) - self.tokens_len;
        &self.from_to[self.goto_map[v]..self.goto_map[v + 1]]
    }

    /// Return the default goto destination for nonterminal `sym`.
    pub fn default_goto(&self, sym: SymIdx) -> StIdx {
        self.default_gotos[usize::from(sym) - self.tokens_len]
    }
}

#[cfg(test)]
mod test {
    use super::Lookaheads;
    use crate::stategraph::{lr0_stategraph, StateGraph};
    use lalrgrammar::{Grammar, GrammarBuilder, RIdx};
    use crate::StIdx;

    fn has(
        grm: &Grammar,
        sg: &StateGraph,
        la: &Lookaheads,
        st: StIdx,
        ridx: RIdx,
        should_be: &[&str],
    ) {
        let pos = sg
            .reductions(st)
            .iter()
            .position(|&r| r == ridx)
            .unwrap();
        let row = &la.state_lookaheads(st)[pos];
        for i in 0..grm.tokens_len() {
            let n = grm.sym_name(lalrgrammar::SymIdx::from(i));
            let expected = should_be.contains(&n);
            if row[i] != expected {
                panic!("bit for {} is {} in {}", n, row[i], grm.pp_rule(ridx));
            }
        }
    }

    #[test]
    fn test_matched_pairs() {
        let grm = GrammarBuilder::new()
            .token("'a'")
            .token("'b'")
            .rule("S", &["'a'", "S", "'b'"])
            .rule("S", &[])
            .start("S")
            .build()
            .unwrap();
        let sg = lr0_stategraph(&grm);
        let la = Lookaheads::new(&grm, &sg);

        let a = grm.sym_idx("'a'").unwrap();
        let b = grm.sym_idx("'b'").unwrap();
        let s = grm.sym_idx("S").unwrap();
        let s0 = sg.start_state();
        let s1 = sg.edge(s0, a).unwrap();
        let s3 = sg.edge(s1, s).unwrap();
        let s4 = sg.edge(s3, b).unwrap();
        assert_eq!(sg.edge(s1, a), Some(s1));

        // The empty rule reduces on $end at the top level but on 'b' under an 'a'.
        has(&grm, &sg, &la, s0, RIdx(4), &["$end"]);
        has(&grm, &sg, &la, s1, RIdx(4), &["'b'"]);
        has(&grm, &sg, &la, s4, RIdx(3), &["$end", "'b'"]);

        // Both gotos on S lead to distinct states; the lowest-numbered most frequent
        // destination is the default.
        assert_eq!(la.gotos(s).len(), 2);
        assert_eq!(la.default_goto(s), sg.edge(s0, s).unwrap());
    }

    #[test]
    fn test_includes_chain() {
        let grm = GrammarBuilder::new()
            .token("'a'")
            .rule("S", &["A"])
            .rule("A", &["'a'"])
            .start("S")
            .build()
            .unwrap();
        let sg = lr0_stategraph(&grm);
        let la = Lookaheads::new(&grm, &sg);
        let s1 = sg.edge(sg.start_state(), grm.sym_idx("'a'").unwrap()).unwrap();
        let s3 = sg.edge(sg.start_state(), grm.sym_idx("A").unwrap()).unwrap();
        // $end reaches A's reduction only through the includes relation (S's body ends in A).
        has(&grm, &sg, &la, s1, RIdx(4), &["$end"]);
        has(&grm, &sg, &la, s3, RIdx(3), &["$end"]);
    }

    #[test]
    fn test_reads_nullable_goto() {
        let grm = GrammarBuilder::new()
            .token("'a'")
            .token("'b'")
            .token("'c'")
            .token("'x'")
            .rule("S", &["'a'", "A", "B", "'c'"])
            .rule("A", &["'x'"])
            .rule("B", &["'b'"])
            .rule("B", &[])
            .start("S")
            .build()
            .unwrap();
        let sg = lr0_stategraph(&grm);
        let la = Lookaheads::new(&grm, &sg);

        let s_a = sg.edge(sg.start_state(), grm.sym_idx("'a'").unwrap()).unwrap();
        let s_x = sg.edge(s_a, grm.sym_idx("'x'").unwrap()).unwrap();
        let s_aa = sg.edge(s_a, grm.sym_idx("A").unwrap()).unwrap();
        // B is nullable, so 'c' flows back into the A goto's follow row via reads.
        has(&grm, &sg, &la, s_x, RIdx(4), &["'b'", "'c'"]);
        has(&grm, &sg, &la, s_aa, RIdx(6), &["'c'"]);
    }
}
