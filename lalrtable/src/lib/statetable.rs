// Licensed under the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::cmp::Ordering;

use lalrgrammar::{AssocKind, Grammar, Precedence, RIdx, SymIdx};

use crate::{lookahead::Lookaheads, stategraph::StateGraph, StIdx};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ActionKind {
    Shift(StIdx),
    Reduce(RIdx),
}

/// Why an action lost its slot, if it did. `Conflict` marks the loser of a genuine (counted)
/// conflict; `Precedence` marks an action removed by the precedence rules, which is not a
/// conflict at all.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Suppressed {
    No,
    Conflict,
    Precedence,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Action {
    pub sym: SymIdx,
    pub kind: ActionKind,
    pub prec: Option<Precedence>,
    pub suppressed: Suppressed,
}

#[derive(Debug)]
struct StateActions {
    actions: Vec<Action>,
    default_reduction: Option<RIdx>,
    sr_conflicts: usize,
    rr_conflicts: usize,
}

/// The parser's actions, one sorted list per state: ascending symbol, shifts before reduces,
/// reduces in ascending rule order. Losing actions stay in the list with a `Suppressed` mark,
/// so conflict reporting and backtracking vectors can see them.
#[derive(Debug)]
pub struct StateTable {
    states: Vec<StateActions>,
    final_state: StIdx,
    sr_conflicts: usize,
    rr_conflicts: usize,
    expect_sr: Option<usize>,
    expect_rr: Option<usize>,
}

impl StateTable {
    pub fn new(grm: &Grammar, sg: &StateGraph, la: &Lookaheads) -> StateTable {
        let final_state = sg.final_state(grm);
        let backtrack = grm.backtrack();
        let mut states = Vec::with_capacity(sg.all_states_len());
        let mut sr_total = 0;
        let mut rr_total = 0;
        for i in 0..sg.all_states_len() {
            let stidx = StIdx::from(i);
            let mut actions: Vec<Action> = Vec::new();
            for &dst in sg.shifts(stidx) {
                let sym = sg.accessing_symbol(dst);
                if grm.is_token(sym) {
                    actions.push(Action {
                        sym,
                        kind: ActionKind::Shift(dst),
                        prec: grm.prec(sym),
                        suppressed: Suppressed::No,
                    });
                }
            }
            for (k, &ridx) in sg.reductions(stidx).iter().enumerate() {
                for t in la.state_lookaheads(stidx)[k].iter_set_bits(..) {
                    let sym = SymIdx::from(t);
                    let pos = actions.partition_point(|a| match a.sym.cmp(&sym) {
                        Ordering::Less => true,
                        Ordering::Greater => false,
                        Ordering::Equal => match a.kind {
                            ActionKind::Shift(_) => true,
                            ActionKind::Reduce(r) => r < ridx,
                        },
                    });
                    actions.insert(
                        pos,
                        Action {
                            sym,
                            kind: ActionKind::Reduce(ridx),
                            prec: grm.rule_prec(ridx),
                            suppressed: Suppressed::No,
                        },
                    );
                }
            }
            let (sr, rr) = resolve_conflicts(&mut actions, stidx == final_state, backtrack);
            // The final state accepts on end-of-input; it must never reduce by default.
            let default_reduction = if stidx == final_state {
                None
            } else {
                sole_reduction(grm, &actions, backtrack)
            };
            sr_total += sr;
            rr_total += rr;
            states.push(StateActions {
                actions,
                default_reduction,
                sr_conflicts: sr,
                rr_conflicts: rr,
            });
        }
        StateTable {
            states,
            final_state,
            sr_conflicts: sr_total,
            rr_conflicts: rr_total,
            expect_sr: grm.expect_sr(),
            expect_rr: grm.expect_rr(),
        }
    }

    /// How many states does this `StateTable` contain?
    pub fn all_states_len(&self) -> usize {
        self.states.len()
    }

    /// Return all actions of `stidx`, suppressed ones included.
    pub fn actions(&self, stidx: StIdx) -> &[Action] {
        &self.states[usize::from(stidx)].actions
    }

    /// Return the live action of `stidx` on `sym`, if any.
    pub fn action(&self, stidx: StIdx, sym: SymIdx) -> Option<&Action> {
        self.states[usize::from(stidx)]
            .actions
            .iter()
            .find(|a| a.sym == sym && a.suppressed == Suppressed::No)
    }

    /// Return the rule `stidx` reduces by without consulting the lookahead, if it has one.
    pub fn default_reduction(&self, stidx: StIdx) -> Option<RIdx> {
        self.states[usize::from(stidx)].default_reduction
    }

    /// Return the state in which the parser accepts on end-of-input.
    pub fn final_state(&self) -> StIdx {
        self.final_state
    }

    /// How many shift/reduce conflicts did conflict resolution count?
    pub fn sr_conflicts(&self) -> usize {
        self.sr_conflicts
    }

    /// How many reduce/reduce conflicts did conflict resolution count?
    pub fn rr_conflicts(&self) -> usize {
        self.rr_conflicts
    }

    /// Did the conflict counts differ from the grammar's declared expectations? Purely a
    /// diagnostic: mismatches never fail table construction.
    pub fn conflicts_mismatch(&self) -> bool {
        self.expect_sr.map_or(false, |n| n != self.sr_conflicts)
            || self.expect_rr.map_or(false, |n| n != self.rr_conflicts)
    }

    /// Pretty print a conflict report as a `String`, one line per conflicted state plus
    /// totals. Empty if the grammar is conflict free.
    pub fn pp_conflicts(&self, grm: &Grammar) -> String {
        let mut o = String::new();
        for (i, state) in self.states.iter().enumerate() {
            if state.sr_conflicts > 0 || state.rr_conflicts > 0 {
                o.push_str(&format!(
                    "state {}: {} shift/reduce, {} reduce/reduce\n",
                    i, state.sr_conflicts, state.rr_conflicts
                ));
                for a in &state.actions {
                    if a.suppressed == Suppressed::Conflict {
                        if let ActionKind::Reduce(ridx) = a.kind {
                            o.push_str(&format!(
                                "   {} : suppressed reduce by {}\n",
                                grm.sym_name(a.sym),
                                grm.pp_rule(ridx)
                            ));
                        } else {
                            o.push_str(&format!(
                                "   {} : suppressed shift\n",
                                grm.sym_name(a.sym)
                            ));
                        }
                    }
                }
            }
        }
        if self.sr_conflicts > 0 || self.rr_conflicts > 0 {
            o.push_str(&format!(
                "{} shift/reduce, {} reduce/reduce\n",
                self.sr_conflicts, self.rr_conflicts
            ));
            if self.conflicts_mismatch() {
                o.push_str("conflict counts differ from those declared\n");
            }
        }
        o
    }
}

/// Walk each symbol's run of actions, resolving against the currently preferred (first live)
/// action. Precedence removals are silent; everything else is counted. In backtrack mode the
/// preferred action of a counted conflict is marked too, making the whole group trial actions.
fn resolve_conflicts(actions: &mut [Action], is_final: bool, backtrack: bool) -> (usize, usize) {
    let mut sr = 0;
    let mut rr = 0;
    // The accept is an implicit shift on end-of-input in the final state: anything on that
    // symbol there loses to it, even a lone reduce.
    if is_final {
        for a in actions.iter_mut() {
            if a.sym == SymIdx(0) {
                sr += 1;
                a.suppressed = Suppressed::Conflict;
            }
        }
    }
    let mut pref = 0;
    for i in 1..actions.len() {
        if actions[i].sym != actions[pref].sym {
            pref = i;
            continue;
        }
        if is_final && actions[i].sym == SymIdx(0) {
            // Already resolved against the accept.
            continue;
        }
        if let ActionKind::Shift(_) = actions[pref].kind {
            match (actions[pref].prec, actions[i].prec) {
                (Some(sp), Some(rp)) => {
                    if sp.level < rp.level {
                        actions[pref].suppressed = Suppressed::Precedence;
                        pref = i;
                    } else if sp.level > rp.level {
                        actions[i].suppressed = Suppressed::Precedence;
                    } else {
                        match sp.kind {
                            AssocKind::Left => {
                                actions[pref].suppressed = Suppressed::Precedence;
                                pref = i;
                            }
                            AssocKind::Right => {
                                actions[i].suppressed = Suppressed::Precedence;
                            }
                            AssocKind::Nonassoc => {
                                // An unresolvable tie counts as a conflict; the shift stays.
                                sr += 1;
                                actions[i].suppressed = Suppressed::Conflict;
                                if backtrack && actions[pref].suppressed == Suppressed::No {
                                    actions[pref].suppressed = Suppressed::Conflict;
                                }
                            }
                        }
                    }
                }
                _ => {
                    sr += 1;
                    actions[i].suppressed = Suppressed::Conflict;
                    if backtrack && actions[pref].suppressed == Suppressed::No {
                        actions[pref].suppressed = Suppressed::Conflict;
                    }
                }
            }
        } else {
            rr += 1;
            actions[i].suppressed = Suppressed::Conflict;
            if backtrack && actions[pref].suppressed == Suppressed::No {
                actions[pref].suppressed = Suppressed::Conflict;
            }
        }
    }
    (sr, rr)
}

/// A state can reduce by default if every live action is a reduce by one and the same rule,
/// and at least one of those is on something other than the error token.
fn sole_reduction(grm: &Grammar, actions: &[Action], backtrack: bool) -> Option<RIdx> {
    let mut ridx = None;
    let mut count = 0;
    for a in actions {
        let live = a.suppressed == Suppressed::No
            || (backtrack && a.suppressed == Suppressed::Conflict);
        if !live {
            continue;
        }
        match a.kind {
            ActionKind::Shift(_) => return None,
            ActionKind::Reduce(r) => {
                if let Some(p) = ridx {
                    if p != r {
                        return None;
                    }
                }
                if a.sym != grm.error_sym() {
                    count += 1;
                }
                ridx = Some(r);
            }
        }
    }
    if count == 0 {
        None
    } else {
        ridx
    }
}

#[cfg(test)]
mod test {
    use super::{ActionKind, StateTable, Suppressed};
    use crate::{lookahead::Lookaheads, stategraph::lr0_stategraph};
    use lalrgrammar::{Grammar, GrammarBuilder, RIdx};

    fn build(grm: &Grammar) -> (crate::StateGraph, StateTable) {
        let sg = lr0_stategraph(grm);
        let la = Lookaheads::new(grm, &sg);
        let st = StateTable::new(grm, &sg, &la);
        (sg, st)
    }

    fn expr_grammar() -> Grammar {
        GrammarBuilder::new()
            .left(&["'+'"])
            .left(&["'*'"])
            .token("'id'")
            .rule("E", &["E", "'+'", "E"])
            .rule("E", &["E", "'*'", "E"])
            .rule("E", &["'id'"])
            .start("E")
            .build()
            .unwrap()
    }

    #[test]
    fn test_precedence_resolution() {
        let grm = expr_grammar();
        let (sg, st) = build(&grm);
        assert_eq!(st.sr_conflicts(), 0);
        assert_eq!(st.rr_conflicts(), 0);

        let plus = grm.sym_idx("'+'").unwrap();
        let star = grm.sym_idx("'*'").unwrap();
        let e = grm.sym_idx("E").unwrap();
        let s_e = sg.edge(sg.start_state(), e).unwrap();

        // After E '+' E: '+' is left associative, so reduce; '*' binds tighter, so shift.
        let s_epe = sg.edge(sg.edge(s_e, plus).unwrap(), e).unwrap();
        assert_eq!(st.action(s_epe, plus).unwrap().kind, ActionKind::Reduce(RIdx(3)));
        assert!(matches!(
            st.action(s_epe, star).unwrap().kind,
            ActionKind::Shift(_)
        ));
        // The losers are still present, marked as precedence removals.
        assert!(st.actions(s_epe).iter().any(|a| a.sym == plus
            && matches!(a.kind, ActionKind::Shift(_))
            && a.suppressed == Suppressed::Precedence));
        assert!(st.actions(s_epe).iter().any(|a| a.sym == star
            && a.kind == ActionKind::Reduce(RIdx(3))
            && a.suppressed == Suppressed::Precedence));

        // After E '*' E: the rule outranks '+' and '*' is left associative, so always reduce.
        let s_ese = sg.edge(sg.edge(s_e, star).unwrap(), e).unwrap();
        assert_eq!(st.action(s_ese, plus).unwrap().kind, ActionKind::Reduce(RIdx(4)));
        assert_eq!(st.action(s_ese, star).unwrap().kind, ActionKind::Reduce(RIdx(4)));
    }

    fn else_grammar() -> GrammarBuilder {
        GrammarBuilder::new()
            .token("'if'")
            .token("'e'")
            .token("'else'")
            .token("'x'")
            .rule("stmt", &["'if'", "'e'", "stmt"])
            .rule("stmt", &["'if'", "'e'", "stmt", "'else'", "stmt"])
            .rule("stmt", &["'x'"])
            .start("stmt")
    }

    #[test]
    fn test_dangling_else() {
        let grm = else_grammar().build().unwrap();
        let (sg, st) = build(&grm);
        assert_eq!(st.sr_conflicts(), 1);
        assert_eq!(st.rr_conflicts(), 0);

        let s = sg.edge(sg.start_state(), grm.sym_idx("'if'").unwrap()).unwrap();
        let s = sg.edge(s, grm.sym_idx("'e'").unwrap()).unwrap();
        let s = sg.edge(s, grm.sym_idx("stmt").unwrap()).unwrap();
        let else_t = grm.sym_idx("'else'").unwrap();
        // The else shifts; the reduce of the short form is the counted loser.
        assert!(matches!(
            st.action(s, else_t).unwrap().kind,
            ActionKind::Shift(_)
        ));
        assert!(st.actions(s).iter().any(|a| a.sym == else_t
            && a.kind == ActionKind::Reduce(RIdx(3))
            && a.suppressed == Suppressed::Conflict));
        assert!(!st.pp_conflicts(&grm).is_empty());
    }

    #[test]
    fn test_expected_conflicts() {
        let grm = else_grammar().expect_sr(1).build().unwrap();
        let (_, st) = build(&grm);
        assert!(!st.conflicts_mismatch());

        let grm = else_grammar().expect_sr(2).build().unwrap();
        let (_, st) = build(&grm);
        assert!(st.conflicts_mismatch());
    }

    #[test]
    fn test_reduce_reduce() {
        let grm = GrammarBuilder::new()
            .token("'a'")
            .rule("S", &["A"])
            .rule("S", &["B"])
            .rule("A", &["'a'"])
            .rule("B", &["'a'"])
            .start("S")
            .build()
            .unwrap();
        let (sg, st) = build(&grm);
        assert_eq!(st.sr_conflicts(), 0);
        assert_eq!(st.rr_conflicts(), 1);

        let s1 = sg.edge(sg.start_state(), grm.sym_idx("'a'").unwrap()).unwrap();
        // The lower-numbered rule wins.
        assert_eq!(
            st.action(s1, grm.eof_sym()).unwrap().kind,
            ActionKind::Reduce(RIdx(5))
        );
        assert!(st.actions(s1).iter().any(|a| a.kind == ActionKind::Reduce(RIdx(6))
            && a.suppressed == Suppressed::Conflict));
        assert_eq!(st.default_reduction(s1), Some(RIdx(5)));
    }

    #[test]
    fn test_nonassoc_tie() {
        let grm = GrammarBuilder::new()
            .nonassoc(&["'<'"])
            .token("'id'")
            .rule("E", &["E", "'<'", "E"])
            .rule("E", &["'id'"])
            .start("E")
            .build()
            .unwrap();
        let (sg, st) = build(&grm);
        assert_eq!(st.sr_conflicts(), 1);

        let lt = grm.sym_idx("'<'").unwrap();
        let e = grm.sym_idx("E").unwrap();
        let s_e = sg.edge(sg.start_state(), e).unwrap();
        let s_ee = sg.edge(sg.edge(s_e, lt).unwrap(), e).unwrap();
        assert!(matches!(st.action(s_ee, lt).unwrap().kind, ActionKind::Shift(_)));
        assert!(st.actions(s_ee).iter().any(|a| a.sym == lt
            && a.kind == ActionKind::Reduce(RIdx(3))
            && a.suppressed == Suppressed::Conflict));
    }

    #[test]
    fn test_default_reduction() {
        let grm = GrammarBuilder::new()
            .token("'a'")
            .rule("S", &["'a'"])
            .start("S")
            .build()
            .unwrap();
        let (sg, st) = build(&grm);
        let s0 = sg.start_state();
        let s1 = sg.edge(s0, grm.sym_idx("'a'").unwrap()).unwrap();
        // A state with shifts never reduces by default; a state reducing one rule on all
        // lookaheads does.
        assert_eq!(st.default_reduction(s0), None);
        assert_eq!(st.default_reduction(s1), Some(RIdx(3)));
        // The final state has no actions: the accept is the engine's job.
        assert_eq!(st.final_state(), sg.final_state(&grm));
        assert!(st.actions(st.final_state()).is_empty());
        assert_eq!(st.default_reduction(st.final_state()), None);
    }

    #[test]
    fn test_accept_beats_final_state_reduce() {
        // S and A derive each other, so the final state can also reduce on end-of-input. The
        // accept must win, be counted, and block any default reduction there.
        let grm = GrammarBuilder::new()
            .token("'a'")
            .rule("S", &["A"])
            .rule("A", &["S"])
            .rule("A", &["'a'"])
            .start("S")
            .build()
            .unwrap();
        let (_, st) = build(&grm);
        assert_eq!(st.sr_conflicts(), 1);
        let fin = st.final_state();
        assert!(st.action(fin, grm.eof_sym()).is_none());
        assert!(st.actions(fin).iter().any(|a| a.sym == grm.eof_sym()
            && a.kind == ActionKind::Reduce(RIdx(4))
            && a.suppressed == Suppressed::Conflict));
        assert_eq!(st.default_reduction(fin), None);
    }

    #[test]
    fn test_backtrack_trial_actions() {
        let grm = else_grammar().backtrack(true).build().unwrap();
        let (sg, st) = build(&grm);
        assert_eq!(st.sr_conflicts(), 1);

        let s = sg.edge(sg.start_state(), grm.sym_idx("'if'").unwrap()).unwrap();
        let s = sg.edge(s, grm.sym_idx("'e'").unwrap()).unwrap();
        let s = sg.edge(s, grm.sym_idx("stmt").unwrap()).unwrap();
        let else_t = grm.sym_idx("'else'").unwrap();
        // Both the shift and the reduce become trial actions.
        assert!(st.action(s, else_t).is_none());
        let on_else: Vec<_> = st
            .actions(s)
            .iter()
            .filter(|a| a.sym == else_t)
            .collect();
        assert_eq!(on_else.len(), 2);
        assert!(on_else.iter().all(|a| a.suppressed == Suppressed::Conflict));
        // A state whose live actions include a (trial) shift has no default reduction.
        assert_eq!(st.default_reduction(s), None);
    }
}
