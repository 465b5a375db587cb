// Licensed under the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use lalrgrammar::{Grammar, ItIdx, Item, RIdx};
use vob::Vob;

use crate::digraph::or_rows;

/// The item-set closure engine. Most of the work is done up front: `first_base` records, for
/// every nonterminal `A`, the set of rules whose start item belongs in the closure of any item
/// with `A` after the dot. Closing a kernel is then a union of `first_base` rows followed by an
/// ordered merge.
pub(crate) struct Closure {
    first_base: Vec<Vob>,
    ruleset: Vob,
    itemset: Vec<ItIdx>,
}

impl Closure {
    pub(crate) fn new(grm: &Grammar) -> Self {
        let nvars = grm.vars_len();

        // eff[i][j]: nonterminal i can derive a string starting with nonterminal j. Seeded from
        // the leftmost symbol of every rule, then closed reflexively and transitively
        // (Warshall, a row at a time).
        let mut eff = vec![Vob::from_elem(false, nvars); nvars];
        for var in 0..nvars {
            for &ridx in grm.derives(grm.var_sym(var)) {
                if let Some(&Item::Symbol(sym)) = grm.rule_rhs(ridx).first() {
                    if !grm.is_token(sym) {
                        eff[var].set(grm.var_offset(sym), true);
                    }
                }
            }
        }
        for (var, row) in eff.iter_mut().enumerate() {
            row.set(var, true);
        }
        for k in 0..nvars {
            for i in 0..nvars {
                if eff[i][k] {
                    or_rows(&mut eff, i, k);
                }
            }
        }

        let mut first_base = vec![Vob::from_elem(false, grm.rules_len()); nvars];
        for (var, row) in eff.iter().enumerate() {
            for dvar in row.iter_set_bits(..) {
                for &ridx in grm.derives(grm.var_sym(dvar)) {
                    first_base[var].set(usize::from(ridx), true);
                }
            }
        }

        Closure {
            first_base,
            ruleset: Vob::from_elem(false, grm.rules_len()),
            itemset: Vec::new(),
        }
    }

    /// Close `kernel` (which must be sorted ascending) and return the closed item set, also
    /// sorted ascending. The result is valid until the next call.
    pub(crate) fn close(&mut self, grm: &Grammar, kernel: &[ItIdx]) -> &[ItIdx] {
        self.ruleset.set_all(false);
        for &itidx in kernel {
            if let Item::Symbol(sym) = grm.item(itidx) {
                if !grm.is_token(sym) {
                    self.ruleset.or(&self.first_base[grm.var_offset(sym)]);
                }
            }
        }

        // Merge the selected rules' start items with the kernel, preserving item order.
        self.itemset.clear();
        let mut kiter = kernel.iter().copied().peekable();
        for r in self.ruleset.iter_set_bits(..) {
            let itemno = grm.rule_start(RIdx::from(r));
            while let Some(&next) = kiter.peek() {
                if next >= itemno {
                    break;
                }
                self.itemset.push(next);
                kiter.next();
            }
            while kiter.peek() == Some(&itemno) {
                kiter.next();
            }
            self.itemset.push(itemno);
        }
        self.itemset.extend(kiter);
        &self.itemset
    }
}

#[cfg(test)]
mod test {
    use super::Closure;
    use lalrgrammar::{Grammar, GrammarBuilder, ItIdx, RIdx};

    fn dragon_grammar() -> Grammar {
        // From the LR sections of the dragon book.
        GrammarBuilder::new()
            .token("'='")
            .token("'*'")
            .token("'id'")
            .rule("S", &["L", "'='", "R"])
            .rule("S", &["R"])
            .rule("L", &["'*'", "R"])
            .rule("L", &["'id'"])
            .rule("R", &["L"])
            .start("S")
            .build()
            .unwrap()
    }

    #[test]
    fn test_closure_start_state() {
        let grm = dragon_grammar();
        let mut cl = Closure::new(&grm);
        let kernel = [grm.rule_start(grm.start_rule())];
        let closed = cl.close(&grm, &kernel).to_vec();
        // The kernel item plus the start item of all five user rules, in item order.
        let mut expected = vec![ItIdx(1)];
        for r in 3..8 {
            expected.push(grm.rule_start(RIdx::from(r)));
        }
        assert_eq!(closed, expected);
    }

    #[test]
    fn test_closure_idempotent() {
        let grm = dragon_grammar();
        let mut cl = Closure::new(&grm);
        let kernel = [grm.rule_start(grm.start_rule())];
        let once = cl.close(&grm, &kernel).to_vec();
        let twice = cl.close(&grm, &once).to_vec();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_closure_terminal_dot() {
        let grm = dragon_grammar();
        let mut cl = Closure::new(&grm);
        // The dot in "L: '*' . R" advanced once more sits after 'R' at the End slot; an item
        // set with only dots at terminals or End slots closes to itself.
        let start = usize::from(grm.rule_start(RIdx(5)));
        let kernel = [ItIdx::from(start + 2)];
        assert_eq!(cl.close(&grm, &kernel), &kernel);
    }
}
