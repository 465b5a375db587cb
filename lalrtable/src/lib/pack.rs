// Licensed under the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use lalrgrammar::{Grammar, RIdx, SymIdx};

use crate::{
    lookahead::Lookaheads,
    statetable::{ActionKind, StateTable, Suppressed},
    StIdx,
};

/// The parse tables in row-displacement form. Every state contributes a shift row (keyed by
/// token), a reduce row (keyed by token, default reduction elided) and, in backtrack mode, a
/// conflict row; every nonterminal except the augmented start symbol contributes a goto row
/// (keyed by source state, default destination elided). All rows share one `table`/`check`
/// array pair: `base` holds each row's displacement, with 0 reserved for empty rows, and an
/// entry is present iff `check[base + key] == key`.
#[derive(Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PackedTables {
    nstates: usize,
    tokens_len: usize,
    base: Vec<i32>,
    table: Vec<i32>,
    check: Vec<i32>,
    /// Trial-action runs, each terminated by -1; conflict-row values index into this.
    /// Shifts are stored as destination states, reduces as rule index minus 2.
    conflicts: Vec<i32>,
    /// Per state, rule index minus 2, or 0 for states without a default reduction.
    default_reductions: Vec<i32>,
    default_gotos: Vec<StIdx>,
}

fn width(row: &[(usize, i32)]) -> usize {
    row[row.len() - 1].0 - row[0].0 + 1
}

/// If the run `conflicts[base..]` already occurs earlier in the list, drop it and return the
/// position of the earlier copy; otherwise keep it and return `base`. Overlapping matches are
/// allowed, so a run can share the tail of the one appended just before it.
fn find_conflict_base(conflicts: &mut Vec<i32>, base: usize) -> i32 {
    let n = conflicts.len();
    let mut i = 0;
    while i < base {
        let mut j = 0;
        while base + j < n && conflicts[i + j] == conflicts[base + j] {
            j += 1;
        }
        if base + j == n {
            break;
        }
        i += 1;
    }
    if i < base {
        conflicts.truncate(base);
    }
    i as i32
}

/// Find the lowest displacement at which `row` fits into `table`/`check` without touching an
/// occupied slot, skipping displacement 0 and displacements already handed out (`used`), then
/// write the row there.
fn pack_vector(
    row: &[(usize, i32)],
    table: &mut Vec<i32>,
    check: &mut Vec<i32>,
    lowzero: &mut usize,
    used: &[i32],
) -> i32 {
    let low = row[0].0 as i32;
    let mut offset = *lowzero as i32 - low;
    loop {
        if offset != 0 {
            let free = row.iter().all(|&(k, _)| {
                let loc = (offset + k as i32) as usize;
                loc >= check.len() || check[loc] == -1
            });
            if free && !used.contains(&offset) {
                break;
            }
        }
        offset += 1;
    }
    let high = (offset + row[row.len() - 1].0 as i32) as usize;
    if high >= check.len() {
        table.resize(high + 1, 0);
        check.resize(high + 1, -1);
    }
    for &(k, v) in row {
        let loc = (offset + k as i32) as usize;
        table[loc] = v;
        check[loc] = k as i32;
    }
    while *lowzero < check.len() && check[*lowzero] != -1 {
        *lowzero += 1;
    }
    offset
}

impl PackedTables {
    pub fn new(grm: &Grammar, st: &StateTable, la: &Lookaheads) -> PackedTables {
        let nstates = st.all_states_len();
        // The augmented start symbol is the last nonterminal and never the target of a goto
        // lookup, so it gets no row.
        let nvars = grm.vars_len() - 1;
        let nvecs = 3 * nstates + nvars;
        let mut entries: Vec<Vec<(usize, i32)>> = vec![Vec::new(); nvecs];
        let mut conflicts: Vec<i32> = Vec::new();

        for i in 0..nstates {
            let stidx = StIdx::from(i);
            let defred = st.default_reduction(stidx);
            let acts = st.actions(stidx);
            for a in acts {
                if a.suppressed != Suppressed::No {
                    continue;
                }
                match a.kind {
                    ActionKind::Shift(dst) => {
                        entries[i].push((usize::from(a.sym), usize::from(dst) as i32));
                    }
                    ActionKind::Reduce(ridx) => {
                        if defred != Some(ridx) {
                            entries[nstates + i]
                                .push((usize::from(a.sym), u32::from(ridx) as i32 - 2));
                        }
                    }
                }
            }
            if grm.backtrack() {
                let mut k = 0;
                while k < acts.len() {
                    let sym = acts[k].sym;
                    let run_base = conflicts.len();
                    while k < acts.len() && acts[k].sym == sym {
                        if acts[k].suppressed == Suppressed::Conflict {
                            match acts[k].kind {
                                ActionKind::Shift(dst) => {
                                    conflicts.push(usize::from(dst) as i32)
                                }
                                ActionKind::Reduce(ridx) => {
                                    conflicts.push(u32::from(ridx) as i32 - 2)
                                }
                            }
                        }
                        k += 1;
                    }
                    if conflicts.len() > run_base {
                        conflicts.push(-1);
                        entries[2 * nstates + i].push((
                            usize::from(sym),
                            find_conflict_base(&mut conflicts, run_base),
                        ));
                    }
                }
            }
        }

        let mut default_gotos = Vec::with_capacity(nvars);
        for v in 0..nvars {
            let sym = grm.var_sym(v);
            let dflt = la.default_goto(sym);
            default_gotos.push(dflt);
            for &(from, to) in la.gotos(sym) {
                if to != dflt {
                    entries[3 * nstates + v].push((usize::from(from), usize::from(to) as i32));
                }
            }
        }

        // Widest (then fullest) rows are placed first; later, narrower rows slot into the
        // holes they leave. Identical rows share a displacement.
        let mut order: Vec<usize> = (0..nvecs).filter(|&r| !entries[r].is_empty()).collect();
        order.sort_by(|&a, &b| {
            width(&entries[b])
                .cmp(&width(&entries[a]))
                .then(entries[b].len().cmp(&entries[a].len()))
        });

        let mut base = vec![0_i32; nvecs];
        let mut table: Vec<i32> = Vec::new();
        let mut check: Vec<i32> = Vec::new();
        let mut lowzero = 1;
        let mut placed: Vec<usize> = Vec::new();
        for &r in &order {
            let row = &entries[r];
            let mut matched = None;
            for &p in placed.iter().rev() {
                if width(&entries[p]) != width(row) || entries[p].len() != row.len() {
                    break;
                }
                if entries[p] == *row {
                    matched = Some(base[p]);
                    break;
                }
            }
            match matched {
                Some(b) => base[r] = b,
                None => {
                    let used: Vec<i32> = placed.iter().map(|&p| base[p]).collect();
                    base[r] = pack_vector(row, &mut table, &mut check, &mut lowzero, &used);
                    placed.push(r);
                }
            }
        }

        let default_reductions = (0..nstates)
            .map(|i| match st.default_reduction(StIdx::from(i)) {
                Some(ridx) => u32::from(ridx) as i32 - 2,
                None => 0,
            })
            .collect();

        PackedTables {
            nstates,
            tokens_len: grm.tokens_len(),
            base,
            table,
            check,
            conflicts,
            default_reductions,
            default_gotos,
        }
    }

    fn lookup(&self, vec: usize, key: usize) -> Option<i32> {
        let b = self.base[vec];
        if b == 0 {
            return None;
        }
        let loc = b + key as i32;
        if loc >= 0 && (loc as usize) < self.check.len() && self.check[loc as usize] == key as i32
        {
            Some(self.table[loc as usize])
        } else {
            None
        }
    }

    /// How many states do these tables cover?
    pub fn all_states_len(&self) -> usize {
        self.nstates
    }

    /// Return the state to shift to in `stidx` on token `sym`, if any.
    pub fn shift(&self, stidx: StIdx, sym: SymIdx) -> Option<StIdx> {
        self.lookup(usize::from(stidx), usize::from(sym))
            .map(|v| StIdx::from(v as usize))
    }

    /// Return the rule `stidx` reduces by on token `sym`, if the reduce is explicitly
    /// tabulated. Reduces folded into the state's default reduction are not.
    pub fn reduce(&self, stidx: StIdx, sym: SymIdx) -> Option<RIdx> {
        self.lookup(self.nstates + usize::from(stidx), usize::from(sym))
            .map(|v| RIdx::from(v as usize + 2))
    }

    /// Return the rule `stidx` reduces by regardless of lookahead, if it has one.
    pub fn default_reduction(&self, stidx: StIdx) -> Option<RIdx> {
        match self.default_reductions[usize::from(stidx)] {
            0 => None,
            v => Some(RIdx::from(v as usize + 2)),
        }
    }

    /// Return the trial actions of `stidx` on token `sym`. Shifts are encoded as destination
    /// states, reduces as rule index minus 2; empty if the pair is conflict free.
    pub fn conflict_actions(&self, stidx: StIdx, sym: SymIdx) -> &[i32] {
        match self.lookup(2 * self.nstates + usize::from(stidx), usize::from(sym)) {
            Some(b) => {
                let start = b as usize;
                let end = self.conflicts[start..]
                    .iter()
                    .position(|&x| x == -1)
                    .map(|p| start + p)
                    .unwrap_or(self.conflicts.len());
                &self.conflicts[start..end]
            }
            None => &[],
        }
    }

    /// Return the state to go to after reducing to nonterminal `sym` in `stidx`.
    pub fn goto_target(&self, sym: SymIdx, stidx: StIdx) -> StIdx {
        let v = usize::from(sym) - self.tokens_len;
        match self.lookup(3 * self.nstates + v, usize::from(stidx)) {
            Some(t) => StIdx::from(t as usize),
            None => self.default_gotos[v],
        }
    }

    /// Return the default goto destination for nonterminal `sym`.
    pub fn default_goto(&self, sym: SymIdx) -> StIdx {
        self.default_gotos[usize::from(sym) - self.tokens_len]
    }

    /// Return the row displacements. Rows are laid out as `nstates` shift rows, `nstates`
    /// reduce rows, `nstates` conflict rows, then one goto row per nonterminal.
    pub fn bases(&self) -> &[i32] {
        &self.base
    }

    /// Return the shared value array.
    pub fn table(&self) -> &[i32] {
        &self.table
    }

    /// Return the shared key array.
    pub fn check(&self) -> &[i32] {
        &self.check
    }

    /// Return the shared trial-action list.
    pub fn conflict_list(&self) -> &[i32] {
        &self.conflicts
    }
}
