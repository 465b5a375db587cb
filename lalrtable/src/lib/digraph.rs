// Licensed under the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The relation solver at the heart of LALR lookahead computation: given per-node bit rows `F`
//! and a relation `R`, extend every row with the rows of the nodes it can reach, giving all
//! members of a strongly connected component the same row.

use vob::Vob;

const DONE: usize = usize::MAX;

/// Or row `src` into row `dst`. Returns true if this changed `dst`.
pub(crate) fn or_rows(rows: &mut [Vob], dst: usize, src: usize) -> bool {
    if dst == src {
        return false;
    }
    let (d, s) = if dst < src {
        let (l, r) = rows.split_at_mut(src);
        (&mut l[dst], &r[0])
    } else {
        let (l, r) = rows.split_at_mut(dst);
        (&mut r[0], &l[src])
    };
    d.or(s)
}

/// Close `rows` under `relation`: afterwards `rows[i]` is the union of the initial `rows[j]`
/// for every `j` reachable from `i` (including `i` itself). Tarjan's SCC walk with an explicit
/// frame stack, so deep relations can't exhaust the call stack.
pub(crate) fn digraph(rows: &mut [Vob], relation: &[Vec<usize>]) {
    let n = relation.len();
    debug_assert_eq!(rows.len(), n);
    // index[i]: 0 = unvisited, DONE = its SCC is complete, otherwise the (1-based) position on
    // the vertex stack where i's traversal began, lowered to the smallest such position
    // reachable from i.
    let mut index = vec![0_usize; n];
    let mut vertices = Vec::with_capacity(n);
    // (node, next successor offset, height at entry)
    let mut frames: Vec<(usize, usize, usize)> = Vec::new();

    for start in 0..n {
        if index[start] != 0 || relation[start].is_empty() {
            continue;
        }
        vertices.push(start);
        index[start] = vertices.len();
        frames.push((start, 0, vertices.len()));
        while let Some(&(v, succ_off, height)) = frames.last() {
            if succ_off < relation[v].len() {
                let w = relation[v][succ_off];
                frames.last_mut().unwrap().1 += 1;
                if index[w] == 0 {
                    vertices.push(w);
                    index[w] = vertices.len();
                    frames.push((w, 0, vertices.len()));
                } else {
                    if index[w] < index[v] {
                        index[v] = index[w];
                    }
                    or_rows(rows, v, w);
                }
            } else {
                frames.pop();
                if index[v] == height {
                    // v is the root of an SCC: pop its members, giving each the root's row.
                    loop {
                        let w = vertices.pop().unwrap();
                        index[w] = DONE;
                        if w == v {
                            break;
                        }
                        or_rows(rows, w, v);
                    }
                }
                if let Some(&(p, _, _)) = frames.last() {
                    if index[v] < index[p] {
                        index[p] = index[v];
                    }
                    or_rows(rows, p, v);
                }
            }
        }
    }
}

/// Reverse a relation.
pub(crate) fn transpose(relation: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let mut t = vec![Vec::new(); relation.len()];
    for (i, succs) in relation.iter().enumerate() {
        for &j in succs {
            t[j].push(i);
        }
    }
    t
}
