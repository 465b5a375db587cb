// Licensed under the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A library for representing context-free grammars in the form needed by LALR parser table
//! generation. A [Grammar] stores symbols, rules and precedences in the classic yacc layout:
//! one flattened item array holds every rule body, terminals and nonterminals share a single
//! index space, and three synthetic rules (two placeholders plus the augmented start rule
//! `$accept: <start> $end`) precede the user's rules. Grammars are constructed with
//! [GrammarBuilder]; parsing yacc input text is left to front ends.

#[macro_use]
mod idxnewtype;
mod grammar;

pub use crate::grammar::{
    AssocKind, Grammar, GrammarBuilder, GrammarError, Item, Precedence,
};
pub use crate::idxnewtype::{ItIdx, RIdx, SymIdx};
