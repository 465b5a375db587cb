// Licensed under the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::{error::Error, fmt};

use fnv::FnvHashMap;
use vob::Vob;

use crate::{ItIdx, RIdx, SymIdx};

const END_SYMBOL: &str = "$end";
const ERROR_SYMBOL: &str = "error";
const ACCEPT_SYMBOL: &str = "$accept";

/// The associativity of a precedence level.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AssocKind {
    Left,
    Right,
    Nonassoc,
}

/// The precedence of a token or rule. Levels are numbered from 1 upwards; a higher level binds
/// tighter.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Precedence {
    pub level: u32,
    pub kind: AssocKind,
}

/// One slot in a grammar's flattened item array. Each rule's body is a run of `Symbol` slots
/// followed by an `End` slot naming the rule, so "advance the dot" is "add one to the item
/// index".
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Item {
    Symbol(SymIdx),
    End(RIdx),
}

#[derive(Debug)]
struct Rule {
    lhs: SymIdx,
    start: ItIdx,
    len: usize,
    prec: Option<Precedence>,
}

/// An immutable grammar, ready for table generation.
///
/// Symbols live in one id space: terminals first (the end-of-input token at index 0, the error
/// token at index 1, user tokens after), then nonterminals in order of definition, with the
/// augmented start symbol `$accept` last. Rules 0 and 1 are inert placeholders and rule 2 is
/// the augmented start rule `$accept: <start> $end`, so user rules are numbered from 3.
#[derive(Debug)]
pub struct Grammar {
    tokens_len: usize,
    sym_names: Vec<String>,
    sym_precs: Vec<Option<Precedence>>,
    rules: Vec<Rule>,
    items: Vec<Item>,
    nullable: Vob,
    derives: Vec<Vec<RIdx>>,
    expect_sr: Option<usize>,
    expect_rr: Option<usize>,
    backtrack: bool,
}

impl Grammar {
    /// How many terminal symbols does this grammar have (including `$end` and `error`)?
    pub fn tokens_len(&self) -> usize {
        self.tokens_len
    }

    /// How many symbols, terminal and nonterminal, does this grammar have?
    pub fn syms_len(&self) -> usize {
        self.sym_names.len()
    }

    /// How many nonterminal symbols does this grammar have (including `$accept`)?
    pub fn vars_len(&self) -> usize {
        self.sym_names.len() - self.tokens_len
    }

    /// How many rules does this grammar have (including the three synthetic rules)?
    pub fn rules_len(&self) -> usize {
        self.rules.len()
    }

    /// How many slots does this grammar's item array have?
    pub fn items_len(&self) -> usize {
        self.items.len()
    }

    /// Is `sym` a terminal?
    pub fn is_token(&self, sym: SymIdx) -> bool {
        usize::from(sym) < self.tokens_len
    }

    /// Return the end-of-input token.
    pub fn eof_sym(&self) -> SymIdx {
        SymIdx(0)
    }

    /// Return the error token.
    pub fn error_sym(&self) -> SymIdx {
        SymIdx(1)
    }

    /// Return the augmented start symbol (always the last nonterminal).
    pub fn accept_sym(&self) -> SymIdx {
        SymIdx::from(self.sym_names.len() - 1)
    }

    /// Return the augmented start rule `$accept: <start> $end`.
    pub fn start_rule(&self) -> RIdx {
        RIdx(2)
    }

    /// Return the user's start symbol (the first symbol of the augmented start rule's body).
    pub fn goal_sym(&self) -> SymIdx {
        match self.items[1] {
            Item::Symbol(sym) => sym,
            Item::End(_) => unreachable!(),
        }
    }

    /// Return the name of symbol `sym`.
    pub fn sym_name(&self, sym: SymIdx) -> &str {
        &self.sym_names[usize::from(sym)]
    }

    /// Return the index of the symbol named `n` or `None` if it doesn't exist.
    pub fn sym_idx(&self, n: &str) -> Option<SymIdx> {
        self.sym_names
            .iter()
            .position(|x| x == n)
            .map(SymIdx::from)
    }

    /// Return the precedence of symbol `sym`, if any.
    pub fn prec(&self, sym: SymIdx) -> Option<Precedence> {
        self.sym_precs[usize::from(sym)]
    }

    /// Return the 0-based offset of nonterminal `sym` within the nonterminals. Panics if `sym`
    /// is a terminal.
    pub fn var_offset(&self, sym: SymIdx) -> usize {
        debug_assert!(!self.is_token(sym));
        usize::from(sym) - self.tokens_len
    }

    /// Return the nonterminal at 0-based offset `var`.
    pub fn var_sym(&self, var: usize) -> SymIdx {
        SymIdx::from(self.tokens_len + var)
    }

    /// Return the lhs of rule `ridx`.
    pub fn rule_lhs(&self, ridx: RIdx) -> SymIdx {
        self.rules[usize::from(ridx)].lhs
    }

    /// Return the item index of the first body slot of rule `ridx`.
    pub fn rule_start(&self, ridx: RIdx) -> ItIdx {
        self.rules[usize::from(ridx)].start
    }

    /// How many symbols does the body of rule `ridx` have?
    pub fn rule_len(&self, ridx: RIdx) -> usize {
        self.rules[usize::from(ridx)].len
    }

    /// Return the body of rule `ridx` as a slice of `Item::Symbol`s (the trailing `End` slot is
    /// excluded).
    pub fn rule_rhs(&self, ridx: RIdx) -> &[Item] {
        let rule = &self.rules[usize::from(ridx)];
        let start = usize::from(rule.start);
        &self.items[start..start + rule.len]
    }

    /// Return the precedence of rule `ridx`, if any.
    pub fn rule_prec(&self, ridx: RIdx) -> Option<Precedence> {
        self.rules[usize::from(ridx)].prec
    }

    /// Return the item at index `itidx`.
    pub fn item(&self, itidx: ItIdx) -> Item {
        self.items[usize::from(itidx)]
    }

    /// Can `sym` derive the empty string? Always false for terminals.
    pub fn nullable(&self, sym: SymIdx) -> bool {
        self.nullable[usize::from(sym)]
    }

    /// Return the rules whose lhs is the nonterminal `sym`, in ascending order. Panics if `sym`
    /// is a terminal.
    pub fn derives(&self, sym: SymIdx) -> &[RIdx] {
        &self.derives[self.var_offset(sym)]
    }

    /// How many shift/reduce conflicts did the user declare as expected, if any?
    pub fn expect_sr(&self) -> Option<usize> {
        self.expect_sr
    }

    /// How many reduce/reduce conflicts did the user declare as expected, if any?
    pub fn expect_rr(&self) -> Option<usize> {
        self.expect_rr
    }

    /// Should tables keep conflicting actions around for a backtracking parser?
    pub fn backtrack(&self) -> bool {
        self.backtrack
    }

    /// Pretty print rule `ridx` as a `String`.
    pub fn pp_rule(&self, ridx: RIdx) -> String {
        let mut o = format!("{} :", self.sym_name(self.rule_lhs(ridx)));
        for it in self.rule_rhs(ridx) {
            if let Item::Symbol(sym) = *it {
                o.push(' ');
                o.push_str(self.sym_name(sym));
            }
        }
        o
    }
}

/// The errors `GrammarBuilder::build` can produce.
#[derive(Debug, Eq, PartialEq)]
pub enum GrammarError {
    MissingStartSymbol,
    UndefinedStartSymbol(String),
    StartSymbolIsToken(String),
    RedeclaredToken(String),
    ReservedSymbol(String),
    TokenAsRuleName(String),
    UndefinedSymbol(String),
    UnknownPrecedenceToken(String),
}

impl Error for GrammarError {}

impl fmt::Display for GrammarError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GrammarError::MissingStartSymbol => write!(f, "No start symbol specified"),
            GrammarError::UndefinedStartSymbol(n) => {
                write!(f, "Start symbol '{}' has no rules", n)
            }
            GrammarError::StartSymbolIsToken(n) => {
                write!(f, "Start symbol '{}' is a token", n)
            }
            GrammarError::RedeclaredToken(n) => write!(f, "Token '{}' declared twice", n),
            GrammarError::ReservedSymbol(n) => write!(f, "Symbol name '{}' is reserved", n),
            GrammarError::TokenAsRuleName(n) => {
                write!(f, "Token '{}' used as a rule name", n)
            }
            GrammarError::UndefinedSymbol(n) => {
                write!(f, "Symbol '{}' is neither a token nor a rule", n)
            }
            GrammarError::UnknownPrecedenceToken(n) => {
                write!(f, "%prec symbol '{}' is not a declared token", n)
            }
        }
    }
}

struct BuilderRule {
    lhs: String,
    rhs: Vec<String>,
    prec: Option<String>,
}

/// A programmatic way of building a `Grammar`, in lieu of a yacc-style text front end. Symbols
/// are referred to by name; any name which is not a declared token is taken to be a rule name
/// and must appear as the lhs of at least one rule.
pub struct GrammarBuilder {
    tokens: Vec<(String, Option<Precedence>)>,
    levels: u32,
    rules: Vec<BuilderRule>,
    start: Option<String>,
    expect_sr: Option<usize>,
    expect_rr: Option<usize>,
    backtrack: bool,
}

impl GrammarBuilder {
    pub fn new() -> Self {
        GrammarBuilder {
            tokens: Vec::new(),
            levels: 0,
            rules: Vec::new(),
            start: None,
            expect_sr: None,
            expect_rr: None,
            backtrack: false,
        }
    }

    /// Declare a token with no precedence.
    pub fn token(mut self, n: &str) -> Self {
        self.tokens.push((n.to_owned(), None));
        self
    }

    fn prec_level(mut self, kind: AssocKind, ns: &[&str]) -> Self {
        self.levels += 1;
        for n in ns {
            let prec = Precedence {
                level: self.levels,
                kind,
            };
            self.tokens.push(((*n).to_owned(), Some(prec)));
        }
        self
    }

    /// Declare a new precedence level of left associative tokens.
    pub fn left(self, ns: &[&str]) -> Self {
        self.prec_level(AssocKind::Left, ns)
    }

    /// Declare a new precedence level of right associative tokens.
    pub fn right(self, ns: &[&str]) -> Self {
        self.prec_level(AssocKind::Right, ns)
    }

    /// Declare a new precedence level of non-associative tokens.
    pub fn nonassoc(self, ns: &[&str]) -> Self {
        self.prec_level(AssocKind::Nonassoc, ns)
    }

    /// Add a rule `lhs: rhs`.
    pub fn rule(mut self, lhs: &str, rhs: &[&str]) -> Self {
        self.rules.push(BuilderRule {
            lhs: lhs.to_owned(),
            rhs: rhs.iter().map(|x| (*x).to_owned()).collect(),
            prec: None,
        });
        self
    }

    /// Add a rule `lhs: rhs` whose precedence is that of the token `prec` rather than that of
    /// the rightmost terminal in `rhs`.
    pub fn rule_with_prec(mut self, lhs: &str, rhs: &[&str], prec: &str) -> Self {
        self.rules.push(BuilderRule {
            lhs: lhs.to_owned(),
            rhs: rhs.iter().map(|x| (*x).to_owned()).collect(),
            prec: Some(prec.to_owned()),
        });
        self
    }

    /// Set the start symbol.
    pub fn start(mut self, n: &str) -> Self {
        self.start = Some(n.to_owned());
        self
    }

    /// Declare how many shift/reduce conflicts are expected.
    pub fn expect_sr(mut self, n: usize) -> Self {
        self.expect_sr = Some(n);
        self
    }

    /// Declare how many reduce/reduce conflicts are expected.
    pub fn expect_rr(mut self, n: usize) -> Self {
        self.expect_rr = Some(n);
        self
    }

    /// Keep conflicting actions around for a backtracking parser.
    pub fn backtrack(mut self, b: bool) -> Self {
        self.backtrack = b;
        self
    }

    pub fn build(self) -> Result<Grammar, GrammarError> {
        let mut sym_map = FnvHashMap::default();
        let mut sym_names = vec![END_SYMBOL.to_owned(), ERROR_SYMBOL.to_owned()];
        let mut sym_precs: Vec<Option<Precedence>> = vec![None, None];
        sym_map.insert(END_SYMBOL.to_owned(), SymIdx(0));
        sym_map.insert(ERROR_SYMBOL.to_owned(), SymIdx(1));

        for (n, prec) in &self.tokens {
            if n == ACCEPT_SYMBOL {
                return Err(GrammarError::ReservedSymbol(n.clone()));
            }
            if sym_map
                .insert(n.clone(), SymIdx::from(sym_names.len()))
                .is_some()
            {
                return Err(GrammarError::RedeclaredToken(n.clone()));
            }
            sym_names.push(n.clone());
            sym_precs.push(*prec);
        }
        let tokens_len = sym_names.len();

        // Nonterminals are numbered in order of first appearance as an lhs.
        for brule in &self.rules {
            if brule.lhs == ACCEPT_SYMBOL {
                return Err(GrammarError::ReservedSymbol(brule.lhs.clone()));
            }
            match sym_map.get(&brule.lhs) {
                Some(&sym) if usize::from(sym) < tokens_len => {
                    return Err(GrammarError::TokenAsRuleName(brule.lhs.clone()));
                }
                Some(_) => (),
                None => {
                    sym_map.insert(brule.lhs.clone(), SymIdx::from(sym_names.len()));
                    sym_names.push(brule.lhs.clone());
                    sym_precs.push(None);
                }
            }
        }
        let accept_sym = SymIdx::from(sym_names.len());
        sym_map.insert(ACCEPT_SYMBOL.to_owned(), accept_sym);
        sym_names.push(ACCEPT_SYMBOL.to_owned());
        sym_precs.push(None);

        let goal_sym = match self.start {
            None => return Err(GrammarError::MissingStartSymbol),
            Some(ref n) => match sym_map.get(n) {
                None => return Err(GrammarError::UndefinedStartSymbol(n.clone())),
                Some(&sym) if usize::from(sym) < tokens_len => {
                    return Err(GrammarError::StartSymbolIsToken(n.clone()));
                }
                Some(&sym) => sym,
            },
        };

        let mut items = vec![
            Item::End(RIdx(1)),
            Item::Symbol(goal_sym),
            Item::Symbol(SymIdx(0)),
            Item::End(RIdx(2)),
        ];
        let mut rules = vec![
            Rule {
                lhs: SymIdx(0),
                start: ItIdx(0),
                len: 0,
                prec: None,
            },
            Rule {
                lhs: SymIdx(0),
                start: ItIdx(0),
                len: 0,
                prec: None,
            },
            Rule {
                lhs: accept_sym,
                start: ItIdx(1),
                len: 2,
                prec: None,
            },
        ];

        for brule in &self.rules {
            let ridx = RIdx::from(rules.len());
            let start = ItIdx::from(items.len());
            let mut rprec = None;
            for n in &brule.rhs {
                let sym = match sym_map.get(n) {
                    Some(&sym) => sym,
                    None => return Err(GrammarError::UndefinedSymbol(n.clone())),
                };
                // $end and $accept exist only in the augmented start rule.
                if sym == SymIdx(0) || sym == accept_sym {
                    return Err(GrammarError::ReservedSymbol(n.clone()));
                }
                if usize::from(sym) < tokens_len {
                    rprec = sym_precs[usize::from(sym)];
                }
                items.push(Item::Symbol(sym));
            }
            items.push(Item::End(ridx));
            if let Some(ref n) = brule.prec {
                match sym_map.get(n) {
                    Some(&sym) if sym != SymIdx(0) && usize::from(sym) < tokens_len => {
                        rprec = sym_precs[usize::from(sym)];
                    }
                    _ => return Err(GrammarError::UnknownPrecedenceToken(n.clone())),
                }
            }
            rules.push(Rule {
                lhs: sym_map[&brule.lhs],
                start,
                len: brule.rhs.len(),
                prec: rprec,
            });
        }

        // A fixed point over the rules: a nonterminal is nullable if any of its rules has a
        // body of nullable nonterminals.
        let mut nullable = Vob::from_elem(false, sym_names.len());
        loop {
            let mut changed = false;
            for rule in rules.iter().skip(2) {
                if nullable[usize::from(rule.lhs)] {
                    continue;
                }
                let start = usize::from(rule.start);
                let all = items[start..start + rule.len].iter().all(|it| match *it {
                    Item::Symbol(sym) => nullable[usize::from(sym)],
                    Item::End(_) => false,
                });
                if all {
                    nullable.set(usize::from(rule.lhs), true);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        let mut derives = vec![Vec::new(); sym_names.len() - tokens_len];
        for (i, rule) in rules.iter().enumerate().skip(2) {
            derives[usize::from(rule.lhs) - tokens_len].push(RIdx::from(i));
        }

        Ok(Grammar {
            tokens_len,
            sym_names,
            sym_precs,
            rules,
            items,
            nullable,
            derives,
            expect_sr: self.expect_sr,
            expect_rr: self.expect_rr,
            backtrack: self.backtrack,
        })
    }
}

impl Default for GrammarBuilder {
    fn default() -> Self {
        GrammarBuilder::new()
    }
}
