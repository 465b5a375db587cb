// Licensed under the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

// This macro creates a struct with the given name and a u32 payload, and a sensible set of
// traits and conversions. Grammars big enough to overflow a u32 index are beyond anything we
// will ever plausibly encounter, but the From impls check anyway.

macro_rules! IdxNewtype {
    ($(#[$attr:meta])* $n: ident) => {
        $(#[$attr])*
        #[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $n(pub u32);

        impl From<usize> for $n {
            fn from(v: usize) -> Self {
                if v > u32::MAX as usize {
                    panic!("Overflow");
                }
                $n(v as u32)
            }
        }

        impl From<$n> for usize {
            fn from(v: $n) -> Self {
                v.0 as usize
            }
        }

        impl From<$n> for u32 {
            fn from(v: $n) -> Self {
                v.0
            }
        }
    }
}

IdxNewtype!(
    /// A symbol index. Terminals come first (with the end-of-input token at index 0 and the
    /// error token at index 1), nonterminals after.
    SymIdx
);
IdxNewtype!(
    /// A rule index. Rules 0 and 1 are placeholders; rule 2 is the augmented start rule; user
    /// rules are numbered from 3.
    RIdx
);
IdxNewtype!(
    /// An index into a grammar's flattened item array.
    ItIdx
);
