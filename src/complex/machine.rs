//! Syllable segmentation.
//!
//! A script describes its syllables as a list of [`Rule`]s, each a regular
//! [`Pattern`] over character categories. The rules are compiled into a
//! deterministic transition table once per plan; [`Machine::find_syllables`]
//! then walks the buffer with it, taking the longest match at every
//! position. On a tie the rule listed first wins.

use alloc::collections::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;

use crate::buffer::{Buffer, GlyphInfo};

/// Categories are small integers; a pattern atom is a set of them.
pub(crate) type CategorySet = u64;

/// The highest category a grammar can mention, plus one.
pub(crate) const MAX_CATEGORIES: usize = 64;

/// A regular expression over categories.
#[derive(Debug)]
pub(crate) enum Pattern {
    /// One character from the set.
    Any(CategorySet),
    Seq(&'static [Pattern]),
    Alt(&'static [Pattern]),
    Opt(&'static Pattern),
    Star(&'static Pattern),
    /// Zero to `n` repetitions.
    UpTo(usize, &'static Pattern),
}

/// A syllable shape and the syllable type it produces.
#[derive(Debug)]
pub(crate) struct Rule {
    pub pattern: Pattern,
    pub kind: u8,
}

/// A script's syllable grammar.
#[derive(Debug)]
pub(crate) struct Grammar {
    pub rules: &'static [Rule],
    /// Type of a single character nothing else matched.
    pub fallback: u8,
}

const DEAD: u16 = u16::MAX;

/// How far a scan may run past its last accepted length. Keeps
/// segmentation linear when a grammar can stay alive without accepting.
const MAX_PENDING: usize = 32;

#[derive(Clone, Debug)]
struct State {
    next: [u16; MAX_CATEGORIES],
    accept: Option<u8>,
}

/// A compiled grammar.
#[derive(Clone, Debug)]
pub(crate) struct Machine {
    states: Vec<State>,
    fallback: u8,
}

// Thompson construction.
#[derive(Default)]
struct Nfa {
    eps: Vec<Vec<usize>>,
    edge: Vec<Option<(CategorySet, usize)>>,
    accept: Vec<Option<u8>>,
}

impl Nfa {
    fn state(&mut self) -> usize {
        self.eps.push(Vec::new());
        self.edge.push(None);
        self.accept.push(None);
        self.eps.len() - 1
    }

    fn build(&mut self, pattern: &Pattern) -> (usize, usize) {
        match pattern {
            Pattern::Any(set) => {
                let (s, t) = (self.state(), self.state());
                self.edge[s] = Some((*set, t));
                (s, t)
            }
            Pattern::Seq(parts) => {
                let s = self.state();
                let mut end = s;
                for part in parts.iter() {
                    let (a, b) = self.build(part);
                    self.eps[end].push(a);
                    end = b;
                }
                (s, end)
            }
            Pattern::Alt(parts) => {
                let (s, t) = (self.state(), self.state());
                for part in parts.iter() {
                    let (a, b) = self.build(part);
                    self.eps[s].push(a);
                    self.eps[b].push(t);
                }
                (s, t)
            }
            Pattern::Opt(inner) => {
                let (a, b) = self.build(inner);
                self.eps[a].push(b);
                (a, b)
            }
            Pattern::Star(inner) => {
                let (s, t) = (self.state(), self.state());
                let (a, b) = self.build(inner);
                self.eps[s].push(a);
                self.eps[s].push(t);
                self.eps[b].push(a);
                self.eps[b].push(t);
                (s, t)
            }
            Pattern::UpTo(count, inner) => {
                let (s, t) = (self.state(), self.state());
                let mut end = s;
                for _ in 0..*count {
                    let (a, b) = self.build(inner);
                    self.eps[end].push(a);
                    self.eps[end].push(t);
                    end = b;
                }
                self.eps[end].push(t);
                (s, t)
            }
        }
    }

    fn closure(&self, mut set: Vec<usize>) -> Vec<usize> {
        let mut stack = set.clone();
        while let Some(s) = stack.pop() {
            for &t in &self.eps[s] {
                if !set.contains(&t) {
                    set.push(t);
                    stack.push(t);
                }
            }
        }

        set.sort_unstable();
        set
    }
}

impl Machine {
    /// Compiles a grammar with the subset construction.
    pub(crate) fn new(grammar: &Grammar) -> Self {
        let mut nfa = Nfa::default();
        let start = nfa.state();
        for rule in grammar.rules {
            let (a, b) = nfa.build(&rule.pattern);
            nfa.eps[start].push(a);
            nfa.accept[b] = Some(rule.kind);
        }

        let mut states: Vec<State> = Vec::new();
        let mut sets: Vec<Vec<usize>> = Vec::new();
        let mut index: BTreeMap<Vec<usize>, u16> = BTreeMap::new();

        let initial = nfa.closure(vec![start]);
        index.insert(initial.clone(), 0);
        sets.push(initial);

        let mut i = 0;
        while i < sets.len() {
            let set = sets[i].clone();

            // The rule listed first wins a tie.
            let accept = grammar
                .rules
                .iter()
                .map(|rule| rule.kind)
                .find(|kind| set.iter().any(|&s| nfa.accept[s] == Some(*kind)));

            let mut next = [DEAD; MAX_CATEGORIES];
            for (category, slot) in next.iter_mut().enumerate() {
                let bit = 1u64 << category;
                let targets: Vec<usize> = set
                    .iter()
                    .filter_map(|&s| nfa.edge[s])
                    .filter(|&(cats, _)| cats & bit != 0)
                    .map(|(_, t)| t)
                    .collect();

                if targets.is_empty() {
                    continue;
                }

                let target = nfa.closure(targets);
                *slot = match index.get(&target) {
                    Some(&id) => id,
                    None => {
                        let id = sets.len() as u16;
                        index.insert(target.clone(), id);
                        sets.push(target);
                        id
                    }
                };
            }

            states.push(State { next, accept });
            i += 1;
        }

        Machine {
            states,
            fallback: grammar.fallback,
        }
    }

    /// Number of table states.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.states.len()
    }

    /// Length and type of the syllable at the start of `categories`.
    pub(crate) fn match_syllable(&self, categories: impl Iterator<Item = u8>) -> (usize, u8) {
        let mut state = 0usize;
        let mut last = (1, self.fallback);
        for (i, category) in categories.enumerate() {
            let next = match self.states[state].next.get(usize::from(category)) {
                Some(&next) if next != DEAD => next,
                _ => break,
            };

            state = usize::from(next);
            if let Some(kind) = self.states[state].accept {
                last = (i + 1, kind);
            } else if i + 1 - last.0 >= MAX_PENDING {
                break;
            }
        }

        last
    }

    /// Splits the buffer into syllables, storing `serial << 4 | type` in
    /// each glyph's syllable field.
    ///
    /// The serial runs from 1 to 15 and wraps, so adjacent syllables always
    /// differ.
    pub(crate) fn find_syllables(&self, buffer: &mut Buffer, category: impl Fn(&GlyphInfo) -> u8) {
        let mut serial = 1u8;
        let mut start = 0;
        let len = buffer.len;
        while start < len {
            let (length, kind) = self.match_syllable(buffer.info[start..len].iter().map(&category));
            let end = start + length;
            for info in &mut buffer.info[start..end] {
                info.set_syllable((serial << 4) | kind);
            }

            serial += 1;
            if serial == 16 {
                serial = 1;
            }

            start = end;
        }
    }
}

/// A set holding one category.
pub(crate) const fn one(category: u8) -> CategorySet {
    1 << category
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: u8 = 1;
    const B: u8 = 2;
    const C: u8 = 3;

    // ab* | a c
    const RULES: &[Rule] = &[
        Rule {
            pattern: Pattern::Seq(&[Pattern::Any(one(A)), Pattern::Star(&Pattern::Any(one(B)))]),
            kind: 0,
        },
        Rule {
            pattern: Pattern::Seq(&[Pattern::Any(one(A)), Pattern::Opt(&Pattern::Any(one(C)))]),
            kind: 1,
        },
    ];

    const GRAMMAR: Grammar = Grammar {
        rules: RULES,
        fallback: 7,
    };

    #[test]
    fn longest_match_wins() {
        let machine = Machine::new(&GRAMMAR);
        assert_eq!(machine.match_syllable([A, B, B, A].into_iter()), (3, 0));
        assert_eq!(machine.match_syllable([A, C, B].into_iter()), (2, 1));
    }

    #[test]
    fn first_rule_wins_a_tie() {
        let machine = Machine::new(&GRAMMAR);
        assert_eq!(machine.match_syllable([A, A].into_iter()), (1, 0));
    }

    #[test]
    fn bounded_repetition() {
        // a b{0,2}
        const BOUNDED: &[Rule] = &[Rule {
            pattern: Pattern::Seq(&[Pattern::Any(one(A)), Pattern::UpTo(2, &Pattern::Any(one(B)))]),
            kind: 0,
        }];

        let machine = Machine::new(&Grammar {
            rules: BOUNDED,
            fallback: 7,
        });
        assert_eq!(machine.match_syllable([A].into_iter()), (1, 0));
        assert_eq!(machine.match_syllable([A, B, B].into_iter()), (3, 0));
        assert_eq!(machine.match_syllable([A, B, B, B].into_iter()), (3, 0));
    }

    #[test]
    fn scan_stops_when_nothing_accepts() {
        // a | a b* c
        const RULES: &[Rule] = &[
            Rule {
                pattern: Pattern::Any(one(A)),
                kind: 0,
            },
            Rule {
                pattern: Pattern::Seq(&[
                    Pattern::Any(one(A)),
                    Pattern::Star(&Pattern::Any(one(B))),
                    Pattern::Any(one(C)),
                ]),
                kind: 1,
            },
        ];

        let machine = Machine::new(&Grammar { rules: RULES, fallback: 7 });

        let read = core::cell::Cell::new(0);
        let input = core::iter::once(A)
            .chain(core::iter::repeat(B).take(10_000))
            .inspect(|_| read.set(read.get() + 1));
        assert_eq!(machine.match_syllable(input), (1, 0));
        assert!(read.get() <= MAX_PENDING + 1);

        // Short enough runs still reach the longer match.
        assert_eq!(machine.match_syllable([A, B, B, C].into_iter()), (4, 1));
    }

    #[test]
    fn unmatched_character_is_a_single_syllable() {
        let machine = Machine::new(&GRAMMAR);
        assert_eq!(machine.match_syllable([C, A].into_iter()), (1, 7));
        assert_eq!(machine.match_syllable([60, A].into_iter()), (1, 7));
    }

    #[test]
    fn equal_sets_share_a_state() {
        let machine = Machine::new(&GRAMMAR);
        assert!(machine.len() <= 6);
    }
}
