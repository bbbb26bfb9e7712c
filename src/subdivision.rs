//! Enumeration of every contiguous run of tokens, deduplicated by spelling
//! and counted without self-overlap.
//!
//! Runs are identified by walking a trie of interned spellings: extending a
//! run by one token is one map lookup, so enumerating all O(n²) runs stays
//! O(n²) instead of rehashing each run from scratch.

use fnv::FnvHashMap;
use log::debug;
use static_assertions::assert_eq_size;

use crate::lexer::function_like_macros;
use crate::token::Token;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
struct Symbol(u32);

// Trie edges are packed as (parent node, symbol) into a u64
assert_eq_size!(symbol_size_assert; Symbol, u32);

const ROOT: u32 = u32::MAX;

/// A distinct run of token spellings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subdivision {
    /// Index of the first token of the first occurrence
    pub start: usize,
    pub len: usize,
    /// Number of occurrences that do not overlap each other, counted
    /// greedily from the left
    pub frequency: usize,
}

impl Subdivision {
    /// Index of the last token of the first occurrence
    pub fn end(&self) -> usize {
        self.start + self.len - 1
    }

    pub fn tokens<'a>(&self, tokens: &'a [Token]) -> &'a [Token] {
        &tokens[self.start..self.start + self.len]
    }
}

struct Node {
    start: usize,
    len: usize,
    frequency: usize,
    last_end: Option<usize>,
}

fn intern(tokens: &[Token]) -> Vec<Symbol> {
    let mut table: FnvHashMap<&str, Symbol> = FnvHashMap::default();
    tokens
        .iter()
        .map(|t| {
            let next = Symbol(table.len() as u32);
            *table.entry(t.spelling.as_str()).or_insert(next)
        })
        .collect()
}

fn edge_key(parent: u32, symbol: Symbol) -> u64 {
    (u64::from(parent) << 32) | u64::from(symbol.0)
}

/// Invocations of function-like macros. A macro body may hold a whole
/// invocation or none of it; with only part of one, the definition would
/// leave the call's parentheses unbalanced.
pub(crate) struct Calls {
    /// For a token naming an invoked macro, the index of the call's `)`
    close: Vec<Option<usize>>,
    /// Tokens after the name of some call, up to its `)`
    inside: Vec<bool>,
}

impl Calls {
    pub(crate) fn new(tokens: &[Token]) -> Self {
        let names = function_like_macros(tokens);
        let mut close = vec![None; tokens.len()];
        let mut inside = vec![false; tokens.len()];

        for (i, token) in tokens.iter().enumerate() {
            let opens = tokens
                .get(i + 1)
                .map_or(false, |next| next.spelling == "(" && !next.in_directive());
            if token.in_directive() || !opens || !names.contains(token.spelling.as_str()) {
                continue;
            }

            // An unbalanced call runs to the end of the input
            let mut end = tokens.len() - 1;
            let mut depth = 0;
            for (j, t) in tokens.iter().enumerate().skip(i + 1) {
                if t.in_directive() {
                    continue;
                }
                match t.spelling.as_str() {
                    "(" => depth += 1,
                    ")" => {
                        depth -= 1;
                        if depth == 0 {
                            end = j;
                            break;
                        }
                    }
                    _ => {}
                }
            }

            close[i] = Some(end);
            for flag in &mut inside[i + 1..=end] {
                *flag = true;
            }
        }

        Calls { close, inside }
    }

    pub(crate) fn can_start_at(&self, start: usize) -> bool {
        !self.inside[start]
    }

    /// Index of the `)` closing the call named at `i`
    pub(crate) fn close_of(&self, i: usize) -> Option<usize> {
        self.close[i]
    }

    /// Whether `start..=end` holds each call it touches in full
    pub(crate) fn keeps_whole(&self, start: usize, end: usize) -> bool {
        self.can_start_at(start)
            && (start..=end).all(|i| self.close[i].map_or(true, |close| close <= end))
    }
}

/// Enumerates all runs `start..=end` in order of `start`, then `end`, and
/// returns each distinct spelling sequence once, in order of first counted
/// appearance. Runs never include preprocessor directive tokens or open
/// quotes, and never cut a function-like macro invocation in two. When
/// `max_len` is given, longer runs are skipped.
pub fn gen_subdivisions(tokens: &[Token], max_len: Option<usize>) -> Vec<Subdivision> {
    debug!("Generating subdivisions of {} tokens", tokens.len());

    let symbols = intern(tokens);
    let calls = Calls::new(tokens);
    let mut edges: FnvHashMap<u64, u32> = FnvHashMap::default();
    let mut nodes: Vec<Node> = Vec::new();
    // Nodes in the order their first occurrence was counted
    let mut counted: Vec<u32> = Vec::new();

    for start in 0..tokens.len() {
        if !calls.can_start_at(start) {
            continue;
        }
        let limit = max_len.map_or(tokens.len(), |max| tokens.len().min(start + max));
        let mut parent = ROOT;
        // The run is only whole once it reaches the `)` of every call it opens
        let mut whole_from = start;
        for end in start..limit {
            if !tokens[end].extractable() {
                break;
            }
            if let Some(close) = calls.close_of(end) {
                whole_from = whole_from.max(close);
            }

            let fresh = nodes.len() as u32;
            let id = *edges.entry(edge_key(parent, symbols[end])).or_insert(fresh);
            if id == fresh {
                nodes.push(Node {
                    start,
                    len: end - start + 1,
                    frequency: 0,
                    last_end: None,
                });
            }
            parent = id;

            if end < whole_from {
                continue;
            }

            // Every occurrence of a node has the same length, and starts
            // arrive in increasing order, so this is a leftmost greedy scan
            let node = &mut nodes[id as usize];
            if node.last_end.map_or(true, |last| start > last) {
                if node.frequency == 0 {
                    node.start = start;
                    counted.push(id);
                }
                node.frequency += 1;
                node.last_end = Some(end);
            }
        }
    }

    debug!("Counted {} distinct subdivisions", counted.len());

    counted
        .into_iter()
        .map(|id| {
            let node = &nodes[id as usize];
            Subdivision {
                start: node.start,
                len: node.len,
                frequency: node.frequency,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokens;

    fn counts(code: &str, max_len: Option<usize>) -> Vec<(String, usize)> {
        let toks = tokens(code).unwrap();
        gen_subdivisions(&toks, max_len)
            .iter()
            .map(|s| {
                let text = s
                    .tokens(&toks)
                    .iter()
                    .map(|t| t.spelling.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                (text, s.frequency)
            })
            .collect()
    }

    fn owned(expected: &[(&str, usize)]) -> Vec<(String, usize)> {
        expected.iter().map(|(s, n)| (s.to_string(), *n)).collect()
    }

    #[test]
    fn overlapping_occurrences_count_once() {
        assert_eq!(
            counts("a b a b a", None),
            owned(&[
                ("a", 3),
                ("a b", 2),
                ("a b a", 1),
                ("a b a b", 1),
                ("a b a b a", 1),
                ("b", 2),
                ("b a", 2),
                ("b a b", 1),
                ("b a b a", 1),
            ])
        );
    }

    #[test]
    fn repeated_token_runs() {
        // "x x" fits twice into "x x x x" but three times as a sliding window
        let all = counts("x x x x", None);
        assert_eq!(all, owned(&[("x", 4), ("x x", 2), ("x x x", 1), ("x x x x", 1)]));
    }

    #[test]
    fn directives_are_skipped() {
        let all = counts("#define X 1\nx x", None);
        assert_eq!(all, owned(&[("x", 2), ("x x", 1)]));
    }

    #[test]
    fn runs_stop_before_directives() {
        let all = counts("a\n#include <b.h>\na", None);
        assert_eq!(all, owned(&[("a", 2)]));
    }

    #[test]
    fn max_len_bounds_runs() {
        let all = counts("a b a b", Some(1));
        assert_eq!(all, owned(&[("a", 2), ("b", 2)]));
    }

    #[test]
    fn first_occurrence_is_recorded() {
        let toks = tokens("c a b c a b").unwrap();
        let subdivs = gen_subdivisions(&toks, None);
        let ab = subdivs
            .iter()
            .find(|s| s.len == 2 && s.tokens(&toks)[0].spelling == "a")
            .unwrap();
        assert_eq!((ab.start, ab.end(), ab.frequency), (1, 2, 2));
    }

    #[test]
    fn macro_calls_are_kept_whole() {
        let all = counts("#define SQ(x) x\ng(SQ(a)); g(SQ(b));", None);
        let runs: Vec<&str> = all.iter().map(|(text, _)| text.as_str()).collect();
        assert!(runs.contains(&"SQ ( a )"));
        assert!(runs.contains(&") ; g ("));
        assert!(runs.contains(&"g ( SQ ( a ) )"));
        assert!(!runs.iter().any(|r| r.ends_with("SQ") || r.ends_with("SQ (")));
        assert!(!runs.iter().any(|r| r.starts_with("( a") || r.starts_with("a )")));
        assert!(!runs.contains(&"a"));
    }

    #[test]
    fn nested_calls() {
        let toks = tokens("#define F(x) x\nF(F(1)) F(F(1))").unwrap();
        let calls = Calls::new(&toks);
        let first = toks.iter().position(|t| !t.in_directive()).unwrap();
        assert_eq!(calls.close_of(first), Some(first + 6));
        assert_eq!(calls.close_of(first + 2), Some(first + 5));
        assert!(calls.keeps_whole(first, first + 6));
        assert!(!calls.keeps_whole(first + 2, first + 5));
        assert!(!calls.keeps_whole(first, first + 5));
        let first_counted = &counts("#define F(x) x\nF(F(1)) F(F(1))", None)[0];
        assert_eq!(first_counted, &("F ( F ( 1 ) )".to_string(), 2));
    }

    #[test]
    fn object_like_names_are_not_calls() {
        let all = counts("#define N (1)\nN(a) N(a)", None);
        assert!(all.contains(&("N ( a".to_string(), 2)));
    }

    #[test]
    fn open_quotes_end_runs() {
        let all = counts("a b'c\na b", None);
        assert_eq!(all, owned(&[("a", 2), ("a b", 2), ("b", 2)]));
    }

    #[test]
    fn empty_input() {
        assert!(gen_subdivisions(&[], None).is_empty());
    }
}
