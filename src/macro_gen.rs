use std::fmt;

use fnv::FnvHashSet;
use log::{debug, info};

use crate::subdivision::{gen_subdivisions, Calls, Subdivision};
use crate::token::{Token, TokenKind};

/// Directive id given to generated `#define` lines. Lexed directives are
/// numbered from 1.
pub const GENERATED_DIRECTIVE: usize = 0;

/// Net change in token count from defining a macro for a run of `len`
/// tokens and replacing its `frequency` occurrences with the macro name.
/// The definition costs `#`, `define`, the name and the body.
pub fn score(len: usize, frequency: usize) -> i64 {
    let (len, frequency) = (len as i64, frequency as i64);
    frequency * (1 - len) + 2 + 1 + len
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub subdivision: Subdivision,
    pub score: i64,
}

impl Candidate {
    pub fn body<'a>(&self, tokens: &'a [Token]) -> &'a [Token] {
        self.subdivision.tokens(tokens)
    }

    pub fn frequency(&self) -> usize {
        self.subdivision.frequency
    }
}

/// A macro that was extracted from the source
#[derive(Clone, Debug)]
pub struct Macro {
    pub name: String,
    pub body: Vec<Token>,
    pub frequency: usize,
    pub score: i64,
}

impl Macro {
    pub fn body_text(&self) -> String {
        spelling_text(&self.body)
    }
}

impl fmt::Display for Macro {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#define {} {}", self.name, self.body_text())
    }
}

pub fn spelling_text(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|t| t.spelling.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

fn candidates(tokens: &[Token], max_len: Option<usize>) -> impl Iterator<Item = Candidate> {
    gen_subdivisions(tokens, max_len)
        .into_iter()
        .map(|subdivision| Candidate {
            score: score(subdivision.len, subdivision.frequency),
            subdivision,
        })
}

/// Every subdivision of `tokens`, best (lowest score) first. Equal scores
/// keep the order in which the runs first appear.
pub fn rank_candidates(tokens: &[Token], max_len: Option<usize>) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = candidates(tokens, max_len).collect();

    debug!("Sorting and scoring {} candidates", candidates.len());
    candidates.sort_by_key(|c| c.score);
    candidates
}

pub fn best_candidate(tokens: &[Token], max_len: Option<usize>) -> Option<Candidate> {
    candidates(tokens, max_len).min_by_key(|c| c.score)
}

/// Replaces each non-overlapping occurrence of `body` outside preprocessor
/// directives, scanning from the left, with an identifier `name`, and
/// prepends `# define name body`. An occurrence that would split a
/// function-like macro invocation is left alone. Returns the new tokens and
/// the number of occurrences replaced.
pub fn apply_macro(tokens: &[Token], body: &[Token], name: &str) -> (Vec<Token>, usize) {
    let calls = Calls::new(tokens);
    let mut output = definition(body, name);
    let mut replaced = 0;

    let mut i = 0;
    while i < tokens.len() {
        let found = !body.is_empty()
            && tokens.get(i..i + body.len()).map_or(false, |window| {
                window
                    .iter()
                    .zip(body)
                    .all(|(t, b)| t.extractable() && t.spelling == b.spelling)
            })
            && calls.keeps_whole(i, i + body.len() - 1);

        if found {
            output.push(Token::synthetic(TokenKind::Identifier, name));
            replaced += 1;
            i += body.len();
        } else {
            output.push(tokens[i].clone());
            i += 1;
        }
    }

    (output, replaced)
}

fn definition(body: &[Token], name: &str) -> Vec<Token> {
    let mut tokens = vec![
        Token::synthetic(TokenKind::Punctuation, "#"),
        Token::synthetic(TokenKind::Identifier, "define"),
        Token::synthetic(TokenKind::Identifier, name),
    ];
    // Body tokens keep their spans so their spacing survives. The name is
    // synthetic, so a space always follows it and a body starting with `(`
    // still gives an object-like macro.
    tokens.extend(body.iter().cloned());
    for token in &mut tokens {
        token.directive = Some(GENERATED_DIRECTIVE);
    }
    tokens
}

/// Extracts the best-scoring run of tokens into a macro called `name`.
/// Returns `None` when no run would make the program shorter.
pub fn generate_one_macro(
    tokens: &[Token],
    name: &str,
    max_len: Option<usize>,
) -> Option<(Vec<Token>, Macro)> {
    let best = best_candidate(tokens, max_len)?;
    let body = best.body(tokens).to_vec();

    info!(
        "Top subdivision (score {}, {} occurrences): {}",
        best.score,
        best.frequency(),
        spelling_text(&body)
    );

    if best.score >= 0 {
        return None;
    }

    let (rewritten, replaced) = apply_macro(tokens, &body, name);
    debug_assert_eq!(replaced, best.frequency());

    Some((
        rewritten,
        Macro {
            name: name.to_string(),
            body,
            frequency: replaced,
            score: best.score,
        },
    ))
}

/// `prefix` followed by the smallest number that makes a name no token is
/// already spelled as.
pub fn unique_macro_name(prefix: &str, tokens: &[Token]) -> String {
    let taken: FnvHashSet<&str> = tokens.iter().map(|t| t.spelling.as_str()).collect();
    let mut i = 0;
    loop {
        let name = format!("{}{}", prefix, i);
        if !taken.contains(name.as_str()) {
            return name;
        }
        i += 1;
    }
}
