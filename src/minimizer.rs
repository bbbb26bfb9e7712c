use log::info;

use crate::error::Result;
use crate::lexer::tokens;
use crate::macro_gen::{generate_one_macro, unique_macro_name, Macro};
use crate::reconstruct::reconstruct_source;

#[derive(Clone, Debug)]
pub struct MinimizeOptions {
    /// Generated macros are named this followed by a number
    pub prefix: String,
    /// Stop after generating this many macros
    pub max_macros: Option<usize>,
    /// Longest run of tokens considered for a macro body
    pub max_len: Option<usize>,
}

impl Default for MinimizeOptions {
    fn default() -> Self {
        MinimizeOptions {
            prefix: "m".to_string(),
            max_macros: None,
            max_len: None,
        }
    }
}

#[derive(Debug)]
pub struct Report {
    pub source: String,
    pub initial_tokens: usize,
    pub final_tokens: usize,
    pub macros: Vec<Macro>,
}

pub struct Minimizer {
    options: MinimizeOptions,
}

impl Minimizer {
    pub fn new(options: MinimizeOptions) -> Self {
        Minimizer { options }
    }

    /// Extracts macros one at a time, re-reading the rewritten source after
    /// each, until no macro makes it any shorter.
    pub fn run(&self, code: &str) -> Result<Report> {
        let mut current = tokens(code)?;
        let initial_tokens = current.len();
        info!("Initial tokens: {}", initial_tokens);

        let mut source = code.to_string();
        let mut macros = Vec::new();

        while self
            .options
            .max_macros
            .map_or(true, |max| macros.len() < max)
        {
            let name = unique_macro_name(&self.options.prefix, &current);
            let (rewritten, generated) =
                match generate_one_macro(&current, &name, self.options.max_len) {
                    Some(result) => result,
                    None => break,
                };

            let next_source = reconstruct_source(&rewritten);
            let next = tokens(&next_source)?;
            if next.len() >= current.len() {
                info!(
                    "Tokens did not decrease from {} (got {}), keeping previous source",
                    current.len(),
                    next.len()
                );
                break;
            }

            info!("{}: {} -> {} tokens", generated, current.len(), next.len());
            source = next_source;
            current = next;
            macros.push(generated);
        }

        Ok(Report {
            source,
            initial_tokens,
            final_tokens: current.len(),
            macros,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::count_tokens;

    const SQUARES: &str = "\
#define SQ(x) ((x) * (x))
int g(int);
void f(void) {
    g(SQ(a1));
    g(SQ(a2));
    g(SQ(a3));
    g(SQ(a4));
}
";

    const REPEATED: &str = "\
int f(int a, int b);
int main(void) {
    f(1, 2); f(1, 2); f(1, 2); f(1, 2);
    return f(3, 4) + f(3, 4) + f(3, 4);
}
";

    #[test]
    fn shrinks_repeated_code() {
        let report = Minimizer::new(MinimizeOptions::default())
            .run(REPEATED)
            .unwrap();
        assert!(!report.macros.is_empty());
        assert!(report.final_tokens < report.initial_tokens);
        assert_eq!(count_tokens(&report.source).unwrap(), report.final_tokens);
        assert_eq!(report.macros[0].name, "m0");
    }

    #[test]
    fn each_macro_changes_count_by_its_score() {
        let report = Minimizer::new(MinimizeOptions::default())
            .run(REPEATED)
            .unwrap();
        let total: i64 = report.macros.iter().map(|m| m.score).sum();
        assert_eq!(
            report.final_tokens as i64,
            report.initial_tokens as i64 + total
        );
    }

    #[test]
    fn max_macros_stops_early() {
        let options = MinimizeOptions {
            max_macros: Some(1),
            ..MinimizeOptions::default()
        };
        let report = Minimizer::new(options).run(REPEATED).unwrap();
        assert_eq!(report.macros.len(), 1);
        assert!(report.source.starts_with("# define m0 "));
    }

    #[test]
    fn names_avoid_existing_identifiers() {
        let code = "int m0; g(m0, 1); g(m0, 1); g(m0, 1); g(m0, 1);";
        let report = Minimizer::new(MinimizeOptions::default()).run(code).unwrap();
        assert_eq!(report.macros[0].name, "m1");
    }

    #[test]
    fn incompressible_source_is_untouched() {
        let code = "int main(void) { return 0; } // bye\n";
        let report = Minimizer::new(MinimizeOptions::default()).run(code).unwrap();
        assert!(report.macros.is_empty());
        assert_eq!(report.source, code);
        assert_eq!(report.initial_tokens, report.final_tokens);
    }

    #[test]
    fn macro_calls_keep_their_parentheses() {
        let report = Minimizer::new(MinimizeOptions::default())
            .run(SQUARES)
            .unwrap();
        assert!(!report.macros.is_empty());
        let names: Vec<&str> = report.macros.iter().map(|m| m.name.as_str()).collect();

        let toks = tokens(&report.source).unwrap();
        let mut calls = 0;
        for (i, token) in toks.iter().enumerate() {
            if token.spelling != "SQ" || token.in_directive() {
                continue;
            }
            calls += 1;
            assert_eq!(toks[i + 1].spelling, "(");
            let mut depth = 0;
            let close = toks[i + 1..]
                .iter()
                .position(|t| {
                    match t.spelling.as_str() {
                        "(" => depth += 1,
                        ")" => depth -= 1,
                        _ => {}
                    }
                    depth == 0
                })
                .map(|k| i + 1 + k)
                .expect("unclosed SQ call");
            assert!(toks[i..=close]
                .iter()
                .all(|t| !names.contains(&t.spelling.as_str())));
        }
        assert_eq!(calls, 4);
    }

    #[test]
    fn open_quotes_in_skipped_code_are_accepted() {
        let code = "#if 0\nthis isn't built\n#endif\nint x;\n";
        let report = Minimizer::new(MinimizeOptions::default()).run(code).unwrap();
        assert_eq!(report.initial_tokens, 11);
        assert_eq!(report.source, code);
    }

    #[test]
    fn lexing_errors_are_reported() {
        let err = Minimizer::new(MinimizeOptions::default())
            .run("int a = 1 @ 2;")
            .unwrap_err();
        assert!(err.to_string().starts_with("Lexing error: "));
    }
}
