mod error;
mod lexer;
mod macro_gen;
mod minimizer;
mod reconstruct;
mod subdivision;
mod token;

pub use error::{Error, Result};
pub use lexer::{count_tokens, function_like_macros, lex, tokens, LexError, LexErrorType};
pub use macro_gen::{
    apply_macro, best_candidate, generate_one_macro, rank_candidates, score, spelling_text,
    unique_macro_name, Candidate, Macro, GENERATED_DIRECTIVE,
};
pub use minimizer::{MinimizeOptions, Minimizer, Report};
pub use reconstruct::reconstruct_source;
pub use subdivision::{gen_subdivisions, Subdivision};
pub use token::{Pos, Span, Token, TokenKind};
