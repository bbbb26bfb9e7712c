use std::io;

use thiserror::Error;

use crate::lexer::LexError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Lexing error: {0}")]
    Lex(#[from] LexError),
}

pub type Result<T> = std::result::Result<T, Error>;
