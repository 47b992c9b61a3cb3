//! Syntax layer for strata.
//!
//! This crate provides:
//! - `token`: Token kinds and directive locations
//! - `lexer`: Tokenization and string value decoding
//! - `ast`: Owned abstract syntax tree
//! - `parser`: Recursive descent parser for SDL and executable documents
//! - `printer`: SDL printing

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod printer;
pub mod token;

pub use ast::*;
pub use lexer::Lexer;
pub use parser::{parse, ParseResult};
pub use printer::{print, print_with_options, PrintOptions, Printer};
pub use token::{DirectiveLocation, Token, TokenKind};
