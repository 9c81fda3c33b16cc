//! Boolean/comparison expressions used by `#if` blocks.

pub mod eval;
pub mod lexer;

pub use eval::{evaluate, loose_eq, parse, Expr, Lookup};
pub use lexer::{tokenize, Token};
