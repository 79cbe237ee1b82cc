//! Path expressions and the query mini-language embedded in step attributes.
//!
//! Links, drops, loops and switches all refer to pipeline data through
//! slash-delimited paths like `input/orders[0]/id`. Query attributes may mix
//! such paths with operators and function calls; [`tokenizer`] splits them so
//! every referenced variable can be analysed with the same parser.

pub mod parsed;
pub mod tokenizer;

pub use parsed::{ParsedPath, PathIndex, root_of};
pub use tokenizer::{
    Token, TokenKind, expression_body, loose_variables, path_variables, tokenize, variables,
};
