pub mod lexer;
pub mod parser;

use crate::context::ParseContext;
use crate::error::CompileError;

/// Tokenizes `source` and translates it into `ctx` in a single pass.
pub fn parse(source: &str, ctx: &mut ParseContext) -> Result<(), CompileError> {
    let filename = ctx.location.file.clone();
    let tokens = lexer::tokenize(source, &filename)?;
    parser::parse_tokens(tokens, ctx)
}
