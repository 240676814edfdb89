//! Single-pass front end for a block-structured language with nested
//! procedures. Grammar actions resolve names and emit IR while parsing.

pub mod codegen;
pub mod context;
pub mod diagnostics;
pub mod driver;
pub mod error;
pub mod ir;
pub mod parser;
pub mod sema;
pub mod span;

pub use context::ParseContext;
pub use driver::{compile_source, parse, parse_source, CompileOptions, Verify};
pub use error::CompileError;
