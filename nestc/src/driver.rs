//! Entry points that own one translation from source text to a verified module.

use std::fs;
use std::path::Path;

use tracing::{info, info_span};

use crate::context::ParseContext;
use crate::error::CompileError;
use crate::ir::{self, Module};
use crate::parser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verify {
    None,
    /// Check the unit's entry procedure only.
    #[default]
    Outermost,
    All,
}

#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub verify: Verify,
}

/// Reads `filename` and translates it. Each call gets a fresh context.
pub fn parse(filename: &str) -> Result<ParseContext, CompileError> {
    let source = read_source(filename)?;
    parse_source(filename, &source)
}

pub fn parse_source(filename: &str, source: &str) -> Result<ParseContext, CompileError> {
    let span = info_span!("parse", file = %filename);
    let _guard = span.enter();

    let mut ctx = ParseContext::new(filename);
    parser::parse(source, &mut ctx)?;
    info!(
        functions = ctx.module().functions.len(),
        globals = ctx.module().globals.len(),
        "translation finished"
    );
    Ok(ctx)
}

pub fn read_source(filename: &str) -> Result<String, CompileError> {
    fs::read_to_string(filename).map_err(|source| CompileError::Io {
        path: Path::new(filename).to_path_buf(),
        source,
    })
}

/// Runs the post-parse structural check selected by `verify`.
pub fn verify(ctx: &ParseContext, verify: Verify) -> Result<(), CompileError> {
    match verify {
        Verify::None => Ok(()),
        Verify::Outermost => {
            let entry = ctx.outermost_procedure()?;
            info!(procedure = entry.name(), "verifying entry procedure");
            ir::verify_function(ctx.module(), entry.procedure().function)
        }
        Verify::All => {
            info!("verifying every procedure");
            ir::verify_module(ctx.module())
        }
    }
}

/// Parses, verifies and hands back the finished module.
pub fn compile_source(
    filename: &str,
    source: &str,
    options: &CompileOptions,
) -> Result<Module, CompileError> {
    let ctx = parse_source(filename, source)?;
    verify(&ctx, options.verify)?;
    Ok(ctx.into_module())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_an_io_error() {
        let err = parse("/definitely/not/here.nst").unwrap_err();
        assert!(matches!(err, CompileError::Io { .. }));
    }

    #[test]
    fn parse_reads_from_disk() {
        let path = std::env::temp_dir().join(format!("nestc-driver-{}.nst", std::process::id()));
        fs::write(&path, "PROCEDURE MAIN; BEGIN END.").unwrap();
        let ctx = parse(path.to_str().unwrap()).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(ctx.outermost_procedure().unwrap().name(), "MAIN");
        assert!(verify(&ctx, Verify::Outermost).is_ok());
    }

    #[test]
    fn separate_parses_share_nothing() {
        let a = parse_source("a.nst", "VAR X: INT8; PROCEDURE MAIN; BEGIN X := 1 END.").unwrap();
        let b = parse_source("b.nst", "VAR X: INT8; PROCEDURE MAIN; BEGIN X := 2 END.").unwrap();
        assert_eq!(a.module().globals.len(), 1);
        assert_eq!(b.module().globals.len(), 1);
        assert_eq!(b.module().globals[0].name, "X");
    }

    #[test]
    fn verify_none_skips_checks() {
        let ctx = parse_source("t.nst", "PROCEDURE MAIN; BEGIN END.").unwrap();
        assert!(verify(&ctx, Verify::None).is_ok());
        assert!(verify(&ctx, Verify::All).is_ok());
    }
}
