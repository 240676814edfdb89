use crate::error::CompileError;

/// Renders an error with the offending source line and a caret under the
/// reported column.
pub fn render(error: &CompileError, source: Option<&str>) -> String {
    let mut out = format!("error: {error}");
    if let (Some(location), Some(source)) = (error.location(), source) {
        if let Some(line_text) = source.lines().nth(location.line.saturating_sub(1)) {
            out.push_str(&format!(
                "\n  {}\n  {}^",
                line_text,
                " ".repeat(location.column.saturating_sub(1))
            ));
        }
    }
    out
}

/// Reports `error` on stderr and terminates with a non-zero status.
pub fn fatal(error: &CompileError, source: Option<&str>) -> ! {
    eprintln!("{}", render(error, source));
    std::process::exit(1)
}
