use anyhow::Result;
use std::io::{self, BufRead, Write};

/// Ask a yes/no question on stdin. `assume_yes` answers without asking.
pub fn confirm(question: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    let stdin = io::stdin();
    let mut out = io::stdout();
    confirm_with(&mut stdin.lock(), &mut out, question)
}

/// Anything but an explicit yes is a no, including EOF.
pub fn confirm_with(
    input: &mut impl BufRead,
    out: &mut impl Write,
    question: &str,
) -> Result<bool> {
    write!(out, "{question} [y/N]: ")?;
    out.flush().ok();
    let mut s = String::new();
    input.read_line(&mut s)?;
    Ok(matches!(s.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
