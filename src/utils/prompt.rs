//! Yes/no questions on the terminal.

use colored::Colorize;
use log::warn;
use std::io::{self, BufRead, IsTerminal, Write};

/// Ask `question` on stdout and read the answer from stdin. Empty input picks `default_yes`.
/// When stdin is not a terminal nothing is asked and `default_yes` is returned.
pub fn confirm(question: &str, default_yes: bool) -> io::Result<bool> {
    if !io::stdin().is_terminal() {
        warn!("Not a terminal; assuming default answer for: {question}");
        return Ok(default_yes);
    }
    let label = format!("[{}]", env!("CARGO_PKG_NAME")).cyan().bold();
    let hint = if default_yes { "[Y/n]" } else { "[y/N]" };
    print!("{} {} {}: ", label, question, hint);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(parse_answer(&answer, default_yes))
}

fn parse_answer(answer: &str, default_yes: bool) -> bool {
    match answer.trim().to_lowercase().as_str() {
        "" => default_yes,
        "y" | "yes" => true,
        "n" | "no" => false,
        _ => default_yes,
    }
}
