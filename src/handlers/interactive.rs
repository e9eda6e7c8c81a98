//! Interactive mode: one question per line against the same agent, so memory carries over.

use std::io::{BufRead, Write};

use anyhow::Result;
use tracing::debug;

use super::write_outcome;
use crate::agent::EdaAgent;
use crate::printer::Printers;

const PROMPT: &str = "\nWhat would you like to know about the data? > ";

/// Reads queries until `exit` (any case) or end of input. A failed query is
/// reported and the loop keeps going.
pub async fn run_loop<R: BufRead, W: Write>(
    agent: &mut EdaAgent,
    mut input: R,
    out: &mut W,
    printers: &Printers,
) -> Result<()> {
    writeln!(out, "{}", printers.banner.render("\nEntering interactive mode. Type 'exit' to quit."))?;
    writeln!(out, "You can ask questions about the data or request specific analyses.")?;

    let mut line = String::new();
    loop {
        write!(out, "{PROMPT}")?;
        out.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            writeln!(out)?;
            break;
        }
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query.eq_ignore_ascii_case("exit") {
            break;
        }

        debug!(query, "interactive query");
        match agent.ask(query).await {
            Ok(outcome) => {
                writeln!(out, "\nAgent Response:")?;
                write_outcome(out, printers, &outcome)?;
            }
            Err(e) => writeln!(out, "\n{}", printers.error.render(&format!("Error: {e:#}")))?,
        }
    }
    Ok(())
}
