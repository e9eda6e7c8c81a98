//! Top-level modes: one-shot analysis and the interactive question loop.

pub mod analyze;
pub mod interactive;

use std::io::Write;

use anyhow::Result;

use crate::agent::RunOutcome;
use crate::printer::Printers;

fn write_outcome<W: Write>(out: &mut W, printers: &Printers, outcome: &RunOutcome) -> Result<()> {
    writeln!(out, "{}", printers.answer(&outcome.answer))?;
    if !outcome.artifacts.is_empty() {
        writeln!(out, "\n{}", printers.banner.render("Saved visualizations:"))?;
        for path in &outcome.artifacts {
            writeln!(out, "  {path}")?;
        }
    }
    Ok(())
}
