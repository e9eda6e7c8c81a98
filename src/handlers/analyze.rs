//! Non-interactive mode: run the default analysis once and print the answer.

use std::io::Write;

use anyhow::Result;

use super::write_outcome;
use crate::agent::EdaAgent;
use crate::printer::Printers;

pub async fn run<W: Write>(agent: &mut EdaAgent, out: &mut W, printers: &Printers) -> Result<()> {
    let outcome = agent.run(None).await?;
    write_outcome(out, printers, &outcome)?;
    out.flush()?;
    Ok(())
}
