use anyhow::{Context, Result};
use sra_algo::build_matrices;
use sra_io::importers;
use std::io::{self, Write};
use std::path::Path;
use tabwriter::TabWriter;

pub fn handle(system: &Path) -> Result<()> {
    let network = importers::load_system(system)?;
    let matrices = build_matrices(&network)
        .with_context(|| format!("building study matrices for '{}'", system.display()))?;

    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "MATRIX\tROWS\tCOLS\tNNZ")?;
    for summary in matrices.summary() {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}",
            summary.name, summary.rows, summary.cols, summary.nnz
        )?;
    }
    writer.flush()?;
    Ok(())
}
