use anyhow::{bail, Result};
use sra_io::importers;
use std::io::{self, Write};
use std::path::Path;
use tabwriter::TabWriter;
use tracing::info;

pub fn handle(system: &Path) -> Result<()> {
    let network = importers::load_system(system)?;
    let diagnostics = network.validate();
    info!(system = %system.display(), "validating system");

    println!("System: {}", network.stats());
    print!("{diagnostics}");
    let counts = diagnostics.counts_by_category();
    if !counts.is_empty() {
        let mut writer = TabWriter::new(io::stdout());
        writeln!(writer, "CATEGORY\tWARNINGS\tERRORS")?;
        for (category, (warnings, errors)) in counts {
            writeln!(writer, "{category}\t{warnings}\t{errors}")?;
        }
        writer.flush()?;
    }
    if diagnostics.has_errors() {
        bail!(
            "'{}' failed validation: {}",
            system.display(),
            diagnostics.summary()
        );
    }
    Ok(())
}
