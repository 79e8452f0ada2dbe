//! # sra-io: Study Data Import & Result Export
//!
//! Reads the tabular system description consumed by the reliability engine
//! and writes its results back out.
//!
//! ## System directory layout
//!
//! | File | Required | Contents |
//! |------|----------|----------|
//! | `bus.csv` | yes | `Bus Name`, `Bus No.`, optional `Zone` |
//! | `branch.csv` | no | `From Bus`, `To Bus`, `R`, `X`, `B`, `Rating`, `MTTF`, `MTTR` |
//! | `gen.csv` | yes | `Bus No.`, `Max Cap`, `Min Cap`, `FOR`, `MTTF`, `MTTR`, `Cost` |
//! | `storage.csv` | no | `Name`, `Bus`, `Pmax`, `Pmin`, `Duration`, `max_SOC`, `min_SOC`, `Efficiency`, `Discharge Cost`, `Charge Cost`, `MTTF`, `MTTR`, `Units` |
//! | `load.csv` | yes | one column per bus name, one row per hour (MW) |
//! | `derating.json` | no | multi-state generator models keyed by generator row |
//!
//! `MTTF` may be written `inf` for assets that never fail. Renewable scenarios
//! use the same wide layout as `load.csv` and are loaded separately with
//! [`load_bus_series`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sra_io::importers::load_system;
//!
//! fn main() -> anyhow::Result<()> {
//!     let network = load_system("systems/three_area")?;
//!     println!("{}", network.stats());
//!     Ok(())
//! }
//! ```

pub mod exporters;
pub mod importers;

pub use exporters::{write_json, write_matrix_csv, write_records_csv};
pub use importers::{load_bus_series, load_system};
