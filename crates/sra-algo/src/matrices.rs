//! Static incidence and mapping matrices for the dispatch LP.
//!
//! Every matrix has one row per bus (in registry order). Columns index the
//! asset class the matrix maps onto the buses:
//!
//! | Matrix | Shape | Entries |
//! |--------|-------|---------|
//! | `incidence` | buses x branches | `+1` at the from-bus, `-1` at the to-bus |
//! | `gen_map` | buses x generators | `1` at the generator's bus |
//! | `charge_map` / `discharge_map` | buses x storage | `1` at the unit's bus |
//! | `curtail_map` | buses x buses | identity |
//!
//! With branch flow `f` positive in the from→to direction, `incidence * f` is
//! the net outflow at each bus. The matrices are built once per study and
//! shared read-only by every worker.

use serde::Serialize;
use sprs::{CsMat, TriMat};
use sra_core::{BusId, Network, SraError, SraResult};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct StudyMatrices {
    pub incidence: CsMat<f64>,
    pub gen_map: CsMat<f64>,
    pub charge_map: CsMat<f64>,
    pub discharge_map: CsMat<f64>,
    pub curtail_map: CsMat<f64>,
}

/// Dimensions and fill of one matrix, for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatrixSummary {
    pub name: &'static str,
    pub rows: usize,
    pub cols: usize,
    pub nnz: usize,
}

fn resolve(
    positions: &HashMap<BusId, usize>,
    bus: BusId,
    owner: impl FnOnce() -> String,
) -> SraResult<usize> {
    positions
        .get(&bus)
        .copied()
        .ok_or_else(|| SraError::Topology(format!("{} refers to unknown {bus}", owner())))
}

fn indicator(n_bus: usize, buses: &[usize]) -> CsMat<f64> {
    let mut triplets = TriMat::new((n_bus, buses.len()));
    for (col, &row) in buses.iter().enumerate() {
        triplets.add_triplet(row, col, 1.0);
    }
    triplets.to_csr()
}

/// Derive the static matrices from the registry topology.
pub fn build_matrices(network: &Network) -> SraResult<StudyMatrices> {
    let positions = network.bus_positions();
    let n_bus = network.buses.len();

    let mut incidence = TriMat::new((n_bus, network.branches.len()));
    for (col, branch) in network.branches.iter().enumerate() {
        let from = resolve(&positions, branch.from_bus, || branch.id.to_string())?;
        let to = resolve(&positions, branch.to_bus, || branch.id.to_string())?;
        if from == to {
            return Err(SraError::Topology(format!(
                "{} connects {} to itself",
                branch.id, branch.from_bus
            )));
        }
        incidence.add_triplet(from, col, 1.0);
        incidence.add_triplet(to, col, -1.0);
    }

    let gen_buses = network
        .generators
        .iter()
        .map(|gen| resolve(&positions, gen.bus, || gen.id.to_string()))
        .collect::<SraResult<Vec<_>>>()?;
    let ess_buses = network
        .storage
        .iter()
        .map(|ess| resolve(&positions, ess.bus, || ess.id.to_string()))
        .collect::<SraResult<Vec<_>>>()?;
    let all_buses: Vec<usize> = (0..n_bus).collect();

    Ok(StudyMatrices {
        incidence: incidence.to_csr(),
        gen_map: indicator(n_bus, &gen_buses),
        charge_map: indicator(n_bus, &ess_buses),
        discharge_map: indicator(n_bus, &ess_buses),
        curtail_map: indicator(n_bus, &all_buses),
    })
}

/// `row_i(matrix) · values`
fn row_dot(matrix: &CsMat<f64>, row: usize, values: &[f64]) -> f64 {
    matrix
        .outer_view(row)
        .map(|view| view.iter().map(|(col, &a)| a * values[col]).sum())
        .unwrap_or(0.0)
}

impl StudyMatrices {
    pub fn n_bus(&self) -> usize {
        self.curtail_map.rows()
    }

    pub fn n_branch(&self) -> usize {
        self.incidence.cols()
    }

    pub fn n_gen(&self) -> usize {
        self.gen_map.cols()
    }

    pub fn n_storage(&self) -> usize {
        self.discharge_map.cols()
    }

    /// Column indices of row `bus` in `matrix`, with their coefficients.
    pub fn row_entries(matrix: &CsMat<f64>, bus: usize) -> Vec<(usize, f64)> {
        matrix
            .outer_view(bus)
            .map(|view| view.iter().map(|(col, &a)| (col, a)).collect())
            .unwrap_or_default()
    }

    /// Per-bus mismatch (MW) of
    /// `gen + discharge - charge - incidence·flow + curtailment + renewable - spill - load`.
    #[allow(clippy::too_many_arguments)]
    pub fn nodal_residual(
        &self,
        gen: &[f64],
        flow: &[f64],
        charge: &[f64],
        discharge: &[f64],
        curtailment: &[f64],
        spill: &[f64],
        load: &[f64],
        renewable: &[f64],
    ) -> Vec<f64> {
        (0..self.n_bus())
            .map(|bus| {
                row_dot(&self.gen_map, bus, gen) + row_dot(&self.discharge_map, bus, discharge)
                    - row_dot(&self.charge_map, bus, charge)
                    - row_dot(&self.incidence, bus, flow)
                    + row_dot(&self.curtail_map, bus, curtailment)
                    + renewable[bus]
                    - spill[bus]
                    - load[bus]
            })
            .collect()
    }

    pub fn summary(&self) -> Vec<MatrixSummary> {
        [
            ("incidence", &self.incidence),
            ("gen_map", &self.gen_map),
            ("charge_map", &self.charge_map),
            ("discharge_map", &self.discharge_map),
            ("curtail_map", &self.curtail_map),
        ]
        .into_iter()
        .map(|(name, matrix)| MatrixSummary {
            name,
            rows: matrix.rows(),
            cols: matrix.cols(),
            nnz: matrix.nnz(),
        })
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sra_core::{Branch, BranchId, Bus, BusSeries, Gen, GenId, Storage, StorageId};

    fn three_bus() -> Network {
        let buses = (1..=3)
            .map(|i| Bus::new(BusId::new(i * 10), format!("B{i}")))
            .collect();
        let mut network = Network::new(buses, BusSeries::zeros("load", 3, 1));
        network.add_branch(Branch::new(
            BranchId::new(1),
            "a",
            BusId::new(10),
            BusId::new(20),
            50.0,
        ));
        network.add_branch(Branch::new(
            BranchId::new(2),
            "b",
            BusId::new(30),
            BusId::new(20),
            50.0,
        ));
        network.add_generator(Gen::new(GenId::new(1), "g1", BusId::new(30)).with_p_limits(0.0, 10.0));
        network.add_generator(Gen::new(GenId::new(2), "g2", BusId::new(30)).with_p_limits(0.0, 10.0));
        network.add_storage(Storage::new(StorageId::new(1), "s", BusId::new(20), 5.0, 2.0));
        network
    }

    #[test]
    fn test_incidence_signs() {
        let m = build_matrices(&three_bus()).unwrap();
        assert_eq!(m.incidence.shape(), (3, 2));
        assert_eq!(m.incidence.get(0, 0), Some(&1.0));
        assert_eq!(m.incidence.get(1, 0), Some(&-1.0));
        assert_eq!(m.incidence.get(2, 1), Some(&1.0));
        assert_eq!(m.incidence.get(1, 1), Some(&-1.0));
        // each branch column sums to zero
        for col in 0..2 {
            let sum: f64 = (0..3).filter_map(|r| m.incidence.get(r, col)).sum();
            assert_eq!(sum, 0.0);
        }
    }

    #[test]
    fn test_mapping_matrices() {
        let m = build_matrices(&three_bus()).unwrap();
        assert_eq!(m.gen_map.shape(), (3, 2));
        assert_eq!(StudyMatrices::row_entries(&m.gen_map, 2), vec![(0, 1.0), (1, 1.0)]);
        assert_eq!(m.charge_map.get(1, 0), Some(&1.0));
        assert_eq!(m.discharge_map.nnz(), 1);
        assert_eq!(m.curtail_map.nnz(), 3);
        assert_eq!(m.n_storage(), 1);
    }

    #[test]
    fn test_nodal_residual_balanced_flow() {
        let m = build_matrices(&three_bus()).unwrap();
        // bus 30 generates 15, ships 15 to bus 20 which forwards 5 to bus 10
        let residual = m.nodal_residual(
            &[10.0, 5.0],
            &[-5.0, 15.0],
            &[0.0],
            &[0.0],
            &[0.0; 3],
            &[0.0; 3],
            &[5.0, 10.0, 0.0],
            &[0.0; 3],
        );
        for r in residual {
            assert!(r.abs() < 1e-12);
        }
    }

    #[test]
    fn test_unknown_bus_is_topology_error() {
        let mut network = three_bus();
        network.generators[0].bus = BusId::new(99);
        let err = build_matrices(&network).unwrap_err();
        assert!(matches!(err, SraError::Topology(_)));
    }

    #[test]
    fn test_summary_lists_all_matrices() {
        let m = build_matrices(&three_bus()).unwrap();
        let summary = m.summary();
        assert_eq!(summary.len(), 5);
        assert_eq!(summary[0].nnz, 4);
    }
}
