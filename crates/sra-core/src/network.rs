use crate::diagnostics::{Category, Diagnostics};
use crate::error::{SraError, SraResult};
use crate::graph_utils::{find_islands, island_count};
use crate::{Branch, Bus, BusId, BusSeries, Gen, Megawatts, Storage};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Immutable per-study system description.
///
/// Asset vectors are positional: the matrix builder and the state engine index
/// generators, branches and storage units by their position here. Series
/// columns follow the order of `buses`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    pub buses: Vec<Bus>,
    pub branches: Vec<Branch>,
    pub generators: Vec<Gen>,
    pub storage: Vec<Storage>,
    /// Hourly demand per bus (MW)
    pub load: BusSeries,
    /// Renewable availability scenarios per bus (MW); empty means no renewables
    pub renewables: Vec<BusSeries>,
}

impl Network {
    pub fn new(buses: Vec<Bus>, load: BusSeries) -> Self {
        Self {
            buses,
            branches: Vec::new(),
            generators: Vec::new(),
            storage: Vec::new(),
            load,
            renewables: Vec::new(),
        }
    }

    pub fn add_branch(&mut self, branch: Branch) {
        self.branches.push(branch);
    }

    pub fn add_generator(&mut self, generator: Gen) {
        self.generators.push(generator);
    }

    pub fn add_storage(&mut self, storage: Storage) {
        self.storage.push(storage);
    }

    pub fn add_renewable_scenario(&mut self, scenario: BusSeries) {
        self.renewables.push(scenario);
    }

    /// Position of a bus in `buses` (and in every series row).
    pub fn bus_position(&self, id: BusId) -> Option<usize> {
        self.buses.iter().position(|bus| bus.id == id)
    }

    pub fn bus_positions(&self) -> HashMap<BusId, usize> {
        self.buses
            .iter()
            .enumerate()
            .map(|(idx, bus)| (bus.id, idx))
            .collect()
    }

    pub fn stats(&self) -> NetworkStats {
        NetworkStats {
            num_buses: self.buses.len(),
            num_islands: island_count(self),
            num_branches: self.branches.len(),
            num_gens: self.generators.len(),
            num_storage: self.storage.len(),
            num_renewable_scenarios: self.renewables.len(),
            load_hours: self.load.hours(),
            total_gen_capacity_mw: self.generators.iter().map(|g| g.pmax).sum::<Megawatts>().value(),
            total_storage_power_mw: self.storage.iter().map(|s| s.pmax).sum::<Megawatts>().value(),
            peak_load_mw: self.load.peak_total(),
        }
    }

    /// Check the registry for data that would make a study meaningless or
    /// crash the engine. Collects every issue rather than stopping at the first.
    pub fn validate(&self) -> Diagnostics {
        let mut diag = Diagnostics::new();
        self.validate_into(&mut diag);
        diag
    }

    pub fn validate_into(&self, diag: &mut Diagnostics) {
        if self.buses.is_empty() {
            diag.error(Category::Structure, "Network has no buses");
            return;
        }

        let mut seen = HashSet::new();
        for bus in &self.buses {
            if !seen.insert(bus.id) {
                diag.error_for(Category::Topology, "Duplicate bus id", &bus.id.to_string());
            }
        }

        for branch in &self.branches {
            let entity = format!("{} ({})", branch.id, branch.name);
            for endpoint in [branch.from_bus, branch.to_bus] {
                if !seen.contains(&endpoint) {
                    diag.error_for(
                        Category::Topology,
                        &format!("Dangling endpoint: {endpoint} is not registered"),
                        &entity,
                    );
                }
            }
            if branch.from_bus == branch.to_bus {
                diag.error_for(Category::Topology, "Branch connects a bus to itself", &entity);
            }
            let rating = branch.rating.value();
            if rating.is_nan() || rating < 0.0 {
                diag.error_for(
                    Category::Capacity,
                    &format!("Negative rating {rating} MW"),
                    &entity,
                );
            } else if rating == 0.0 {
                diag.warning_for(Category::Capacity, "Branch has zero rating", &entity);
            }
            if let Err(msg) = branch.reliability.check() {
                diag.error_for(Category::Reliability, &msg, &entity);
            }
        }

        for gen in &self.generators {
            let entity = format!("{} ({})", gen.id, gen.name);
            if !seen.contains(&gen.bus) {
                diag.error_for(
                    Category::Topology,
                    &format!("Generator attached to unknown {}", gen.bus),
                    &entity,
                );
            }
            let (pmin, pmax) = (gen.pmin.value(), gen.pmax.value());
            if pmin.is_nan() || pmax.is_nan() || pmin < 0.0 || pmax < 0.0 {
                diag.error_for(
                    Category::Capacity,
                    &format!("Negative capacity bounds [{pmin}, {pmax}] MW"),
                    &entity,
                );
            } else if pmin > pmax {
                diag.error_for(
                    Category::Capacity,
                    &format!("Pmin {pmin} MW exceeds Pmax {pmax} MW"),
                    &entity,
                );
            }
            if !gen.cost.is_finite() {
                diag.error_for(Category::Cost, "Generation cost must be finite", &entity);
            }
            match &gen.derating {
                Some(derating) => {
                    if let Err(msg) = derating.check() {
                        diag.error_for(Category::Reliability, &msg, &entity);
                    }
                }
                None => {
                    if let Err(msg) = gen.reliability.check() {
                        diag.error_for(Category::Reliability, &msg, &entity);
                    }
                }
            }
        }

        for ess in &self.storage {
            self.validate_storage(ess, &seen, diag);
        }

        self.validate_series(&self.load, diag);
        for scenario in &self.renewables {
            self.validate_series(scenario, diag);
        }

        let stats = self.stats();
        if stats.num_gens == 0 && stats.num_storage == 0 && self.renewables.is_empty() {
            diag.warning(Category::Structure, "Network has no generation resources");
        }
        if stats.total_gen_capacity_mw + stats.total_storage_power_mw < stats.peak_load_mw {
            diag.warning(
                Category::Capacity,
                &format!(
                    "Installed capacity ({:.1} MW) is below peak load ({:.1} MW)",
                    stats.total_gen_capacity_mw + stats.total_storage_power_mw,
                    stats.peak_load_mw
                ),
            );
        }

        let islands = find_islands(self);
        if islands.len() > 1 {
            for island in islands.iter().skip(1) {
                let members: Vec<String> = island.buses.iter().map(|b| b.to_string()).collect();
                diag.warning(
                    Category::Topology,
                    &format!(
                        "Island {} is disconnected from {}: {}",
                        island.island_id,
                        islands[0].buses.first().map(|b| b.to_string()).unwrap_or_default(),
                        members.join(", ")
                    ),
                );
            }
        }
    }

    fn validate_storage(&self, ess: &Storage, buses: &HashSet<BusId>, diag: &mut Diagnostics) {
        let entity = format!("{} ({})", ess.id, ess.name);
        if !buses.contains(&ess.bus) {
            diag.error_for(
                Category::Topology,
                &format!("Storage attached to unknown {}", ess.bus),
                &entity,
            );
        }
        let (pmin, pmax) = (ess.pmin.value(), ess.pmax.value());
        if pmin.is_nan() || pmax.is_nan() || pmin < 0.0 || pmax < 0.0 {
            diag.error_for(
                Category::Capacity,
                &format!("Negative power bounds [{pmin}, {pmax}] MW"),
                &entity,
            );
        }
        let duration = ess.duration.value();
        if !duration.is_finite() || duration <= 0.0 {
            diag.error_for(
                Category::Storage,
                &format!("Duration must be positive, got {duration} h"),
                &entity,
            );
        }
        let in_unit = |x: f64| (0.0..=1.0).contains(&x);
        if !in_unit(ess.soc_min) || !in_unit(ess.soc_max) {
            diag.error_for(
                Category::Storage,
                &format!(
                    "SOC bounds [{}, {}] must lie within [0, 1]",
                    ess.soc_min, ess.soc_max
                ),
                &entity,
            );
        } else if ess.soc_min > ess.soc_max {
            diag.error_for(
                Category::Storage,
                &format!("SOC bounds inverted: min {} > max {}", ess.soc_min, ess.soc_max),
                &entity,
            );
        }
        for (label, eta) in [
            ("Charge", ess.charge_efficiency),
            ("Discharge", ess.discharge_efficiency),
        ] {
            if !(eta > 0.0 && eta <= 1.0) {
                diag.error_for(
                    Category::Storage,
                    &format!("{label} efficiency {eta} must lie in (0, 1]"),
                    &entity,
                );
            }
        }
        if !ess.charge_cost.is_finite() || !ess.discharge_cost.is_finite() {
            diag.error_for(Category::Cost, "Storage costs must be finite", &entity);
        }
        if ess.units == 0 {
            diag.error_for(Category::Storage, "Storage must have at least one unit", &entity);
        }
        if let Err(msg) = ess.reliability.check() {
            diag.error_for(Category::Reliability, &msg, &entity);
        }
    }

    fn validate_series(&self, series: &BusSeries, diag: &mut Diagnostics) {
        if series.width() != self.buses.len() {
            diag.error_for(
                Category::Series,
                &format!(
                    "Series has {} bus columns but the network has {} buses",
                    series.width(),
                    self.buses.len()
                ),
                &series.name,
            );
        }
        if let Some((hour, bus, value)) = series.find_invalid() {
            diag.error_for(
                Category::Series,
                &format!("Invalid value {value} at hour {hour}, bus column {bus}"),
                &series.name,
            );
        }
    }

    /// Validate and fail on the first error-level issue set.
    ///
    /// Returns the (warning-only) diagnostics on success so callers can log them.
    pub fn ensure_valid(&self) -> SraResult<Diagnostics> {
        let diag = self.validate();
        if diag.has_errors() {
            let messages: Vec<String> = diag.errors().map(|issue| issue.to_string()).collect();
            return Err(SraError::config(messages.join("; ")));
        }
        Ok(diag)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NetworkStats {
    pub num_buses: usize,
    /// Connected components with every branch in service
    pub num_islands: usize,
    pub num_branches: usize,
    pub num_gens: usize,
    pub num_storage: usize,
    pub num_renewable_scenarios: usize,
    pub load_hours: usize,
    pub total_gen_capacity_mw: f64,
    pub total_storage_power_mw: f64,
    pub peak_load_mw: f64,
}

impl std::fmt::Display for NetworkStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} buses in {} island{}, {} branches, {} gens ({:.0} MW), {} storage ({:.0} MW), peak load {:.0} MW over {} h",
            self.num_buses,
            self.num_islands,
            if self.num_islands == 1 { "" } else { "s" },
            self.num_branches,
            self.num_gens,
            self.total_gen_capacity_mw,
            self.num_storage,
            self.total_storage_power_mw,
            self.peak_load_mw,
            self.load_hours
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BranchId, FailureModel, GenId, StorageId};

    fn two_bus() -> Network {
        let buses = vec![Bus::new(BusId::new(1), "A"), Bus::new(BusId::new(2), "B")];
        let mut network = Network::new(buses, BusSeries::constant("load", vec![10.0, 40.0], 24));
        network.add_branch(
            Branch::new(BranchId::new(1), "A-B", BusId::new(1), BusId::new(2), 60.0)
                .with_reliability(FailureModel::new(2000.0, 20.0)),
        );
        network.add_generator(
            Gen::new(GenId::new(1), "G1", BusId::new(1))
                .with_p_limits(0.0, 100.0)
                .with_cost(15.0)
                .with_reliability(FailureModel::new(1000.0, 40.0)),
        );
        network.add_storage(
            Storage::new(StorageId::new(1), "ESS", BusId::new(2), 20.0, 4.0)
                .with_soc_limits(0.1, 0.9)
                .with_round_trip_efficiency(0.85),
        );
        network
    }

    #[test]
    fn test_valid_network_passes() {
        let network = two_bus();
        let diag = network.validate();
        assert!(!diag.has_errors(), "{diag}");
        assert!(network.ensure_valid().is_ok());
    }

    #[test]
    fn test_stats() {
        let stats = two_bus().stats();
        assert_eq!(stats.num_buses, 2);
        assert_eq!(stats.num_islands, 1);
        assert_eq!(stats.num_gens, 1);
        assert_eq!(stats.total_gen_capacity_mw, 100.0);
        assert_eq!(stats.peak_load_mw, 50.0);
        assert!(stats.to_string().contains("2 buses in 1 island,"));
    }

    #[test]
    fn test_dangling_branch_is_error() {
        let mut network = two_bus();
        network.add_branch(Branch::new(
            BranchId::new(2),
            "A-X",
            BusId::new(1),
            BusId::new(9),
            10.0,
        ));
        let diag = network.validate();
        assert!(diag.in_category(Category::Topology).any(|i| i.message.contains("Dangling")));
        let err = network.ensure_valid().unwrap_err();
        assert!(matches!(err, SraError::Config(_)));
    }

    #[test]
    fn test_non_positive_mttf_is_error() {
        let mut network = two_bus();
        network.generators[0].reliability = FailureModel::new(0.0, 10.0);
        assert!(network
            .validate()
            .in_category(Category::Reliability)
            .next()
            .is_some());
    }

    #[test]
    fn test_storage_bounds_checked() {
        let mut network = two_bus();
        network.storage[0].soc_min = 0.95;
        network.storage[0].charge_efficiency = 1.5;
        let diag = network.validate();
        assert_eq!(diag.in_category(Category::Storage).count(), 2);
    }

    #[test]
    fn test_series_width_mismatch() {
        let mut network = two_bus();
        network.add_renewable_scenario(BusSeries::constant("wind", vec![5.0], 24));
        let diag = network.validate();
        assert!(diag.in_category(Category::Series).next().is_some());
    }

    #[test]
    fn test_island_and_capacity_warnings() {
        let mut network = two_bus();
        network.branches.clear();
        network.generators[0].pmax = crate::Megawatts(10.0);
        let diag = network.validate();
        assert!(!diag.has_errors());
        assert!(diag.in_category(Category::Topology).next().is_some());
        assert!(diag.in_category(Category::Capacity).next().is_some());
    }
}
