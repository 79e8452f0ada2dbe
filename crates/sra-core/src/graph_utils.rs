use crate::{BranchId, BusId, Network};
use petgraph::algo::connected_components;
use petgraph::graph::{NodeIndex, UnGraph};
use std::collections::{HashMap, HashSet, VecDeque};

/// Connected group of buses when every branch is in service.
#[derive(Debug, Clone, PartialEq)]
pub struct Island {
    pub island_id: usize,
    pub buses: Vec<BusId>,
}

/// Build the undirected bus/branch graph. Node weights are bus ids, edge weights branch ids.
///
/// Branches whose endpoints are not registered buses are skipped; validation
/// reports them separately.
pub fn bus_graph(network: &Network) -> UnGraph<BusId, BranchId> {
    let mut graph = UnGraph::with_capacity(network.buses.len(), network.branches.len());
    let mut nodes: HashMap<BusId, NodeIndex> = HashMap::with_capacity(network.buses.len());
    for bus in &network.buses {
        nodes.entry(bus.id).or_insert_with(|| graph.add_node(bus.id));
    }
    for branch in &network.branches {
        if let (Some(&from), Some(&to)) = (nodes.get(&branch.from_bus), nodes.get(&branch.to_bus)) {
            graph.add_edge(from, to, branch.id);
        }
    }
    graph
}

/// Number of connected components of the all-in-service topology.
pub fn island_count(network: &Network) -> usize {
    connected_components(&bus_graph(network))
}

/// Labels connected components (breadth-first search) in bus registration order.
pub fn find_islands(network: &Network) -> Vec<Island> {
    let graph = bus_graph(network);
    let mut visited = HashSet::new();
    let mut islands = Vec::new();
    for start in graph.node_indices() {
        if visited.contains(&start) {
            continue;
        }
        let mut queue = VecDeque::new();
        queue.push_back(start);
        let mut members = Vec::new();
        while let Some(node) = queue.pop_front() {
            if !visited.insert(node) {
                continue;
            }
            members.push(node);
            for neighbor in graph.neighbors(node) {
                if !visited.contains(&neighbor) {
                    queue.push_back(neighbor);
                }
            }
        }
        members.sort_by_key(|node| node.index());
        islands.push(Island {
            island_id: islands.len(),
            buses: members.into_iter().map(|node| graph[node]).collect(),
        });
    }
    islands
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Branch, Bus, BusSeries};

    fn three_bus(connect_third: bool) -> Network {
        let buses = (1..=3)
            .map(|i| Bus::new(BusId::new(i), format!("B{i}")))
            .collect();
        let mut network = Network::new(buses, BusSeries::constant("load", vec![0.0; 3], 1));
        network.add_branch(Branch::new(
            BranchId::new(1),
            "1-2",
            BusId::new(1),
            BusId::new(2),
            10.0,
        ));
        if connect_third {
            network.add_branch(Branch::new(
                BranchId::new(2),
                "2-3",
                BusId::new(2),
                BusId::new(3),
                10.0,
            ));
        }
        network
    }

    #[test]
    fn test_connected_network_is_one_island() {
        let network = three_bus(true);
        assert_eq!(island_count(&network), 1);
        let islands = find_islands(&network);
        assert_eq!(islands.len(), 1);
        assert_eq!(islands[0].buses.len(), 3);
    }

    #[test]
    fn test_isolated_bus_forms_its_own_island() {
        let network = three_bus(false);
        assert_eq!(island_count(&network), 2);
        let islands = find_islands(&network);
        assert_eq!(islands[1].buses, vec![BusId::new(3)]);
    }
}
