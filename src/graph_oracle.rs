//! In-process minimum-weight perfect matching on the DEM's matching graph.
//!
//! Fired detectors are paired with each other or with the boundary, which
//! accepts any number of partners. Shortest paths between fired detectors
//! come from Dijkstra, then the pairing itself is solved exactly by dynamic
//! programming over subsets of fired detectors.
//!
//! Mechanisms with p > 1/2 have negative weight. They are assumed to have
//! fired: their detectors are flipped in every syndrome before matching,
//! their observables are flipped in every answer, and matching runs on |w|.

use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap};

use enum_as_inner::EnumAsInner;
use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use tracing::debug;

use crate::decoder::{Decoder, FaultVector};
use crate::detector_error_model::DetectorErrorModel;
use crate::error::{CrosscheckError, Result};
use crate::syndrome_sampler::Bitstring;

/// Largest number of fired detectors per syndrome the subset DP will take on
pub const MAX_EXACT_DEFECTS : usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumAsInner)]
pub enum MatchingNode {
    Detector(usize),
    Boundary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchingEdge {
    pub weight : f64,
    pub observables : Vec<usize>,
}

pub type MatchingGraph = UnGraph<MatchingNode, MatchingEdge>;

#[derive(Debug, Clone, Copy, PartialEq)]
struct DistanceHeapElement {
    node_idx : NodeIndex,
    distance : f64,
}

impl Eq for DistanceHeapElement { }

impl PartialOrd for DistanceHeapElement {
    fn partial_cmp(&self, other : &DistanceHeapElement) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Reversed so the max-heap pops the closest node first
impl Ord for DistanceHeapElement {
    fn cmp(&self, other : &DistanceHeapElement) -> Ordering {
        other.distance.partial_cmp(&self.distance).unwrap_or(Ordering::Equal)
            .then_with(|| other.node_idx.cmp(&self.node_idx))
    }
}

/// Length and flipped observables of a shortest path
#[derive(Debug, Clone, PartialEq)]
struct PathSummary {
    distance : f64,
    observables : BTreeSet<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Partner {
    Boundary,
    Defect(usize),
}

/// Matching graph compiled from one DEM
#[derive(Debug, Clone)]
pub struct GraphOracle {
    graph : MatchingGraph,
    detector_nodes : Vec<NodeIndex>,
    boundary : NodeIndex,
    /// Detectors flipped an odd number of times by negative-weight edges
    negative_weight_detectors : BTreeSet<usize>,
    /// Observables flipped an odd number of times by negative-weight edges
    negative_weight_observables : BTreeSet<usize>,
}

impl GraphOracle {
    pub fn from_dem(dem : &DetectorErrorModel) -> Result<Self> {
        let mut graph = MatchingGraph::default();
        let detector_nodes = (0..dem.num_detectors()).map(|i| graph.add_node(MatchingNode::Detector(i))).collect::<Vec<_>>();
        let boundary = graph.add_node(MatchingNode::Boundary);

        for (mechanism_idx, mechanism) in dem.mechanisms().iter().enumerate() {
            let weight = mechanism.weight();
            let (a, b) = match mechanism.detectors[..] {
                [d] => (detector_nodes[d], boundary),
                [d1, d2] => (detector_nodes[d1], detector_nodes[d2]),
                _ => return Err(CrosscheckError::InvalidParameter(format!("mechanism {} is not graph-like", mechanism_idx))),
            };
            let edge = MatchingEdge { weight, observables: mechanism.observables.clone() };

            // Parallel mechanisms: keep the more likely one
            match graph.find_edge(a, b) {
                Some(existing) if graph[existing].weight <= weight => {}
                Some(existing) => graph[existing] = edge,
                None => { graph.add_edge(a, b, edge); }
            }
        }

        let mut negative_weight_detectors = BTreeSet::new();
        let mut negative_weight_observables = BTreeSet::new();
        for edge_idx in graph.edge_indices() {
            if graph[edge_idx].weight >= 0.0 {
                continue;
            }
            if let Some((a, b)) = graph.edge_endpoints(edge_idx) {
                for node in [a, b] {
                    if let MatchingNode::Detector(d) = graph[node] {
                        toggle_all(&mut negative_weight_detectors, &[d]);
                    }
                }
            }
            let edge = &mut graph[edge_idx];
            edge.weight = -edge.weight;
            toggle_all(&mut negative_weight_observables, &edge.observables);
        }

        Ok(GraphOracle { graph, detector_nodes, boundary, negative_weight_detectors, negative_weight_observables })
    }

    pub fn from_dem_text(text : &str) -> Result<Self> {
        GraphOracle::from_dem(&DetectorErrorModel::parse(text)?)
    }

    pub fn graph(self : &Self) -> &MatchingGraph {
        &self.graph
    }

    pub fn num_detectors(self : &Self) -> usize {
        self.detector_nodes.len()
    }

    /// Sorted indices of the observables flipped by a minimum-weight perfect matching of the fired detectors.
    /// Syndromes shorter than the detector count are padded with zeros.
    pub fn decode(self : &Self, syndrome : &[bool]) -> Result<Vec<usize>> {
        if syndrome.len() > self.num_detectors() {
            return Err(CrosscheckError::InvalidParameter(format!(
                "syndrome has {} bits but the DEM has {} detectors", syndrome.len(), self.num_detectors(),
            )));
        }
        let mut events = syndrome.iter().enumerate().filter(|(_, &fired)| fired).map(|(i, _)| i).collect::<BTreeSet<_>>();
        toggle_all(&mut events, &self.negative_weight_detectors);
        let defects = events.into_iter().collect::<Vec<_>>();

        let mut flipped = self.negative_weight_observables.clone();
        if defects.is_empty() {
            return Ok(flipped.into_iter().collect());
        }
        if defects.len() > MAX_EXACT_DEFECTS {
            return Err(CrosscheckError::InvalidParameter(format!(
                "{} fired detectors, exact matching is limited to {}", defects.len(), MAX_EXACT_DEFECTS,
            )));
        }

        let paths = defects.iter().map(|&d| self.shortest_paths(d, &defects)).collect::<Vec<_>>();
        let matching = solve_matching(&paths)
            .ok_or_else(|| CrosscheckError::Unmatchable(format!("fired detectors {:?}", defects)))?;

        for (i, partner) in matching {
            let path = match partner {
                Partner::Boundary => &paths[i].boundary,
                Partner::Defect(j) => &paths[i].defects[j],
            };
            toggle_all(&mut flipped, &path.observables);
        }
        Ok(flipped.into_iter().collect())
    }

    /// Dijkstra from one fired detector. The boundary is a sink: paths end there but never pass through.
    fn shortest_paths(self : &Self, source : usize, defects : &[usize]) -> DefectPaths {
        let node_count = self.graph.node_count();
        let mut distance = vec![f64::INFINITY; node_count];
        let mut predecessor : Vec<Option<EdgeIndex>> = vec![None; node_count];
        let mut heap = BinaryHeap::new();

        let start = self.detector_nodes[source];
        distance[start.index()] = 0.0;
        heap.push(DistanceHeapElement { node_idx: start, distance: 0.0 });

        while let Some(DistanceHeapElement { node_idx, distance: node_distance }) = heap.pop() {
            // Stale entry
            if node_distance > distance[node_idx.index()] {
                continue;
            }
            if node_idx == self.boundary {
                continue;
            }
            for edge_ref in self.graph.edges(node_idx) {
                let next = if edge_ref.source() == node_idx { edge_ref.target() } else { edge_ref.source() };
                let candidate = node_distance + edge_ref.weight().weight;
                if candidate < distance[next.index()] {
                    distance[next.index()] = candidate;
                    predecessor[next.index()] = Some(edge_ref.id());
                    heap.push(DistanceHeapElement { node_idx: next, distance: candidate });
                }
            }
        }

        let summarize = |target : NodeIndex| {
            let mut observables = BTreeSet::new();
            let mut node = target;
            while let Some(edge_idx) = predecessor[node.index()] {
                toggle_all(&mut observables, &self.graph[edge_idx].observables);
                if let Some((a, b)) = self.graph.edge_endpoints(edge_idx) {
                    node = if a == node { b } else { a };
                } else {
                    break;
                }
            }
            PathSummary { distance: distance[target.index()], observables }
        };

        DefectPaths {
            boundary: summarize(self.boundary),
            defects: defects.iter().map(|&d| summarize(self.detector_nodes[d])).collect(),
        }
    }
}

#[derive(Debug, Clone)]
struct DefectPaths {
    boundary : PathSummary,
    /// Indexed like the fired-detector list
    defects : Vec<PathSummary>,
}

/// Flip each observable in `set`; flipping twice cancels
fn toggle_all<'a>(set : &mut BTreeSet<usize>, observables : impl IntoIterator<Item = &'a usize>) {
    for &o in observables {
        if !set.remove(&o) {
            set.insert(o);
        }
    }
}

/// Exact min-weight pairing of all defects, each with another defect or the boundary.
/// `None` if some defect cannot be paired at finite cost.
fn solve_matching(paths : &[DefectPaths]) -> Option<Vec<(usize, Partner)>> {
    let k = paths.len();
    let full = (1usize << k) - 1;
    let mut cost = vec![f64::INFINITY; full + 1];
    let mut choice = vec![Partner::Boundary; full + 1];
    cost[0] = 0.0;

    for mask in 1..=full {
        // The lowest unmatched defect has to go somewhere
        let i = mask.trailing_zeros() as usize;
        let rest = mask & !(1 << i);

        let mut best = cost[rest] + paths[i].boundary.distance;
        let mut best_choice = Partner::Boundary;
        let mut others = rest;
        while others != 0 {
            let j = others.trailing_zeros() as usize;
            others &= others - 1;
            let candidate = cost[rest & !(1 << j)] + paths[i].defects[j].distance;
            if candidate < best {
                best = candidate;
                best_choice = Partner::Defect(j);
            }
        }
        cost[mask] = best;
        choice[mask] = best_choice;
    }

    if !cost[full].is_finite() {
        return None;
    }

    let mut pairs = Vec::new();
    let mut mask = full;
    while mask != 0 {
        let i = mask.trailing_zeros() as usize;
        let partner = choice[mask];
        mask &= !(1 << i);
        if let Partner::Defect(j) = partner {
            mask &= !(1 << j);
        }
        pairs.push((i, partner));
    }
    Some(pairs)
}

/// [`Decoder`] backed by [`GraphOracle`]; the graph is rebuilt for every batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphOracleDecoder;

impl Decoder for GraphOracleDecoder {
    fn decode_batch(self : &mut Self, dem_text : &str, syndromes : &[Bitstring]) -> Result<Vec<FaultVector>> {
        let oracle = GraphOracle::from_dem_text(dem_text)?;
        debug!(
            detectors = oracle.num_detectors(),
            edges = oracle.graph().edge_count(),
            batch = syndromes.len(),
            "matching graph built",
        );
        syndromes.iter().map(|s| oracle.decode(s).map(FaultVector::Sparse)).collect()
    }

    fn name(self : &Self) -> String {
        "graph-oracle".to_string()
    }
}
