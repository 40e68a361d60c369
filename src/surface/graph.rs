use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tracing::{debug, trace};

use crate::error::{CarveError, Result};
use crate::surface::subdivide::MeshEdit;
use crate::types::IndexedMesh;

/// Undirected graph of mesh vertices joined by their triangle edges.
///
/// Edge weights are Euclidean lengths at the time the edge was added. There
/// are no multi-edges. Node ids are mesh vertex indices.
#[derive(Debug, Clone, Default)]
pub struct SurfaceGraph {
    /// For each vertex, list of (neighbor index, edge length) pairs.
    neighbors: Vec<Vec<(u32, f64)>>,
    present: Vec<bool>,
    node_count: usize,
    edge_count: usize,
}

/// Priority queue entry for Dijkstra.
#[derive(Debug, Clone, Copy)]
struct State {
    vertex: u32,
    distance: f64,
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for State {}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap.
        other
            .distance
            .total_cmp(&self.distance)
            .then_with(|| other.vertex.cmp(&self.vertex))
    }
}

impl SurfaceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph from every triangle edge of `mesh`.
    pub fn build_from(mesh: &IndexedMesh) -> Result<Self> {
        mesh.validate()?;
        let mut graph = Self::new();
        for [a, b, c] in mesh.triangles() {
            for (s, e) in [(a, b), (b, c), (c, a)] {
                graph.add_edge(mesh, s, e);
            }
        }
        debug!(
            nodes = graph.node_count,
            edges = graph.edge_count,
            "Built surface graph"
        );
        Ok(graph)
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn contains_node(&self, v: u32) -> bool {
        self.present.get(v as usize).copied().unwrap_or(false)
    }

    /// Neighbors of `v` with edge lengths.
    pub fn neighbors(&self, v: u32) -> &[(u32, f64)] {
        self.neighbors.get(v as usize).map_or(&[], |n| n.as_slice())
    }

    /// Weight of the edge between `a` and `b`, if present.
    pub fn edge_weight(&self, a: u32, b: u32) -> Option<f64> {
        self.neighbors(a)
            .iter()
            .find(|&&(n, _)| n == b)
            .map(|&(_, w)| w)
    }

    pub fn add_node(&mut self, v: u32) {
        let i = v as usize;
        if i >= self.present.len() {
            self.present.resize(i + 1, false);
            self.neighbors.resize(i + 1, Vec::new());
        }
        if !self.present[i] {
            self.present[i] = true;
            self.node_count += 1;
        }
    }

    /// Add the undirected edge `a`-`b` weighted by the distance between the
    /// two mesh positions. Returns `false` for a duplicate or a self-loop.
    pub fn add_edge(&mut self, mesh: &IndexedMesh, a: u32, b: u32) -> bool {
        let weight = mesh.position(a as usize).distance(mesh.position(b as usize));
        self.add_weighted_edge(a, b, weight)
    }

    /// Add the undirected edge `a`-`b` with an explicit weight.
    pub fn add_weighted_edge(&mut self, a: u32, b: u32, weight: f64) -> bool {
        self.add_node(a);
        self.add_node(b);
        if a == b || self.neighbors[a as usize].iter().any(|&(n, _)| n == b) {
            return false;
        }
        self.neighbors[a as usize].push((b, weight));
        self.neighbors[b as usize].push((a, weight));
        self.edge_count += 1;
        true
    }

    /// Remove the undirected edge `a`-`b`. Returns whether it existed.
    pub fn remove_edge(&mut self, a: u32, b: u32) -> bool {
        if !self.contains_node(a) || !self.contains_node(b) {
            return false;
        }
        let before = self.neighbors[a as usize].len();
        self.neighbors[a as usize].retain(|&(n, _)| n != b);
        if self.neighbors[a as usize].len() == before {
            return false;
        }
        self.neighbors[b as usize].retain(|&(n, _)| n != a);
        self.edge_count -= 1;
        true
    }

    /// Patch the graph after a vertex insertion instead of rebuilding it.
    /// `mesh` must be the mesh the edit was applied to.
    pub fn apply_edit(&mut self, mesh: &IndexedMesh, edit: &MeshEdit) {
        for &[a, b] in &edit.removed_edges {
            self.remove_edge(a, b);
        }
        self.add_node(edit.vertex);
        for &[a, b] in &edit.added_edges {
            self.add_edge(mesh, a, b);
        }
        trace!(
            vertex = edit.vertex,
            removed = edit.removed_edges.len(),
            added = edit.added_edges.len(),
            "Applied mesh edit to surface graph"
        );
    }

    /// Dijkstra shortest path from `start` to `end`, both inclusive.
    ///
    /// Returns [`CarveError::NoPath`] when either endpoint is missing or
    /// `end` is unreachable.
    pub fn shortest_path(&self, start: u32, end: u32) -> Result<Vec<u32>> {
        Ok(self.shortest_path_with_length(start, end)?.0)
    }

    /// Like [`SurfaceGraph::shortest_path`] but also returns the path length.
    pub fn shortest_path_with_length(&self, start: u32, end: u32) -> Result<(Vec<u32>, f64)> {
        if !self.contains_node(start) || !self.contains_node(end) {
            return Err(CarveError::NoPath { start, end });
        }

        let n = self.neighbors.len();
        let mut distances = vec![f64::INFINITY; n];
        let mut previous: Vec<Option<u32>> = vec![None; n];
        let mut heap = BinaryHeap::new();

        distances[start as usize] = 0.0;
        heap.push(State {
            vertex: start,
            distance: 0.0,
        });

        while let Some(State { vertex, distance }) = heap.pop() {
            if distance > distances[vertex as usize] {
                continue;
            }
            for &(neighbor, weight) in &self.neighbors[vertex as usize] {
                let candidate = distance + weight;
                if candidate < distances[neighbor as usize] {
                    distances[neighbor as usize] = candidate;
                    previous[neighbor as usize] = Some(vertex);
                    heap.push(State {
                        vertex: neighbor,
                        distance: candidate,
                    });
                }
            }
        }

        let total = distances[end as usize];
        if !total.is_finite() {
            return Err(CarveError::NoPath { start, end });
        }

        let mut path = vec![end];
        let mut current = end;
        while current != start {
            current = previous[current as usize].ok_or(CarveError::NoPath { start, end })?;
            path.push(current);
        }
        path.reverse();

        trace!(start, end, hops = path.len(), length = total, "Shortest path");
        Ok((path, total))
    }
}
