use std::fmt::{Display, Formatter};

use anyhow::ensure;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::Bfs;

use crate::error::{OptResult, OptimizerError};
use crate::expr::Expr;
use crate::properties::LogicalProperty;

/// Set of join graph vertices, at most 64 of them.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BitSet(u64);

impl BitSet {
    pub const MAX_BITS: usize = 64;

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn singleton(bit: usize) -> Self {
        debug_assert!(bit < Self::MAX_BITS);
        Self(1u64 << bit)
    }

    /// `{0, .., n - 1}`.
    pub fn first(n: usize) -> Self {
        if n >= Self::MAX_BITS {
            Self(u64::MAX)
        } else {
            Self((1u64 << n) - 1)
        }
    }

    pub fn insert(&mut self, bit: usize) {
        debug_assert!(bit < Self::MAX_BITS);
        self.0 |= 1u64 << bit;
    }

    pub fn contains(self, bit: usize) -> bool {
        bit < Self::MAX_BITS && (self.0 & (1u64 << bit)) != 0
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    pub fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    pub fn is_subset(self, other: Self) -> bool {
        self.0 & !other.0 == 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn min(self) -> Option<usize> {
        if self.is_empty() {
            None
        } else {
            Some(self.0.trailing_zeros() as usize)
        }
    }

    /// Members in ascending order.
    pub fn iter(self) -> BitSetIter {
        BitSetIter(self.0)
    }

    /// Non-empty subsets, in ascending numeric order.
    pub fn subsets(self) -> SubsetIter {
        SubsetIter {
            set: self.0,
            current: 0,
        }
    }
}

pub struct BitSetIter(u64);

impl Iterator for BitSetIter {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.0 == 0 {
            None
        } else {
            let bit = self.0.trailing_zeros() as usize;
            self.0 &= self.0 - 1;
            Some(bit)
        }
    }
}

impl DoubleEndedIterator for BitSetIter {
    fn next_back(&mut self) -> Option<usize> {
        if self.0 == 0 {
            None
        } else {
            let bit = 63 - self.0.leading_zeros() as usize;
            self.0 &= !(1u64 << bit);
            Some(bit)
        }
    }
}

pub struct SubsetIter {
    set: u64,
    current: u64,
}

impl Iterator for SubsetIter {
    type Item = BitSet;

    fn next(&mut self) -> Option<BitSet> {
        self.current = self.current.wrapping_sub(self.set) & self.set;
        if self.current == 0 {
            None
        } else {
            Some(BitSet(self.current))
        }
    }
}

impl Display for BitSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (idx, bit) in self.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", bit)?;
        }
        write!(f, "}}")
    }
}

/// An input of a join block.
#[derive(Clone, Debug)]
pub struct JoinRelation {
    pub prop: LogicalProperty,
    pub rows: f64,
}

impl JoinRelation {
    pub fn new(prop: LogicalProperty, rows: f64) -> Self {
        Self { prop, rows }
    }
}

/// A conjunct of the block and the vertices it references.
#[derive(Clone, Debug)]
pub(super) struct JoinPredicate {
    pub(super) vertices: BitSet,
    pub(super) expr: Expr,
}

/// Query graph of a join block.
///
/// Vertices are numbered in breadth first order starting from the first relation, the solver
/// works on vertex numbers and maps them back to relation indexes when it builds trees.
#[derive(Clone, Debug)]
pub struct JoinGraph {
    relations: Vec<JoinRelation>,
    /// Relation index of every vertex.
    vertex_relations: Vec<usize>,
    predicates: Vec<JoinPredicate>,
    neighbours: Vec<BitSet>,
}

impl JoinGraph {
    /// Builds the graph of `relations` joined by `predicates`.
    ///
    /// A conjunct referencing fewer than two relations can only be evaluated once every relation
    /// is joined. Disconnected components are chained by cross product edges between consecutive
    /// components.
    pub fn new(relations: Vec<JoinRelation>, predicates: &[Expr]) -> OptResult<Self> {
        let n = relations.len();
        ensure!(
            n > 0 && n < BitSet::MAX_BITS,
            OptimizerError::InvalidPlan(format!("join block of {} relations", n))
        );

        let mut conjuncts: Vec<(BitSet, Expr)> = Vec::new();
        for conjunct in predicates.iter().flat_map(|p| p.conjuncts()) {
            let columns = conjunct.columns();
            let mut referenced = BitSet::empty();
            for (idx, relation) in relations.iter().enumerate() {
                if columns.iter().any(|c| relation.prop.contains(c)) {
                    referenced.insert(idx);
                }
            }
            conjuncts.push((referenced, conjunct.clone()));
        }

        let mut graph: UnGraph<usize, ()> = UnGraph::default();
        let nodes: Vec<NodeIndex> = (0..n).map(|idx| graph.add_node(idx)).collect();
        for (referenced, _) in &conjuncts {
            let members: Vec<usize> = referenced.iter().collect();
            for (pos, &a) in members.iter().enumerate() {
                for &b in &members[pos + 1..] {
                    graph.update_edge(nodes[a], nodes[b], ());
                }
            }
        }

        // Label components by their smallest relation, then chain them.
        let mut component = vec![usize::MAX; n];
        let mut roots = vec![];
        for start in 0..n {
            if component[start] != usize::MAX {
                continue;
            }
            roots.push(start);
            let mut bfs = Bfs::new(&graph, nodes[start]);
            while let Some(node) = bfs.next(&graph) {
                component[graph[node]] = start;
            }
        }
        for pair in roots.windows(2) {
            graph.update_edge(nodes[pair[0]], nodes[pair[1]], ());
        }

        let mut vertex_relations = Vec::with_capacity(n);
        let mut bfs = Bfs::new(&graph, nodes[0]);
        while let Some(node) = bfs.next(&graph) {
            vertex_relations.push(graph[node]);
        }
        ensure!(
            vertex_relations.len() == n,
            OptimizerError::InternalError("join graph is not connected".to_string())
        );
        let mut vertex_of = vec![0; n];
        for (vertex, &relation) in vertex_relations.iter().enumerate() {
            vertex_of[relation] = vertex;
        }
        let to_vertices = |set: BitSet| {
            set.iter()
                .map(|r| BitSet::singleton(vertex_of[r]))
                .fold(BitSet::empty(), BitSet::union)
        };

        let mut neighbours = vec![BitSet::empty(); n];
        for edge in graph.edge_indices() {
            if let Some((a, b)) = graph.edge_endpoints(edge) {
                let (va, vb) = (vertex_of[graph[a]], vertex_of[graph[b]]);
                neighbours[va].insert(vb);
                neighbours[vb].insert(va);
            }
        }

        let all = BitSet::first(n);
        let predicates = conjuncts
            .into_iter()
            .map(|(referenced, expr)| {
                let vertices = if referenced.len() < 2 {
                    all
                } else {
                    to_vertices(referenced)
                };
                JoinPredicate { vertices, expr }
            })
            .collect();

        Ok(Self {
            relations,
            vertex_relations,
            predicates,
            neighbours,
        })
    }

    pub fn vertex_count(&self) -> usize {
        self.relations.len()
    }

    pub fn all_vertices(&self) -> BitSet {
        BitSet::first(self.vertex_count())
    }

    /// Relation index behind a vertex.
    pub fn relation_index(&self, vertex: usize) -> usize {
        self.vertex_relations[vertex]
    }

    pub fn relation(&self, vertex: usize) -> &JoinRelation {
        &self.relations[self.vertex_relations[vertex]]
    }

    /// Vertices adjacent to `set`, excluding `set` itself.
    pub fn neighbours(&self, set: BitSet) -> BitSet {
        set.iter()
            .fold(BitSet::empty(), |acc, v| acc.union(self.neighbours[v]))
            .difference(set)
    }

    pub fn is_connected(&self, set: BitSet) -> bool {
        let start = match set.min() {
            Some(start) => BitSet::singleton(start),
            None => return false,
        };
        let mut reached = start;
        loop {
            let next = reached.union(self.neighbours(reached).intersection(set));
            if next == reached {
                return reached == set;
            }
            reached = next;
        }
    }

    /// Conjuncts evaluated when joining `left` with `right`: those referencing both sides and
    /// nothing outside of them.
    pub fn predicates_between(&self, left: BitSet, right: BitSet) -> Vec<Expr> {
        let joined = left.union(right);
        self.predicates
            .iter()
            .filter(|p| {
                p.vertices.is_subset(joined)
                    && !p.vertices.is_subset(left)
                    && !p.vertices.is_subset(right)
            })
            .map(|p| p.expr.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{col, ColumnRef};

    fn relation(name: &str) -> JoinRelation {
        JoinRelation::new(
            LogicalProperty::new(vec![ColumnRef::new(name, "id")]).with_relation(name),
            100.0,
        )
    }

    #[test]
    fn test_subsets_ascending() {
        let set = BitSet::singleton(0).union(BitSet::singleton(2));
        let subsets: Vec<BitSet> = set.subsets().collect();
        assert_eq!(
            vec![
                BitSet::singleton(0),
                BitSet::singleton(2),
                BitSet::singleton(0).union(BitSet::singleton(2))
            ],
            subsets
        );
        assert_eq!(vec![2, 0], set.iter().rev().collect::<Vec<_>>());
        assert_eq!("{0, 2}", set.to_string());
    }

    #[test]
    fn test_disconnected_components_are_chained() {
        let graph = JoinGraph::new(
            vec![relation("a"), relation("b"), relation("c")],
            &[col("a", "id").eq(col("b", "id"))],
        )
        .unwrap();
        assert!(graph.is_connected(graph.all_vertices()));
        assert_eq!(3, graph.vertex_count());
    }

    #[test]
    fn test_single_relation_conjunct_attaches_at_top() {
        let graph = JoinGraph::new(
            vec![relation("a"), relation("b"), relation("c")],
            &[
                col("a", "id").eq(col("b", "id")),
                col("b", "id").eq(col("c", "id")),
                col("a", "id").gt(crate::expr::lit(3i64)),
            ],
        )
        .unwrap();

        let a = BitSet::singleton(0);
        let b = BitSet::singleton(1);
        assert_eq!(1, graph.predicates_between(a, b).len());
        let rest = graph.all_vertices().difference(a);
        assert_eq!(2, graph.predicates_between(a, rest).len());
    }
}
