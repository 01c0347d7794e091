use petgraph::graphmap::UnGraphMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Minimum label-set intersection size for a site-wide edge.
pub const DEFAULT_OVERLAP_THRESHOLD: u32 = 2;

/// Role of a page inside a keyword cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterRole {
    Parent,
    Child,
}

impl ClusterRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterRole::Parent => "parent",
            ClusterRole::Child => "child",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "parent" => Some(ClusterRole::Parent),
            "child" => Some(ClusterRole::Child),
            _ => None,
        }
    }
}

/// Adapter over whatever record type the caller stores pages in.
/// The graph builder only ever sees these fields.
pub trait PageSource {
    fn page_id(&self) -> i64;
    fn page_url(&self) -> &str;
    fn page_title(&self) -> Option<&str>;
    fn primary_keyword(&self) -> Option<&str>;
    fn secondary_keywords(&self) -> Vec<String>;
    fn word_count(&self) -> usize;
    fn cluster_role(&self) -> Option<ClusterRole>;
    fn labels(&self) -> BTreeSet<String>;
    fn content_complete(&self) -> bool;
    fn keyword_approved(&self) -> bool;
}

/// Source-shape tag on a node: cluster pages carry a role, site pages a
/// label set. Only the builder knows which concrete record produced which.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Role(ClusterRole),
    Labeled(BTreeSet<String>),
}

#[derive(Debug, Clone)]
pub struct GraphNode {
    pub page_id: i64,
    pub url: String,
    pub title: Option<String>,
    pub keyword: Option<String>,
    pub secondary_keywords: Vec<String>,
    pub word_count: usize,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    ParentChild,
    Sibling,
    LabelOverlap,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeAttr {
    pub kind: EdgeKind,
    pub weight: u32,
}

/// Adjacency graph over one scope of pages.
pub struct LinkGraph {
    nodes: HashMap<i64, GraphNode>,
    adjacency: UnGraphMap<i64, EdgeAttr>,
}

impl LinkGraph {
    fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            adjacency: UnGraphMap::new(),
        }
    }

    fn add_node(&mut self, node: GraphNode) {
        self.adjacency.add_node(node.page_id);
        self.nodes.insert(node.page_id, node);
    }

    fn add_edge(&mut self, a: i64, b: i64, attr: EdgeAttr) {
        self.adjacency.add_edge(a, b, attr);
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.edge_count()
    }

    pub fn node(&self, page_id: i64) -> Option<&GraphNode> {
        self.nodes.get(&page_id)
    }

    /// All page ids, ascending, for deterministic iteration.
    pub fn page_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.nodes.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Neighbors of a page together with the connecting edge attributes.
    pub fn edges_of(&self, page_id: i64) -> Vec<(i64, EdgeAttr)> {
        self.adjacency
            .edges(page_id)
            .map(|(a, b, attr)| (if a == page_id { b } else { a }, *attr))
            .collect()
    }

    pub fn parents(&self) -> Vec<i64> {
        self.ids_with_role(ClusterRole::Parent)
    }

    pub fn children(&self) -> Vec<i64> {
        self.ids_with_role(ClusterRole::Child)
    }

    fn ids_with_role(&self, role: ClusterRole) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .nodes
            .values()
            .filter(|n| matches!(&n.kind, NodeKind::Role(r) if *r == role))
            .map(|n| n.page_id)
            .collect();
        ids.sort_unstable();
        ids
    }
}

/// Builds adjacency graphs from page records. Pure: re-running over the same
/// pages produces an identical graph.
pub struct GraphBuilder {
    overlap_threshold: u32,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            overlap_threshold: DEFAULT_OVERLAP_THRESHOLD,
        }
    }

    pub fn with_overlap_threshold(mut self, threshold: u32) -> Self {
        self.overlap_threshold = threshold;
        self
    }

    /// Cluster graph: one parent_child edge for every (parent, child) pair,
    /// one sibling edge for every unordered child pair. Parents never pair
    /// with parents. A single-page cluster yields one node and no edges.
    pub fn build_cluster<P: PageSource>(&self, pages: &[P]) -> LinkGraph {
        let mut graph = LinkGraph::new();
        for page in pages {
            // Pages without an explicit role are treated as children so they
            // still receive their mandatory parent link.
            let role = page.cluster_role().unwrap_or(ClusterRole::Child);
            graph.add_node(node_from(page, NodeKind::Role(role)));
        }
        if graph.node_count() <= 1 {
            return graph;
        }

        let parents = graph.parents();
        let children = graph.children();
        for &p in &parents {
            for &c in &children {
                graph.add_edge(
                    p,
                    c,
                    EdgeAttr {
                        kind: EdgeKind::ParentChild,
                        weight: 1,
                    },
                );
            }
        }
        for (i, &a) in children.iter().enumerate() {
            for &b in &children[i + 1..] {
                graph.add_edge(
                    a,
                    b,
                    EdgeAttr {
                        kind: EdgeKind::Sibling,
                        weight: 1,
                    },
                );
            }
        }
        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "built cluster graph"
        );
        graph
    }

    /// Site-wide graph: pages failing the completion or approval gate are
    /// silently excluded. An edge exists between two included pages iff their
    /// label-set intersection meets the overlap threshold; the intersection
    /// size is the edge weight.
    pub fn build_site<P: PageSource>(&self, pages: &[P]) -> LinkGraph {
        let mut graph = LinkGraph::new();
        let eligible: Vec<&P> = pages
            .iter()
            .filter(|p| p.content_complete() && p.keyword_approved())
            .collect();
        for page in &eligible {
            graph.add_node(node_from(*page, NodeKind::Labeled(page.labels())));
        }

        for (i, a) in eligible.iter().enumerate() {
            let a_labels = a.labels();
            for b in &eligible[i + 1..] {
                let weight = a_labels.intersection(&b.labels()).count() as u32;
                if weight >= self.overlap_threshold {
                    graph.add_edge(
                        a.page_id(),
                        b.page_id(),
                        EdgeAttr {
                            kind: EdgeKind::LabelOverlap,
                            weight,
                        },
                    );
                }
            }
        }
        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "built site graph"
        );
        graph
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn node_from<P: PageSource>(page: &P, kind: NodeKind) -> GraphNode {
    GraphNode {
        page_id: page.page_id(),
        url: page.page_url().to_string(),
        title: page.page_title().map(str::to_string),
        keyword: page.primary_keyword().map(str::to_string),
        secondary_keywords: page.secondary_keywords(),
        word_count: page.word_count(),
        kind,
    }
}
