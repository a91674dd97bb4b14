//! The static road network.

use crate::math::Point2d;
use crate::{EdgeId, EdgeSet, Error, NodeId, NodeSet};
use log::warn;
use serde::Deserialize;
use slotmap::{SecondaryMap, SlotMap};
use smallvec::SmallVec;
use std::collections::HashMap;

/// An intersection or virtual routing point in the network.
#[derive(Clone, Debug)]
pub struct Node {
    /// The node ID.
    id: NodeId,
    /// The external id from the network input.
    ext_id: String,
    /// Position in local coordinates.
    point: Point2d,
    /// Whether the node has no physical footprint.
    virt: bool,
    /// Inset distance applied to incident road ends, in m.
    width: Option<f64>,
    /// Polygon outline of the intersection body, in local coordinates.
    outline: Option<Vec<Point2d>>,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn ext_id(&self) -> &str {
        &self.ext_id
    }

    pub fn point(&self) -> Point2d {
        self.point
    }

    pub fn is_virtual(&self) -> bool {
        self.virt
    }

    pub fn width(&self) -> Option<f64> {
        self.width
    }

    pub fn outline(&self) -> Option<&[Point2d]> {
        self.outline.as_deref()
    }
}

/// A directed road segment between two nodes.
#[derive(Clone, Debug)]
pub struct Edge {
    /// The edge ID.
    id: EdgeId,
    /// The external id from the network input.
    ext_id: String,
    /// The node the edge leaves from.
    from: NodeId,
    /// The node the edge arrives at.
    to: NodeId,
    /// Polyline of the edge in local coordinates.
    points: Vec<Point2d>,
    /// Width of each lane in m, ordered left to right.
    lane_widths: SmallVec<[f64; 8]>,
}

impl Edge {
    pub fn id(&self) -> EdgeId {
        self.id
    }

    pub fn ext_id(&self) -> &str {
        &self.ext_id
    }

    pub fn from(&self) -> NodeId {
        self.from
    }

    pub fn to(&self) -> NodeId {
        self.to
    }

    pub fn points(&self) -> &[Point2d] {
        &self.points
    }

    pub fn lane_widths(&self) -> &[f64] {
        &self.lane_widths
    }

    /// The number of lanes.
    pub fn n_lane(&self) -> usize {
        self.lane_widths.len()
    }

    /// The total width of the road in m.
    pub fn road_width(&self) -> f64 {
        self.lane_widths.iter().sum()
    }
}

/// A parsed road network: typed nodes and edges with resolved endpoints.
#[derive(Clone, Debug, Default)]
pub struct RoadNetwork {
    nodes: NodeSet,
    edges: EdgeSet,
    edge_index: HashMap<String, EdgeId>,
    /// The opposite-direction partner of each edge, if it has one.
    partners: SecondaryMap<EdgeId, EdgeId>,
}

impl RoadNetwork {
    /// Loads a network from its JSON description.
    ///
    /// The load is atomic: on any failure no partial network is
    /// returned, so a previously loaded network stays usable.
    pub fn load(json: &str) -> Result<Self, Error> {
        let raw: RawNetwork = serde_json::from_str(json)?;

        let mut nodes = SlotMap::with_key();
        let mut node_index = HashMap::with_capacity(raw.nodes.len());
        for node in raw.nodes {
            let ext_id = node.id.into_string();
            let outline = node.outline.map(|coords| {
                if coords.len() % 2 != 0 {
                    warn!("node {}: odd outline coordinate dropped", ext_id);
                }
                coords
                    .chunks_exact(2)
                    .map(|c| Point2d::new(c[0], c[1]))
                    .collect()
            });
            let id = nodes.insert_with_key(|id| Node {
                id,
                ext_id: ext_id.clone(),
                point: Point2d::new(node.point[0], node.point[1]),
                virt: node.virt,
                width: node.width,
                outline,
            });
            if node_index.insert(ext_id.clone(), id).is_some() {
                warn!("duplicate node id {}", ext_id);
            }
        }

        let mut edges: EdgeSet = SlotMap::with_key();
        let mut edge_index = HashMap::with_capacity(raw.edges.len());
        let mut endpoints = HashMap::with_capacity(raw.edges.len());
        for edge in raw.edges {
            let ext_id = edge.id.into_string();
            let resolve = |node: RawId| {
                let node = node.into_string();
                node_index
                    .get(&node)
                    .copied()
                    .ok_or_else(|| Error::UnresolvedNode {
                        edge: ext_id.clone(),
                        node,
                    })
            };
            let from = resolve(edge.from)?;
            let to = resolve(edge.to)?;
            if edge.n_lane != edge.lane_widths.len() {
                return Err(Error::LaneCount {
                    edge: ext_id,
                    n_lane: edge.n_lane,
                    widths: edge.lane_widths.len(),
                });
            }
            let id = edges.insert_with_key(|id| Edge {
                id,
                ext_id: ext_id.clone(),
                from,
                to,
                points: edge
                    .points
                    .iter()
                    .map(|p| Point2d::new(p[0], p[1]))
                    .collect(),
                lane_widths: SmallVec::from_vec(edge.lane_widths),
            });
            edge_index.insert(ext_id, id);
            endpoints.insert((from, to), id);
        }

        // Pair up opposite-direction edges between the same two nodes.
        let mut partners = SecondaryMap::new();
        for (&(from, to), &id) in &endpoints {
            if let Some(&partner) = endpoints.get(&(to, from)) {
                if partner != id {
                    partners.insert(id, partner);
                }
            }
        }

        Ok(Self {
            nodes,
            edges,
            edge_index,
            partners,
        })
    }

    /// Returns an iterator over all the nodes in the network.
    pub fn iter_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Returns an iterator over all the edges in the network.
    pub fn iter_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// Gets a reference to the node with the given ID.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// Gets a reference to the edge with the given ID.
    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id]
    }

    /// Looks up an edge by its external id.
    pub fn edge_by_ext_id(&self, ext_id: &str) -> Option<&Edge> {
        self.edge_index.get(ext_id).map(|id| &self.edges[*id])
    }

    /// The bidirectional partner of an edge: the edge running between
    /// the same two nodes in the opposite direction, if there is one.
    pub fn partner(&self, id: EdgeId) -> Option<EdgeId> {
        self.partners.get(id).copied()
    }

    /// Returns true if the two edges form a bidirectional pair.
    pub fn is_pair(&self, a: EdgeId, b: EdgeId) -> bool {
        self.partner(a) == Some(b)
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }
}

/// An id in the network input; strings and integers are both accepted
/// and integers are stored as their decimal strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Str(String),
    Int(i64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Str(s) => s,
            RawId::Int(n) => n.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct RawNetwork {
    #[serde(default)]
    nodes: Vec<RawNode>,
    #[serde(default)]
    edges: Vec<RawEdge>,
}

#[derive(Deserialize)]
struct RawNode {
    id: RawId,
    point: [f64; 2],
    #[serde(rename = "virtual", default)]
    virt: bool,
    #[serde(default)]
    width: Option<f64>,
    #[serde(default)]
    outline: Option<Vec<f64>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEdge {
    id: RawId,
    from: RawId,
    to: RawId,
    points: Vec<[f64; 2]>,
    lane_widths: Vec<f64>,
    n_lane: usize,
}
