use thiserror::Error;

/// An error raised while loading a road network or replay log.
///
/// Loads are atomic: when any of these is returned, no partial data has
/// been installed and previously loaded state remains usable.
#[derive(Debug, Error)]
pub enum Error {
    /// The network description is not well-formed JSON.
    #[error("malformed network JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// An edge references a node id that is not in the network.
    #[error("edge {edge} references unknown node {node}")]
    UnresolvedNode { edge: String, node: String },
    /// An edge's declared lane count disagrees with its lane widths.
    #[error("edge {edge} declares {n_lane} lanes but lists {widths} lane widths")]
    LaneCount {
        edge: String,
        n_lane: usize,
        widths: usize,
    },
    /// A replay line does not split into a vehicle and a signal group.
    #[error("replay line {line} does not split into vehicle and signal groups")]
    MalformedStep { line: usize },
}
