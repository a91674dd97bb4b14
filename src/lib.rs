pub use cgmath;
pub use error::Error;
pub use feature::{
    Color, Frame, GeoLine, GeoPolygon, LightAnchors, MarkerShape, StaticFeatures,
    TrafficLightPoint, VehiclePoint, VehicleStyle,
};
pub use geometry::GeometryBuilder;
pub use network::{Edge, Node, RoadNetwork};
pub use playback::{PlaybackEngine, PlaybackState, RenderSink, Ticket};
pub use replay::{ReplayLog, ReplayStep, SignalRecord, SignalStatus, VehicleRecord};
use slotmap::{new_key_type, SlotMap};
pub use slotmap::{Key, KeyData};
pub use transform::{GeoScale, GeoTransform, LngLat};

mod error;
mod feature;
mod geometry;
pub mod math;
mod network;
mod playback;
mod replay;
mod transform;

new_key_type! {
    /// Unique ID of a [Node].
    pub struct NodeId;
    /// Unique ID of an [Edge].
    pub struct EdgeId;
}

type NodeSet = SlotMap<NodeId, Node>;
type EdgeSet = SlotMap<EdgeId, Edge>;
