//! Derives renderable geographic geometry from the road network.
//!
//! All offset construction happens in local metre space; vertices pass
//! through the [GeoTransform] only as they are emitted. Lane widths and
//! intersection insets are metre quantities and never mix with the
//! anisotropic degree scale.

use crate::feature::{GeoLine, GeoPolygon, LightAnchors, StaticFeatures};
use crate::math::{move_towards, vertex_perpendiculars, Point2d, Vector2d};
use crate::network::{Edge, RoadNetwork};
use crate::transform::GeoTransform;
use log::warn;

/// Builds the static feature sets for a loaded network.
pub struct GeometryBuilder<'a> {
    network: &'a RoadNetwork,
    transform: &'a GeoTransform,
}

/// An edge's polyline after endpoint insets, with the unit offset
/// direction at every vertex.
struct EdgeFrame {
    points: Vec<Point2d>,
    perps: Vec<Vector2d>,
}

impl<'a> GeometryBuilder<'a> {
    pub fn new(network: &'a RoadNetwork, transform: &'a GeoTransform) -> Self {
        Self { network, transform }
    }

    /// Builds all static features: road polygons, lane markings, center
    /// lines, intersection polygons and traffic-light anchors.
    pub fn build(&self) -> StaticFeatures {
        let mut features = StaticFeatures::default();

        for edge in self.network.iter_edges() {
            if edge.points().len() < 2 {
                warn!("edge {} has fewer than two points, skipped", edge.ext_id());
                continue;
            }
            let frame = self.edge_frame(edge);

            features.road_polygons.push(self.road_polygon(&frame, edge.road_width()));

            // One marking per internal lane boundary.
            let mut offset = 0.0;
            for width in &edge.lane_widths()[..edge.n_lane().saturating_sub(1)] {
                offset += width;
                features
                    .lane_marking_lines
                    .push(self.offset_line(&frame, offset));
            }

            if self.owns_center_line(edge) {
                features.center_lines.push(self.offset_line(&frame, 0.0));
            }

            if let Some(anchors) = self.light_anchors(edge, &frame) {
                features.light_anchors.push(anchors);
            }
        }

        for node in self.network.iter_nodes() {
            if node.is_virtual() {
                continue;
            }
            if let Some(outline) = node.outline() {
                features
                    .intersection_polygons
                    .push(self.intersection_polygon(outline));
            }
        }

        features
    }

    /// Insets the edge's endpoints away from real intersection bodies
    /// and computes the per-vertex offset directions.
    fn edge_frame(&self, edge: &Edge) -> EdgeFrame {
        let mut points = edge.points().to_vec();
        let last = points.len() - 1;

        let start = self.network.node(edge.from());
        if !start.is_virtual() {
            if let Some(width) = start.width() {
                points[0] = move_towards(points[0], points[1], width);
            }
        }
        let end = self.network.node(edge.to());
        if !end.is_virtual() {
            if let Some(width) = end.width() {
                points[last] = move_towards(points[last], points[last - 1], width);
            }
        }

        let perps = vertex_perpendiculars(&points);
        EdgeFrame { points, perps }
    }

    /// The polyline offset by `offset` metres along the per-vertex
    /// perpendiculars, converted to geographic coordinates.
    fn offset_line(&self, frame: &EdgeFrame, offset: f64) -> GeoLine {
        let points = frame
            .points
            .iter()
            .zip(&frame.perps)
            .map(|(p, perp)| self.transform.to_geo(*p + *perp * offset))
            .collect();
        GeoLine { points }
    }

    /// The closed road outline: left boundary, then the right boundary
    /// reversed, then back to the first vertex.
    fn road_polygon(&self, frame: &EdgeFrame, road_width: f64) -> GeoPolygon {
        let left = self.offset_line(frame, 0.0).points;
        let right = self.offset_line(frame, road_width).points;
        let first = left[0];
        let mut ring = left;
        ring.extend(right.into_iter().rev());
        ring.push(first);
        GeoPolygon { ring }
    }

    /// Whether this edge contributes the center line of its
    /// bidirectional pair. Exactly one edge per pair does: the one with
    /// the smaller external id.
    fn owns_center_line(&self, edge: &Edge) -> bool {
        match self.network.partner(edge.id()) {
            Some(partner) => edge.ext_id() < self.network.edge(partner).ext_id(),
            None => false,
        }
    }

    /// Per-lane traffic-light anchors at the edge's end, or `None` when
    /// the end node is virtual and carries no signal.
    fn light_anchors(&self, edge: &Edge, frame: &EdgeFrame) -> Option<LightAnchors> {
        if self.network.node(edge.to()).is_virtual() {
            return None;
        }
        let end = *frame.points.last().expect("frame is never empty");
        let perp = *frame.perps.last().expect("frame is never empty");

        let mut offset = 0.0;
        let anchors = edge
            .lane_widths()
            .iter()
            .map(|width| {
                let centre = offset + width / 2.0;
                offset += width;
                self.transform.to_geo(end + perp * centre)
            })
            .collect();
        Some(LightAnchors {
            edge_id: edge.ext_id().to_string(),
            anchors,
        })
    }

    /// The intersection body as a closed geographic ring.
    fn intersection_polygon(&self, outline: &[Point2d]) -> GeoPolygon {
        let mut ring: Vec<_> = outline.iter().map(|p| self.transform.to_geo(*p)).collect();
        if ring.first() != ring.last() {
            if let Some(first) = ring.first().copied() {
                ring.push(first);
            }
        }
        GeoPolygon { ring }
    }
}
