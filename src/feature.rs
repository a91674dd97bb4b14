//! Renderable feature types handed to the render sink.
//!
//! Everything in this module is plain data in geographic coordinates;
//! the sink performs no further coordinate math.

use crate::transform::LngLat;
use rand::{Rng, SeedableRng};
use serde::Serialize;

/// A closed geographic ring. The first and last coordinates are equal.
#[derive(Clone, Debug, Default, Serialize)]
pub struct GeoPolygon {
    pub ring: Vec<LngLat>,
}

/// An open geographic polyline.
#[derive(Clone, Debug, Default, Serialize)]
pub struct GeoLine {
    pub points: Vec<LngLat>,
}

/// An RGB color with 8-bit channels.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const RED: Color = Color {
        r: 224,
        g: 36,
        b: 36,
    };
    pub const GREEN: Color = Color {
        r: 24,
        g: 168,
        b: 56,
    };
    pub const GRAY: Color = Color {
        r: 128,
        g: 128,
        b: 128,
    };

    /// Derives a stable vehicle color from an id-derived seed.
    ///
    /// The same seed always yields the same hue, so a vehicle keeps its
    /// color across every step it appears in.
    pub fn from_seed(seed: u64) -> Color {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        Self::from_hue(rng.gen_range(0.0..360.0))
    }

    /// A fully saturated, mid-lightness color at the given hue in degrees.
    fn from_hue(hue: f64) -> Color {
        let h = hue.rem_euclid(360.0) / 60.0;
        let x = 1.0 - (h.rem_euclid(2.0) - 1.0).abs();
        let (r, g, b) = match h as u32 {
            0 => (1.0, x, 0.0),
            1 => (x, 1.0, 0.0),
            2 => (0.0, 1.0, x),
            3 => (0.0, x, 1.0),
            4 => (x, 0.0, 1.0),
            _ => (1.0, 0.0, x),
        };
        // Channels span 64..=224 rather than 0..=255.
        let channel = |c: f64| (64.0 + 160.0 * c) as u8;
        Color {
            r: channel(r),
            g: channel(g),
            b: channel(b),
        }
    }
}

/// The marker shape of a [VehicleStyle].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum MarkerShape {
    Arrow,
    Circle,
    Rectangle,
}

/// Declarative style descriptor for vehicle markers.
///
/// The render sink owns rasterization; this struct only names the shape,
/// a size-by-zoom curve, and the feature field that rotates the marker.
#[derive(Clone, Debug, Serialize)]
pub struct VehicleStyle {
    pub shape: MarkerShape,
    /// `(zoom, size in pixels)` control points, interpolated by the sink.
    pub size_by_zoom: Vec<(f64, f64)>,
    /// Name of the [VehiclePoint] field supplying marker rotation.
    pub rotation_field: &'static str,
}

impl Default for VehicleStyle {
    fn default() -> Self {
        Self {
            shape: MarkerShape::Arrow,
            size_by_zoom: vec![(12.0, 2.0), (15.0, 6.0), (18.0, 14.0)],
            rotation_field: "bearing",
        }
    }
}

/// The traffic-light anchor points of one edge, ordered by lane index.
#[derive(Clone, Debug, Serialize)]
pub struct LightAnchors {
    /// External id of the edge the anchors belong to.
    pub edge_id: String,
    /// One anchor per lane, on the lane's centerline at the edge's end.
    pub anchors: Vec<LngLat>,
}

/// The static feature sets, built once per load.
#[derive(Clone, Debug, Default, Serialize)]
pub struct StaticFeatures {
    pub road_polygons: Vec<GeoPolygon>,
    pub lane_marking_lines: Vec<GeoLine>,
    /// One line per bidirectional road pair.
    pub center_lines: Vec<GeoLine>,
    pub intersection_polygons: Vec<GeoPolygon>,
    pub light_anchors: Vec<LightAnchors>,
    pub vehicle_style: VehicleStyle,
}

/// A vehicle marker for one replay step.
#[derive(Clone, Debug, Serialize)]
pub struct VehiclePoint {
    pub id: String,
    pub position: LngLat,
    /// Bearing in degrees clockwise from north.
    pub bearing: f64,
    pub color: Color,
}

/// A traffic-light marker for one replay step.
#[derive(Clone, Debug, Serialize)]
pub struct TrafficLightPoint {
    /// External edge id and lane index, joined with `_`.
    pub id: String,
    pub position: LngLat,
    pub color: Color,
    /// 0.0 hides the marker entirely.
    pub opacity: f64,
}

/// One rendered replay frame.
#[derive(Clone, Debug, Serialize)]
pub struct Frame {
    /// The step index this frame renders.
    pub step: usize,
    pub vehicle_points: Vec<VehiclePoint>,
    pub traffic_light_points: Vec<TrafficLightPoint>,
}
