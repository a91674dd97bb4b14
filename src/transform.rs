//! Conversion from simulation-local planar space to geographic space.

use crate::math::Point2d;
use serde::{Deserialize, Serialize};

/// A geographic coordinate in degrees.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub const fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }
}

/// Degrees of longitude and latitude per metre of local distance.
///
/// The two axes scale independently because a degree of longitude
/// shrinks with latitude.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct GeoScale {
    pub lng: f64,
    pub lat: f64,
}

/// Maps simulation-local planar coordinates onto geographic coordinates.
///
/// Local points are rotated by `rotation_degrees` about the local origin,
/// scaled per axis, then translated to `origin`. The rotation defaults to
/// zero; deployments whose network is not north-aligned configure it once
/// and both points and bearings stay consistent.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct GeoTransform {
    origin: LngLat,
    scale: GeoScale,
    rotation_degrees: f64,
}

impl GeoTransform {
    /// Creates a transform with no rotation.
    pub fn new(origin: LngLat, scale: GeoScale) -> Self {
        Self {
            origin,
            scale,
            rotation_degrees: 0.0,
        }
    }

    /// Creates a transform that also rotates the local frame.
    pub fn with_rotation(origin: LngLat, scale: GeoScale, rotation_degrees: f64) -> Self {
        Self {
            origin,
            scale,
            rotation_degrees,
        }
    }

    /// Converts a local point to geographic coordinates.
    pub fn to_geo(&self, point: Point2d) -> LngLat {
        let (sin, cos) = self.rotation_degrees.to_radians().sin_cos();
        let x = point.x * cos - point.y * sin;
        let y = point.x * sin + point.y * cos;
        LngLat::new(
            self.origin.lng + x * self.scale.lng,
            self.origin.lat + y * self.scale.lat,
        )
    }

    /// Converts a local heading to a geographic bearing.
    ///
    /// Local headings are radians counter-clockwise from the local +x
    /// axis; bearings are degrees clockwise from north, in `[0, 360)`.
    pub fn to_bearing(&self, angle_radians: f64) -> f64 {
        (90.0 + angle_radians.to_degrees() + self.rotation_degrees).rem_euclid(360.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::f64::consts::{PI, TAU};

    fn identity() -> GeoTransform {
        GeoTransform::new(LngLat::new(0.0, 0.0), GeoScale { lng: 1.0, lat: 1.0 })
    }

    #[test]
    fn bearing_is_periodic() {
        let t = GeoTransform::with_rotation(
            LngLat::new(0.0, 0.0),
            GeoScale { lng: 1.0, lat: 1.0 },
            37.5,
        );
        for i in -8..8 {
            let angle = 0.4 * i as f64;
            assert_approx_eq!(t.to_bearing(angle), t.to_bearing(angle + TAU));
        }
    }

    #[test]
    fn bearing_of_zero_heading_is_east() {
        assert_approx_eq!(identity().to_bearing(0.0), 90.0);
    }

    #[test]
    fn rotation_shifts_the_bearing() {
        let t = GeoTransform::with_rotation(
            LngLat::new(0.0, 0.0),
            GeoScale { lng: 1.0, lat: 1.0 },
            30.0,
        );
        assert_approx_eq!(t.to_bearing(0.0), 120.0);
        assert_approx_eq!(t.to_bearing(PI), 300.0);
    }

    #[test]
    fn zero_rotation_scales_and_translates() {
        let t = GeoTransform::new(
            LngLat::new(116.0, 39.9),
            GeoScale {
                lng: 2e-5,
                lat: 1e-5,
            },
        );
        let geo = t.to_geo(Point2d::new(100.0, 200.0));
        assert_approx_eq!(geo.lng, 116.0 + 100.0 * 2e-5);
        assert_approx_eq!(geo.lat, 39.9 + 200.0 * 1e-5);
    }

    #[test]
    fn quarter_rotation_swaps_axes() {
        let t = GeoTransform::with_rotation(
            LngLat::new(0.0, 0.0),
            GeoScale { lng: 1.0, lat: 1.0 },
            90.0,
        );
        let geo = t.to_geo(Point2d::new(1.0, 0.0));
        assert_approx_eq!(geo.lng, 0.0);
        assert_approx_eq!(geo.lat, 1.0);
    }
}
