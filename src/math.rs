//! Mathematical structs and functions.

use cgmath::prelude::*;
use cgmath::{Point2, Vector2};

/// A 2D point
pub type Point2d = Point2<f64>;

/// A 2D vector
pub type Vector2d = Vector2<f64>;

/// Rotates a vector 90 degrees clockwise.
///
/// This is the one perpendicular convention used across the crate;
/// offsets to the right of a direction vector are positive.
pub fn perp(vec: Vector2d) -> Vector2d {
    Vector2d::new(vec.y, -vec.x)
}

/// Normalises a vector, or returns the zero vector if its magnitude
/// is too small to divide by.
pub fn normalize_or_zero(vec: Vector2d) -> Vector2d {
    let mag = vec.magnitude();
    if mag > f64::EPSILON {
        vec / mag
    } else {
        Vector2d::new(0.0, 0.0)
    }
}

/// Moves `point` towards `target` by `distance`.
///
/// Used to inset road endpoints away from intersection bodies. If the
/// two points coincide, `point` is returned unchanged.
pub fn move_towards(point: Point2d, target: Point2d, distance: f64) -> Point2d {
    point + normalize_or_zero(target - point) * distance
}

/// Computes the unit offset direction at every vertex of a polyline.
///
/// The first and last vertices use the perpendicular of their adjacent
/// segment; interior vertices use the perpendicular of the chord between
/// their two neighbours, which produces smoother corners than
/// per-segment normals.
pub fn vertex_perpendiculars(points: &[Point2d]) -> Vec<Vector2d> {
    let last = points.len() - 1;
    (0..points.len())
        .map(|i| {
            let dir = if i == 0 {
                points[1] - points[0]
            } else if i == last {
                points[last] - points[last - 1]
            } else {
                points[i + 1] - points[i - 1]
            };
            normalize_or_zero(perp(dir))
        })
        .collect()
}
