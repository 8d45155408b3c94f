//! Wire geometry: cubic bezier curves from an output port to an input port.
//!
//! Both control points run horizontally out of their port by half the
//! horizontal distance, but never less than 50 units, so short or
//! backwards wires still leave and enter their ports sideways.

use flowdo_core::{Edge, FlowGraph, Point};
use kurbo::{CubicBez, ParamCurveNearest};

/// Minimum horizontal control-point offset.
pub const MIN_CONTROL_OFFSET: f64 = 50.0;
/// Half the width of the invisible stroke that catches clicks on a wire.
pub const WIRE_HIT_TOLERANCE: f32 = 12.5;

fn kp(p: Point) -> kurbo::Point {
    kurbo::Point::new(p.x as f64, p.y as f64)
}

/// The bezier curve for a wire between two world points.
pub fn wire_curve(start: Point, end: Point) -> CubicBez {
    let (s, e) = (kp(start), kp(end));
    let offset = ((e.x - s.x).abs() * 0.5).max(MIN_CONTROL_OFFSET);
    CubicBez::new(
        s,
        kurbo::Point::new(s.x + offset, s.y),
        kurbo::Point::new(e.x - offset, e.y),
        e,
    )
}

/// Curve for an existing edge, or `None` if an endpoint is missing.
pub fn edge_curve(graph: &FlowGraph, edge: &Edge) -> Option<CubicBez> {
    let source = graph.node(edge.source)?;
    let target = graph.node(edge.target)?;
    Some(wire_curve(source.output_port(), target.input_port()))
}

/// SVG path data (`M … C …`) for a curve.
pub fn svg_path(curve: &CubicBez) -> String {
    format!(
        "M {} {} C {} {}, {} {}, {} {}",
        curve.p0.x, curve.p0.y, curve.p1.x, curve.p1.y, curve.p2.x, curve.p2.y, curve.p3.x, curve.p3.y
    )
}

/// Distance from `p` to the closest point on `curve`.
pub fn distance_to(curve: &CubicBez, p: Point) -> f32 {
    curve.nearest(kp(p), 1e-3).distance_sq.sqrt() as f32
}

/// Topmost wire within `tolerance` of `p` (wires created later paint on top).
pub fn hit_test_wire(graph: &FlowGraph, p: Point, tolerance: f32) -> Option<Edge> {
    let edges: Vec<Edge> = graph.edges().collect();
    edges.into_iter().rev().find(|edge| {
        edge_curve(graph, edge).is_some_and(|curve| distance_to(&curve, p) <= tolerance)
    })
}
