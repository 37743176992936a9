//! Polygonal zone of interest.
//!
//! A zone is defined once per deployment as a normalized template (vertices in
//! `[0,1]²`) and scaled to pixel coordinates when the source reports its
//! resolution. Containment uses the even-odd ray-casting rule against a
//! detection's bounding-box center: the center is a stable reference point
//! under box jitter, unlike corners.
//!
//! Boundary rule: points on a polygon edge are classified by the half-open
//! parity of the even-odd test. For an axis-aligned rectangle that means the
//! minimum-x edge is inside and the maximum-x edge is outside. Tests pin this
//! classification.

use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::detect::Detection;

/// Normalized zone polygon, fixed per deployment.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ZoneTemplate {
    vertices: Vec<(f64, f64)>,
}

impl ZoneTemplate {
    pub fn new(vertices: Vec<(f64, f64)>) -> Result<Self> {
        if vertices.len() < 3 {
            return Err(anyhow!(
                "zone template needs at least 3 vertices, got {}",
                vertices.len()
            ));
        }
        for &(x, y) in &vertices {
            if !(0.0..=1.0).contains(&x) || !(0.0..=1.0).contains(&y) {
                return Err(anyhow!(
                    "zone template vertex ({}, {}) outside the unit square",
                    x,
                    y
                ));
            }
        }
        Ok(Self { vertices })
    }

    /// The left half of the frame. Matches the deployed monitoring layout.
    pub fn left_half() -> Self {
        Self {
            vertices: vec![(0.0, 0.0), (0.5, 0.0), (0.5, 1.0), (0.0, 1.0)],
        }
    }

    pub fn vertices(&self) -> &[(f64, f64)] {
        &self.vertices
    }

    /// Validate a template that arrived via deserialization.
    pub fn validated(self) -> Result<Self> {
        Self::new(self.vertices)
    }
}

/// Zone polygon in source-resolution pixel coordinates.
///
/// Computed once per session as `template * (width, height)` with coordinates
/// truncated to integers, so the same template yields exactly proportional
/// polygons at proportional resolutions.
#[derive(Clone, Debug, PartialEq)]
pub struct Zone {
    vertices: Vec<(i32, i32)>,
}

impl Zone {
    pub fn from_template(template: &ZoneTemplate, width: u32, height: u32) -> Self {
        let vertices = template
            .vertices()
            .iter()
            .map(|&(x, y)| ((x * width as f64) as i32, (y * height as f64) as i32))
            .collect();
        Self { vertices }
    }

    pub fn vertices(&self) -> &[(i32, i32)] {
        &self.vertices
    }

    /// Even-odd ray-casting point-in-polygon test.
    pub fn contains_point(&self, px: f32, py: f32) -> bool {
        let px = px as f64;
        let py = py as f64;
        let mut inside = false;
        let n = self.vertices.len();
        let mut j = n - 1;
        for i in 0..n {
            let (xi, yi) = (self.vertices[i].0 as f64, self.vertices[i].1 as f64);
            let (xj, yj) = (self.vertices[j].0 as f64, self.vertices[j].1 as f64);
            if (yi > py) != (yj > py) {
                let x_cross = xi + (py - yi) * (xj - xi) / (yj - yi);
                if px < x_cross {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    /// Containment test for one detection, using the bounding-box center as
    /// the reference point.
    pub fn contains(&self, detection: &Detection) -> bool {
        let (cx, cy) = detection.bbox.center();
        self.contains_point(cx, cy)
    }

    /// The subset of detections inside the zone. Feeds the annotator overlay
    /// only; neither alerting nor occupancy is gated on zone membership.
    pub fn trigger<'a>(&self, detections: &'a [Detection]) -> Vec<&'a Detection> {
        detections.iter().filter(|d| self.contains(d)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    fn rect_zone() -> Zone {
        // 100x100 square at the origin.
        let template = ZoneTemplate::new(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)])
            .expect("template");
        Zone::from_template(&template, 100, 100)
    }

    /// Reference even-odd implementation, structured differently from the
    /// production one, for agreement checks.
    fn reference_contains(vertices: &[(i32, i32)], px: f64, py: f64) -> bool {
        let mut crossings = 0u32;
        for i in 0..vertices.len() {
            let (x1, y1) = (vertices[i].0 as f64, vertices[i].1 as f64);
            let k = (i + 1) % vertices.len();
            let (x2, y2) = (vertices[k].0 as f64, vertices[k].1 as f64);
            if (y1 > py) == (y2 > py) {
                continue;
            }
            let t = (py - y1) / (y2 - y1);
            if px < x1 + t * (x2 - x1) {
                crossings += 1;
            }
        }
        crossings % 2 == 1
    }

    #[test]
    fn template_requires_three_vertices() {
        assert!(ZoneTemplate::new(vec![(0.0, 0.0), (1.0, 1.0)]).is_err());
        assert!(ZoneTemplate::new(vec![(0.0, 0.0), (1.0, 0.0), (0.5, 1.0)]).is_ok());
    }

    #[test]
    fn template_rejects_vertices_outside_unit_square() {
        assert!(ZoneTemplate::new(vec![(0.0, 0.0), (1.2, 0.0), (0.5, 1.0)]).is_err());
    }

    #[test]
    fn contains_agrees_with_reference_on_concave_polygon() {
        // Concave "L" shape.
        let template = ZoneTemplate::new(vec![
            (0.0, 0.0),
            (1.0, 0.0),
            (1.0, 0.4),
            (0.4, 0.4),
            (0.4, 1.0),
            (0.0, 1.0),
        ])
        .expect("template");
        let zone = Zone::from_template(&template, 200, 200);

        for x in (0..200).step_by(7) {
            for y in (0..200).step_by(7) {
                let (px, py) = (x as f64 + 0.5, y as f64 + 0.5);
                assert_eq!(
                    zone.contains_point(px as f32, py as f32),
                    reference_contains(zone.vertices(), px, py),
                    "disagreement at ({}, {})",
                    px,
                    py
                );
            }
        }
    }

    #[test]
    fn boundary_rule_is_half_open() {
        let zone = rect_zone();
        // Minimum-x edge counts as inside, maximum-x edge as outside.
        assert!(zone.contains_point(0.0, 50.0));
        assert!(!zone.contains_point(100.0, 50.0));
        // Interior and exterior sanity.
        assert!(zone.contains_point(50.0, 50.0));
        assert!(!zone.contains_point(150.0, 50.0));
    }

    #[test]
    fn detection_containment_uses_box_center() {
        let zone = rect_zone();
        // Box straddling the border, center inside.
        let inside = Detection::new("person", 0.9, BoundingBox::new(80.0, 40.0, 110.0, 60.0));
        // Center outside even though a corner is inside.
        let outside = Detection::new("person", 0.9, BoundingBox::new(90.0, 40.0, 160.0, 60.0));
        assert!(zone.contains(&inside));
        assert!(!zone.contains(&outside));
    }

    #[test]
    fn trigger_returns_contained_subset() {
        let zone = rect_zone();
        let detections = vec![
            Detection::new("person", 0.9, BoundingBox::new(10.0, 10.0, 30.0, 30.0)),
            Detection::new("person", 0.8, BoundingBox::new(150.0, 10.0, 170.0, 30.0)),
        ];
        let hits = zone.trigger(&detections);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].bbox, detections[0].bbox);
    }

    #[test]
    fn halving_resolution_halves_every_vertex() {
        let template = ZoneTemplate::left_half();
        let full = Zone::from_template(&template, 1280, 720);
        let half = Zone::from_template(&template, 640, 360);
        assert_eq!(full.vertices().len(), half.vertices().len());
        for (&(fx, fy), &(hx, hy)) in full.vertices().iter().zip(half.vertices()) {
            assert_eq!(fx, hx * 2);
            assert_eq!(fy, hy * 2);
        }
    }
}
