//! Lane centerline geometry.
//!
//! A [`LaneInfo`] stores its centerline as a polyline together with the
//! cumulative arc length `s` at every vertex, so a point at any `s` can be
//! recovered by linear interpolation along the matching segment.
//!
//! # Example
//!
//! ```rust
//! use crossway_map::LaneInfo;
//! use crossway_types::Point3;
//!
//! let lane = LaneInfo::new(
//!     "lane_A",
//!     vec![Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 0.0, 0.0)],
//! )
//! .unwrap();
//!
//! let p = lane.interpolate(2.5);
//! assert!((p.x - 2.5).abs() < 1e-9);
//! assert!((lane.length() - 10.0).abs() < 1e-9);
//! ```

use crossway_types::{LaneId, PlanningError, Point3};
use serde::{Deserialize, Serialize};

/// Serialized form of a lane: id plus centerline vertices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaneRecord {
    pub id: LaneId,
    pub centerline: Vec<Point3>,
}

/// A lane with its centerline and precomputed arc lengths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "LaneRecord", into = "LaneRecord")]
pub struct LaneInfo {
    id: LaneId,
    points: Vec<Point3>,
    /// `accumulated_s[i]` is the arc length from the first vertex to `points[i]`.
    accumulated_s: Vec<f64>,
}

impl LaneInfo {
    /// Build a lane from its centerline.
    ///
    /// Fails when the centerline is empty or contains a non-finite vertex.
    pub fn new(id: impl Into<LaneId>, points: Vec<Point3>) -> Result<Self, PlanningError> {
        let id = id.into();
        if points.is_empty() {
            return Err(PlanningError::Map(format!("lane {id} has an empty centerline")));
        }
        if points.iter().any(|p| !p.is_finite()) {
            return Err(PlanningError::Map(format!(
                "lane {id} has a non-finite centerline vertex"
            )));
        }

        let mut accumulated_s = Vec::with_capacity(points.len());
        let mut s = 0.0;
        accumulated_s.push(s);
        for pair in points.windows(2) {
            s += pair[0].distance_xy(&pair[1]);
            accumulated_s.push(s);
        }

        Ok(Self {
            id,
            points,
            accumulated_s,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Total centerline length.
    pub fn length(&self) -> f64 {
        self.accumulated_s.last().copied().unwrap_or(0.0)
    }

    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    /// Point on the centerline at arc length `s`.
    ///
    /// `s` is clamped to `[0, length]`. Height is interpolated along with the
    /// planar coordinates.
    pub fn interpolate(&self, s: f64) -> Point3 {
        let s = s.clamp(0.0, self.length());

        // First vertex whose accumulated s is >= the query.
        let upper = self.accumulated_s.partition_point(|&acc| acc < s);
        if upper == 0 {
            return self.points[0];
        }
        if upper >= self.points.len() {
            return self.points[self.points.len() - 1];
        }

        let lower = upper - 1;
        let (s0, s1) = (self.accumulated_s[lower], self.accumulated_s[upper]);
        let (p0, p1) = (self.points[lower], self.points[upper]);
        let span = s1 - s0;
        if span <= f64::EPSILON {
            return p0;
        }
        let t = (s - s0) / span;
        Point3::new(
            p0.x + t * (p1.x - p0.x),
            p0.y + t * (p1.y - p0.y),
            p0.z + t * (p1.z - p0.z),
        )
    }
}

impl TryFrom<LaneRecord> for LaneInfo {
    type Error = PlanningError;

    fn try_from(record: LaneRecord) -> Result<Self, Self::Error> {
        LaneInfo::new(record.id, record.centerline)
    }
}

impl From<LaneInfo> for LaneRecord {
    fn from(lane: LaneInfo) -> Self {
        LaneRecord {
            id: lane.id,
            centerline: lane.points,
        }
    }
}
