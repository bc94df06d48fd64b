//! Stroke payloads and incremental stroke assembly.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One sampled canvas point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal canvas coordinate.
    pub x: f64,
    /// Vertical canvas coordinate.
    pub y: f64,
}

impl Point {
    /// Builds a point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Rendering parameters (color, width, mode, style flags).
///
/// Opaque to the log and replay; only renderers interpret it.
pub type StrokeMetadata = Map<String, Value>;

/// A completed stroke: metadata plus its ordered points.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Stroke {
    /// Rendering parameters.
    #[serde(default, alias = "meta")]
    pub metadata: StrokeMetadata,
    /// Points in drawing order.
    #[serde(default)]
    pub points: Vec<Point>,
}

impl Stroke {
    /// Builds a stroke from its parts.
    pub fn new(metadata: StrokeMetadata, points: Vec<Point>) -> Self {
        Self { metadata, points }
    }
}

/// Buffers an in-progress stroke until the pointer is released.
///
/// Points beyond `max_points` are dropped; the stroke keeps its head.
#[derive(Debug, Clone)]
pub struct StrokeBuilder {
    stroke: Stroke,
    max_points: usize,
    dropped: usize,
}

impl StrokeBuilder {
    /// Starts a stroke from its opening metadata and any initial points.
    pub fn start(initial: Stroke, max_points: usize) -> Self {
        let mut builder = Self {
            stroke: Stroke::new(initial.metadata, Vec::new()),
            max_points,
            dropped: 0,
        };
        for point in initial.points {
            builder.push(point);
        }
        builder
    }

    /// Appends one point. Returns `false` when the buffer is full.
    pub fn push(&mut self, point: Point) -> bool {
        if self.stroke.points.len() >= self.max_points {
            self.dropped += 1;
            return false;
        }
        self.stroke.points.push(point);
        true
    }

    /// Points buffered so far.
    pub fn len(&self) -> usize {
        self.stroke.points.len()
    }

    /// True when no point has been buffered.
    pub fn is_empty(&self) -> bool {
        self.stroke.points.is_empty()
    }

    /// Points rejected because the buffer was full.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Coalesces the buffered updates into one stroke.
    pub fn finish(self) -> Stroke {
        self.stroke
    }
}
