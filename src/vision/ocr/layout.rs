// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Reading-order reconstruction: clusters detections into text lines

use std::cmp::Ordering;

use super::normalize::{Detection, Position};

/// Default vertical tolerance between consecutive detections of one line, in pixels
pub const DEFAULT_Y_THRESHOLD: f64 = 10.0;

/// Detections believed to share one horizontal text line, left to right
pub type Line = Vec<Detection>;

/// Group detections into lines ordered top to bottom, fragments left to right
///
/// Each detection is compared against the y of the previously accepted
/// detection, not against a line centroid, so a line may drift gradually by
/// more than `y_threshold` overall. Detections without geometry cannot be
/// placed and are returned, in input order, as one trailing line.
pub fn group_into_lines(detections: Vec<Detection>, y_threshold: f64) -> Vec<Line> {
    let mut positioned: Vec<(Position, Detection)> = Vec::with_capacity(detections.len());
    let mut unplaced: Line = Vec::new();
    for detection in detections {
        match detection.position() {
            Some(position) => positioned.push((position, detection)),
            None => unplaced.push(detection),
        }
    }

    positioned.sort_by(|(a, _), (b, _)| compare_reading_order(a, b));

    let mut lines: Vec<Line> = Vec::new();
    let mut current_line: Vec<(Position, Detection)> = Vec::new();
    let mut last_y: Option<f64> = None;

    for (position, detection) in positioned {
        let same_line = last_y.map_or(true, |y| (position.y - y).abs() <= y_threshold);
        if !same_line {
            lines.push(flush_line(std::mem::take(&mut current_line)));
        }
        last_y = Some(position.y);
        current_line.push((position, detection));
    }

    if !current_line.is_empty() {
        lines.push(flush_line(current_line));
    }

    if !unplaced.is_empty() {
        lines.push(unplaced);
    }

    lines
}

fn compare_reading_order(a: &Position, b: &Position) -> Ordering {
    a.y.total_cmp(&b.y).then_with(|| a.x.total_cmp(&b.x))
}

fn flush_line(mut members: Vec<(Position, Detection)>) -> Line {
    members.sort_by(|(a, _), (b, _)| a.x.total_cmp(&b.x));
    members.into_iter().map(|(_, detection)| detection).collect()
}
