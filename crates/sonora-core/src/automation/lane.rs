//! Automation lane: sorted control points and value queries

use serde::{Deserialize, Serialize};

use crate::types::SampleCount;

/// One control point on a lane
///
/// `curve` shapes the segment that starts at this point: 0 is linear,
/// positive values ease in (exponential), negative values ease out
/// (logarithmic).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutomationPoint {
    pub position: SampleCount,
    pub value: f32,
    #[serde(default)]
    pub curve: f32,
}

impl AutomationPoint {
    pub fn new(position: SampleCount, value: f32) -> Self {
        Self {
            position,
            value,
            curve: 0.0,
        }
    }

    pub fn with_curve(position: SampleCount, value: f32, curve: f32) -> Self {
        Self {
            position,
            value,
            curve,
        }
    }
}

/// Points kept strictly ascending by position, never two at the same position
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AutomationLane {
    points: Vec<AutomationPoint>,
}

impl AutomationLane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a lane from arbitrary points; later duplicates overwrite earlier ones
    pub fn from_points(points: impl IntoIterator<Item = AutomationPoint>) -> Self {
        let mut lane = Self::new();
        for point in points {
            lane.add_point(point);
        }
        lane
    }

    /// Insert keeping ascending order; an existing point at the same
    /// position takes the new value and curve
    pub fn add_point(&mut self, point: AutomationPoint) {
        match self.search(point.position) {
            Ok(index) => self.points[index] = point,
            Err(index) => self.points.insert(index, point),
        }
    }

    /// Remove the point at exactly `position`, returning whether one existed
    pub fn remove_point(&mut self, position: SampleCount) -> bool {
        match self.search(position) {
            Ok(index) => {
                self.points.remove(index);
                true
            }
            Err(_) => false,
        }
    }

    /// Remove every point with `start <= position <= end`, returning how many
    pub fn remove_points_in_range(&mut self, start: SampleCount, end: SampleCount) -> usize {
        let range = self.range_indices(start, end);
        let removed = range.len();
        self.points.drain(range);
        removed
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn points(&self) -> &[AutomationPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Value at `position`
    ///
    /// Exact matches return the stored value. Between points the segment is
    /// shaped by the preceding point's curve. Outside the lane the nearest
    /// boundary value is held. An empty lane reads as 0.
    pub fn value_at(&self, position: SampleCount) -> f32 {
        let next = match self.search(position) {
            Ok(index) => return self.points[index].value,
            Err(next) => next,
        };

        match (next.checked_sub(1).map(|i| &self.points[i]), self.points.get(next)) {
            (None, None) => 0.0,
            (None, Some(first)) => first.value,
            (Some(last), None) => last.value,
            (Some(before), Some(after)) => interpolate(before, after, position),
        }
    }

    /// Shift the positions of points inside `[start, end]` by `offset`
    ///
    /// A shifted point landing on a stationary point replaces it.
    pub fn move_range(&mut self, start: SampleCount, end: SampleCount, offset: SampleCount) {
        if offset == 0 {
            return;
        }
        let range = self.range_indices(start, end);
        let moved: Vec<AutomationPoint> = self.points.drain(range).collect();
        for mut point in moved {
            point.position += offset;
            self.add_point(point);
        }
    }

    /// Multiply the values of points inside `[start, end]`
    pub fn scale_range(&mut self, start: SampleCount, end: SampleCount, factor: f32) {
        let range = self.range_indices(start, end);
        for point in &mut self.points[range] {
            point.value *= factor;
        }
    }

    /// Add `offset` to the values of points inside `[start, end]`
    pub fn offset_range(&mut self, start: SampleCount, end: SampleCount, offset: f32) {
        let range = self.range_indices(start, end);
        for point in &mut self.points[range] {
            point.value += offset;
        }
    }

    /// Position of the first point (0 when empty)
    pub fn start(&self) -> SampleCount {
        self.points.first().map_or(0, |p| p.position)
    }

    /// Position of the last point (0 when empty)
    pub fn end(&self) -> SampleCount {
        self.points.last().map_or(0, |p| p.position)
    }

    pub fn min_value(&self) -> f32 {
        self.points
            .iter()
            .map(|p| p.value)
            .reduce(f32::min)
            .unwrap_or(0.0)
    }

    pub fn max_value(&self) -> f32 {
        self.points
            .iter()
            .map(|p| p.value)
            .reduce(f32::max)
            .unwrap_or(0.0)
    }

    #[inline]
    fn search(&self, position: SampleCount) -> Result<usize, usize> {
        self.points.binary_search_by_key(&position, |p| p.position)
    }

    /// Index range of points with `start <= position <= end`
    fn range_indices(&self, start: SampleCount, end: SampleCount) -> std::ops::Range<usize> {
        if start > end {
            return 0..0;
        }
        let first = self.points.partition_point(|p| p.position < start);
        let last = self.points.partition_point(|p| p.position <= end);
        first..last
    }
}

fn interpolate(before: &AutomationPoint, after: &AutomationPoint, position: SampleCount) -> f32 {
    let span = (after.position - before.position) as f64;
    let t = ((position - before.position) as f64 / span) as f32;

    let shaped = if before.curve > 0.0 {
        t.powf(1.0 + before.curve)
    } else if before.curve < 0.0 {
        1.0 - (1.0 - t).powf(1.0 - before.curve)
    } else {
        t
    };

    before.value + shaped * (after.value - before.value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lane(points: &[(SampleCount, f32)]) -> AutomationLane {
        AutomationLane::from_points(points.iter().map(|&(p, v)| AutomationPoint::new(p, v)))
    }

    #[test]
    fn test_empty_lane_reads_zero() {
        let lane = AutomationLane::new();
        assert_eq!(lane.value_at(0), 0.0);
        assert_eq!(lane.value_at(-500), 0.0);
        assert_eq!(lane.min_value(), 0.0);
        assert_eq!(lane.max_value(), 0.0);
        assert_eq!(lane.start(), 0);
        assert_eq!(lane.end(), 0);
    }

    #[test]
    fn test_points_stay_sorted() {
        let lane = lane(&[(300, 3.0), (100, 1.0), (200, 2.0)]);
        let positions: Vec<_> = lane.points().iter().map(|p| p.position).collect();
        assert_eq!(positions, vec![100, 200, 300]);
    }

    #[test]
    fn test_duplicate_position_overwrites() {
        let mut lane = lane(&[(0, 0.0), (100, 1.0)]);
        lane.add_point(AutomationPoint::with_curve(100, 0.25, 2.0));

        assert_eq!(lane.len(), 2);
        assert_eq!(lane.points()[1].value, 0.25);
        assert_eq!(lane.points()[1].curve, 2.0);
    }

    #[test]
    fn test_exact_match_ignores_curve() {
        let mut lane = AutomationLane::new();
        lane.add_point(AutomationPoint::with_curve(0, 0.2, 3.0));
        lane.add_point(AutomationPoint::with_curve(1000, 0.9, -3.0));
        lane.add_point(AutomationPoint::new(2000, 0.1));

        assert_eq!(lane.value_at(0), 0.2);
        assert_eq!(lane.value_at(1000), 0.9);
        assert_eq!(lane.value_at(2000), 0.1);
    }

    #[test]
    fn test_boundaries_hold() {
        let lane = lane(&[(100, 0.3), (200, 0.8)]);
        assert_eq!(lane.value_at(0), 0.3);
        assert_eq!(lane.value_at(-1_000_000), 0.3);
        assert_eq!(lane.value_at(201), 0.8);
        assert_eq!(lane.value_at(i64::MAX), 0.8);
    }

    #[test]
    fn test_single_point_holds_everywhere() {
        let lane = lane(&[(500, 0.7)]);
        assert_eq!(lane.value_at(0), 0.7);
        assert_eq!(lane.value_at(10_000), 0.7);
    }

    #[test]
    fn test_linear_interpolation() {
        let lane = lane(&[(0, 0.0), (100, 1.0)]);
        assert!((lane.value_at(25) - 0.25).abs() < 1e-6);
        assert!((lane.value_at(50) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_positive_curve_eases_in() {
        let mut lane = AutomationLane::new();
        lane.add_point(AutomationPoint::with_curve(0, 0.0, 1.0));
        lane.add_point(AutomationPoint::new(100, 1.0));

        // t^(1 + 1) at t = 0.5
        assert!((lane.value_at(50) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_negative_curve_eases_out() {
        let mut lane = AutomationLane::new();
        lane.add_point(AutomationPoint::with_curve(0, 0.0, -1.0));
        lane.add_point(AutomationPoint::new(100, 1.0));

        // 1 - (1 - t)^(1 + 1) at t = 0.5
        assert!((lane.value_at(50) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_curve_of_following_point_is_ignored() {
        let mut lane = AutomationLane::new();
        lane.add_point(AutomationPoint::new(0, 0.0));
        lane.add_point(AutomationPoint::with_curve(100, 1.0, 5.0));
        assert!((lane.value_at(50) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_remove_point() {
        let mut lane = lane(&[(0, 0.0), (100, 1.0)]);
        assert!(lane.remove_point(100));
        assert!(!lane.remove_point(100));
        assert_eq!(lane.len(), 1);
    }

    #[test]
    fn test_remove_range_is_inclusive() {
        let mut lane = lane(&[(0, 0.0), (100, 1.0), (200, 2.0), (300, 3.0)]);
        assert_eq!(lane.remove_points_in_range(100, 200), 2);
        let positions: Vec<_> = lane.points().iter().map(|p| p.position).collect();
        assert_eq!(positions, vec![0, 300]);

        assert_eq!(lane.remove_points_in_range(400, 100), 0);
        lane.clear();
        assert!(lane.is_empty());
    }

    #[test]
    fn test_move_range_resorts() {
        let mut lane = lane(&[(0, 0.0), (100, 1.0), (200, 2.0)]);
        lane.move_range(0, 100, 250);

        let positions: Vec<_> = lane.points().iter().map(|p| p.position).collect();
        assert_eq!(positions, vec![200, 250, 350]);
        assert_eq!(lane.value_at(250), 0.0);
        assert_eq!(lane.value_at(350), 1.0);
    }

    #[test]
    fn test_move_range_collision_keeps_moved_point() {
        let mut lane = lane(&[(0, 0.5), (100, 1.0)]);
        lane.move_range(0, 0, 100);

        assert_eq!(lane.len(), 1);
        assert_eq!(lane.value_at(100), 0.5);
    }

    #[test]
    fn test_value_edits_only_touch_range() {
        let mut lane = lane(&[(0, 1.0), (100, 1.0), (200, 1.0)]);
        lane.scale_range(50, 200, 0.5);
        lane.offset_range(200, 300, 0.25);

        let values: Vec<_> = lane.points().iter().map(|p| p.value).collect();
        assert_eq!(values, vec![1.0, 0.5, 0.75]);
        assert_eq!(lane.min_value(), 0.5);
        assert_eq!(lane.max_value(), 1.0);
        assert_eq!(lane.start(), 0);
        assert_eq!(lane.end(), 200);
    }
}
