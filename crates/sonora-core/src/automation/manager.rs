//! Parameter-id registry of automation lanes
//!
//! Edits go through a `Mutex` on the control thread. After every edit the
//! whole table is copied into a fresh [`AutomationSnapshot`] and swapped into a
//! `SharedCell`; the audio thread only ever touches that snapshot.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use basedrop::{Shared, SharedCell};
use serde::{Deserialize, Serialize};

use super::{AutomationLane, AutomationPoint};
use crate::engine::gc::gc_handle;
use crate::types::SampleCount;

/// Name of an automatable parameter, e.g. `"master/gain_db"`
pub type ParameterId = String;

/// Plain point lists keyed by parameter id, for loading and saving
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutomationData {
    #[serde(default)]
    pub lanes: BTreeMap<ParameterId, Vec<AutomationPoint>>,
}

/// Immutable copy of the lane table published to the audio thread
#[derive(Debug, Clone, Default)]
pub struct AutomationSnapshot {
    lanes: HashMap<ParameterId, AutomationLane>,
}

impl AutomationSnapshot {
    /// Build a snapshot directly from point lists, for offline rendering
    pub fn from_data(data: &AutomationData) -> Self {
        Self {
            lanes: data
                .lanes
                .iter()
                .map(|(id, points)| (id.clone(), AutomationLane::from_points(points.iter().copied())))
                .collect(),
        }
    }

    /// Value of `id` at `position`, 0 when the parameter has no lane
    pub fn parameter_value(&self, id: &str, position: SampleCount) -> f32 {
        self.lane_value(id, position).unwrap_or(0.0)
    }

    /// Value of `id` at `position`, `None` when the parameter has no lane
    pub fn lane_value(&self, id: &str, position: SampleCount) -> Option<f32> {
        self.lanes.get(id).map(|lane| lane.value_at(position))
    }

    pub fn lane(&self, id: &str) -> Option<&AutomationLane> {
        self.lanes.get(id)
    }

    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }
}

/// Realtime-side view of an [`AutomationManager`]
///
/// Cloneable and `Send`; reading never takes a lock.
#[derive(Clone)]
pub struct AutomationReader {
    cell: Arc<SharedCell<AutomationSnapshot>>,
}

impl AutomationReader {
    /// Pin the current snapshot. Hold it for a block, then drop it.
    #[inline]
    pub fn snapshot(&self) -> Shared<AutomationSnapshot> {
        self.cell.get()
    }

    pub fn parameter_value(&self, id: &str, position: SampleCount) -> f32 {
        self.cell.get().parameter_value(id, position)
    }
}

/// Registry of automation lanes by parameter id
pub struct AutomationManager {
    lanes: Mutex<HashMap<ParameterId, AutomationLane>>,
    published: Arc<SharedCell<AutomationSnapshot>>,
}

impl AutomationManager {
    pub fn new() -> Self {
        Self {
            lanes: Mutex::new(HashMap::new()),
            published: Arc::new(SharedCell::new(Shared::new(
                &gc_handle(),
                AutomationSnapshot::default(),
            ))),
        }
    }

    /// Handle for the audio thread
    pub fn reader(&self) -> AutomationReader {
        AutomationReader {
            cell: Arc::clone(&self.published),
        }
    }

    /// Register `lane` under `id`, replacing any existing lane
    pub fn add_lane(&self, id: impl Into<ParameterId>, lane: AutomationLane) {
        self.edit(|lanes| {
            lanes.insert(id.into(), lane);
        });
    }

    pub fn remove_lane(&self, id: &str) -> bool {
        self.edit(|lanes| lanes.remove(id).is_some())
    }

    pub fn has_lane(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    /// Copy of the lane registered under `id`
    pub fn lane(&self, id: &str) -> Option<AutomationLane> {
        self.lock().get(id).cloned()
    }

    /// Mutate one lane in place. Returns `None` when `id` is not registered.
    pub fn edit_lane<R>(&self, id: &str, f: impl FnOnce(&mut AutomationLane) -> R) -> Option<R> {
        let mut lanes = self.lock();
        let result = lanes.get_mut(id).map(f);
        if result.is_some() {
            self.publish(&lanes);
        }
        result
    }

    pub fn lane_ids(&self) -> Vec<ParameterId> {
        let mut ids: Vec<_> = self.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Value of `id` at `position`, 0 for unregistered parameters
    pub fn parameter_value(&self, id: &str, position: SampleCount) -> f32 {
        self.lock().get(id).map_or(0.0, |lane| lane.value_at(position))
    }

    pub fn clear(&self) {
        self.edit(HashMap::clear);
    }

    /// Remove points inside `[start, end]` from every lane
    pub fn clear_range(&self, start: SampleCount, end: SampleCount) {
        self.edit(|lanes| {
            for lane in lanes.values_mut() {
                lane.remove_points_in_range(start, end);
            }
        });
    }

    /// Export all lanes as plain point lists
    pub fn data(&self) -> AutomationData {
        let lanes = self.lock();
        AutomationData {
            lanes: lanes
                .iter()
                .map(|(id, lane)| (id.clone(), lane.points().to_vec()))
                .collect(),
        }
    }

    /// Replace every lane with the contents of `data`
    pub fn set_data(&self, data: &AutomationData) {
        self.edit(|lanes| {
            lanes.clear();
            for (id, points) in &data.lanes {
                lanes.insert(
                    id.clone(),
                    AutomationLane::from_points(points.iter().copied()),
                );
            }
        });
        log::debug!("Automation data loaded: {} lanes", data.lanes.len());
    }

    fn edit<R>(&self, f: impl FnOnce(&mut HashMap<ParameterId, AutomationLane>) -> R) -> R {
        let mut lanes = self.lock();
        let result = f(&mut lanes);
        self.publish(&lanes);
        result
    }

    fn publish(&self, lanes: &HashMap<ParameterId, AutomationLane>) {
        let snapshot = AutomationSnapshot {
            lanes: lanes.clone(),
        };
        self.published.set(Shared::new(&gc_handle(), snapshot));
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ParameterId, AutomationLane>> {
        self.lanes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for AutomationManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn ramp_lane() -> AutomationLane {
        AutomationLane::from_points([AutomationPoint::new(0, 0.0), AutomationPoint::new(100, 1.0)])
    }

    #[test]
    fn test_unregistered_parameter_reads_zero() {
        let manager = AutomationManager::new();
        assert_eq!(manager.parameter_value("track/1/pan", 50), 0.0);
        assert_eq!(manager.reader().parameter_value("track/1/pan", 50), 0.0);
        assert!(!manager.has_lane("track/1/pan"));
    }

    #[test]
    fn test_reader_sees_published_edits() {
        let manager = AutomationManager::new();
        let reader = manager.reader();

        manager.add_lane("master/gain_db", ramp_lane());
        assert!((reader.parameter_value("master/gain_db", 50) - 0.5).abs() < 1e-6);

        manager.edit_lane("master/gain_db", |lane| lane.add_point(AutomationPoint::new(50, 0.9)));
        assert_eq!(reader.parameter_value("master/gain_db", 50), 0.9);
        assert_eq!(manager.parameter_value("master/gain_db", 50), 0.9);
    }

    #[test]
    fn test_pinned_snapshot_is_stable_across_edits() {
        let manager = AutomationManager::new();
        manager.add_lane("fx/mix", ramp_lane());
        let reader = manager.reader();

        let pinned = reader.snapshot();
        manager.remove_lane("fx/mix");

        assert!(pinned.lane("fx/mix").is_some());
        assert!(reader.snapshot().lane("fx/mix").is_none());
    }

    #[test]
    fn test_edit_missing_lane_returns_none() {
        let manager = AutomationManager::new();
        assert!(manager.edit_lane("nope", |lane| lane.clear()).is_none());
    }

    #[test]
    fn test_clear_range_applies_to_all_lanes() {
        let manager = AutomationManager::new();
        manager.add_lane("a", ramp_lane());
        manager.add_lane("b", ramp_lane());

        manager.clear_range(50, 150);
        assert_eq!(manager.lane("a").unwrap().len(), 1);
        assert_eq!(manager.lane("b").unwrap().len(), 1);
        assert_eq!(manager.lane_ids(), vec!["a".to_string(), "b".to_string()]);

        manager.clear();
        assert!(manager.lane_ids().is_empty());
        assert!(manager.reader().snapshot().is_empty());
    }

    #[test]
    fn test_data_roundtrip_replaces_lanes() {
        let source = AutomationManager::new();
        source.add_lane("track/0/pan", ramp_lane());
        let data = source.data();

        let target = AutomationManager::new();
        target.add_lane("stale", ramp_lane());
        target.set_data(&data);

        assert!(!target.has_lane("stale"));
        assert_eq!(target.lane("track/0/pan"), Some(ramp_lane()));
    }

    #[test]
    fn test_reader_never_blocks_on_editor() {
        let manager = Arc::new(AutomationManager::new());
        manager.add_lane("p", ramp_lane());
        let reader = manager.reader();

        let editor = {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                for i in 0..500 {
                    manager.edit_lane("p", |lane| {
                        lane.add_point(AutomationPoint::new(100, (i % 2) as f32))
                    });
                }
            })
        };

        for _ in 0..5000 {
            let value = reader.parameter_value("p", 100);
            assert!(value == 0.0 || value == 1.0);
        }
        editor.join().unwrap();
    }

    #[test]
    fn test_snapshot_from_data() {
        let mut data = AutomationData::default();
        data.lanes.insert(
            "master/pan".to_string(),
            vec![AutomationPoint::new(100, 1.0), AutomationPoint::new(0, -1.0)],
        );

        let snapshot = AutomationSnapshot::from_data(&data);
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.lane_value("master/pan", 50).unwrap().abs() < 1e-6);
        assert_eq!(snapshot.lane_value("master/gain_db", 50), None);
    }
}
