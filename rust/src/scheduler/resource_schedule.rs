//! Resource timeline with sorted, non-overlapping busy periods.

use crate::models::{Activity, Resource, ResourceSchedule, ScheduledActivity};

/// Timeline of one resource while the simulation runs.
///
/// Busy periods are half-open `[start, finish)` tick ranges, kept sorted by
/// start and merged when they touch, so lookups are binary searches.
#[derive(Clone, Debug)]
pub struct ResourceScheduleBuilder<T, R> {
    resource: Resource<R>,
    /// Invariant: sorted by start, non-overlapping, non-adjacent
    busy_periods: Vec<(i32, i32)>,
    scheduled_activities: Vec<ScheduledActivity<T>>,
}

impl<T: Copy, R> ResourceScheduleBuilder<T, R> {
    pub fn new(resource: Resource<R>) -> Self {
        Self {
            resource,
            busy_periods: Vec::new(),
            scheduled_activities: Vec::new(),
        }
    }

    pub fn resource(&self) -> &Resource<R> {
        &self.resource
    }

    pub fn busy_periods(&self) -> &[(i32, i32)] {
        &self.busy_periods
    }

    pub fn scheduled_activities(&self) -> &[ScheduledActivity<T>] {
        &self.scheduled_activities
    }

    /// Add a busy period, merging with any period it overlaps or touches.
    pub fn add_busy_period(&mut self, start: i32, finish: i32) {
        if finish <= start {
            return;
        }
        let idx = self.busy_periods.partition_point(|(s, _)| *s < start);

        let mut new_start = start;
        let mut new_finish = finish;
        let mut merge_start = idx;
        let mut merge_end = idx;

        if idx > 0 {
            let (prev_start, prev_finish) = self.busy_periods[idx - 1];
            if prev_finish >= start {
                new_start = prev_start;
                new_finish = new_finish.max(prev_finish);
                merge_start = idx - 1;
            }
        }

        while merge_end < self.busy_periods.len() {
            let (next_start, next_finish) = self.busy_periods[merge_end];
            if next_start <= new_finish {
                new_finish = new_finish.max(next_finish);
                merge_end += 1;
            } else {
                break;
            }
        }

        if merge_start < merge_end {
            self.busy_periods.drain(merge_start..merge_end);
        }
        self.busy_periods.insert(merge_start, (new_start, new_finish));
    }

    /// First busy period that contains `current` or starts after it.
    fn find_next_busy_period(&self, current: i32) -> Option<(i32, i32)> {
        let idx = self.busy_periods.partition_point(|(_, finish)| *finish <= current);
        self.busy_periods.get(idx).copied()
    }

    /// Earliest tick at or after `from` when the resource is idle.
    pub fn next_available_time(&self, from: i32) -> i32 {
        match self.find_next_busy_period(from) {
            Some((start, finish)) if start <= from => finish,
            _ => from,
        }
    }

    /// Whether the resource is idle for the whole of `[start, start + duration)`.
    pub fn is_available(&self, start: i32, duration: i32) -> bool {
        match self.find_next_busy_period(start) {
            None => true,
            Some((busy_start, _)) => busy_start >= start + duration.max(1),
        }
    }

    /// End of the first busy period still running after `time`.
    pub fn next_release_after(&self, time: i32) -> Option<i32> {
        self.find_next_busy_period(time)
            .map(|(_, finish)| finish)
            .filter(|&finish| finish > time)
    }

    /// Book the activity from `start`. Returns its finish time.
    pub fn schedule(&mut self, activity: &Activity<T, R>, start: i32) -> i32 {
        let finish = start + activity.duration;
        self.add_busy_period(start, finish);
        self.scheduled_activities.push(ScheduledActivity {
            id: activity.id,
            name: activity.name.clone(),
            duration: activity.duration,
            start_time: start,
            finish_time: finish,
        });
        finish
    }

    pub fn is_empty(&self) -> bool {
        self.scheduled_activities.is_empty()
    }

    pub fn build(self) -> ResourceSchedule<T, R> {
        let finish_time = self
            .scheduled_activities
            .iter()
            .map(|scheduled| scheduled.finish_time)
            .max()
            .unwrap_or(0);
        ResourceSchedule {
            resource: self.resource,
            scheduled_activities: self.scheduled_activities,
            finish_time,
        }
    }
}
