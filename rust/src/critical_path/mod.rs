//! Critical path propagation using forward and backward passes.
//!
//! Both representations produce the same timings for the same activities:
//!
//! - `es = max(0, release(pred)...)`, raised to the minimum earliest start
//! - `ef = es + duration`, `release = ef + minimum_free_slack`
//! - `lf = min(F, ls(succ)...) - minimum_free_slack`, clamped down to the
//!   maximum latest finish, where `F` is the latest release in the graph
//! - `free_slack = min(F, es(succ)...) - ef`
//!
//! The passes are Kahn worklists; a pass that cannot process every item
//! means the graph still holds a cycle.

pub mod arrow;
mod constraints;
pub mod vertex;

pub use constraints::{
    invalid_post_compilation_constraints, invalid_pre_compilation_constraints,
    is_invalid_post_compilation, is_invalid_pre_compilation,
};

use crate::models::Activity;

/// Time at which successors of this activity may start.
pub(crate) fn release_time<T, R>(activity: &Activity<T, R>) -> Option<i32> {
    activity
        .earliest_finish_time()
        .map(|finish| finish + activity.minimum_free_slack.unwrap_or(0))
}

/// Latest release across all activities (0 when there are none).
pub(crate) fn project_finish<'a, T: 'a, R: 'a>(
    activities: impl IntoIterator<Item = &'a Activity<T, R>>,
) -> i32 {
    activities
        .into_iter()
        .filter_map(release_time)
        .max()
        .unwrap_or(0)
        .max(0)
}

/// Latest finish from the successors' limit, after slack and deadline.
pub(crate) fn latest_finish_time<T, R>(activity: &Activity<T, R>, successor_limit: i32) -> i32 {
    let latest_finish = successor_limit - activity.minimum_free_slack.unwrap_or(0);
    match activity.maximum_latest_finish_time {
        Some(deadline) => latest_finish.min(deadline),
        None => latest_finish,
    }
}

/// Earliest start from the predecessors' release, after the start floor.
pub(crate) fn earliest_start_time<T, R>(activity: &Activity<T, R>, predecessor_release: i32) -> i32 {
    match activity.minimum_earliest_start_time {
        Some(floor) => predecessor_release.max(floor),
        None => predecessor_release,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_includes_free_slack() {
        let mut activity: Activity<i32, i32> = Activity::new(1, 4);
        assert_eq!(release_time(&activity), None);

        activity.earliest_start_time = Some(1);
        assert_eq!(release_time(&activity), Some(5));

        activity.minimum_free_slack = Some(2);
        assert_eq!(release_time(&activity), Some(7));
        assert_eq!(project_finish([&activity]), 7);
    }

    #[test]
    fn test_latest_finish_clamps_to_deadline() {
        let mut activity: Activity<i32, i32> = Activity::new(1, 4);
        assert_eq!(latest_finish_time(&activity, 10), 10);

        activity.maximum_latest_finish_time = Some(8);
        assert_eq!(latest_finish_time(&activity, 10), 8);

        activity.maximum_latest_finish_time = None;
        activity.minimum_free_slack = Some(3);
        assert_eq!(latest_finish_time(&activity, 10), 7);
    }

    #[test]
    fn test_earliest_start_floor() {
        let mut activity: Activity<i32, i32> = Activity::new(1, 4);
        assert_eq!(earliest_start_time(&activity, 2), 2);
        activity.minimum_earliest_start_time = Some(5);
        assert_eq!(earliest_start_time(&activity, 2), 5);
        assert_eq!(earliest_start_time(&activity, 9), 9);
    }

    #[test]
    fn test_empty_project_finishes_at_zero() {
        assert_eq!(project_finish(Vec::<&Activity<i32, i32>>::new()), 0);
    }
}
