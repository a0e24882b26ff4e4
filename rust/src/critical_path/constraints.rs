//! Constraint validation before and after time propagation.

use crate::models::Activity;

/// True if the activity's own constraints cannot all hold, regardless of the
/// rest of the graph.
pub fn is_invalid_pre_compilation<T, R>(activity: &Activity<T, R>) -> bool {
    if activity.duration < 0 {
        return true;
    }
    // Minimum free slack and maximum latest finish are mutually exclusive
    if activity.minimum_free_slack.is_some() && activity.maximum_latest_finish_time.is_some() {
        return true;
    }
    if let Some(latest_finish) = activity.maximum_latest_finish_time {
        if latest_finish < activity.duration {
            return true;
        }
        if let Some(earliest_start) = activity.minimum_earliest_start_time {
            if earliest_start + activity.duration > latest_finish {
                return true;
            }
        }
    }
    false
}

/// True if propagation pushed the activity past its maximum latest finish.
pub fn is_invalid_post_compilation<T, R>(activity: &Activity<T, R>) -> bool {
    match (
        activity.earliest_finish_time(),
        activity.maximum_latest_finish_time,
    ) {
        (Some(earliest_finish), Some(latest_finish)) => earliest_finish > latest_finish,
        _ => false,
    }
}

/// Ids of activities with invalid pre-compilation constraints, in input order.
pub fn invalid_pre_compilation_constraints<'a, T, R>(
    activities: impl IntoIterator<Item = &'a Activity<T, R>>,
) -> Vec<T>
where
    T: Copy + 'a,
    R: 'a,
{
    activities
        .into_iter()
        .filter(|activity| is_invalid_pre_compilation(activity))
        .map(|activity| activity.id)
        .collect()
}

/// Ids of activities with invalid post-compilation constraints, in input order.
pub fn invalid_post_compilation_constraints<'a, T, R>(
    activities: impl IntoIterator<Item = &'a Activity<T, R>>,
) -> Vec<T>
where
    T: Copy + 'a,
    R: 'a,
{
    activities
        .into_iter()
        .filter(|activity| is_invalid_post_compilation(activity))
        .map(|activity| activity.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activity(duration: i32) -> Activity<i32, i32> {
        Activity::new(1, duration)
    }

    #[test]
    fn test_valid_activity() {
        let mut a = activity(3);
        a.minimum_earliest_start_time = Some(2);
        a.maximum_latest_finish_time = Some(5);
        assert!(!is_invalid_pre_compilation(&a));
    }

    #[test]
    fn test_negative_duration() {
        assert!(is_invalid_pre_compilation(&activity(-1)));
    }

    #[test]
    fn test_free_slack_excludes_latest_finish() {
        let mut a = activity(3);
        a.minimum_free_slack = Some(1);
        a.maximum_latest_finish_time = Some(10);
        assert!(is_invalid_pre_compilation(&a));
    }

    #[test]
    fn test_latest_finish_shorter_than_duration() {
        let mut a = activity(3);
        a.maximum_latest_finish_time = Some(2);
        assert!(is_invalid_pre_compilation(&a));
    }

    #[test]
    fn test_window_too_narrow() {
        let mut a = activity(3);
        a.minimum_earliest_start_time = Some(4);
        a.maximum_latest_finish_time = Some(6);
        assert!(is_invalid_pre_compilation(&a));
    }

    #[test]
    fn test_post_compilation() {
        let mut a = activity(3);
        a.maximum_latest_finish_time = Some(5);
        assert!(!is_invalid_post_compilation(&a));

        a.earliest_start_time = Some(2);
        assert!(!is_invalid_post_compilation(&a));

        a.earliest_start_time = Some(3);
        assert!(is_invalid_post_compilation(&a));

        assert_eq!(invalid_post_compilation_constraints([&a]), vec![1]);
    }
}
