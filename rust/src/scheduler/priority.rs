//! Critical-path priority list for list scheduling.

use std::collections::BTreeSet;
use tracing::trace;

use crate::builder::{ActivityGraphBuilder, VertexGraphBuilder};
use crate::error::{GraphError, Result};
use crate::sequence::SequentialId;

/// Order activities by repeatedly taking the most critical one.
///
/// Each round recomputes the critical path on a working copy, picks the
/// remaining activity with the least total slack (ties: earliest start, then
/// id), and zeroes its duration before the next round. Activities that
/// already have zero duration need no resource and are left out.
pub fn priority_list<T, R>(builder: &VertexGraphBuilder<T, R>) -> Result<Vec<T>>
where
    T: SequentialId,
    R: Clone,
{
    let mut working = builder.clone();
    let mut remaining: BTreeSet<T> = working
        .activity_ids()
        .into_iter()
        .filter(|&id| working.activity(id).is_some_and(|activity| !activity.is_dummy()))
        .collect();
    let mut order = Vec::with_capacity(remaining.len());

    while !remaining.is_empty() {
        if !working.calculate_critical_path()? {
            return Err(GraphError::InvariantViolation(
                "critical path unavailable while building the priority list".to_string(),
            ));
        }

        let mut best: Option<(i32, i32, T)> = None;
        for &id in &remaining {
            let Some(activity) = working.activity(id) else {
                continue;
            };
            let key = (
                activity.total_slack().unwrap_or(i32::MAX),
                activity.earliest_start_time.unwrap_or(i32::MAX),
                id,
            );
            if best.map_or(true, |current| key < current) {
                best = Some(key);
            }
        }
        let Some((slack, start, id)) = best else {
            break;
        };

        trace!(activity = ?id, slack, start, "prioritised");
        order.push(id);
        remaining.remove(&id);
        if let Some(activity) = working.activity_mut(id) {
            activity.duration = 0;
        }
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Activity;
    use crate::sequence::sequential_generator;

    fn builder(activities: &[(i32, i32, &[i32])]) -> VertexGraphBuilder<i32, i32> {
        let mut builder = VertexGraphBuilder::new(sequential_generator(1000));
        for &(id, duration, dependencies) in activities {
            builder
                .add_activity(
                    Activity::new(id, duration),
                    &dependencies.iter().copied().collect(),
                )
                .unwrap();
        }
        builder
    }

    #[test]
    fn test_critical_chain_first() {
        // 1 (4) -> 3 (2) is critical; 2 (1) has slack
        let b = builder(&[(1, 4, &[]), (2, 1, &[]), (3, 2, &[1])]);
        assert_eq!(priority_list(&b).unwrap(), vec![1, 3, 2]);
    }

    #[test]
    fn test_ties_break_on_start_then_id() {
        let b = builder(&[(2, 3, &[]), (1, 3, &[]), (3, 3, &[1, 2])]);
        assert_eq!(priority_list(&b).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_zero_duration_left_out() {
        let b = builder(&[(1, 2, &[]), (2, 0, &[1]), (3, 1, &[2])]);
        assert_eq!(priority_list(&b).unwrap(), vec![1, 3]);
    }

    #[test]
    fn test_source_builder_untouched() {
        let b = builder(&[(1, 2, &[]), (2, 1, &[1])]);
        priority_list(&b).unwrap();
        assert_eq!(b.activity(1).unwrap().duration, 2);
        assert_eq!(b.activity(1).unwrap().earliest_start_time, None);
    }
}
