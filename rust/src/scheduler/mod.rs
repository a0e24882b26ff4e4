//! Resource scheduling for compiled vertex graphs.
//!
//! Scheduling runs in two stages: a critical-path priority list, then a
//! list-scheduling simulation that books activities onto resource lanes in
//! that priority order.

mod core;
mod priority;
mod resource_schedule;

pub use core::{invalid_target_resources, ResourceScheduler};
pub use priority::priority_list;
pub use resource_schedule::ResourceScheduleBuilder;
