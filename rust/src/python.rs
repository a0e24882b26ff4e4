//! Python bindings over the vertex graph compiler, with `int` ids.

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use std::collections::BTreeSet;

use crate::compiler::VertexGraphCompiler;
use crate::config::CompilerConfig;
use crate::error::GraphError;
use crate::models::{Activity, GraphCompilation, LogicalOperator, Resource};
use crate::sequence::sequential_generator;

impl From<GraphError> for PyErr {
    fn from(err: GraphError) -> PyErr {
        PyRuntimeError::new_err(err.to_string())
    }
}

/// `None` falls back to `LogicalOperator::default()`.
fn parse_operator(operator: Option<&str>) -> PyResult<LogicalOperator> {
    operator
        .map(str::parse::<LogicalOperator>)
        .transpose()
        .map(Option::unwrap_or_default)
        .map_err(|err: GraphError| PyValueError::new_err(err.to_string()))
}

/// A resource activities can be scheduled on.
#[pyclass(name = "Resource")]
#[derive(Clone, Debug)]
pub struct PyResource {
    #[pyo3(get, set)]
    pub id: i64,
    #[pyo3(get, set)]
    pub name: String,
    #[pyo3(get, set)]
    pub is_explicit_target: bool,
    #[pyo3(get, set)]
    pub is_inactive: bool,
    #[pyo3(get, set)]
    pub allocation_order: i32,
}

#[pymethods]
impl PyResource {
    #[new]
    #[pyo3(signature = (id, name=String::new(), is_explicit_target=false, is_inactive=false, allocation_order=0))]
    fn new(
        id: i64,
        name: String,
        is_explicit_target: bool,
        is_inactive: bool,
        allocation_order: i32,
    ) -> Self {
        Self {
            id,
            name,
            is_explicit_target,
            is_inactive,
            allocation_order,
        }
    }

    fn __repr__(&self) -> String {
        format!("Resource(id={}, name={:?})", self.id, self.name)
    }
}

impl From<PyResource> for Resource<i64> {
    fn from(resource: PyResource) -> Self {
        Resource {
            id: resource.id,
            name: resource.name,
            is_explicit_target: resource.is_explicit_target,
            is_inactive: resource.is_inactive,
            allocation_order: resource.allocation_order,
        }
    }
}

#[pyclass(name = "CompiledActivity", get_all)]
#[derive(Clone, Debug)]
pub struct PyCompiledActivity {
    pub id: i64,
    pub name: String,
    pub duration: i32,
    pub dependencies: Vec<i64>,
    pub resource_dependencies: Vec<i64>,
    pub allocated_to_resources: Vec<i64>,
    pub earliest_start_time: Option<i32>,
    pub earliest_finish_time: Option<i32>,
    pub latest_start_time: Option<i32>,
    pub latest_finish_time: Option<i32>,
    pub free_slack: Option<i32>,
    pub total_slack: Option<i32>,
    pub is_critical: bool,
}

impl From<&Activity<i64, i64>> for PyCompiledActivity {
    fn from(activity: &Activity<i64, i64>) -> Self {
        Self {
            id: activity.id,
            name: activity.name.clone(),
            duration: activity.duration,
            dependencies: activity.dependencies.iter().copied().collect(),
            resource_dependencies: activity.resource_dependencies.iter().copied().collect(),
            allocated_to_resources: activity.allocated_to_resources.iter().copied().collect(),
            earliest_start_time: activity.earliest_start_time,
            earliest_finish_time: activity.earliest_finish_time(),
            latest_start_time: activity.latest_start_time(),
            latest_finish_time: activity.latest_finish_time,
            free_slack: activity.free_slack,
            total_slack: activity.total_slack(),
            is_critical: activity.is_critical(),
        }
    }
}

#[pymethods]
impl PyCompiledActivity {
    fn __repr__(&self) -> String {
        format!(
            "CompiledActivity(id={}, es={:?}, lf={:?})",
            self.id, self.earliest_start_time, self.latest_finish_time
        )
    }
}

#[pyclass(name = "ScheduledActivity", get_all)]
#[derive(Clone, Debug)]
pub struct PyScheduledActivity {
    pub id: i64,
    pub name: String,
    pub start_time: i32,
    pub finish_time: i32,
}

#[pyclass(name = "ResourceSchedule", get_all)]
#[derive(Clone, Debug)]
pub struct PyResourceSchedule {
    pub resource_id: i64,
    pub resource_name: String,
    pub scheduled_activities: Vec<PyScheduledActivity>,
    pub finish_time: i32,
}

/// Compilation result. Error lists are empty on success.
#[pyclass(name = "GraphCompilation", get_all)]
#[derive(Clone, Debug)]
pub struct PyGraphCompilation {
    pub activities: Vec<PyCompiledActivity>,
    pub resource_schedules: Vec<PyResourceSchedule>,
    pub cyclomatic_complexity: i32,
    pub finish_time: i32,
    pub circular_dependencies: Vec<Vec<i64>>,
    pub missing_dependencies: Vec<i64>,
    pub invalid_pre_compilation_constraints: Vec<i64>,
    pub invalid_post_compilation_constraints: Vec<i64>,
    pub invalid_target_resources: Vec<i64>,
}

#[pymethods]
impl PyGraphCompilation {
    fn has_errors(&self) -> bool {
        !(self.circular_dependencies.is_empty()
            && self.missing_dependencies.is_empty()
            && self.invalid_pre_compilation_constraints.is_empty()
            && self.invalid_post_compilation_constraints.is_empty()
            && self.invalid_target_resources.is_empty())
    }
}

impl From<GraphCompilation<i64, i64>> for PyGraphCompilation {
    fn from(compilation: GraphCompilation<i64, i64>) -> Self {
        let finish_time = compilation.finish_time();
        let errors = compilation.errors.unwrap_or_default();
        Self {
            activities: compilation
                .dependent_activities
                .iter()
                .map(PyCompiledActivity::from)
                .collect(),
            resource_schedules: compilation
                .resource_schedules
                .into_iter()
                .map(|schedule| PyResourceSchedule {
                    resource_id: schedule.resource.id,
                    resource_name: schedule.resource.name,
                    scheduled_activities: schedule
                        .scheduled_activities
                        .into_iter()
                        .map(|scheduled| PyScheduledActivity {
                            id: scheduled.id,
                            name: scheduled.name,
                            start_time: scheduled.start_time,
                            finish_time: scheduled.finish_time,
                        })
                        .collect(),
                    finish_time: schedule.finish_time,
                })
                .collect(),
            cyclomatic_complexity: compilation.cyclomatic_complexity,
            finish_time,
            circular_dependencies: errors
                .circular_dependencies
                .into_iter()
                .map(|cycle| cycle.dependencies.into_iter().collect())
                .collect(),
            missing_dependencies: errors.missing_dependencies.into_iter().collect(),
            invalid_pre_compilation_constraints: errors.invalid_pre_compilation_constraints,
            invalid_post_compilation_constraints: errors.invalid_post_compilation_constraints,
            invalid_target_resources: errors.invalid_target_resources,
        }
    }
}

/// Thread-safe activity-on-node compiler.
#[pyclass(name = "VertexGraphCompiler")]
pub struct PyVertexGraphCompiler {
    inner: VertexGraphCompiler<i64, i64>,
}

#[pymethods]
impl PyVertexGraphCompiler {
    #[new]
    #[pyo3(signature = (transitive_reduction=true, inject_resource_dependencies=true))]
    fn new(transitive_reduction: bool, inject_resource_dependencies: bool) -> Self {
        let config = CompilerConfig {
            transitive_reduction,
            inject_resource_dependencies,
            ..CompilerConfig::default()
        };
        Self {
            inner: VertexGraphCompiler::with_config(sequential_generator(0), config),
        }
    }

    #[pyo3(signature = (
        id,
        duration,
        dependencies=Vec::new(),
        name=None,
        can_be_removed=false,
        target_resources=Vec::new(),
        target_resource_operator=None,
        minimum_free_slack=None,
        minimum_earliest_start_time=None,
        maximum_latest_finish_time=None,
    ))]
    #[allow(clippy::too_many_arguments)]
    fn add_activity(
        &self,
        id: i64,
        duration: i32,
        dependencies: Vec<i64>,
        name: Option<String>,
        can_be_removed: bool,
        target_resources: Vec<i64>,
        target_resource_operator: Option<&str>,
        minimum_free_slack: Option<i32>,
        minimum_earliest_start_time: Option<i32>,
        maximum_latest_finish_time: Option<i32>,
    ) -> PyResult<bool> {
        let mut activity = Activity::new(id, duration);
        if let Some(name) = name {
            activity.name = name;
        }
        activity.can_be_removed = can_be_removed;
        activity.target_resources = target_resources.into_iter().collect();
        activity.target_resource_operator = parse_operator(target_resource_operator)?;
        activity.minimum_free_slack = minimum_free_slack;
        activity.minimum_earliest_start_time = minimum_earliest_start_time;
        activity.maximum_latest_finish_time = maximum_latest_finish_time;

        let dependencies: BTreeSet<i64> = dependencies.into_iter().collect();
        Ok(self.inner.add_activity(activity, &dependencies)?)
    }

    fn remove_activity(&self, id: i64) -> PyResult<bool> {
        Ok(self.inner.remove_activity(id)?)
    }

    fn set_activity_dependencies(&self, id: i64, dependencies: Vec<i64>) -> PyResult<bool> {
        let dependencies: BTreeSet<i64> = dependencies.into_iter().collect();
        Ok(self.inner.set_activity_dependencies(id, &dependencies)?)
    }

    fn transitive_reduction(&self) -> PyResult<bool> {
        Ok(self.inner.transitive_reduction()?)
    }

    fn cyclomatic_complexity(&self) -> i32 {
        self.inner.cyclomatic_complexity()
    }

    /// Compile the graph, scheduling onto `resources` (unlimited if empty).
    #[pyo3(signature = (resources=Vec::new()))]
    fn compile(&self, py: Python<'_>, resources: Vec<PyResource>) -> PyResult<PyGraphCompilation> {
        let resources: Vec<Resource<i64>> = resources.into_iter().map(Resource::from).collect();
        let compilation = py.allow_threads(|| self.inner.compile_with_resources(&resources))?;
        Ok(compilation.into())
    }
}

/// The pert_graph Python module.
#[pymodule]
fn pert_graph(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyResource>()?;
    m.add_class::<PyCompiledActivity>()?;
    m.add_class::<PyScheduledActivity>()?;
    m.add_class::<PyResourceSchedule>()?;
    m.add_class::<PyGraphCompilation>()?;
    m.add_class::<PyVertexGraphCompiler>()?;
    Ok(())
}
