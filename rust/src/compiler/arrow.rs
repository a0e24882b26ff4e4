//! Compiler over activity-on-arrow graphs.

use tracing::info;

use crate::builder::{ActivityGraphBuilder, ArrowGraph, ArrowGraphBuilder};
use crate::config::CompilerConfig;
use crate::error::Result;
use crate::models::{Activity, GraphCompilation, GraphCompilationErrors};
use crate::sequence::{IdGenerator, SequentialId};

use super::{failed, validate, GraphCompiler};

pub type ArrowGraphCompiler<T, R> = GraphCompiler<T, R, ArrowGraphBuilder<T, R>>;

impl<T: SequentialId, R: Clone> GraphCompiler<T, R, ArrowGraphBuilder<T, R>> {
    pub fn new(edge_id_generator: IdGenerator<T>, node_id_generator: IdGenerator<T>) -> Result<Self> {
        Self::with_config(edge_id_generator, node_id_generator, CompilerConfig::default())
    }

    pub fn with_config(
        edge_id_generator: IdGenerator<T>,
        node_id_generator: IdGenerator<T>,
        config: CompilerConfig,
    ) -> Result<Self> {
        Ok(Self::with_builder(
            ArrowGraphBuilder::new(edge_id_generator, node_id_generator)?,
            config,
        ))
    }

    pub fn from_graph(
        graph: ArrowGraph<T, R>,
        edge_id_generator: IdGenerator<T>,
        node_id_generator: IdGenerator<T>,
        config: CompilerConfig,
    ) -> Result<Self> {
        Ok(Self::with_builder(
            ArrowGraphBuilder::from_graph(graph, edge_id_generator, node_id_generator)?,
            config,
        ))
    }

    /// Validate, simplify the dummy structure, then propagate times.
    ///
    /// Dummy activities never appear in the output; each real activity
    /// reports the real activities it depends on through any chain of
    /// dummies. Arrow graphs are not resource scheduled.
    pub fn compile(&self) -> Result<GraphCompilation<T, R>> {
        let mut state = self.lock();
        state.clear_resource_dependencies::<R>()?;
        let builder = &mut state.builder;

        if let Some(errors) = validate::<T, R, _>(&*builder) {
            return Ok(failed(errors, builder.cyclomatic_complexity()));
        }
        if self.config.transitive_reduction {
            builder.transitive_reduction()?;
        }
        if self.config.reduce_dummy_activities {
            builder.clean_up_edges()?;
            if self.config.transitive_reduction {
                builder.transitive_reduction()?;
            }
        }
        if !builder.calculate_critical_path()? {
            let errors = GraphCompilationErrors {
                missing_dependencies: builder.missing_dependencies(),
                invalid_pre_compilation_constraints: builder.find_invalid_pre_compilation_constraints(),
                invalid_post_compilation_constraints: builder
                    .find_invalid_post_compilation_constraints(),
                ..GraphCompilationErrors::default()
            };
            return Ok(failed(errors, builder.cyclomatic_complexity()));
        }

        let dependent_activities: Vec<Activity<T, R>> = builder
            .real_activities()
            .into_iter()
            .map(|activity| {
                let mut activity = activity.clone();
                activity.dependencies = builder
                    .activity_dependency_ids(activity.id)
                    .unwrap_or_default();
                activity.resource_dependencies.clear();
                activity
            })
            .collect();

        let compilation = GraphCompilation {
            dependent_activities,
            resource_schedules: Vec::new(),
            cyclomatic_complexity: builder.cyclomatic_complexity(),
            errors: None,
        };
        info!(
            activities = compilation.dependent_activities.len(),
            edges = builder.edge_count(),
            nodes = builder.node_count(),
            finish_time = compilation.finish_time(),
            "compiled arrow graph"
        );
        Ok(compilation)
    }
}
