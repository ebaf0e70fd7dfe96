//! Pipeline builder with definition-time validation.

use std::collections::{HashMap, HashSet};

use super::{FallbackStrategy, PipelineDefinition, RetryPolicy};
use crate::core::Task;
use crate::errors::{CycleDetectedError, DiagnosticInfo, PipelineValidationError};

/// Builder for validated pipeline definitions.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    definition: PipelineDefinition,
}

impl PipelineBuilder {
    /// Starts a pipeline with the given registry id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            definition: PipelineDefinition::new(id),
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.definition.name = name.into();
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.definition.description = description.into();
        self
    }

    /// Appends a task. Tasks run in the order they are added.
    #[must_use]
    pub fn step(mut self, task: Task) -> Self {
        self.definition.steps.push(task);
        self
    }

    /// Sets the fallback strategy.
    #[must_use]
    pub fn with_fallback(mut self, strategy: FallbackStrategy) -> Self {
        self.definition.fallback_strategy = strategy;
        self
    }

    /// Sets the per-task retry count.
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.definition.max_retries = retries;
        self
    }

    /// Sets the whole-run budget.
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.definition.timeout_ms = timeout_ms;
        self
    }

    /// Sets the retry delay schedule.
    #[must_use]
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.definition.retry = policy;
        self
    }

    /// Sets how many whole-pipeline re-runs the retry fallback may make.
    #[must_use]
    pub fn with_fallback_reruns(mut self, reruns: u32) -> Self {
        self.definition.fallback_reruns = reruns;
        self
    }

    /// Returns the number of steps so far.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.definition.steps.len()
    }

    /// Validates and returns the definition.
    ///
    /// # Errors
    ///
    /// Returns the first rule the steps break, checked in this order:
    /// empty, duplicate id, self-dependency, missing dependency, cycle,
    /// forward reference.
    pub fn build(self) -> Result<PipelineDefinition, PipelineValidationError> {
        validate_steps(&self.definition.steps)?;
        Ok(self.definition)
    }
}

/// Checks the definition-time rules over `steps`.
pub(crate) fn validate_steps(steps: &[Task]) -> Result<(), PipelineValidationError> {
    if steps.is_empty() {
        return Err(PipelineValidationError::new("Pipeline has no steps").with_info(
            DiagnosticInfo::new("PIPELINE-EMPTY", "Cannot run an empty pipeline"),
        ));
    }

    let mut seen = HashSet::new();
    for task in steps {
        if !seen.insert(task.id.as_str()) {
            return Err(PipelineValidationError::new(format!(
                "Task '{}' is declared more than once",
                task.id
            ))
            .with_tasks(vec![task.id.clone()])
            .with_info(DiagnosticInfo::new(
                "PIPELINE-DUPLICATE_TASK",
                format!("Duplicate task id '{}'", task.id),
            )));
        }
    }

    for task in steps {
        if task.dependencies.iter().any(|d| *d == task.id) {
            return Err(PipelineValidationError::new(format!(
                "Task '{}' cannot depend on itself",
                task.id
            ))
            .with_tasks(vec![task.id.clone()])
            .with_info(DiagnosticInfo::new(
                "PIPELINE-SELF_DEP",
                format!("Task '{}' lists itself as a dependency", task.id),
            )));
        }
        if let Some(dep) = task.dependencies.iter().find(|d| !seen.contains(d.as_str())) {
            return Err(PipelineValidationError::new(format!(
                "Task '{}' depends on unknown task '{}'",
                task.id, dep
            ))
            .with_tasks(vec![task.id.clone(), dep.clone()])
            .with_info(
                DiagnosticInfo::new("PIPELINE-MISSING_DEP", format!("Dependency '{dep}' not found"))
                    .with_context_entry("task", task.id.clone()),
            ));
        }
    }

    detect_cycles(steps)?;

    let mut declared = HashSet::new();
    for task in steps {
        if let Some(dep) = task.dependencies.iter().find(|d| !declared.contains(d.as_str())) {
            return Err(PipelineValidationError::new(format!(
                "Task '{}' depends on '{}', which is declared after it",
                task.id, dep
            ))
            .with_tasks(vec![task.id.clone(), dep.clone()])
            .with_info(DiagnosticInfo::new(
                "PIPELINE-FORWARD_REF",
                format!("Dependency '{dep}' is declared later"),
            )));
        }
        declared.insert(task.id.as_str());
    }

    Ok(())
}

fn detect_cycles(steps: &[Task]) -> Result<(), CycleDetectedError> {
    let graph: HashMap<&str, &[String]> = steps
        .iter()
        .map(|t| (t.id.as_str(), t.dependencies.as_slice()))
        .collect();
    let mut visited = HashSet::new();
    let mut on_stack = HashSet::new();
    let mut path = Vec::new();

    for task in steps {
        if !visited.contains(task.id.as_str()) {
            if let Some(cycle) = dfs_cycle(&graph, &task.id, &mut visited, &mut on_stack, &mut path)
            {
                return Err(CycleDetectedError::new(cycle));
            }
        }
    }
    Ok(())
}

fn dfs_cycle<'a>(
    graph: &HashMap<&'a str, &'a [String]>,
    node: &'a str,
    visited: &mut HashSet<&'a str>,
    on_stack: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
) -> Option<Vec<String>> {
    visited.insert(node);
    on_stack.insert(node);
    path.push(node);

    for dep in graph.get(node).copied().unwrap_or_default() {
        let dep = dep.as_str();
        if !visited.contains(dep) {
            if let Some(cycle) = dfs_cycle(graph, dep, visited, on_stack, path) {
                return Some(cycle);
            }
        } else if on_stack.contains(dep) {
            let start = path.iter().position(|n| *n == dep).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..].iter().map(|s| (*s).to_string()).collect();
            cycle.push(dep.to_string());
            return Some(cycle);
        }
    }

    path.pop();
    on_stack.remove(node);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TaskKind;

    fn task(id: &str, deps: &[&str]) -> Task {
        Task::new(id, TaskKind::Analysis).with_dependencies(deps.iter().copied())
    }

    fn code(result: Result<PipelineDefinition, PipelineValidationError>) -> String {
        result.unwrap_err().code().unwrap_or_default().to_string()
    }

    #[test]
    fn test_builds_valid_chain() {
        let def = PipelineBuilder::new("chain")
            .name("Chain")
            .step(task("a", &[]))
            .step(task("b", &["a"]))
            .step(task("c", &["a", "b"]))
            .with_max_retries(2)
            .build()
            .unwrap();
        assert_eq!(def.steps.len(), 3);
        assert_eq!(def.max_retries, 2);
        assert_eq!(def.name, "Chain");
    }

    #[test]
    fn test_rejects_empty() {
        assert_eq!(code(PipelineBuilder::new("x").build()), "PIPELINE-EMPTY");
    }

    #[test]
    fn test_rejects_duplicate() {
        let result = PipelineBuilder::new("x")
            .step(task("a", &[]))
            .step(task("a", &[]))
            .build();
        assert_eq!(code(result), "PIPELINE-DUPLICATE_TASK");
    }

    #[test]
    fn test_rejects_self_dependency() {
        let result = PipelineBuilder::new("x").step(task("a", &["a"])).build();
        assert_eq!(code(result), "PIPELINE-SELF_DEP");
    }

    #[test]
    fn test_rejects_missing_dependency() {
        let result = PipelineBuilder::new("x")
            .step(task("a", &[]))
            .step(task("b", &["ghost"]))
            .build();
        let err = result.unwrap_err();
        assert_eq!(err.code(), Some("PIPELINE-MISSING_DEP"));
        assert_eq!(err.tasks, vec!["b".to_string(), "ghost".to_string()]);
        assert!(err.info.unwrap().fix_hint.is_some());
    }

    #[test]
    fn test_rejects_cycle() {
        let result = PipelineBuilder::new("x")
            .step(task("a", &["c"]))
            .step(task("b", &["a"]))
            .step(task("c", &["b"]))
            .build();
        let err = result.unwrap_err();
        assert_eq!(err.code(), Some("PIPELINE-CYCLE"));
        assert_eq!(err.tasks.first(), err.tasks.last());
        assert_eq!(err.tasks.len(), 4);
    }

    #[test]
    fn test_rejects_forward_reference() {
        let result = PipelineBuilder::new("x")
            .step(task("b", &["a"]))
            .step(task("a", &[]))
            .build();
        assert_eq!(code(result), "PIPELINE-FORWARD_REF");
    }
}
