//! Task registry and dependency-ordered execution queue.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use crate::domain::errors::{DiagError, DiagResult};
use crate::domain::models::Identifier;
use crate::domain::ports::Task;

/// Case-insensitive lookup key for a declared dependency string.
fn dependency_key(dependency: &str) -> DiagResult<String> {
    Identifier::parse(dependency).map(|id| id.key())
}

/// Tasks in an order where every task follows all of its dependencies.
///
/// The ordering is checked on construction, so the orchestrator can rely on
/// every upstream result being available.
#[derive(Clone, Default)]
pub struct TaskQueue {
    tasks: Vec<Arc<dyn Task>>,
}

impl TaskQueue {
    /// Validate and wrap an already ordered list of tasks.
    ///
    /// Identifiers and dependencies compare ignoring case, the same way the
    /// registry and the orchestrator look them up.
    pub fn new(tasks: Vec<Arc<dyn Task>>) -> DiagResult<Self> {
        let mut seen: HashSet<String> = HashSet::new();

        for task in &tasks {
            let identifier = task.identifier();
            for dependency in task.dependencies() {
                if !seen.contains(&dependency_key(&dependency)?) {
                    return Err(DiagError::DependencyOrder {
                        task: identifier.to_string(),
                        dependency,
                    });
                }
            }
            if !seen.insert(identifier.key()) {
                return Err(DiagError::DuplicateTask(identifier.to_string()));
            }
        }

        Ok(Self { tasks })
    }

    pub fn tasks(&self) -> &[Arc<dyn Task>] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn identifiers(&self) -> Vec<Identifier> {
        self.tasks.iter().map(|t| t.identifier()).collect()
    }
}

impl IntoIterator for TaskQueue {
    type Item = Arc<dyn Task>;
    type IntoIter = std::vec::IntoIter<Arc<dyn Task>>;

    fn into_iter(self) -> Self::IntoIter {
        self.tasks.into_iter()
    }
}

/// Every task known to the binary, in registration order.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: Vec<Arc<dyn Task>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task. Identifiers must be unique, ignoring case.
    pub fn register(&mut self, task: Arc<dyn Task>) -> DiagResult<()> {
        let id = task.identifier();
        if self.get(&id).is_some() {
            return Err(DiagError::DuplicateTask(id.to_string()));
        }
        self.tasks.push(task);
        Ok(())
    }

    pub fn tasks(&self) -> &[Arc<dyn Task>] {
        &self.tasks
    }

    pub fn get(&self, identifier: &Identifier) -> Option<Arc<dyn Task>> {
        self.position(identifier).map(|i| Arc::clone(&self.tasks[i]))
    }

    fn position(&self, identifier: &Identifier) -> Option<usize> {
        self.tasks
            .iter()
            .position(|t| t.identifier().matches(identifier))
    }

    /// Build the queue for the given patterns.
    ///
    /// A pattern is either an exact identifier (case-insensitive) or a prefix
    /// ending in `*`, such as `Base/*`. No patterns selects every task.
    /// Transitive dependencies are added, and the result is ordered so that
    /// dependencies run first; ties keep registration order.
    pub fn resolve(&self, patterns: &[String]) -> DiagResult<TaskQueue> {
        let selected = self.select(patterns)?;
        let included = self.with_dependencies(selected)?;
        let ordered = self.order(&included)?;

        TaskQueue::new(ordered.into_iter().map(|i| Arc::clone(&self.tasks[i])).collect())
    }

    fn select(&self, patterns: &[String]) -> DiagResult<Vec<usize>> {
        if patterns.is_empty() {
            return Ok((0..self.tasks.len()).collect());
        }

        let mut selected = Vec::new();
        for pattern in patterns.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
            let matches: Vec<usize> = if let Some(prefix) = pattern.strip_suffix('*') {
                let prefix = prefix.to_lowercase();
                self.tasks
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.identifier().to_string().to_lowercase().starts_with(&prefix))
                    .map(|(i, _)| i)
                    .collect()
            } else {
                let id = Identifier::parse(pattern)?;
                self.position(&id).into_iter().collect()
            };

            if matches.is_empty() {
                return Err(DiagError::UnknownTask(pattern.to_string()));
            }
            selected.extend(matches);
        }
        Ok(selected)
    }

    fn dependency_indices(&self, index: usize) -> DiagResult<Vec<usize>> {
        self.tasks[index]
            .dependencies()
            .iter()
            .map(|dep| {
                let id = Identifier::parse(dep)?;
                self.position(&id)
                    .ok_or_else(|| DiagError::UnknownTask(dep.clone()))
            })
            .collect()
    }

    fn with_dependencies(&self, selected: Vec<usize>) -> DiagResult<BTreeSet<usize>> {
        let mut included = BTreeSet::new();
        let mut stack = selected;
        while let Some(index) = stack.pop() {
            if included.insert(index) {
                stack.extend(self.dependency_indices(index)?);
            }
        }
        Ok(included)
    }

    /// Kahn's algorithm over the included tasks.
    fn order(&self, included: &BTreeSet<usize>) -> DiagResult<Vec<usize>> {
        let mut in_degree: HashMap<usize, usize> = HashMap::new();
        let mut dependents: HashMap<usize, Vec<usize>> = HashMap::new();
        let mut dependencies: HashMap<usize, Vec<usize>> = HashMap::new();

        for &index in included {
            let deps = self.dependency_indices(index)?;
            in_degree.insert(index, deps.len());
            for &dep in &deps {
                dependents.entry(dep).or_default().push(index);
            }
            dependencies.insert(index, deps);
        }

        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .filter(|&(_, &degree)| degree == 0)
            .map(|(&i, _)| i)
            .collect();
        let mut sorted = Vec::with_capacity(included.len());

        while let Some(index) = ready.pop_first() {
            sorted.push(index);
            if let Some(children) = dependents.get(&index) {
                for child in children {
                    if let Some(degree) = in_degree.get_mut(child) {
                        *degree -= 1;
                        if *degree == 0 {
                            ready.insert(*child);
                        }
                    }
                }
            }
        }

        if sorted.len() != included.len() {
            let done: HashSet<usize> = sorted.into_iter().collect();
            return Err(DiagError::DependencyCycle(self.find_cycle(
                included,
                &done,
                &dependencies,
            )));
        }

        Ok(sorted)
    }

    /// Every unsorted task still waits on another unsorted task, so walking
    /// dependencies from any of them must revisit a node.
    fn find_cycle(
        &self,
        included: &BTreeSet<usize>,
        done: &HashSet<usize>,
        dependencies: &HashMap<usize, Vec<usize>>,
    ) -> Vec<String> {
        let Some(mut current) = included.iter().copied().find(|i| !done.contains(i)) else {
            return Vec::new();
        };

        let mut path: Vec<usize> = Vec::new();
        loop {
            if let Some(start) = path.iter().position(|&i| i == current) {
                path.drain(..start);
                path.push(current);
                break;
            }
            path.push(current);
            let next = dependencies
                .get(&current)
                .and_then(|deps| deps.iter().copied().find(|d| !done.contains(d)));
            match next {
                Some(next) => current = next,
                None => break,
            }
        }

        path.into_iter()
            .map(|i| self.tasks[i].identifier().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{TaskOptions, TaskResult};
    use crate::domain::ports::UpstreamResults;
    use async_trait::async_trait;

    struct StubTask {
        id: &'static str,
        deps: Vec<&'static str>,
    }

    #[async_trait]
    impl Task for StubTask {
        fn identifier(&self) -> Identifier {
            Identifier::parse(self.id).unwrap()
        }

        fn explain(&self) -> String {
            "stub".to_string()
        }

        fn dependencies(&self) -> Vec<String> {
            self.deps.iter().map(|d| d.to_string()).collect()
        }

        async fn execute(&self, _: &TaskOptions, _: &UpstreamResults) -> TaskResult {
            TaskResult::default()
        }
    }

    fn stub(id: &'static str, deps: Vec<&'static str>) -> Arc<dyn Task> {
        Arc::new(StubTask { id, deps })
    }

    fn ids(queue: &TaskQueue) -> Vec<String> {
        queue.identifiers().iter().map(|i| i.to_string()).collect()
    }

    #[test]
    fn test_queue_accepts_ordered_tasks() {
        let queue = TaskQueue::new(vec![
            stub("Base/Config/Collect", vec![]),
            stub("Base/Config/Validate", vec!["Base/Config/Collect"]),
        ])
        .unwrap();
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_queue_rejects_dependency_after_dependent() {
        let err = TaskQueue::new(vec![
            stub("Base/Config/Validate", vec!["Base/Config/Collect"]),
            stub("Base/Config/Collect", vec![]),
        ])
        .err()
        .unwrap();
        assert!(matches!(err, DiagError::DependencyOrder { ref task, .. } if task == "Base/Config/Validate"));
    }

    #[test]
    fn test_dependency_case_does_not_matter() {
        let mut registry = TaskRegistry::new();
        registry.register(stub("Base/Config/Collect", vec![])).unwrap();
        registry
            .register(stub("Base/Config/Validate", vec!["base/config/collect"]))
            .unwrap();

        let queue = registry.resolve(&[]).unwrap();
        assert_eq!(ids(&queue), vec!["Base/Config/Collect", "Base/Config/Validate"]);

        let queue = registry.resolve(&["BASE/CONFIG/VALIDATE".to_string()]).unwrap();
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_queue_rejects_duplicates() {
        let err = TaskQueue::new(vec![
            stub("Base/Config/Collect", vec![]),
            stub("Base/Config/Collect", vec![]),
        ])
        .err()
        .unwrap();
        assert!(matches!(err, DiagError::DuplicateTask(_)));
    }

    #[test]
    fn test_registry_rejects_duplicates_ignoring_case() {
        let mut registry = TaskRegistry::new();
        registry.register(stub("Base/Config/Collect", vec![])).unwrap();
        assert!(registry.register(stub("base/config/collect", vec![])).is_err());
    }

    #[test]
    fn test_resolve_orders_dependencies_first() {
        let mut registry = TaskRegistry::new();
        registry
            .register(stub("Base/Config/Validate", vec!["Base/Config/Collect"]))
            .unwrap();
        registry.register(stub("Base/Env/CollectEnvVars", vec![])).unwrap();
        registry.register(stub("Base/Config/Collect", vec![])).unwrap();

        let queue = registry.resolve(&[]).unwrap();
        assert_eq!(
            ids(&queue),
            vec![
                "Base/Env/CollectEnvVars",
                "Base/Config/Collect",
                "Base/Config/Validate"
            ]
        );
    }

    #[test]
    fn test_resolve_pulls_in_transitive_dependencies() {
        let mut registry = TaskRegistry::new();
        registry.register(stub("Base/Config/Collect", vec![])).unwrap();
        registry
            .register(stub("Base/Config/Validate", vec!["Base/Config/Collect"]))
            .unwrap();
        registry
            .register(stub("Java/Config/Agent", vec!["Base/Config/Validate"]))
            .unwrap();
        registry.register(stub("Base/Env/CollectEnvVars", vec![])).unwrap();

        let queue = registry.resolve(&["java/config/agent".to_string()]).unwrap();
        assert_eq!(
            ids(&queue),
            vec!["Base/Config/Collect", "Base/Config/Validate", "Java/Config/Agent"]
        );
    }

    #[test]
    fn test_resolve_prefix_pattern() {
        let mut registry = TaskRegistry::new();
        registry.register(stub("Base/Config/Collect", vec![])).unwrap();
        registry.register(stub("Base/Env/CollectEnvVars", vec![])).unwrap();
        registry.register(stub("Java/Env/Version", vec![])).unwrap();

        let queue = registry.resolve(&["Base/*".to_string()]).unwrap();
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_resolve_unknown_pattern() {
        let registry = TaskRegistry::new();
        let err = registry.resolve(&["Base/Config/Nope".to_string()]).err().unwrap();
        assert!(matches!(err, DiagError::UnknownTask(_)));
    }

    #[test]
    fn test_resolve_unknown_dependency() {
        let mut registry = TaskRegistry::new();
        registry
            .register(stub("Base/Config/Validate", vec!["Base/Config/Missing"]))
            .unwrap();
        let err = registry.resolve(&[]).err().unwrap();
        assert!(matches!(err, DiagError::UnknownTask(ref dep) if dep == "Base/Config/Missing"));
    }

    #[test]
    fn test_resolve_detects_cycle() {
        let mut registry = TaskRegistry::new();
        registry.register(stub("A/B/One", vec!["A/B/Two"])).unwrap();
        registry.register(stub("A/B/Two", vec!["A/B/One"])).unwrap();
        registry.register(stub("A/B/Free", vec![])).unwrap();

        match registry.resolve(&[]) {
            Err(DiagError::DependencyCycle(path)) => {
                assert_eq!(path.first(), path.last());
                assert!(path.contains(&"A/B/One".to_string()));
                assert!(path.contains(&"A/B/Two".to_string()));
            }
            other => panic!("expected cycle, got {:?}", other.map(|q| q.len())),
        }
    }
}
