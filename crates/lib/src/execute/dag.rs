//! File dependency graph for staleness checks and execution planning.
//!
//! Nodes are files, edges point from a dependency to the file built from it.
//! Files produced by a task (step sources when a template is configured, and
//! step executables) remember their producing [`Task`]. A single traversal from
//! the goal outputs decides which tasks are stale, and the stale tasks are then
//! grouped into parallel execution waves.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{debug, trace};

use super::types::{ExecuteError, Task};
use crate::project::Project;

/// Source of file modification times. Returns `None` for missing files.
pub trait Timestamps {
  fn mtime(&self, path: &Path) -> std::io::Result<Option<SystemTime>>;
}

/// Timestamps read from the filesystem.
pub struct FsTimestamps;

impl Timestamps for FsTimestamps {
  fn mtime(&self, path: &Path) -> std::io::Result<Option<SystemTime>> {
    crate::util::fs::mtime(path)
  }
}

/// Stale tasks grouped for execution.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildPlan {
  /// Waves of tasks. Every task's dependencies are in earlier waves.
  pub waves: Vec<Vec<Task>>,
  /// Goal tasks whose outputs are already fresh.
  pub up_to_date: BTreeSet<Task>,
  /// Direct task dependencies of every planned task.
  pub dependencies: HashMap<Task, Vec<Task>>,
}

impl BuildPlan {
  pub fn task_count(&self) -> usize {
    self.waves.iter().map(Vec::len).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.waves.is_empty()
  }
}

pub struct BuildGraph {
  /// The underlying graph of files.
  graph: DiGraph<PathBuf, ()>,

  /// Map from path to node index.
  nodes: HashMap<PathBuf, NodeIndex>,

  /// Output file of every task.
  outputs: HashMap<Task, NodeIndex>,

  /// Producing task of every generated file.
  producers: HashMap<NodeIndex, Task>,
}

impl BuildGraph {
  /// Build the file graph for a project.
  pub fn from_project(project: &Project) -> Result<Self, ExecuteError> {
    let mut dag = Self {
      graph: DiGraph::new(),
      nodes: HashMap::new(),
      outputs: HashMap::new(),
      producers: HashMap::new(),
    };

    let template = project.template.as_ref().map(|p| dag.node(p));
    let project_file = project.project_file.as_ref().map(|p| dag.node(p));
    let shared: Vec<NodeIndex> = project
      .compiler
      .support
      .iter()
      .chain(&project.compiler.extra_deps)
      .map(|p| dag.node(p))
      .collect();

    for record in project.table.records() {
      let source = dag.node(&record.source);
      let executable = dag.node(&record.executable);

      if let Some(template) = template {
        dag.graph.update_edge(template, source, ());
        if let Some(project_file) = project_file {
          dag.graph.update_edge(project_file, source, ());
        }
        dag.produce(Task::Regenerate(record.step), source);
      }

      dag.graph.update_edge(source, executable, ());
      for &dep in &shared {
        dag.graph.update_edge(dep, executable, ());
      }
      dag.produce(Task::Compile(record.step), executable);
    }

    dag.verify_acyclic()?;
    Ok(dag)
  }

  fn node(&mut self, path: &Path) -> NodeIndex {
    if let Some(&idx) = self.nodes.get(path) {
      return idx;
    }
    let idx = self.graph.add_node(path.to_path_buf());
    self.nodes.insert(path.to_path_buf(), idx);
    idx
  }

  fn produce(&mut self, task: Task, output: NodeIndex) {
    self.outputs.insert(task, output);
    self.producers.insert(output, task);
  }

  /// Verify that the graph is acyclic.
  fn verify_acyclic(&self) -> Result<(), ExecuteError> {
    toposort(&self.graph, None).map_err(|cycle| ExecuteError::CycleDetected(self.graph[cycle.node_id()].clone()))?;
    Ok(())
  }

  /// Number of file nodes.
  pub fn file_count(&self) -> usize {
    self.graph.node_count()
  }

  /// Output path of a task, if the task exists in this project.
  pub fn output(&self, task: Task) -> Option<&Path> {
    self.outputs.get(&task).map(|&idx| self.graph[idx].as_path())
  }

  /// Direct input files of a file.
  pub fn inputs(&self, path: &Path) -> Vec<&Path> {
    let Some(&idx) = self.nodes.get(path) else {
      return Vec::new();
    };
    self
      .graph
      .neighbors_directed(idx, Direction::Incoming)
      .map(|dep| self.graph[dep].as_path())
      .collect()
  }

  /// Compute which tasks must run to bring `goals` up to date.
  ///
  /// A produced file is stale when it is missing, when any input is newer,
  /// or when any input is itself stale. Goals that are not in the project are
  /// ignored; target parsing rejects them earlier.
  pub fn plan(&self, goals: &[Task], stamps: &dyn Timestamps) -> Result<BuildPlan, ExecuteError> {
    let mut memo: HashMap<NodeIndex, bool> = HashMap::new();
    let mut plan = BuildPlan::default();

    for &goal in goals {
      let Some(&output) = self.outputs.get(&goal) else {
        continue;
      };
      if !self.is_stale(output, stamps, &mut memo)? {
        plan.up_to_date.insert(goal);
      }
    }

    let selected: HashSet<Task> = memo
      .iter()
      .filter(|&(_, &stale)| stale)
      .filter_map(|(idx, _)| self.producers.get(idx).copied())
      .collect();

    for &task in &selected {
      let output = self.outputs[&task];
      let deps: Vec<Task> = self
        .graph
        .neighbors_directed(output, Direction::Incoming)
        .filter_map(|dep| self.producers.get(&dep).copied())
        .filter(|dep| selected.contains(dep))
        .collect();
      plan.dependencies.insert(task, deps);
    }

    plan.waves = waves(&plan.dependencies)?;

    debug!(
      tasks = plan.task_count(),
      waves = plan.waves.len(),
      up_to_date = plan.up_to_date.len(),
      "computed build plan"
    );

    Ok(plan)
  }

  fn is_stale(
    &self,
    idx: NodeIndex,
    stamps: &dyn Timestamps,
    memo: &mut HashMap<NodeIndex, bool>,
  ) -> Result<bool, ExecuteError> {
    if let Some(&stale) = memo.get(&idx) {
      return Ok(stale);
    }

    // Plain inputs are never rebuilt.
    if !self.producers.contains_key(&idx) {
      memo.insert(idx, false);
      return Ok(false);
    }

    let path = &self.graph[idx];
    let own = stamps.mtime(path)?;
    let mut stale = own.is_none();

    let deps: Vec<NodeIndex> = self.graph.neighbors_directed(idx, Direction::Incoming).collect();
    for dep in deps {
      // Visit every input so stale producers further up are recorded too.
      let dep_stale = self.is_stale(dep, stamps, memo)?;
      if dep_stale {
        stale = true;
        continue;
      }
      if let (Some(own), Some(dep_time)) = (own, stamps.mtime(&self.graph[dep])?)
        && dep_time > own
      {
        trace!(path = %path.display(), newer = %self.graph[dep].display(), "input is newer");
        stale = true;
      }
    }

    memo.insert(idx, stale);
    Ok(stale)
  }
}

/// Group tasks into levels with Kahn's algorithm. Each wave is sorted.
fn waves(dependencies: &HashMap<Task, Vec<Task>>) -> Result<Vec<Vec<Task>>, ExecuteError> {
  let mut remaining: BTreeSet<Task> = dependencies.keys().copied().collect();
  let mut done: HashSet<Task> = HashSet::new();
  let mut waves = Vec::new();

  while !remaining.is_empty() {
    let ready: Vec<Task> = remaining
      .iter()
      .filter(|task| dependencies[task].iter().all(|dep| done.contains(dep)))
      .copied()
      .collect();

    if ready.is_empty() {
      return Err(ExecuteError::CycleDetected(PathBuf::from(
        remaining.iter().next().map(|t| t.to_string()).unwrap_or_default(),
      )));
    }

    for task in &ready {
      remaining.remove(task);
      done.insert(*task);
    }
    waves.push(ready);
  }

  Ok(waves)
}
