use std::fmt;

use serde::{Deserialize, Serialize};

use crate::agents::AgentKind;

/// Raw text produced by one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutput {
    pub task_id: String,
    pub agent: AgentKind,
    pub agent_role: String,
    pub description: String,
    pub raw: String,
}

/// Outcome of one crew run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunResult {
    /// Per-task outputs in execution order; never empty.
    Completed { outputs: Vec<TaskOutput> },
    Empty,
}

impl RunResult {
    pub fn from_outputs(outputs: Vec<TaskOutput>) -> Self {
        if outputs.is_empty() {
            RunResult::Empty
        } else {
            RunResult::Completed { outputs }
        }
    }

    pub fn outputs(&self) -> &[TaskOutput] {
        match self {
            RunResult::Completed { outputs } => outputs,
            RunResult::Empty => &[],
        }
    }

    pub fn has_outputs(&self) -> bool {
        !self.outputs().is_empty()
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunResult::Completed { outputs } => {
                let raws: Vec<&str> = outputs.iter().map(|output| output.raw.as_str()).collect();
                write!(f, "{}", raws.join("\n\n"))
            }
            RunResult::Empty => Ok(()),
        }
    }
}
