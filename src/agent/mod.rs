//! The analysis agent: builds a fresh context per run, drives the planner and tools,
//! and carries the transcript forward in its memory log.

mod planner;

use std::fmt;

use anyhow::Result;
use tracing::{debug, info};

use crate::config::AgentSettings;
use crate::execution::ExecutionContext;
use crate::functions::Registry;
use crate::memory::MemoryLog;
use crate::table::Table;

pub use planner::{Action, LlmPlanner, Planner, ToolInvocation};

pub const DEFAULT_QUERY: &str = "Please perform an initial exploratory data analysis on this dataset. \
Start with basic statistics and create relevant visualizations for numeric columns.";

/// One element of a run's transcript.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnRecord {
    Task(String),
    Plan(String),
    Step {
        index: usize,
        calls: Vec<ToolInvocation>,
        observations: Vec<String>,
    },
    Final(String),
    Error(String),
}

impl fmt::Display for TurnRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnRecord::Task(t) => write!(f, "[task] {t}"),
            TurnRecord::Plan(p) => write!(f, "[plan] {p}"),
            TurnRecord::Step { index, calls, observations } => {
                write!(f, "[step {index}]")?;
                for (call, obs) in calls.iter().zip(observations) {
                    write!(f, "\n{}({}) -> {}", call.name, call.arguments, obs)?;
                }
                Ok(())
            }
            TurnRecord::Final(a) => write!(f, "[final] {a}"),
            TurnRecord::Error(e) => write!(f, "[error] {e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub answer: String,
    /// Figure paths saved during this run, in save order.
    pub artifacts: Vec<String>,
    pub steps: usize,
}

pub struct EdaAgent {
    table: Table,
    planner: Box<dyn Planner>,
    registry: Registry,
    memory: MemoryLog,
    settings: AgentSettings,
}

impl EdaAgent {
    pub fn new(table: Table, planner: Box<dyn Planner>, registry: Registry, settings: AgentSettings) -> Self {
        Self { table, planner, registry, memory: MemoryLog::new(), settings }
    }

    pub fn memory(&self) -> &MemoryLog {
        &self.memory
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Runs one request, or the default analysis when `query` is `None`.
    ///
    /// The transcript is appended to memory, one record per element, whether or
    /// not the run succeeds. Taking `&mut self` rules out overlapping runs.
    pub async fn run(&mut self, query: Option<&str>) -> Result<RunOutcome> {
        let task = query.unwrap_or(DEFAULT_QUERY).to_string();
        let mut ctx = ExecutionContext::new(
            self.table.clone(),
            self.memory.history(),
            self.settings.plot.clone(),
            self.settings.output.clone(),
        );
        let mut transcript = vec![TurnRecord::Task(task)];
        info!(max_steps = self.settings.max_steps, memory_entries = self.memory.len(), "run started");

        let result = self.drive(&mut ctx, &mut transcript).await;
        if let Err(e) = &result {
            transcript.push(TurnRecord::Error(format!("{e:#}")));
        }
        for record in &transcript {
            self.memory.add(record.to_string());
        }

        let (answer, steps) = result?;
        let artifacts = ctx.into_artifacts();
        info!(steps, artifacts = artifacts.len(), "run finished");
        Ok(RunOutcome { answer, artifacts, steps })
    }

    pub async fn ask(&mut self, query: &str) -> Result<RunOutcome> {
        self.run(Some(query)).await
    }

    async fn drive(&self, ctx: &mut ExecutionContext, transcript: &mut Vec<TurnRecord>) -> Result<(String, usize)> {
        let (max_steps, planning_interval) = (self.settings.max_steps, self.settings.planning_interval);

        for step in 1..=max_steps {
            if planning_interval > 0 && (step - 1) % planning_interval == 0 {
                let plan = self.planner.plan(&ctx.snapshot(), transcript).await?;
                debug!(step, "plan updated");
                transcript.push(TurnRecord::Plan(plan));
            }

            match self.planner.propose_step(&ctx.snapshot(), transcript).await? {
                Action::Finish(answer) => {
                    transcript.push(TurnRecord::Final(answer.clone()));
                    return Ok((answer, step));
                }
                Action::Invoke(calls) => {
                    let mut observations = Vec::with_capacity(calls.len());
                    for call in &calls {
                        debug!(step, tool = %call.name, "tool call");
                        observations.push(self.registry.execute(ctx, &call.name, &call.arguments).await);
                    }
                    transcript.push(TurnRecord::Step { index: step, calls, observations });
                }
            }
        }

        info!(max_steps, "step budget exhausted, asking for a final answer");
        let answer = self.planner.final_answer(&ctx.snapshot(), transcript).await?;
        transcript.push(TurnRecord::Final(answer.clone()));
        Ok((answer, max_steps))
    }
}
