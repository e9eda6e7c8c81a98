//! The reasoning side of the run loop, injected into the agent as a trait object.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use super::TurnRecord;
use crate::execution::ContextSnapshot;
use crate::llm::{ChatBackend, ChatMessage, ChatOptions, FunctionCall, Role, ToolCall, ToolSchema};
use crate::role::{self, AgentRole};

/// One requested tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolInvocation {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into(), arguments: arguments.into() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Invoke(Vec<ToolInvocation>),
    Finish(String),
}

#[async_trait]
pub trait Planner: Send + Sync {
    /// Free-text plan for the remaining work.
    async fn plan(&self, snapshot: &ContextSnapshot, transcript: &[TurnRecord]) -> Result<String>;

    /// Next thing to do: call tools or finish with an answer.
    async fn propose_step(&self, snapshot: &ContextSnapshot, transcript: &[TurnRecord]) -> Result<Action>;

    /// Answer to give when the step budget runs out.
    async fn final_answer(&self, snapshot: &ContextSnapshot, transcript: &[TurnRecord]) -> Result<String>;
}

/// Planner backed by an OpenAI-compatible function-calling model.
pub struct LlmPlanner {
    backend: Arc<dyn ChatBackend>,
    model: String,
    tools: Vec<ToolSchema>,
}

impl LlmPlanner {
    pub fn new(backend: Arc<dyn ChatBackend>, model: impl Into<String>, tools: Vec<ToolSchema>) -> Self {
        Self { backend, model: model.into(), tools }
    }

    fn messages(&self, snapshot: &ContextSnapshot, transcript: &[TurnRecord]) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::new(Role::System, role::system_prompt(snapshot))];
        for record in transcript {
            match record {
                TurnRecord::Task(task) => messages.push(ChatMessage::new(Role::User, task.clone())),
                TurnRecord::Plan(plan) => messages.push(ChatMessage::new(Role::Assistant, format!("Plan:\n{plan}"))),
                TurnRecord::Step { calls, observations, .. } => {
                    if calls.is_empty() {
                        continue;
                    }
                    let tool_calls = calls
                        .iter()
                        .map(|c| ToolCall {
                            id: Some(c.id.clone()),
                            r#type: "function".into(),
                            function: FunctionCall { name: c.name.clone(), arguments: c.arguments.clone() },
                        })
                        .collect();
                    messages.push(ChatMessage::assistant_tool_calls(tool_calls));
                    for (call, obs) in calls.iter().zip(observations) {
                        messages.push(ChatMessage::tool_result(call.id.clone(), call.name.clone(), obs.clone()));
                    }
                }
                TurnRecord::Final(answer) => messages.push(ChatMessage::new(Role::Assistant, answer.clone())),
                TurnRecord::Error(err) => messages.push(ChatMessage::new(Role::User, format!("Error: {err}"))),
            }
        }
        messages
    }

    async fn ask_text(&self, snapshot: &ContextSnapshot, transcript: &[TurnRecord], role: AgentRole) -> Result<String> {
        let mut messages = self.messages(snapshot, transcript);
        messages.push(ChatMessage::new(Role::User, role::role_text(role)));
        let reply = self.backend.complete(&messages, &ChatOptions::new(&self.model)).await?;
        Ok(reply.content.unwrap_or_default())
    }
}

#[async_trait]
impl Planner for LlmPlanner {
    async fn plan(&self, snapshot: &ContextSnapshot, transcript: &[TurnRecord]) -> Result<String> {
        self.ask_text(snapshot, transcript, AgentRole::Planner).await
    }

    async fn propose_step(&self, snapshot: &ContextSnapshot, transcript: &[TurnRecord]) -> Result<Action> {
        let messages = self.messages(snapshot, transcript);
        let opts = ChatOptions::new(&self.model).with_tools(self.tools.clone());
        let reply = self.backend.complete(&messages, &opts).await?;

        if reply.tool_calls.is_empty() {
            return Ok(Action::Finish(reply.content.unwrap_or_default()));
        }
        let base = transcript.len();
        let calls = reply
            .tool_calls
            .into_iter()
            .enumerate()
            .map(|(i, call)| {
                let id = call.id.unwrap_or_else(|| format!("call_{base}_{i}"));
                ToolInvocation::new(id, call.function.name, call.function.arguments)
            })
            .collect();
        Ok(Action::Invoke(calls))
    }

    async fn final_answer(&self, snapshot: &ContextSnapshot, transcript: &[TurnRecord]) -> Result<String> {
        self.ask_text(snapshot, transcript, AgentRole::Reporter).await
    }
}
