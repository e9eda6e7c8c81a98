use std::{
    collections::VecDeque,
    io::Cursor,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use eda_agent::{
    agent::{Action, EdaAgent, Planner, ToolInvocation, TurnRecord},
    config::AgentSettings,
    execution::{ContextSnapshot, OutputLayout},
    functions::Registry,
    handlers::interactive,
    llm::{ChatBackend, ChatMessage, ChatOptions, ChatReply},
    printer::Printers,
    render::PlotStyle,
    table::{Column, Table},
};

#[derive(Default)]
struct Script {
    actions: Mutex<VecDeque<Result<Action, String>>>,
    plans: AtomicUsize,
    finals: AtomicUsize,
    seen_memory: Mutex<Vec<String>>,
}

struct ScriptedPlanner(Arc<Script>);

#[async_trait]
impl Planner for ScriptedPlanner {
    async fn plan(&self, _snapshot: &ContextSnapshot, _transcript: &[TurnRecord]) -> Result<String> {
        let n = self.0.plans.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("plan #{n}"))
    }

    async fn propose_step(&self, snapshot: &ContextSnapshot, _transcript: &[TurnRecord]) -> Result<Action> {
        self.0.seen_memory.lock().unwrap().push(snapshot.memory.clone());
        match self.0.actions.lock().unwrap().pop_front() {
            Some(Ok(action)) => Ok(action),
            Some(Err(msg)) => Err(anyhow!(msg)),
            None => Ok(Action::Finish("no more steps".into())),
        }
    }

    async fn final_answer(&self, _snapshot: &ContextSnapshot, _transcript: &[TurnRecord]) -> Result<String> {
        self.0.finals.fetch_add(1, Ordering::SeqCst);
        Ok("budget summary".into())
    }
}

struct SilentBackend;

#[async_trait]
impl ChatBackend for SilentBackend {
    async fn complete(&self, _messages: &[ChatMessage], _opts: &ChatOptions) -> Result<ChatReply> {
        Err(anyhow!("offline"))
    }
}

fn call(name: &str, args: &str) -> ToolInvocation {
    ToolInvocation::new(format!("call_{name}"), name, args)
}

fn sample_table() -> Table {
    Table::new(vec![
        Column::numeric("age", vec![Some(21.0), Some(35.0), None, Some(48.0)]),
        Column::categorical("city", vec![Some("Pune"), Some("Agra"), Some("Pune"), None]),
    ])
    .unwrap()
}

fn agent_with(script: Arc<Script>, root: &std::path::Path, max_steps: usize, planning_interval: usize) -> EdaAgent {
    let settings = AgentSettings {
        model: "scripted".into(),
        vision_model: "scripted-vision".into(),
        max_steps,
        planning_interval,
        plot: PlotStyle::new("default", 4.0, 3.0, 50),
        output: OutputLayout::new(root),
    };
    let registry = Registry::new(Arc::new(SilentBackend), "scripted-vision");
    EdaAgent::new(sample_table(), Box::new(ScriptedPlanner(script)), registry, settings)
}

fn script(actions: Vec<Result<Action, String>>) -> Arc<Script> {
    Arc::new(Script { actions: Mutex::new(actions.into()), ..Default::default() })
}

#[tokio::test]
async fn default_run_executes_tools_and_records_transcript() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path().join("output");
    let report = root.join("report.md");
    let report_args = serde_json::json!({"text": "Sample", "output_path": report}).to_string();
    let s = script(vec![
        Ok(Action::Invoke(vec![
            call("get_dataframe_info", "{}"),
            call("ensure_directory", &serde_json::json!({"path": root.join("visualizations")}).to_string()),
        ])),
        Ok(Action::Invoke(vec![call("create_report", &report_args)])),
        Ok(Action::Finish("done".into())),
    ]);
    let mut agent = agent_with(s.clone(), &root, 25, 3);

    let outcome = agent.run(None).await?;
    assert_eq!(outcome.answer, "done");
    assert_eq!(outcome.steps, 3);
    assert!(outcome.artifacts.is_empty());
    assert!(root.join("visualizations").is_dir());
    assert!(std::fs::read_to_string(&report)?.contains("Sample"));
    // Planning happens on step 1 only with an interval of 3 and three steps.
    assert_eq!(s.plans.load(Ordering::SeqCst), 1);

    let entries = agent.memory().entries();
    assert_eq!(entries.len(), 5);
    assert!(entries[0].starts_with("[task] Please perform an initial exploratory data analysis"));
    assert_eq!(entries[1], "[plan] plan #1");
    assert!(entries[2].starts_with("[step 1]\nget_dataframe_info({}) -> DataFrame Shape: (4, 2)"));
    assert!(entries[3].contains("Report saved successfully to"));
    assert_eq!(entries[4], "[final] done");
    Ok(())
}

#[tokio::test]
async fn exhausted_budget_asks_for_final_answer() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let s = script(vec![
        Ok(Action::Invoke(vec![call("list_visualizations", "")])),
        Ok(Action::Invoke(vec![call("list_visualizations", "")])),
        Ok(Action::Invoke(vec![call("list_visualizations", "")])),
    ]);
    let mut agent = agent_with(s.clone(), dir.path(), 2, 1);

    let outcome = agent.ask("keep going").await?;
    assert_eq!(outcome.answer, "budget summary");
    assert_eq!(outcome.steps, 2);
    assert_eq!(s.plans.load(Ordering::SeqCst), 2);
    assert_eq!(s.finals.load(Ordering::SeqCst), 1);
    assert!(agent.memory().history().contains("No visualizations saved yet."));
    Ok(())
}

#[tokio::test]
async fn zero_planning_interval_never_plans() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let s = script(vec![Ok(Action::Finish("ok".into()))]);
    let mut agent = agent_with(s.clone(), dir.path(), 5, 0);
    agent.ask("anything").await?;
    assert_eq!(s.plans.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn tool_failures_become_observations() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let s = script(vec![Ok(Action::Invoke(vec![
        call("plot_histogram", r#"{"column":"city"}"#),
        call("plot_pie", r#"{"column":"nope"}"#),
        call("save_figure", r#"{"figure":"figure_9","filename":"x.png"}"#),
        call("ensure_directory", "{not json"),
        call("run_python", "{}"),
        call("analyze_image", r#"{"image_path":"missing.png","query":"what?"}"#),
    ]))]);
    let mut agent = agent_with(s, dir.path(), 3, 0);

    let outcome = agent.ask("break things").await?;
    assert_eq!(outcome.answer, "no more steps");

    let step = &agent.memory().entries()[1];
    let observations: Vec<&str> = step.lines().skip(1).map(|l| l.split(" -> ").nth(1).unwrap_or("")).collect();
    assert_eq!(observations.len(), 6);
    assert!(observations.iter().all(|o| o.starts_with("Error:")), "{observations:?}");
    assert!(observations[0].contains("column `city` must be numeric"));
    assert!(observations[1].contains("column `nope` not found"));
    assert!(observations[2].contains("unknown figure `figure_9`"));
    assert!(observations[4].contains("unknown tool `run_python`"));
    assert!(observations[5].starts_with("Error: image analysis failed:"), "{}", observations[5]);
    Ok(())
}

#[tokio::test]
async fn saved_figures_flow_into_default_report() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path().join("output");
    let s = script(vec![
        Ok(Action::Invoke(vec![
            call("plot_histogram", r#"{"column":"age"}"#),
            call("plot_bar", r#"{"x":"city"}"#),
        ])),
        Ok(Action::Invoke(vec![
            call("save_figure", r#"{"figure":"figure_1","filename":"age_hist.png"}"#),
            call("save_figure", r#"{"figure":"figure_2","filename":"city_counts"}"#),
        ])),
        Ok(Action::Invoke(vec![call("create_report", r#"{"text":"Ages skew young."}"#)])),
        Ok(Action::Finish("report written".into())),
    ]);
    let mut agent = agent_with(s, &root, 10, 0);

    let outcome = agent.ask("plot and report").await?;
    assert_eq!(outcome.answer, "report written");

    let visual_dir = root.join("visualizations");
    let expected = vec![
        visual_dir.join("age_hist.png").display().to_string(),
        visual_dir.join("city_counts.png").display().to_string(),
    ];
    assert_eq!(outcome.artifacts, expected);
    for path in &expected {
        assert_eq!(&std::fs::read(path)?[..4], b"\x89PNG");
    }

    let body = std::fs::read_to_string(root.join("report.md"))?;
    assert!(body.contains("Ages skew young."));
    let images: Vec<&str> = body.lines().filter(|l| l.starts_with("![Visualization](")).collect();
    assert_eq!(
        images,
        vec!["![Visualization](visualizations/age_hist.png)", "![Visualization](visualizations/city_counts.png)"]
    );
    Ok(())
}

#[tokio::test]
async fn huge_bin_count_does_not_end_the_session() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let s = script(vec![Ok(Action::Invoke(vec![call(
        "plot_histogram",
        r#"{"column":"age","bins":1000000000000000000}"#,
    )]))]);
    let mut agent = agent_with(s, dir.path(), 3, 0);

    let outcome = agent.ask("fine bins please").await?;
    assert_eq!(outcome.answer, "no more steps");
    assert!(agent.memory().entries()[1].contains("-> Created figure_1: histogram of age"));
    Ok(())
}

#[tokio::test]
async fn failed_run_still_lands_in_memory() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let s = script(vec![Err("service unavailable".into())]);
    let mut agent = agent_with(s, dir.path(), 3, 0);

    let err = agent.ask("hello").await.unwrap_err();
    assert!(err.to_string().contains("service unavailable"));
    let entries = agent.memory().entries();
    assert_eq!(entries[0], "[task] hello");
    assert_eq!(entries[1], "[error] service unavailable");
    Ok(())
}

#[tokio::test]
async fn memory_snapshot_carries_into_next_run() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let s = script(vec![Ok(Action::Finish("one".into())), Ok(Action::Finish("two".into()))]);
    let mut agent = agent_with(s.clone(), dir.path(), 3, 0);

    agent.ask("first").await?;
    agent.ask("second").await?;

    let seen = s.seen_memory.lock().unwrap().clone();
    assert_eq!(seen[0], "");
    assert_eq!(seen[1], "[task] first\n[final] one");
    Ok(())
}

#[tokio::test]
async fn interactive_loop_stops_on_exit_and_survives_errors() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let s = script(vec![Err("boom".into()), Ok(Action::Finish("the answer".into()))]);
    let mut agent = agent_with(s.clone(), dir.path(), 3, 0);

    let input = Cursor::new("first\n\nsecond\n  EXIT  \nnever asked\n");
    let mut out = Vec::new();
    interactive::run_loop(&mut agent, input, &mut out, &Printers::plain()).await?;
    let out = String::from_utf8(out)?;

    assert!(out.contains("Entering interactive mode. Type 'exit' to quit."));
    assert!(out.contains("\nError: boom"));
    assert!(out.contains("\nAgent Response:\nthe answer\n"));
    assert!(!agent.memory().history().contains("never asked"));
    assert_eq!(s.seen_memory.lock().unwrap().len(), 2);
    Ok(())
}

#[tokio::test]
async fn interactive_loop_ends_at_eof() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let s = script(vec![]);
    let mut agent = agent_with(s, dir.path(), 3, 0);

    let mut out = Vec::new();
    interactive::run_loop(&mut agent, Cursor::new("only question\n"), &mut out, &Printers::plain()).await?;
    assert!(String::from_utf8(out)?.contains("no more steps"));
    Ok(())
}
