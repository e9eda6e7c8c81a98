//! Role prompts for the analysis agent.

use crate::execution::ContextSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentRole {
    /// System prompt for every step.
    Analyst,
    /// Periodic re-planning request.
    Planner,
    /// Closing summary once the step budget is spent.
    Reporter,
}

pub fn role_text(role: AgentRole) -> &'static str {
    match role {
        AgentRole::Analyst => ANALYST,
        AgentRole::Planner => PLANNER,
        AgentRole::Reporter => REPORTER,
    }
}

/// Analyst prompt followed by the current dataset, artifacts and memory.
pub fn system_prompt(snapshot: &ContextSnapshot) -> String {
    let mut out = String::from(ANALYST);
    out.push_str("\n\n## Dataset\n");
    out.push_str(&format!("Shape: ({}, {})\n", snapshot.shape.0, snapshot.shape.1));
    for col in &snapshot.columns {
        out.push_str(&format!("- {} ({})\n", col.name, col.dtype));
    }

    out.push_str("\n## Saved visualizations\n");
    if snapshot.artifacts.is_empty() {
        out.push_str("None yet.\n");
    } else {
        for path in &snapshot.artifacts {
            out.push_str(&format!("- {path}\n"));
        }
    }
    if !snapshot.figures.is_empty() {
        out.push_str(&format!("\nUnsaved figure handles: {}\n", snapshot.figures.join(", ")));
    }

    if !snapshot.memory.is_empty() {
        out.push_str("\n## Memory from earlier requests\n");
        out.push_str(&snapshot.memory);
        out.push('\n');
    }
    out
}

const ANALYST: &str = "You are an exploratory data analysis (EDA) assistant.
Guidelines:
1. Only use the available tools. Call them through function calls; never write code.
   - get_dataframe_info: basic statistics about the dataset
   - plot_histogram, plot_scatter, plot_line, plot_boxplot, plot_bar, plot_pie: render a figure and return its handle
   - save_figure: save a figure handle to disk under output/visualizations
   - list_visualizations: list the visualizations saved so far
   - ensure_directory: create a directory (no error when it exists)
   - analyze_image: ask a vision model about a saved image
   - create_report: write the final markdown report to output/report.md
2. Begin your analysis with get_dataframe_info to understand the dataset structure.
3. Every plot must be saved with save_figure before it can be referenced in the report.
4. Choose visualizations that fit the data:
   - histograms (with KDE) for numeric distributions
   - pie charts or bar plots for categorical data
   - scatter plots for relationships between numeric variables
   - box plots for categorical vs numeric comparisons
   - line plots for time series or ordered data
5. Set clear, descriptive titles and meaningful axis labels.
6. Analyze the saved visualizations to identify key insights or patterns.
7. Finally, use create_report to summarize your analysis, with commentary on each visualization and the statistical findings.
8. When the request is fully answered, reply with your answer as plain text and no function call.";

const PLANNER: &str = "Before continuing, review the dataset structure and what has been done so far.
Outline a concise step-by-step plan for the remaining analysis: which visualizations suit the numeric and categorical features, any preprocessing worth noting, and the questions still to be answered.
Reply with the plan only; do not call any tools.";

const REPORTER: &str = "The step budget is exhausted. Synthesize the findings so far into a concise final answer: key statistics, patterns seen in the visualizations, and the paths of any saved figures or reports.
Reply in markdown; do not call any tools.";
