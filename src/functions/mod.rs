//! Tool registry: function schemas offered to the model and their execution against the run context.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{
    execution::ExecutionContext,
    llm::{ChatBackend, FunctionSchema, ToolSchema},
    render::{self, PlotOptions, RenderedImage},
    tools::{self, ToolError},
};

#[derive(Debug, Deserialize)]
struct ColumnArgs {
    column: String,
    #[serde(flatten)]
    opts: PlotOptions,
}

#[derive(Debug, Deserialize)]
struct PairArgs {
    x: String,
    y: String,
    #[serde(flatten)]
    opts: PlotOptions,
}

#[derive(Debug, Deserialize)]
struct BarArgs {
    x: String,
    #[serde(default)]
    y: Option<String>,
    #[serde(flatten)]
    opts: PlotOptions,
}

#[derive(Debug, Deserialize)]
struct PathArgs {
    path: String,
}

#[derive(Debug, Deserialize)]
struct SaveArgs {
    figure: String,
    filename: String,
}

#[derive(Debug, Deserialize)]
struct ReportArgs {
    text: String,
    #[serde(default)]
    image_links: Option<Vec<String>>,
    #[serde(default)]
    output_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageArgs {
    image_path: String,
    query: String,
}

pub struct Registry {
    vision: Arc<dyn ChatBackend>,
    vision_model: String,
}

impl Registry {
    pub fn new(vision: Arc<dyn ChatBackend>, vision_model: impl Into<String>) -> Self {
        Self { vision, vision_model: vision_model.into() }
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        let styling = |extra: Value| {
            let mut props = json!({
                "title": {"type": "string", "description": "Figure title"},
                "xlabel": {"type": "string", "description": "X axis label"},
                "ylabel": {"type": "string", "description": "Y axis label"}
            });
            if let (Some(p), Some(e)) = (props.as_object_mut(), extra.as_object()) {
                p.extend(e.clone());
            }
            props
        };
        let hue = json!({"hue": {"type": "string", "description": "Categorical column used to group series"}});
        let pair = |hue: &Value| {
            let mut props = styling(hue.clone());
            props["x"] = json!({"type": "string"});
            props["y"] = json!({"type": "string"});
            props
        };

        vec![
            schema(
                "get_dataframe_info",
                "Shape, columns, dtypes, summary statistics and missing values of the dataset.",
                json!({"type": "object", "properties": {}}),
            ),
            schema(
                "ensure_directory",
                "Create a directory and any missing parents. Succeeds if it already exists.",
                object(json!({"path": {"type": "string"}}), &["path"]),
            ),
            schema(
                "plot_histogram",
                "Histogram with a KDE curve for a numeric column. Returns a figure handle.",
                object(
                    {
                        let mut p = styling(json!({"bins": {"type": "integer", "minimum": 1, "maximum": 1000}}));
                        p["column"] = json!({"type": "string"});
                        p
                    },
                    &["column"],
                ),
            ),
            schema(
                "plot_scatter",
                "Scatter plot of two numeric columns. Returns a figure handle.",
                object(pair(&hue), &["x", "y"]),
            ),
            schema(
                "plot_line",
                "Line plot of the mean of y for each x, in x order. Returns a figure handle.",
                object(pair(&hue), &["x", "y"]),
            ),
            schema(
                "plot_boxplot",
                "Box plot of a numeric column y per category of x. Returns a figure handle.",
                object(pair(&json!({})), &["x", "y"]),
            ),
            schema(
                "plot_bar",
                "Bar plot of the mean of y per category of x, or category counts when y is omitted. Returns a figure handle.",
                object(
                    {
                        let mut p = styling(hue.clone());
                        p["x"] = json!({"type": "string"});
                        p["y"] = json!({"type": "string"});
                        p
                    },
                    &["x"],
                ),
            ),
            schema(
                "plot_pie",
                "Pie chart of the value counts of a column. Returns a figure handle.",
                object(
                    {
                        let mut p = styling(json!({}));
                        p["column"] = json!({"type": "string"});
                        p
                    },
                    &["column"],
                ),
            ),
            schema(
                "save_figure",
                "Save a figure handle as an image. Bare file names go to output/visualizations.",
                object(
                    json!({
                        "figure": {"type": "string", "description": "Handle such as figure_1"},
                        "filename": {"type": "string", "description": "e.g. age_histogram.png"}
                    }),
                    &["figure", "filename"],
                ),
            ),
            schema(
                "list_visualizations",
                "Paths of the visualizations saved during this request.",
                json!({"type": "object", "properties": {}}),
            ),
            schema(
                "create_report",
                "Write the markdown report. image_links defaults to every saved visualization, output_path to output/report.md.",
                object(
                    json!({
                        "text": {"type": "string", "description": "Markdown narrative"},
                        "image_links": {"type": "array", "items": {"type": "string"}},
                        "output_path": {"type": "string"}
                    }),
                    &["text"],
                ),
            ),
            schema(
                "analyze_image",
                "Ask a vision model a question about an image file.",
                object(
                    json!({
                        "image_path": {"type": "string"},
                        "query": {"type": "string"}
                    }),
                    &["image_path", "query"],
                ),
            ),
        ]
    }

    /// Runs one tool call. Failures come back as text starting with `Error:`.
    pub async fn execute(&self, ctx: &mut ExecutionContext, name: &str, args_json: &str) -> String {
        debug!(tool = name, args = args_json, "executing tool");
        match self.dispatch(ctx, name, args_json).await {
            Ok(out) => out,
            Err(e) => {
                warn!(tool = name, error = %e, "tool call failed");
                format!("Error: {e}")
            }
        }
    }

    async fn dispatch(&self, ctx: &mut ExecutionContext, name: &str, args_json: &str) -> Result<String, ToolError> {
        match name {
            "get_dataframe_info" => Ok(tools::get_dataframe_info(ctx.table())),
            "ensure_directory" => {
                let a: PathArgs = parse(name, args_json)?;
                tools::ensure_directory(&a.path)
            }
            "plot_histogram" => {
                let a: ColumnArgs = parse(name, args_json)?;
                let img = render::histogram(ctx.table(), &a.column, &a.opts, &ctx.style)?;
                Ok(stash(ctx, img, &format!("histogram of {}", a.column)))
            }
            "plot_scatter" => {
                let a: PairArgs = parse(name, args_json)?;
                let img = render::scatter(ctx.table(), &a.x, &a.y, &a.opts, &ctx.style)?;
                Ok(stash(ctx, img, &format!("scatter of {} vs {}", a.y, a.x)))
            }
            "plot_line" => {
                let a: PairArgs = parse(name, args_json)?;
                let img = render::line(ctx.table(), &a.x, &a.y, &a.opts, &ctx.style)?;
                Ok(stash(ctx, img, &format!("line of {} over {}", a.y, a.x)))
            }
            "plot_boxplot" => {
                let a: PairArgs = parse(name, args_json)?;
                let img = render::boxplot(ctx.table(), &a.x, &a.y, &a.opts, &ctx.style)?;
                Ok(stash(ctx, img, &format!("box plot of {} by {}", a.y, a.x)))
            }
            "plot_bar" => {
                let a: BarArgs = parse(name, args_json)?;
                let img = render::bar(ctx.table(), &a.x, a.y.as_deref(), &a.opts, &ctx.style)?;
                let what = match &a.y {
                    Some(y) => format!("bar plot of mean {} by {}", y, a.x),
                    None => format!("bar plot of counts by {}", a.x),
                };
                Ok(stash(ctx, img, &what))
            }
            "plot_pie" => {
                let a: ColumnArgs = parse(name, args_json)?;
                let img = render::pie(ctx.table(), &a.column, &a.opts, &ctx.style)?;
                Ok(stash(ctx, img, &format!("pie chart of {}", a.column)))
            }
            "save_figure" => {
                let a: SaveArgs = parse(name, args_json)?;
                let saved = {
                    let image = ctx
                        .figure(&a.figure)
                        .ok_or_else(|| ToolError::UnknownFigure(a.figure.clone()))?;
                    let dest = destination(&a.filename, &ctx.layout.visualizations, image.extension());
                    tools::save_figure(image, &dest, &ctx.layout.visualizations)
                        .ok_or_else(|| ToolError::SaveFailed(dest.display().to_string()))?
                };
                ctx.push_artifact(&saved);
                Ok(format!("Figure saved to {}", saved.display()))
            }
            "list_visualizations" => {
                if ctx.artifacts().is_empty() {
                    Ok("No visualizations saved yet.".to_string())
                } else {
                    Ok(ctx.artifacts().join("\n"))
                }
            }
            "create_report" => {
                let a: ReportArgs = parse(name, args_json)?;
                let links = a.image_links.unwrap_or_else(|| ctx.artifacts().to_vec());
                let output = a
                    .output_path
                    .map(PathBuf::from)
                    .unwrap_or_else(|| ctx.layout.report.clone());
                tools::build_report(&a.text, &links, &output, &ctx.layout.root)
            }
            "analyze_image" => {
                let a: ImageArgs = parse(name, args_json)?;
                let answer =
                    tools::describe_image(self.vision.as_ref(), &self.vision_model, Path::new(&a.image_path), &a.query)
                        .await;
                Ok(answer)
            }
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }
}

fn schema(name: &str, description: &str, parameters: Value) -> ToolSchema {
    ToolSchema {
        r#type: "function".into(),
        function: FunctionSchema {
            name: name.into(),
            description: Some(description.into()),
            parameters,
        },
    }
}

fn object(properties: Value, required: &[&str]) -> Value {
    json!({"type": "object", "properties": properties, "required": required})
}

fn parse<T: DeserializeOwned>(tool: &str, args_json: &str) -> Result<T, ToolError> {
    let raw = if args_json.trim().is_empty() { "{}" } else { args_json };
    serde_json::from_str(raw).map_err(|e| ToolError::BadArguments {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

fn stash(ctx: &mut ExecutionContext, image: RenderedImage, what: &str) -> String {
    let (w, h, ext) = (image.width, image.height, image.extension());
    let handle = ctx.store_figure(image);
    format!("Created {handle}: {what} ({w}x{h} {ext}). Save it with save_figure.")
}

/// Bare file names land in the visualization directory; a missing extension is filled in.
fn destination(filename: &str, visual_dir: &Path, extension: &str) -> PathBuf {
    let path = Path::new(filename);
    let mut dest = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => path.to_path_buf(),
        _ => visual_dir.join(path),
    };
    if dest.extension().is_none() {
        dest.set_extension(extension);
    }
    dest
}
