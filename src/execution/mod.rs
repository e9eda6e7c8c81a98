//! Per-run execution context shared between the agent and its tools.

use std::path::{Path, PathBuf};

use crate::render::{PlotStyle, RenderedImage};
use crate::table::Table;

/// Where figures and the report land on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputLayout {
    pub root: PathBuf,
    pub visualizations: PathBuf,
    pub report: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            visualizations: root.join("visualizations"),
            report: root.join("report.md"),
            root,
        }
    }
}

impl Default for OutputLayout {
    fn default() -> Self {
        Self::new("output")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnBrief {
    pub name: String,
    pub dtype: &'static str,
}

/// Read-only view of a context, handed to the planner.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextSnapshot {
    pub shape: (usize, usize),
    pub columns: Vec<ColumnBrief>,
    pub artifacts: Vec<String>,
    pub figures: Vec<String>,
    pub memory: String,
}

/// State threaded through every tool call of one run. Built fresh at run start
/// from a private copy of the table and the memory snapshot; dropped at run end.
#[derive(Debug)]
pub struct ExecutionContext {
    table: Table,
    memory: String,
    artifacts: Vec<String>,
    figures: Vec<(String, RenderedImage)>,
    pub style: PlotStyle,
    pub layout: OutputLayout,
}

impl ExecutionContext {
    pub fn new(table: Table, memory: String, style: PlotStyle, layout: OutputLayout) -> Self {
        Self {
            table,
            memory,
            artifacts: Vec::new(),
            figures: Vec::new(),
            style,
            layout,
        }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn memory(&self) -> &str {
        &self.memory
    }

    pub fn artifacts(&self) -> &[String] {
        &self.artifacts
    }

    pub fn push_artifact(&mut self, path: &Path) {
        self.artifacts.push(path.display().to_string());
    }

    /// Stores a rendered figure and returns its handle (`figure_1`, `figure_2`, ...).
    pub fn store_figure(&mut self, image: RenderedImage) -> String {
        let handle = format!("figure_{}", self.figures.len() + 1);
        self.figures.push((handle.clone(), image));
        handle
    }

    pub fn figure(&self, handle: &str) -> Option<&RenderedImage> {
        self.figures
            .iter()
            .find(|(name, _)| name == handle)
            .map(|(_, img)| img)
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            shape: self.table.shape(),
            columns: self
                .table
                .columns()
                .iter()
                .map(|c| ColumnBrief { name: c.name().to_string(), dtype: c.dtype() })
                .collect(),
            artifacts: self.artifacts.clone(),
            figures: self.figures.iter().map(|(name, _)| name.clone()).collect(),
            memory: self.memory.clone(),
        }
    }

    pub fn into_artifacts(self) -> Vec<String> {
        self.artifacts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    fn image() -> RenderedImage {
        RenderedImage { bytes: vec![1, 2, 3], format: image::ImageFormat::Png, width: 1, height: 1 }
    }

    #[test]
    fn layout_paths_hang_off_root() {
        let layout = OutputLayout::new("out");
        assert_eq!(layout.visualizations, Path::new("out/visualizations"));
        assert_eq!(layout.report, Path::new("out/report.md"));
    }

    #[test]
    fn figure_handles_are_sequential() {
        let table = Table::new(vec![Column::numeric("a", vec![Some(1.0)])]).unwrap();
        let mut ctx = ExecutionContext::new(table, String::new(), PlotStyle::default(), OutputLayout::default());
        assert_eq!(ctx.store_figure(image()), "figure_1");
        assert_eq!(ctx.store_figure(image()), "figure_2");
        assert!(ctx.figure("figure_2").is_some());
        assert!(ctx.figure("figure_3").is_none());

        let snap = ctx.snapshot();
        assert_eq!(snap.shape, (1, 1));
        assert_eq!(snap.figures, vec!["figure_1", "figure_2"]);
        assert_eq!(snap.columns[0].dtype, "int64");
    }
}
