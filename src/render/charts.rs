use std::collections::HashMap;

use crate::table::{stats, Column, ColumnType, Table};

use super::{padded, paint, Figure, Mark, PlotOptions, PlotStyle, RenderError, RenderedImage, XTicks};

const DEFAULT_BINS: usize = 30;
const MAX_BINS: usize = 1000;

fn column<'t>(table: &'t Table, name: &str) -> Result<&'t Column, RenderError> {
    table
        .column(name)
        .ok_or_else(|| RenderError::UnknownColumn(name.to_string()))
}

fn numeric<'t>(table: &'t Table, name: &str) -> Result<&'t [Option<f64>], RenderError> {
    let col = column(table, name)?;
    col.as_numeric().ok_or(RenderError::ColumnType {
        column: name.to_string(),
        expected: "numeric",
        found: col.kind(),
    })
}

/// Numeric or datetime column as plot coordinates.
fn axis(table: &Table, name: &str) -> Result<(Vec<Option<f64>>, XTicks), RenderError> {
    let col = column(table, name)?;
    let ticks = match col.kind() {
        ColumnType::Datetime => XTicks::Dates,
        _ => XTicks::Numeric,
    };
    let values = col.as_axis().ok_or(RenderError::ColumnType {
        column: name.to_string(),
        expected: "numeric or datetime",
        found: col.kind(),
    })?;
    Ok((values, ticks))
}

/// Category index for every row (`None` when the cell is missing), plus the category names.
fn categories(col: &Column) -> (Vec<Option<usize>>, Vec<String>) {
    let names = col.categories();
    let index = {
        let lookup: HashMap<&str, usize> = names.iter().enumerate().map(|(i, n)| (n.as_str(), i)).collect();
        (0..col.len())
            .map(|row| col.text_at(row).and_then(|t| lookup.get(t.as_str()).copied()))
            .collect()
    };
    (index, names)
}

/// Optional grouping column; a single implicit group when absent.
fn hue_groups(table: &Table, hue: Option<&str>) -> Result<(Vec<Option<usize>>, Vec<String>), RenderError> {
    match hue {
        Some(name) => Ok(categories(column(table, name)?)),
        None => Ok((vec![Some(0); table.row_count()], Vec::new())),
    }
}

fn value_range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

pub(crate) fn histogram_figure(table: &Table, col: &str, opts: &PlotOptions) -> Result<Figure, RenderError> {
    let sorted = stats::sorted_present(numeric(table, col)?);
    let (lo, hi) = match (sorted.first(), sorted.last()) {
        (Some(lo), Some(hi)) => (*lo, *hi),
        _ => return Err(RenderError::NoData(col.to_string())),
    };
    let bins = opts.bins.unwrap_or(DEFAULT_BINS).clamp(1, MAX_BINS);
    let (lo, hi) = if lo == hi { (lo - 0.5, hi + 0.5) } else { (lo, hi) };
    let width = (hi - lo) / bins as f64;

    let mut counts = vec![0usize; bins];
    for v in &sorted {
        let idx = (((v - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    let mut marks: Vec<Mark> = counts
        .iter()
        .enumerate()
        .map(|(i, c)| Mark::Rect {
            x0: lo + width * i as f64,
            y0: 0.0,
            x1: lo + width * (i + 1) as f64,
            y1: *c as f64,
            color: 0,
        })
        .collect();

    // KDE overlay scaled to bar heights
    let grid: Vec<f64> = (0..=200).map(|i| lo + (hi - lo) * i as f64 / 200.0).collect();
    let mut top = counts.iter().copied().max().unwrap_or(0) as f64;
    if let Some(density) = stats::gaussian_kde(&sorted, &grid) {
        let scale = sorted.len() as f64 * width;
        let points: Vec<(f64, f64)> = grid.iter().zip(density).map(|(x, d)| (*x, d * scale)).collect();
        top = points.iter().map(|p| p.1).fold(top, f64::max);
        marks.push(Mark::Path { points, color: 0, markers: false });
    }

    Ok(Figure {
        title: opts.title_or("Histogram"),
        x_label: opts.xlabel_or(col),
        y_label: opts.ylabel_or("Frequency"),
        x_range: padded(lo, hi),
        y_range: (0.0, top.max(1.0) * 1.05),
        x_ticks: XTicks::Numeric,
        marks,
        legend: Vec::new(),
        polar: false,
    })
}

pub(crate) fn scatter_figure(table: &Table, x: &str, y: &str, opts: &PlotOptions) -> Result<Figure, RenderError> {
    let (xs, x_ticks) = axis(table, x)?;
    let ys = numeric(table, y)?;
    let (groups, names) = hue_groups(table, opts.hue.as_deref())?;

    let marks: Vec<Mark> = xs
        .iter()
        .zip(ys)
        .zip(&groups)
        .filter_map(|((x, y), g)| Some(Mark::Point { x: (*x)?, y: (*y)?, color: (*g)? }))
        .collect();
    let points = || {
        marks.iter().filter_map(|m| match m {
            Mark::Point { x, y, .. } => Some((*x, *y)),
            _ => None,
        })
    };
    let (x_lo, x_hi) = value_range(points().map(|p| p.0)).ok_or_else(|| RenderError::NoData(format!("{x}/{y}")))?;
    let (y_lo, y_hi) = value_range(points().map(|p| p.1)).unwrap_or((0.0, 1.0));

    Ok(Figure {
        title: opts.title_or("Scatter Plot"),
        x_label: opts.xlabel_or(x),
        y_label: opts.ylabel_or(y),
        x_range: padded(x_lo, x_hi),
        y_range: padded(y_lo, y_hi),
        x_ticks,
        marks,
        legend: names.into_iter().enumerate().map(|(i, n)| (n, i)).collect(),
        polar: false,
    })
}

pub(crate) fn line_figure(table: &Table, x: &str, y: &str, opts: &PlotOptions) -> Result<Figure, RenderError> {
    let x_col = column(table, x)?;
    let ys = numeric(table, y)?;
    let (xs, x_ticks): (Vec<Option<f64>>, XTicks) = match x_col.kind() {
        ColumnType::Categorical => {
            let (idx, names) = categories(x_col);
            (idx.into_iter().map(|i| i.map(|i| i as f64)).collect(), XTicks::Categories(names))
        }
        _ => axis(table, x)?,
    };
    let (groups, names) = hue_groups(table, opts.hue.as_deref())?;
    let group_count = names.len().max(1);

    let mut marks = Vec::new();
    for g in 0..group_count {
        let mut pairs: Vec<(f64, f64)> = xs
            .iter()
            .zip(ys)
            .zip(&groups)
            .filter(|(_, gi)| **gi == Some(g))
            .filter_map(|((x, y), _)| Some(((*x)?, (*y)?)))
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        // mean of y per distinct x
        let mut points: Vec<(f64, f64)> = Vec::new();
        let mut run: Option<(f64, f64, usize)> = None;
        for (px, py) in pairs {
            run = match run {
                Some((rx, sum, n)) if rx == px => Some((rx, sum + py, n + 1)),
                Some((rx, sum, n)) => {
                    points.push((rx, sum / n as f64));
                    Some((px, py, 1))
                }
                None => Some((px, py, 1)),
            };
        }
        if let Some((rx, sum, n)) = run {
            points.push((rx, sum / n as f64));
        }
        if !points.is_empty() {
            marks.push(Mark::Path { points, color: g, markers: true });
        }
    }

    let all = || {
        marks.iter().flat_map(|m| match m {
            Mark::Path { points, .. } => points.clone(),
            _ => Vec::new(),
        })
    };
    let (x_lo, x_hi) = value_range(all().map(|p| p.0)).ok_or_else(|| RenderError::NoData(format!("{x}/{y}")))?;
    let (y_lo, y_hi) = value_range(all().map(|p| p.1)).unwrap_or((0.0, 1.0));
    let x_range = match &x_ticks {
        XTicks::Categories(names) => (-0.5, names.len() as f64 - 0.5),
        _ => padded(x_lo, x_hi),
    };

    Ok(Figure {
        title: opts.title_or("Line Plot"),
        x_label: opts.xlabel_or(x),
        y_label: opts.ylabel_or(y),
        x_range,
        y_range: padded(y_lo, y_hi),
        x_ticks,
        marks,
        legend: names.into_iter().enumerate().map(|(i, n)| (n, i)).collect(),
        polar: false,
    })
}

pub(crate) fn boxplot_figure(table: &Table, x: &str, y: &str, opts: &PlotOptions) -> Result<Figure, RenderError> {
    let (idx, names) = categories(column(table, x)?);
    let ys = numeric(table, y)?;

    let mut marks = Vec::new();
    let mut extent: Option<(f64, f64)> = None;
    let mut buckets: Vec<Vec<Option<f64>>> = vec![Vec::new(); names.len()];
    for (i, v) in idx.iter().zip(ys) {
        if let Some(i) = i {
            buckets[*i].push(*v);
        }
    }
    for (c, values) in buckets.iter().enumerate() {
        let sorted = stats::sorted_present(values);
        if let Some(summary) = stats::BoxSummary::of(&sorted) {
            let lo = sorted.first().copied().unwrap_or(summary.q1);
            let hi = sorted.last().copied().unwrap_or(summary.q3);
            extent = Some(match extent {
                None => (lo, hi),
                Some((a, b)) => (a.min(lo), b.max(hi)),
            });
            marks.push(Mark::Box { center: c as f64, half_width: 0.4, summary, color: c });
        }
    }
    let (lo, hi) = extent.ok_or_else(|| RenderError::NoData(format!("{x}/{y}")))?;

    Ok(Figure {
        title: opts.title_or("Box Plot"),
        x_label: opts.xlabel_or(x),
        y_label: opts.ylabel_or(y),
        x_range: (-0.5, names.len() as f64 - 0.5),
        y_range: padded(lo, hi),
        x_ticks: XTicks::Categories(names),
        marks,
        legend: Vec::new(),
        polar: false,
    })
}

pub(crate) fn bar_figure(table: &Table, x: &str, y: Option<&str>, opts: &PlotOptions) -> Result<Figure, RenderError> {
    let (idx, names) = categories(column(table, x)?);
    let ys = y.map(|name| numeric(table, name)).transpose()?;
    let (groups, hue_names) = hue_groups(table, opts.hue.as_deref())?;
    let group_count = hue_names.len().max(1);
    let slot = 0.8 / group_count as f64;

    // per (category, group) cell: row count, then sum and count of present y values
    let cells = names.len() * group_count;
    let (mut rows, mut sums, mut present) = (vec![0usize; cells], vec![0.0f64; cells], vec![0usize; cells]);
    for r in 0..table.row_count() {
        let (Some(c), Some(g)) = (idx[r], groups[r]) else { continue };
        let cell = c * group_count + g;
        rows[cell] += 1;
        if let Some(v) = ys.and_then(|values| values[r]) {
            sums[cell] += v;
            present[cell] += 1;
        }
    }

    let mut marks = Vec::new();
    let (mut lo, mut hi) = (0.0f64, 0.0f64);
    for c in 0..names.len() {
        for g in 0..group_count {
            let cell = c * group_count + g;
            let height = match ys {
                Some(_) if present[cell] == 0 => continue,
                Some(_) => sums[cell] / present[cell] as f64,
                None => rows[cell] as f64,
            };
            lo = lo.min(height);
            hi = hi.max(height);
            let left = c as f64 - 0.4 + slot * g as f64;
            marks.push(Mark::Rect {
                x0: left,
                y0: 0.0,
                x1: left + slot,
                y1: height,
                color: if group_count > 1 { g } else { c },
            });
        }
    }
    if marks.is_empty() {
        return Err(RenderError::NoData(x.to_string()));
    }

    Ok(Figure {
        title: opts.title_or("Bar Plot"),
        x_label: opts.xlabel_or(x),
        y_label: opts.ylabel_or(y.unwrap_or("Count")),
        x_range: (-0.5, names.len() as f64 - 0.5),
        y_range: (lo * 1.05, if hi > 0.0 { hi * 1.05 } else { 1.0 }),
        x_ticks: XTicks::Categories(names),
        marks,
        legend: hue_names.into_iter().enumerate().map(|(i, n)| (n, i)).collect(),
        polar: false,
    })
}

pub(crate) fn pie_figure(table: &Table, col: &str, opts: &PlotOptions) -> Result<Figure, RenderError> {
    let (idx, names) = categories(column(table, col)?);
    let mut tally = vec![0usize; names.len()];
    for i in idx.iter().flatten() {
        tally[*i] += 1;
    }
    let mut counts: Vec<(String, usize)> = names.into_iter().zip(tally).collect();
    // descending by count, ties keep first appearance
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    let total: usize = counts.iter().map(|c| c.1).sum();
    if total == 0 {
        return Err(RenderError::NoData(col.to_string()));
    }

    // start at 12 o'clock, clockwise
    let mut start = 90.0;
    let marks = counts
        .into_iter()
        .enumerate()
        .map(|(i, (label, n))| {
            let share = n as f64 / total as f64;
            let sweep = -360.0 * share;
            let wedge = Mark::Wedge { start, sweep, color: i, label, share };
            start += sweep;
            wedge
        })
        .collect();

    Ok(Figure {
        title: opts.title_or("Pie Chart"),
        x_label: String::new(),
        y_label: String::new(),
        x_range: (-1.0, 1.0),
        y_range: (-1.0, 1.0),
        x_ticks: XTicks::Numeric,
        marks,
        legend: Vec::new(),
        polar: true,
    })
}

/// Distribution of one numeric column.
pub fn histogram(table: &Table, column: &str, opts: &PlotOptions, style: &PlotStyle) -> Result<RenderedImage, RenderError> {
    paint(&histogram_figure(table, column, opts)?, style)
}

/// Relationship between two numeric columns, optionally coloured by `hue`.
pub fn scatter(table: &Table, x: &str, y: &str, opts: &PlotOptions, style: &PlotStyle) -> Result<RenderedImage, RenderError> {
    paint(&scatter_figure(table, x, y, opts)?, style)
}

/// Mean of `y` over ordered `x`.
pub fn line(table: &Table, x: &str, y: &str, opts: &PlotOptions, style: &PlotStyle) -> Result<RenderedImage, RenderError> {
    paint(&line_figure(table, x, y, opts)?, style)
}

pub fn boxplot(table: &Table, x: &str, y: &str, opts: &PlotOptions, style: &PlotStyle) -> Result<RenderedImage, RenderError> {
    paint(&boxplot_figure(table, x, y, opts)?, style)
}

/// Mean of `y` per category of `x`, or category counts when `y` is `None`.
pub fn bar(table: &Table, x: &str, y: Option<&str>, opts: &PlotOptions, style: &PlotStyle) -> Result<RenderedImage, RenderError> {
    paint(&bar_figure(table, x, y, opts)?, style)
}

pub fn pie(table: &Table, column: &str, opts: &PlotOptions, style: &PlotStyle) -> Result<RenderedImage, RenderError> {
    paint(&pie_figure(table, column, opts)?, style)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    fn sample() -> Table {
        Table::new(vec![
            Column::numeric("age", vec![Some(20.0), Some(30.0), Some(30.0), None, Some(50.0)]),
            Column::numeric("score", vec![Some(1.0), Some(2.0), Some(4.0), Some(8.0), Some(5.0)]),
            Column::categorical("city", vec![Some("Pune"), Some("Agra"), Some("Pune"), Some("Pune"), None]),
        ])
        .unwrap()
    }

    #[test]
    fn histogram_counts_every_present_value() {
        let opts = PlotOptions { bins: Some(4), ..Default::default() };
        let fig = histogram_figure(&sample(), "age", &opts).unwrap();
        let total: f64 = fig
            .marks
            .iter()
            .filter_map(|m| match m {
                Mark::Rect { y1, .. } => Some(*y1),
                _ => None,
            })
            .sum();
        assert_eq!(total, 4.0);
        assert_eq!(fig.title, "Histogram");
        assert_eq!(fig.x_label, "age");
        assert_eq!(fig.y_label, "Frequency");
    }

    #[test]
    fn histogram_rejects_categorical() {
        let err = histogram_figure(&sample(), "city", &PlotOptions::default()).unwrap_err();
        assert!(matches!(err, RenderError::ColumnType { .. }));
    }

    #[test]
    fn labels_default_to_column_names() {
        let opts = PlotOptions { title: Some("Age vs score".into()), ..Default::default() };
        let fig = scatter_figure(&sample(), "age", "score", &opts).unwrap();
        assert_eq!(fig.title, "Age vs score");
        assert_eq!((fig.x_label.as_str(), fig.y_label.as_str()), ("age", "score"));
        assert_eq!(fig.marks.len(), 4);
    }

    #[test]
    fn line_averages_duplicate_x() {
        let fig = line_figure(&sample(), "age", "score", &PlotOptions::default()).unwrap();
        let Mark::Path { points, .. } = &fig.marks[0] else { panic!("expected path") };
        assert_eq!(points, &vec![(20.0, 1.0), (30.0, 3.0), (50.0, 5.0)]);
    }

    #[test]
    fn bar_counts_without_y() {
        let fig = bar_figure(&sample(), "city", None, &PlotOptions::default()).unwrap();
        let heights: Vec<f64> = fig
            .marks
            .iter()
            .filter_map(|m| match m {
                Mark::Rect { y1, .. } => Some(*y1),
                _ => None,
            })
            .collect();
        assert_eq!(heights, vec![3.0, 1.0]);
        assert_eq!(fig.y_label, "Count");
        assert_eq!(fig.x_ticks, XTicks::Categories(vec!["Pune".into(), "Agra".into()]));
    }

    #[test]
    fn bar_means_with_y() {
        let fig = bar_figure(&sample(), "city", Some("score"), &PlotOptions::default()).unwrap();
        let Mark::Rect { y1, .. } = fig.marks[0] else { panic!("expected rect") };
        assert!((y1 - 13.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn histogram_bins_are_capped() {
        let opts = PlotOptions { bins: Some(usize::MAX), ..Default::default() };
        let fig = histogram_figure(&sample(), "age", &opts).unwrap();
        let bars = fig.marks.iter().filter(|m| matches!(m, Mark::Rect { .. })).count();
        assert_eq!(bars, MAX_BINS);

        let opts = PlotOptions { bins: Some(0), ..Default::default() };
        let fig = histogram_figure(&sample(), "age", &opts).unwrap();
        assert_eq!(fig.marks.iter().filter(|m| matches!(m, Mark::Rect { .. })).count(), 1);
    }

    #[test]
    fn pie_over_unique_ids_gets_one_wedge_each() {
        let ids: Vec<String> = (0..20_000).map(|i| format!("u{i}")).collect();
        let table = Table::new(vec![Column::categorical("id", ids.iter().map(|s| Some(s.as_str())).collect())]).unwrap();
        let fig = pie_figure(&table, "id", &PlotOptions::default()).unwrap();
        assert_eq!(fig.marks.len(), 20_000);
        let Mark::Wedge { label, share, .. } = &fig.marks[0] else { panic!("expected wedge") };
        assert_eq!(label, "u0");
        assert!((share - 1.0 / 20_000.0).abs() < 1e-12);
    }

    #[test]
    fn pie_is_clockwise_from_top_and_sums_to_one() {
        let fig = pie_figure(&sample(), "city", &PlotOptions::default()).unwrap();
        assert!(fig.polar);
        let wedges: Vec<(f64, f64, f64)> = fig
            .marks
            .iter()
            .filter_map(|m| match m {
                Mark::Wedge { start, sweep, share, .. } => Some((*start, *sweep, *share)),
                _ => None,
            })
            .collect();
        assert_eq!(wedges[0].0, 90.0);
        assert!(wedges.iter().all(|w| w.1 < 0.0));
        assert!((wedges.iter().map(|w| w.2).sum::<f64>() - 1.0).abs() < 1e-9);
        assert!((wedges[0].2 - 0.75).abs() < 1e-9);
    }

    #[test]
    fn boxplot_one_box_per_category() {
        let fig = boxplot_figure(&sample(), "city", "score", &PlotOptions::default()).unwrap();
        assert_eq!(fig.marks.len(), 2);
    }

    #[test]
    fn unknown_column_is_reported() {
        let err = pie_figure(&sample(), "nope", &PlotOptions::default()).unwrap_err();
        assert_eq!(err.to_string(), "column `nope` not found");
    }
}
