use std::collections::HashMap;

use crate::table::{stats::Describe, Column, ColumnType, Table};

/// Shape, column names, dtypes, descriptive statistics and missing counts, as one text block.
pub fn get_dataframe_info(table: &Table) -> String {
    let (rows, cols) = table.shape();
    let columns = table.columns();
    let names = table.column_names().join(", ");

    let info = [
        format!("DataFrame Shape: ({rows}, {cols})"),
        format!("\nColumns:\n{names}"),
        format!("\nDataTypes:\n{}", per_column(columns, |c| c.dtype().to_string())),
        format!("\nSummary Statistics:\n{}", describe(columns)),
        format!("\nMissing Values:\n{}", per_column(columns, |c| c.missing_count().to_string())),
    ];
    info.join("\n")
}

fn per_column(columns: &[Column], value: impl Fn(&Column) -> String) -> String {
    let width = columns.iter().map(|c| c.name().len()).max().unwrap_or(0);
    columns
        .iter()
        .map(|c| format!("{:<width$}    {}", c.name(), value(c)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn describe(columns: &[Column]) -> String {
    let numeric: Vec<&Column> = columns.iter().filter(|c| c.kind() == ColumnType::Numeric).collect();
    if !numeric.is_empty() {
        let labels = ["count", "mean", "std", "min", "25%", "50%", "75%", "max"];
        let cells = numeric
            .iter()
            .map(|c| {
                let d = Describe::of(c.as_numeric().unwrap_or_default());
                let values = d.rows().iter().map(|(_, v)| fixed(*v)).collect();
                (c.name().to_string(), values)
            })
            .collect();
        return grid(&labels, cells);
    }
    if columns.is_empty() {
        return "Empty DataFrame".to_string();
    }
    let labels = ["count", "unique", "top", "freq"];
    let cells = columns
        .iter()
        .map(|c| (c.name().to_string(), categorical_summary(c)))
        .collect();
    grid(&labels, cells)
}

fn fixed(v: Option<f64>) -> String {
    match v {
        Some(x) if x.is_finite() => format!("{x:.6}"),
        _ => "NaN".to_string(),
    }
}

fn categorical_summary(col: &Column) -> Vec<String> {
    // first-appearance order is kept in `counts`; `slots` maps a value to its entry
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut slots: HashMap<String, usize> = HashMap::new();
    for row in 0..col.len() {
        let Some(text) = col.text_at(row) else { continue };
        match slots.get(&text) {
            Some(&slot) => counts[slot].1 += 1,
            None => {
                slots.insert(text.clone(), counts.len());
                counts.push((text, 1));
            }
        }
    }
    let present: usize = counts.iter().map(|(_, n)| n).sum();
    // First value reaching the highest count wins ties.
    let top = counts
        .iter()
        .fold(None::<&(String, usize)>, |best, cur| match best {
            Some(b) if b.1 >= cur.1 => Some(b),
            _ => Some(cur),
        });
    match top {
        Some((value, freq)) => vec![present.to_string(), counts.len().to_string(), value.clone(), freq.to_string()],
        None => vec!["0".into(), "0".into(), "NaN".into(), "NaN".into()],
    }
}

/// Row labels down the left, one right-aligned column per entry.
fn grid(labels: &[&str], columns: Vec<(String, Vec<String>)>) -> String {
    let label_width = labels.iter().map(|l| l.len()).max().unwrap_or(0);
    let widths: Vec<usize> = columns
        .iter()
        .map(|(name, values)| values.iter().map(String::len).chain([name.len()]).max().unwrap_or(0))
        .collect();

    let mut lines = Vec::with_capacity(labels.len() + 1);
    let mut header = " ".repeat(label_width);
    for ((name, _), w) in columns.iter().zip(&widths) {
        header.push_str(&format!("  {name:>w$}"));
    }
    lines.push(header);
    for (i, label) in labels.iter().enumerate() {
        let mut line = format!("{label:<label_width$}");
        for ((_, values), w) in columns.iter().zip(&widths) {
            let cell = values.get(i).map(String::as_str).unwrap_or("");
            line.push_str(&format!("  {cell:>w$}"));
        }
        lines.push(line);
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_only_tables_use_count_unique_top_freq() {
        let table = Table::new(vec![Column::categorical(
            "city",
            vec![Some("Pune"), Some("Agra"), Some("Agra"), None],
        )])
        .unwrap();
        let info = get_dataframe_info(&table);
        assert!(info.contains("unique"));
        let top_line = info.lines().find(|l| l.starts_with("top")).unwrap();
        assert!(top_line.ends_with("Agra"));
        let count_line = info.lines().find(|l| l.starts_with("count")).unwrap();
        assert!(count_line.ends_with('3'));
    }

    #[test]
    fn high_cardinality_text_counts_every_distinct_value() {
        let ids: Vec<String> = (0..20_000).map(|i| format!("row-{i}")).collect();
        let mut values: Vec<Option<&str>> = ids.iter().map(|s| Some(s.as_str())).collect();
        values.push(Some("row-7"));
        let table = Table::new(vec![Column::categorical("id", values)]).unwrap();

        let summary = categorical_summary(&table.columns()[0]);
        assert_eq!(summary, vec!["20001", "20000", "row-7", "2"]);
    }

    #[test]
    fn describe_uses_six_decimals_and_nan() {
        let table = Table::new(vec![Column::numeric("x", vec![Some(1.0)])]).unwrap();
        let info = get_dataframe_info(&table);
        let mean = info.lines().find(|l| l.starts_with("mean")).unwrap();
        assert!(mean.ends_with("1.000000"));
        let std = info.lines().find(|l| l.starts_with("std")).unwrap();
        assert!(std.ends_with("NaN"));
    }
}
