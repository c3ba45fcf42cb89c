//! Export: project the annotated table and replace the destination table.

use std::sync::{Arc, OnceLock};

use arrow::array::StringArray;
use arrow::compute::cast;
use arrow::datatypes::DataType;
use regex::Regex;

use super::{ExportArgs, StageContext, StageError};
use crate::error::TableError;
use crate::table::csv::from_csv_bytes;
use crate::table::{Table, GENRES, MOVIE_ID, PROMPT_ID, RATING, TITLE};
use crate::warehouse::TableName;

/// Columns of the destination table, in order.
pub const EXPORT_COLUMNS: [&str; 5] = [PROMPT_ID, MOVIE_ID, GENRES, TITLE, RATING];

/// Result of the export stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub rows: usize,
    pub table: TableName,
}

fn fraction_of_five() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)\s*/\s*5\b").expect("valid rating regex"))
}

/// Normalize a raw model response into a rating token.
///
/// A `n/5` fraction anywhere in the text becomes `"n/5"`. Anything else is
/// returned trimmed and unquoted. The text is never evaluated.
pub fn normalize_rating(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    match fraction_of_five().captures(trimmed) {
        Some(caps) => format!("{}/5", &caps[1]),
        None => trimmed.to_string(),
    }
}

/// Select the export columns, normalize ratings and type the id columns.
pub fn prepare_export(table: &Table) -> Result<Table, StageError> {
    let projected = table.project(&EXPORT_COLUMNS)?;

    let ratings: Vec<String> = projected
        .string_column(RATING)?
        .into_iter()
        .map(|r| normalize_rating(r.as_deref().unwrap_or("")))
        .collect();

    let mut out = projected.with_column(RATING, Arc::new(StringArray::from(ratings)))?;
    for name in [PROMPT_ID, MOVIE_ID] {
        let ids = cast(out.column(name)?, &DataType::Int64).map_err(TableError::from)?;
        out = out.with_column(name, ids)?;
    }
    Ok(out)
}

/// Read the annotated artifact and fully replace `args.output_table`.
pub async fn run_export(ctx: &StageContext, args: &ExportArgs) -> Result<ExportReport, StageError> {
    let name = TableName::parse(&args.output_table, &args.project_id)?;

    let bytes = ctx.store.get(&args.bucket, &args.input_path).await?;
    let table = from_csv_bytes(&bytes)?;
    let export = prepare_export(&table)?;
    let rows = export.num_rows();

    tracing::info!(
        bucket = %args.bucket,
        path = %args.input_path,
        table = %name,
        rows = rows,
        "Replacing destination table"
    );
    ctx.warehouse.replace_table(&name, &export).await?;

    Ok(ExportReport { rows, table: name })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    #[test]
    fn test_normalize_rating() {
        assert_eq!(normalize_rating("4/5"), "4/5");
        assert_eq!(normalize_rating(" 4 / 5 "), "4/5");
        assert_eq!(normalize_rating("\"3/5\""), "3/5");
        assert_eq!(normalize_rating("Rating: 4.5/5."), "4.5/5");
        assert_eq!(normalize_rating(" 4 "), "4");
        assert_eq!(normalize_rating("__import__('os')"), "__import__('os')");
        assert_eq!(normalize_rating(""), "");
        assert_eq!(normalize_rating("4/50"), "4/50");
    }

    #[test]
    fn test_prepare_export_projects_in_order() {
        let table = Table::from_string_columns(vec![
            ("prompt_id", vec![s("0"), s("1")]),
            ("movieId", vec![s("10"), s("20")]),
            ("title", vec![s("Tangled"), s("Rubber")]),
            ("genres", vec![s("Animation"), s("Comedy")]),
            ("extra", vec![s("x"), s("y")]),
            ("rating", vec![s(" 4/5"), None]),
        ])
        .expect("table");

        let out = prepare_export(&table).expect("export");
        assert_eq!(
            out.column_names(),
            vec!["prompt_id", "movieId", "genres", "title", "rating"]
        );
        assert_eq!(out.column(PROMPT_ID).expect("col").data_type(), &DataType::Int64);
        assert_eq!(out.column(MOVIE_ID).expect("col").data_type(), &DataType::Int64);

        let records = out.records().expect("records");
        assert_eq!(records[0].rating.as_deref(), Some("4/5"));
        assert_eq!(records[1].rating.as_deref(), Some(""));
        assert_eq!(records[1].movie_id, Some(20));
    }

    #[test]
    fn test_prepare_export_missing_movie_id() {
        let table = Table::from_string_columns(vec![
            ("prompt_id", vec![s("0")]),
            ("title", vec![s("Tangled")]),
            ("genres", vec![s("Animation")]),
            ("rating", vec![s("4/5")]),
        ])
        .expect("table");

        match prepare_export(&table) {
            Err(StageError::Table(TableError::MissingColumn(col))) => assert_eq!(col, "movieId"),
            other => panic!("expected missing column, got {:?}", other.map(|t| t.num_rows())),
        }
    }
}
