//! Ingestion: read the source rows and write the first intermediate artifact.

use std::sync::{Arc, OnceLock};

use arrow::array::{ArrayRef, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use regex::Regex;

use super::{IngestArgs, IngestSource, StageContext, StageError};
use crate::error::TableError;
use crate::table::csv::{to_csv_bytes, CSV_CONTENT_TYPE};
use crate::table::{Table, GENRES, MOVIE_ID, PROMPT_ID, TITLE};
use crate::warehouse::TableName;

/// Result of the ingestion stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub rows: usize,
}

fn title_year_suffix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.*?)\s*\(\d{4}\)\s*$").expect("valid title regex"))
}

/// Drop one trailing ` (YYYY)` suffix from a title.
///
/// Titles without the suffix, or consisting only of it, are returned unchanged.
pub fn normalize_title(title: &str) -> String {
    match title_year_suffix().captures(title) {
        Some(caps) if !caps[1].trim().is_empty() => caps[1].to_string(),
        _ => title.to_string(),
    }
}

/// The built-in three-row source used when no warehouse table is read.
pub fn sample_table() -> Result<Table, TableError> {
    let schema = Arc::new(Schema::new(vec![
        Field::new(MOVIE_ID, DataType::Int64, false),
        Field::new(TITLE, DataType::Utf8, false),
        Field::new(GENRES, DataType::Utf8, false),
    ]));

    let movie_ids: ArrayRef = Arc::new(Int64Array::from(vec![1, 2, 3]));
    let titles: ArrayRef = Arc::new(StringArray::from(vec![
        "Tangled (2010)",
        "Rubber (2010)",
        "Toy Story 3 (2010)",
    ]));
    let genres: ArrayRef = Arc::new(StringArray::from(vec![
        "Animation|Children|Comedy|Fantasy|Musical|Romance|IMAX",
        "Action|Adventure|Comedy|Crime|Drama|Film-Noir|Horror|Mystery|Thriller|Western",
        "Adventure|Animation|Children|Comedy|Fantasy|IMAX",
    ]));

    let batch = RecordBatch::try_new(schema, vec![movie_ids, titles, genres])?;
    Ok(Table::new(batch))
}

/// Assign dense 0-based prompt ids and normalize titles.
///
/// `prompt_id` becomes the first column; an existing `prompt_id` column is
/// replaced in place.
pub fn prepare_table(table: Table) -> Result<Table, StageError> {
    let titles: Vec<Option<String>> = table
        .string_column(TITLE)?
        .into_iter()
        .map(|t| t.map(|t| normalize_title(&t)))
        .collect();

    let ids: ArrayRef = Arc::new(Int64Array::from_iter_values(0..table.num_rows() as i64));
    let table = if table.has_column(PROMPT_ID) {
        tracing::warn!("Source already has a prompt_id column; replacing it");
        table.with_column(PROMPT_ID, ids)?
    } else {
        table.insert_column(0, PROMPT_ID, ids)?
    };

    Ok(table.with_column(TITLE, Arc::new(StringArray::from(titles)))?)
}

/// Read the source, prepare it, and write it to `args.bucket/args.output_path`.
pub async fn run_ingest(ctx: &StageContext, args: &IngestArgs) -> Result<IngestReport, StageError> {
    let source = match ctx.ingest.source {
        IngestSource::Sample => {
            tracing::info!(input_table = %args.input_table, "Using built-in sample rows");
            sample_table()?
        }
        IngestSource::Warehouse => {
            let name = TableName::parse(&args.input_table, &args.project_id)?;
            tracing::info!(input_table = %name, limit = ?ctx.ingest.row_limit, "Reading source table");
            ctx.warehouse.read_table(&name, ctx.ingest.row_limit).await?
        }
    };

    let table = prepare_table(source)?;
    let rows = table.num_rows();

    let bytes = to_csv_bytes(&table)?;
    ctx.store
        .put(&args.bucket, &args.output_path, bytes, CSV_CONTENT_TYPE)
        .await?;

    tracing::info!(
        bucket = %args.bucket,
        path = %args.output_path,
        rows = rows,
        "Ingested rows written"
    );
    Ok(IngestReport { rows })
}
