//! Annotation: ask the hosted model for a rating of every row.
//!
//! Rows are processed in source order. A failed model call never aborts the
//! stage: the row gets an empty rating, the failure is logged with the row's
//! `prompt_id`, and it is listed in the [`AnnotationReport`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use arrow::array::StringArray;
use futures::stream::{self, StreamExt};

use super::{AnnotateArgs, AnnotationMode, StageContext, StageError};
use crate::error::LlmError;
use crate::llm::{GenerationRequest, ModelId, TextGenerator};
use crate::table::csv::{from_csv_bytes, to_csv_bytes, CSV_CONTENT_TYPE};
use crate::table::{GENRES, PROMPT_ID, RATING, TITLE};

/// A model-provided rating, already cut to its first paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rating(pub String);

impl Rating {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Result of the annotation stage.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnnotationReport {
    pub rows: usize,
    /// Row indexes whose model call failed and were left with an empty rating.
    pub failed_rows: Vec<usize>,
}

/// Build the rating prompt for one movie.
pub fn build_prompt(genres: &str, title: &str) -> String {
    format!(
        "You are movie critic, Rate the {} movie {} based on your knowledge on scale of 1-5, \
         with 1 being the lowest and 5 being the best. reply just score in format x/5 ",
        genres, title
    )
}

/// Text before the first blank line.
pub fn first_paragraph(text: &str) -> &str {
    text.split("\n\n").next().unwrap_or_default()
}

/// Ask the model for one rating.
///
/// With a `timeout`, a call that does not finish in time fails with
/// [`LlmError::Timeout`].
pub async fn rate_row(
    generator: &dyn TextGenerator,
    project_id: &str,
    model: &ModelId,
    genres: &str,
    title: &str,
    timeout: Option<Duration>,
) -> Result<Rating, LlmError> {
    let request = GenerationRequest::new(project_id, model.clone(), build_prompt(genres, title));
    let call = generator.generate(request);

    let response = match timeout {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| LlmError::Timeout {
                millis: limit.as_millis() as u64,
            })??,
        None => call.await?,
    };
    if response.blocked {
        tracing::warn!(title = %title, "Model response flagged as blocked");
    }

    Ok(Rating(first_paragraph(&response.text).to_string()))
}

struct RowInput<'a> {
    index: usize,
    prompt_id: Option<&'a str>,
    genres: &'a str,
    title: &'a str,
}

/// Rate one row, collapsing a failure to an empty rating.
///
/// Returns the rating text and whether the call failed.
async fn annotate_row(
    ctx: &StageContext,
    args: &AnnotateArgs,
    row: RowInput<'_>,
) -> (String, bool) {
    let model = &args.model;
    let start = Instant::now();
    let outcome = rate_row(
        ctx.generator.as_ref(),
        &args.project_id,
        model,
        row.genres,
        row.title,
        ctx.annotation.call_timeout,
    )
    .await;
    let latency = start.elapsed().as_secs_f64();

    ctx.metrics
        .record_llm_request(model.as_str(), outcome.is_ok(), latency);

    match outcome {
        Ok(rating) => {
            tracing::debug!(
                row = row.index,
                prompt_id = row.prompt_id.unwrap_or(""),
                rating = %rating.as_str(),
                "Row rated"
            );
            (rating.0, false)
        }
        Err(e) => {
            tracing::warn!(
                row = row.index,
                prompt_id = row.prompt_id.unwrap_or(""),
                error = %e,
                "Model call failed; leaving rating empty"
            );
            (String::new(), true)
        }
    }
}

/// Read the intermediate table, rate every row, write the augmented table.
pub async fn run_annotate(
    ctx: &StageContext,
    args: &AnnotateArgs,
) -> Result<AnnotationReport, StageError> {
    let bytes = ctx.store.get(&args.bucket, &args.input_path).await?;
    let table = from_csv_bytes(&bytes)?;

    let titles = table.string_column(TITLE)?;
    let genres = table.string_column(GENRES)?;
    let prompt_ids = if table.has_column(PROMPT_ID) {
        table.string_column(PROMPT_ID)?
    } else {
        vec![None; table.num_rows()]
    };

    tracing::info!(
        bucket = %args.bucket,
        path = %args.input_path,
        rows = table.num_rows(),
        project_id = %args.project_id,
        model = %args.model,
        mode = ?ctx.annotation.mode,
        "Calling model for ratings"
    );

    let rows = (0..table.num_rows()).map(|i| RowInput {
        index: i,
        prompt_id: prompt_ids[i].as_deref(),
        genres: genres[i].as_deref().unwrap_or(""),
        title: titles[i].as_deref().unwrap_or(""),
    });

    let outcomes: Vec<(String, bool)> = match ctx.annotation.mode {
        AnnotationMode::Sequential => {
            let mut outcomes = Vec::with_capacity(table.num_rows());
            for row in rows {
                outcomes.push(annotate_row(ctx, args, row).await);
            }
            outcomes
        }
        AnnotationMode::Bounded { max_workers } => {
            stream::iter(rows)
                .map(|row| annotate_row(ctx, args, row))
                .buffered(max_workers.max(1))
                .collect()
                .await
        }
    };

    let mut ratings = Vec::with_capacity(outcomes.len());
    let mut failed_rows = Vec::new();
    for (index, (rating, failed)) in outcomes.into_iter().enumerate() {
        if failed {
            failed_rows.push(index);
        }
        ratings.push(rating);
    }

    let rows = table.num_rows();
    let table = table.with_column(RATING, Arc::new(StringArray::from(ratings)))?;
    let bytes = to_csv_bytes(&table)?;
    ctx.store
        .put(&args.bucket, &args.output_path, bytes, CSV_CONTENT_TYPE)
        .await?;

    if !failed_rows.is_empty() {
        tracing::warn!(
            failed = failed_rows.len(),
            rows = rows,
            "Some rows were left without a rating"
        );
    }
    tracing::info!(
        bucket = %args.bucket,
        path = %args.output_path,
        rows = rows,
        "Annotated rows written"
    );

    Ok(AnnotationReport { rows, failed_rows })
}
