//! In-memory tables passed between pipeline stages.
//!
//! A [`Table`] wraps a single Arrow `RecordBatch`. Stages add, replace and
//! project columns by name; row order is never changed.
//!
//! # Example
//!
//! ```ignore
//! use rating_forge::table::{csv, Table};
//!
//! let table = csv::from_csv_bytes(&bytes)?;
//! let titles = table.string_column("title")?;
//! let projected = table.project(&["prompt_id", "title"])?;
//! ```

pub mod csv;

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, StringArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;

use crate::error::TableError;

/// Column holding the dense 0-based row identifier assigned at ingestion.
pub const PROMPT_ID: &str = "prompt_id";
/// Column holding the source movie identifier.
pub const MOVIE_ID: &str = "movieId";
/// Column holding the (normalized) movie title.
pub const TITLE: &str = "title";
/// Column holding the `|`-delimited genre tags.
pub const GENRES: &str = "genres";
/// Column holding the model response.
pub const RATING: &str = "rating";

/// One logical row of the working table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub prompt_id: Option<i64>,
    pub movie_id: Option<i64>,
    pub title: String,
    pub genres: String,
    /// `None` until the annotation stage has run.
    pub rating: Option<String>,
}

/// An ordered sequence of rows sharing a schema.
#[derive(Debug, Clone)]
pub struct Table {
    batch: RecordBatch,
}

impl Table {
    /// Wraps an existing record batch.
    pub fn new(batch: RecordBatch) -> Self {
        Self { batch }
    }

    /// Builds a table of nullable string columns, in the given order.
    pub fn from_string_columns(columns: Vec<(&str, Vec<Option<String>>)>) -> Result<Self, TableError> {
        let expected = columns.first().map(|(_, values)| values.len()).unwrap_or(0);

        let mut fields = Vec::with_capacity(columns.len());
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(columns.len());
        for (name, values) in columns {
            if values.len() != expected {
                return Err(TableError::LengthMismatch {
                    column: name.to_string(),
                    expected,
                    actual: values.len(),
                });
            }
            fields.push(Field::new(name, DataType::Utf8, true));
            arrays.push(Arc::new(StringArray::from(values)));
        }

        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;
        Ok(Self { batch })
    }

    /// Borrow the underlying record batch.
    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// Column names in schema order.
    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.batch.schema().index_of(name).is_ok()
    }

    /// Returns the named column as an Arrow array.
    pub fn column(&self, name: &str) -> Result<&ArrayRef, TableError> {
        self.batch
            .column_by_name(name)
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))
    }

    /// Returns the named column rendered as optional strings.
    ///
    /// Non-string columns are cast to strings first, so an integer column
    /// read back from parquet yields the same values as one read from CSV.
    pub fn string_column(&self, name: &str) -> Result<Vec<Option<String>>, TableError> {
        let column = self.column(name)?;
        let as_strings = match column.data_type() {
            DataType::Utf8 => column.clone(),
            other => cast(column, &DataType::Utf8).map_err(|_| TableError::NotAStringColumn {
                column: name.to_string(),
                actual: other.to_string(),
            })?,
        };

        let strings = as_strings
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| TableError::NotAStringColumn {
                column: name.to_string(),
                actual: as_strings.data_type().to_string(),
            })?;

        Ok((0..strings.len())
            .map(|i| {
                if strings.is_null(i) {
                    None
                } else {
                    Some(strings.value(i).to_string())
                }
            })
            .collect())
    }

    /// Replaces the named column in place, or appends it when absent.
    pub fn with_column(self, name: &str, values: ArrayRef) -> Result<Self, TableError> {
        match self.batch.schema().index_of(name) {
            Ok(index) => self.put_column(index, name, values, true),
            Err(_) => {
                let end = self.batch.num_columns();
                self.put_column(end, name, values, false)
            }
        }
    }

    /// Inserts a new column at `index`, shifting later columns right.
    pub fn insert_column(self, index: usize, name: &str, values: ArrayRef) -> Result<Self, TableError> {
        let end = self.batch.num_columns();
        self.put_column(index.min(end), name, values, false)
    }

    fn put_column(
        self,
        index: usize,
        name: &str,
        values: ArrayRef,
        replace: bool,
    ) -> Result<Self, TableError> {
        if values.len() != self.num_rows() {
            return Err(TableError::LengthMismatch {
                column: name.to_string(),
                expected: self.num_rows(),
                actual: values.len(),
            });
        }

        let schema = self.batch.schema();
        let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
        let mut columns: Vec<ArrayRef> = self.batch.columns().to_vec();

        let field = Field::new(name, values.data_type().clone(), true);
        if replace {
            fields[index] = field;
            columns[index] = values;
        } else {
            fields.insert(index, field);
            columns.insert(index, values);
        }

        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?;
        Ok(Self { batch })
    }

    /// Selects exactly `names`, in that order.
    ///
    /// Fails with [`TableError::MissingColumn`] naming the first absent column.
    pub fn project(&self, names: &[&str]) -> Result<Self, TableError> {
        let schema = self.batch.schema();
        let indices = names
            .iter()
            .map(|name| {
                schema
                    .index_of(name)
                    .map_err(|_| TableError::MissingColumn(name.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            batch: self.batch.project(&indices)?,
        })
    }

    /// Reads the rows back as typed records.
    ///
    /// `title` and `genres` are required; the other columns are optional and
    /// unparseable identifiers read as `None`.
    pub fn records(&self) -> Result<Vec<Record>, TableError> {
        let titles = self.string_column(TITLE)?;
        let genres = self.string_column(GENRES)?;
        let prompt_ids = self.optional_column(PROMPT_ID)?;
        let movie_ids = self.optional_column(MOVIE_ID)?;
        let ratings = self.optional_column(RATING)?;

        Ok((0..self.num_rows())
            .map(|i| Record {
                prompt_id: parse_id(&prompt_ids[i]),
                movie_id: parse_id(&movie_ids[i]),
                title: titles[i].clone().unwrap_or_default(),
                genres: genres[i].clone().unwrap_or_default(),
                rating: if self.has_column(RATING) {
                    Some(ratings[i].clone().unwrap_or_default())
                } else {
                    None
                },
            })
            .collect())
    }

    fn optional_column(&self, name: &str) -> Result<Vec<Option<String>>, TableError> {
        if self.has_column(name) {
            self.string_column(name)
        } else {
            Ok(vec![None; self.num_rows()])
        }
    }
}

fn parse_id(value: &Option<String>) -> Option<i64> {
    value.as_deref().and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;

    fn sample() -> Table {
        Table::from_string_columns(vec![
            ("title", vec![Some("Tangled".to_string()), Some("Rubber".to_string())]),
            ("genres", vec![Some("Animation".to_string()), Some("Action|Comedy".to_string())]),
        ])
        .expect("table should build")
    }

    #[test]
    fn test_from_string_columns_length_mismatch() {
        let result = Table::from_string_columns(vec![
            ("a", vec![Some("1".to_string())]),
            ("b", vec![]),
        ]);
        assert!(matches!(result, Err(TableError::LengthMismatch { .. })));
    }

    #[test]
    fn test_with_column_appends_then_replaces() {
        let table = sample();
        let rating: ArrayRef = Arc::new(StringArray::from(vec!["4/5", "2/5"]));
        let table = table.with_column(RATING, rating).expect("append");
        assert_eq!(table.column_names(), vec!["title", "genres", "rating"]);

        let rating: ArrayRef = Arc::new(StringArray::from(vec!["5/5", ""]));
        let table = table.with_column(RATING, rating).expect("replace");
        assert_eq!(table.column_names(), vec!["title", "genres", "rating"]);
        assert_eq!(
            table.string_column(RATING).expect("rating"),
            vec![Some("5/5".to_string()), Some(String::new())]
        );
    }

    #[test]
    fn test_insert_column_at_front() {
        let ids: ArrayRef = Arc::new(Int64Array::from(vec![0, 1]));
        let table = sample().insert_column(0, PROMPT_ID, ids).expect("insert");
        assert_eq!(table.column_names(), vec!["prompt_id", "title", "genres"]);
        assert_eq!(
            table.string_column(PROMPT_ID).expect("cast to strings"),
            vec![Some("0".to_string()), Some("1".to_string())]
        );
    }

    #[test]
    fn test_insert_column_past_end_appends() {
        let ids: ArrayRef = Arc::new(Int64Array::from(vec![7, 8]));
        let table = sample().insert_column(10, "movieId", ids).expect("insert");
        assert_eq!(table.column_names(), vec!["title", "genres", "movieId"]);
    }

    #[test]
    fn test_with_column_rejects_wrong_length() {
        let rating: ArrayRef = Arc::new(StringArray::from(vec!["4/5"]));
        let err = sample().with_column(RATING, rating).unwrap_err();
        assert!(matches!(err, TableError::LengthMismatch { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn test_project_orders_and_reports_missing() {
        let table = sample();
        let projected = table.project(&["genres", "title"]).expect("project");
        assert_eq!(projected.column_names(), vec!["genres", "title"]);

        let err = table.project(&["title", "movieId"]).unwrap_err();
        assert!(matches!(err, TableError::MissingColumn(ref c) if c == "movieId"));
    }

    #[test]
    fn test_records_without_rating_column() {
        let records = sample().records().expect("records");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "Tangled");
        assert_eq!(records[1].genres, "Action|Comedy");
        assert!(records.iter().all(|r| r.rating.is_none() && r.prompt_id.is_none()));
    }
}
