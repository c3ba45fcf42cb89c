//! CSV encoding for intermediate artifacts.
//!
//! Tables are written with a header row and no index column. On read every
//! column is typed as a nullable string; empty cells read back as nulls.

use std::io::Cursor;
use std::sync::Arc;

use arrow::compute::concat_batches;
use arrow::csv::reader::Format;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::datatypes::{DataType, Field, Schema};

use super::Table;
use crate::error::TableError;

/// Content type used when uploading CSV artifacts.
pub const CSV_CONTENT_TYPE: &str = "text/csv";

/// Serialize a table to CSV bytes.
pub fn to_csv_bytes(table: &Table) -> Result<Vec<u8>, TableError> {
    let mut buf = Vec::new();
    {
        let mut writer = WriterBuilder::new().with_header(true).build(&mut buf);
        writer.write(table.batch())?;
    }
    Ok(buf)
}

/// Parse CSV bytes (with a header row) into a table of string columns.
pub fn from_csv_bytes(bytes: &[u8]) -> Result<Table, TableError> {
    let (header, _) = Format::default()
        .with_header(true)
        .infer_schema(Cursor::new(bytes), Some(0))?;

    if header.fields().is_empty() {
        return Err(TableError::MissingHeader);
    }

    let fields: Vec<Field> = header
        .fields()
        .iter()
        .map(|f| Field::new(f.name(), DataType::Utf8, true))
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let reader = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .build(Cursor::new(bytes))?;
    let batches = reader.collect::<Result<Vec<_>, _>>()?;
    let batch = concat_batches(&schema, &batches)?;

    Ok(Table::new(batch))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_and_quoting() {
        let table = Table::from_string_columns(vec![
            ("title", vec![Some("Lock, Stock".to_string())]),
            ("rating", vec![Some("4/5".to_string())]),
        ])
        .expect("table");

        let bytes = to_csv_bytes(&table).expect("encode");
        let text = String::from_utf8(bytes).expect("utf8");
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("title,rating"));
        assert_eq!(lines.next(), Some("\"Lock, Stock\",4/5"));
    }

    #[test]
    fn test_read_preserves_order_and_reads_empty_as_null() {
        let csv = "prompt_id,title,rating\n0,Tangled,4/5\n1,Rubber,\n2,Toy Story 3,3/5\n";
        let table = from_csv_bytes(csv.as_bytes()).expect("decode");

        assert_eq!(table.num_rows(), 3);
        assert_eq!(table.column_names(), vec!["prompt_id", "title", "rating"]);
        assert_eq!(
            table.string_column("title").expect("title"),
            vec![
                Some("Tangled".to_string()),
                Some("Rubber".to_string()),
                Some("Toy Story 3".to_string())
            ]
        );
        assert_eq!(table.string_column("rating").expect("rating")[1], None);
    }

    #[test]
    fn test_header_only_input_yields_empty_table() {
        let table = from_csv_bytes(b"prompt_id,title\n").expect("decode");
        assert_eq!(table.num_rows(), 0);
        assert_eq!(table.column_names(), vec!["prompt_id", "title"]);
    }

    #[test]
    fn test_empty_input_is_rejected() {
        assert!(matches!(from_csv_bytes(b""), Err(TableError::MissingHeader)));
    }
}
