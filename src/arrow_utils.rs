use arrow::array::{Array, ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

use crate::errors::{Result, SaveError};

/// Builds a single-row payload of nullable Utf8 columns from `(column, value)` pairs.
pub fn payload_from_pairs(pairs: &[(&str, &str)]) -> Result<RecordBatch> {
    if pairs.is_empty() {
        return Err(SaveError::ArrowError(
            "payload requires at least one column".to_string(),
        ));
    }
    let fields: Vec<Field> = pairs
        .iter()
        .map(|(name, _)| Field::new(*name, DataType::Utf8, true))
        .collect();
    let columns: Vec<ArrayRef> = pairs
        .iter()
        .map(|(_, value)| Arc::new(StringArray::from(vec![Some(*value)])) as ArrayRef)
        .collect();
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

/// Reads the first-row value of a Utf8 column.
///
/// Returns `None` when the column is missing, not Utf8, empty, or null.
pub fn string_value(batch: &RecordBatch, column: &str) -> Option<String> {
    let (index, _) = batch.schema().column_with_name(column)?;
    let array = batch.column(index).as_any().downcast_ref::<StringArray>()?;
    if array.is_empty() || array.is_null(0) {
        return None;
    }
    Some(array.value(0).to_string())
}

/// Structural check for an entity payload: exactly one row.
pub fn validate_payload(batch: &RecordBatch) -> Result<()> {
    if batch.num_rows() != 1 {
        return Err(SaveError::InvalidMutation(format!(
            "entity payload must hold exactly one row, got {}",
            batch.num_rows()
        )));
    }
    Ok(())
}
