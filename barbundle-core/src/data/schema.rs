use polars::prelude::*;

pub const TIMESTAMP: &str = "timestamp";
pub const OPEN: &str = "open";
pub const HIGH: &str = "high";
pub const LOW: &str = "low";
pub const CLOSE: &str = "close";
pub const VOLUME: &str = "volume";
pub const DIVIDEND: &str = "dividend";
pub const SPLIT: &str = "split";

/// Price and factor columns every normalized series carries, all `Float64`.
pub const VALUE_COLUMNS: [&str; 7] = [OPEN, HIGH, LOW, CLOSE, VOLUME, DIVIDEND, SPLIT];

/// Expected schema for normalized bar data
pub struct BarSchema;

impl BarSchema {
    /// Dtype of the timestamp column after normalization.
    pub fn timestamp_dtype() -> DataType {
        DataType::Datetime(TimeUnit::Milliseconds, None)
    }

    /// Get the canonical bar schema
    pub fn schema() -> Schema {
        let mut fields = vec![Field::new(TIMESTAMP.into(), Self::timestamp_dtype())];
        fields.extend(
            VALUE_COLUMNS
                .iter()
                .map(|name| Field::new((*name).into(), DataType::Float64)),
        );
        Schema::from_iter(fields)
    }

    /// Validate DataFrame against schema. Extra columns are allowed.
    pub fn validate(df: &DataFrame) -> Result<(), SchemaError> {
        let expected = Self::schema();

        for field in expected.iter_fields() {
            let actual = df
                .column(field.name())
                .map_err(|_| SchemaError::MissingColumn(field.name().to_string()))?;
            if actual.dtype() != field.dtype() {
                return Err(SchemaError::TypeMismatch {
                    column: field.name().to_string(),
                    expected: field.dtype().clone(),
                    actual: actual.dtype().clone(),
                });
            }
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Type mismatch in column {column}: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        actual: DataType,
    },
}

/// Whether `df` has a column named `name`.
pub(crate) fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_index(name).is_some()
}
