use crate::error::StorageError;
use bytes::Bytes;
use model::{core::value::Value, records::row::Row};

/// Encodes converted values into the text a load job ingests.
pub trait LoadValueEncoder {
    /// Encodes a concrete value into its cell text.
    fn encode_value(&self, value: &Value) -> String;

    /// Cell text for a null.
    fn encode_null(&self) -> String;

    fn encode_optional(&self, value: Option<&Value>) -> String {
        match value {
            Some(Value::Null) | None => self.encode_null(),
            Some(v) => self.encode_value(v),
        }
    }
}

/// CSV cell encoding for the warehouse loader. An empty unquoted cell is
/// read back as null.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvLoadEncoder;

impl CsvLoadEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Writes `rows` as one CSV document without a header line.
    pub fn encode_rows(&self, rows: &[Row]) -> Result<Bytes, StorageError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());

        for row in rows {
            writer.write_record(row.iter().map(|value| self.encode_optional(Some(value))))?;
        }

        let buffer = writer
            .into_inner()
            .map_err(|err| csv::Error::from(err.into_error()))?;
        Ok(Bytes::from(buffer))
    }
}

impl LoadValueEncoder for CsvLoadEncoder {
    fn encode_value(&self, value: &Value) -> String {
        match value {
            Value::Null => self.encode_null(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::Time(t) => t.format("%H:%M:%S%.f").to_string(),
            Value::Datetime(dt) => dt.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
            Value::Json(v) => v.to_string(),
            other => other.to_string(),
        }
    }

    fn encode_null(&self) -> String {
        String::new()
    }
}
