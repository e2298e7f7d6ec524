use crate::array::ArrayData;
use crate::error::{IpcError, Result};
use crate::schema::SchemaRef;

/// Equal-length columns described by a shared schema.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordBatch {
    schema: SchemaRef,
    num_rows: usize,
    columns: Vec<ArrayData>,
}

impl RecordBatch {
    /// Row count is taken from the first column; a batch without columns has
    /// zero rows.
    pub fn try_new(schema: SchemaRef, columns: Vec<ArrayData>) -> Result<Self> {
        let num_rows = columns.first().map_or(0, |column| column.len());
        Self::try_new_with_num_rows(schema, columns, num_rows)
    }

    pub fn try_new_with_num_rows(
        schema: SchemaRef,
        columns: Vec<ArrayData>,
        num_rows: usize,
    ) -> Result<Self> {
        if columns.len() != schema.fields().len() {
            return Err(IpcError::InvalidBatch {
                reason: format!(
                    "schema has {} fields, got {} columns",
                    schema.fields().len(),
                    columns.len()
                ),
            });
        }

        for (column, field) in columns.iter().zip(schema.fields()) {
            if column.data_type() != field.data_type() {
                return Err(IpcError::InvalidBatch {
                    reason: format!(
                        "column {:?} is {:?}, field type is {:?}",
                        field.name(),
                        column.data_type(),
                        field.data_type()
                    ),
                });
            }
            if column.len() != num_rows {
                return Err(IpcError::InvalidBatch {
                    reason: format!(
                        "column {:?} has {} rows, expected {num_rows}",
                        field.name(),
                        column.len()
                    ),
                });
            }
            if !field.is_nullable() && column.null_count() > 0 {
                return Err(IpcError::InvalidBatch {
                    reason: format!(
                        "non-nullable column {:?} contains {} nulls",
                        field.name(),
                        column.null_count()
                    ),
                });
            }
        }

        Ok(Self {
            schema,
            num_rows,
            columns,
        })
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[ArrayData] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&ArrayData> {
        self.columns.get(index)
    }

    pub fn column_by_name(&self, name: &str) -> Option<&ArrayData> {
        self.schema
            .index_of(name)
            .and_then(|index| self.columns.get(index))
    }

    /// Zero-copy view of `len` rows starting at `offset`.
    pub fn slice(&self, offset: usize, len: usize) -> Self {
        assert!(
            offset + len <= self.num_rows,
            "slice {offset}+{len} out of bounds for {} rows",
            self.num_rows
        );
        Self {
            schema: self.schema.clone(),
            num_rows: len,
            columns: self
                .columns
                .iter()
                .map(|column| column.slice(offset, len))
                .collect(),
        }
    }
}
