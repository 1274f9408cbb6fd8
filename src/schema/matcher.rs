// SPDX-License-Identifier: Apache-2.0

//! Structural check between a requested column list and an external schema.
//!
//! Runs once per external-table binding, before any fragment is produced or
//! any row is read. It does not coerce values.

use fedbridge_core::{ColumnDescriptor, ExternalSchema, SchemaMismatch};
use tracing::debug;

use super::compat::is_compatible;
use super::native::parse_native_type;

/// Validates that `requested` lines up with the external data columns
/// followed by its partition columns, and that every pair is type compatible.
pub fn validate_schema(
    requested: &[ColumnDescriptor],
    external: &ExternalSchema,
) -> Result<(), SchemaMismatch> {
    let data_columns = external.data_columns.len();
    let partition_columns = external.partition_columns.len();

    debug!(
        data_columns,
        partition_columns,
        requested = requested.len(),
        "Matching external schema"
    );

    if requested.len() != data_columns + partition_columns {
        return Err(SchemaMismatch::column_count(
            requested.len(),
            data_columns,
            partition_columns,
        ));
    }

    for (ordinal, (column, external_column)) in requested.iter().zip(external.columns()).enumerate() {
        let native = parse_native_type(&external_column.native_type).map_err(|message| {
            SchemaMismatch::UnparsableNativeType {
                ordinal,
                column: column.name.clone(),
                native_type: external_column.native_type.clone(),
                message,
            }
        })?;

        if !is_compatible(column, &native) {
            return Err(SchemaMismatch::IncompatibleType {
                ordinal,
                column: column.name.clone(),
                requested_type: column.type_display(),
                external_type: external_column.native_type.clone(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fedbridge_core::{DataType, ExternalColumn, StorageDescriptor};
    use proptest::prelude::*;

    fn schema(data: &[(&str, &str)], partitions: &[(&str, &str)]) -> ExternalSchema {
        ExternalSchema {
            data_columns: data.iter().map(|(n, t)| ExternalColumn::new(*n, *t)).collect(),
            partition_columns: partitions.iter().map(|(n, t)| ExternalColumn::new(*n, *t)).collect(),
            storage: StorageDescriptor::default(),
        }
    }

    fn columns(types: &[DataType]) -> Vec<ColumnDescriptor> {
        types
            .iter()
            .enumerate()
            .map(|(i, t)| ColumnDescriptor::new(format!("c{i}"), *t, i))
            .collect()
    }

    #[test]
    fn test_accepts_matching_schema_with_partitions() {
        let external = schema(
            &[("id", "int"), ("name", "string"), ("amount", "decimal(10,2)")],
            &[("dt", "date")],
        );
        let requested = columns(&[DataType::BigInt, DataType::Text, DataType::Numeric, DataType::Date]);
        assert!(validate_schema(&requested, &external).is_ok());
    }

    #[test]
    fn test_partition_columns_are_matched_after_data_columns() {
        let external = schema(&[("id", "int")], &[("region", "string")]);
        // Caller lists the partition column first: the text column lands on `id`.
        let swapped = columns(&[DataType::Text, DataType::Integer]);
        let err = validate_schema(&swapped, &external).unwrap_err();
        assert_eq!(err.ordinal(), Some(0));

        let ordered = columns(&[DataType::Integer, DataType::Text]);
        assert!(validate_schema(&ordered, &external).is_ok());
    }

    #[test]
    fn test_count_mismatch_reports_both_counts() {
        let external = schema(&[("a", "int"), ("b", "int"), ("c", "int")], &[("p", "string")]);
        let requested = columns(&[DataType::Integer, DataType::Integer, DataType::Integer]);
        let err = validate_schema(&requested, &external).unwrap_err();
        assert_eq!(err, SchemaMismatch::column_count(3, 3, 1));
        assert!(err.to_string().contains("3 vs 4"));
    }

    #[test]
    fn test_incompatible_type_names_column_types_and_ordinal() {
        let external = schema(&[("id", "int"), ("price", "double")], &[]);
        let requested = columns(&[DataType::Integer, DataType::Integer]);
        match validate_schema(&requested, &external).unwrap_err() {
            SchemaMismatch::IncompatibleType {
                ordinal,
                column,
                requested_type,
                external_type,
            } => {
                assert_eq!(ordinal, 1);
                assert_eq!(column, "c1");
                assert_eq!(requested_type, "integer");
                assert_eq!(external_type, "double");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unparsable_native_type_is_a_mismatch() {
        let external = schema(&[("geom", "geometry")], &[]);
        let requested = columns(&[DataType::Text]);
        let err = validate_schema(&requested, &external).unwrap_err();
        assert!(matches!(err, SchemaMismatch::UnparsableNativeType { ordinal: 0, .. }));
    }

    #[test]
    fn test_pathologically_nested_type_is_a_mismatch() {
        let nested = format!("{}int{}", "array<".repeat(10_000), ">".repeat(10_000));
        let external = schema(&[("deep", nested.as_str())], &[]);
        let requested = columns(&[DataType::Text]);
        let err = validate_schema(&requested, &external).unwrap_err();
        assert!(matches!(err, SchemaMismatch::UnparsableNativeType { ordinal: 0, .. }));
    }

    proptest! {
        #[test]
        fn test_differing_counts_always_report_exact_counts(
            requested in 0usize..12,
            data in 0usize..8,
            partitions in 0usize..4,
        ) {
            prop_assume!(requested != data + partitions);
            let data_cols: Vec<(String, String)> =
                (0..data).map(|i| (format!("d{i}"), "string".to_string())).collect();
            let part_cols: Vec<(String, String)> =
                (0..partitions).map(|i| (format!("p{i}"), "string".to_string())).collect();
            let external = ExternalSchema {
                data_columns: data_cols.iter().map(|(n, t)| ExternalColumn::new(n.as_str(), t.as_str())).collect(),
                partition_columns: part_cols.iter().map(|(n, t)| ExternalColumn::new(n.as_str(), t.as_str())).collect(),
                storage: StorageDescriptor::default(),
            };
            let requested_cols = columns(&vec![DataType::Text; requested]);

            let err = validate_schema(&requested_cols, &external).unwrap_err();
            prop_assert_eq!(err, SchemaMismatch::column_count(requested, data, partitions));
        }
    }
}
