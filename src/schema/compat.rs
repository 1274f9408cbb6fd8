// SPDX-License-Identifier: Apache-2.0

//! Type compatibility between external native types and relational columns.
//!
//! A requested column is compatible with an external type when every value of
//! the external type converts to the requested type without loss. Numeric types
//! widen, bounded strings fit into equal-or-longer (or unbounded) text, and
//! container types are only readable as text.

use fedbridge_core::{ColumnDescriptor, DataType};

use super::native::NativeType;

/// Digits needed to hold every value of an integral native type.
fn integral_digits(native: &NativeType) -> Option<u32> {
    match native {
        NativeType::TinyInt => Some(3),
        NativeType::SmallInt => Some(5),
        NativeType::Int => Some(10),
        NativeType::BigInt => Some(19),
        _ => None,
    }
}

/// `numeric` with no typmod is unbounded; otherwise its integer digits must
/// cover `integer_digits` and its scale must cover `scale`.
fn numeric_holds(column: &ColumnDescriptor, integer_digits: u32, scale: u32) -> bool {
    match column.precision_scale() {
        None => true,
        Some((p, s)) => s >= scale && p.saturating_sub(s) >= integer_digits,
    }
}

/// Unbounded, or declared at least `length` long.
fn length_holds(column: &ColumnDescriptor, length: Option<u32>) -> bool {
    match (column.length(), length) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(declared), Some(needed)) => declared >= needed,
    }
}

/// Returns true when `column` can receive every value of `native`.
pub fn is_compatible(column: &ColumnDescriptor, native: &NativeType) -> bool {
    use DataType as T;

    match native {
        NativeType::Boolean => column.data_type == T::Boolean,
        NativeType::TinyInt | NativeType::SmallInt => match column.data_type {
            T::SmallInt | T::Integer | T::BigInt | T::Real | T::Double => true,
            T::Numeric => numeric_holds(column, integral_digits(native).unwrap_or(5), 0),
            _ => false,
        },
        NativeType::Int => match column.data_type {
            T::Integer | T::BigInt | T::Double => true,
            T::Numeric => numeric_holds(column, integral_digits(native).unwrap_or(10), 0),
            _ => false,
        },
        NativeType::BigInt => match column.data_type {
            T::BigInt => true,
            T::Numeric => numeric_holds(column, integral_digits(native).unwrap_or(19), 0),
            _ => false,
        },
        NativeType::Float => matches!(column.data_type, T::Real | T::Double),
        NativeType::Double => column.data_type == T::Double,
        NativeType::Decimal { precision, scale } => {
            column.data_type == T::Numeric && numeric_holds(column, precision.saturating_sub(*scale), *scale)
        }
        NativeType::String => match column.data_type {
            T::Text => true,
            T::Varchar => length_holds(column, None),
            _ => false,
        },
        NativeType::Varchar(n) => match column.data_type {
            T::Text => true,
            T::Varchar => length_holds(column, Some(*n)),
            _ => false,
        },
        NativeType::Char(n) => match column.data_type {
            T::Text => true,
            T::Varchar => length_holds(column, Some(*n)),
            T::Bpchar => column.length().map_or(true, |declared| declared >= *n),
            _ => false,
        },
        NativeType::Binary => column.data_type == T::Bytea,
        NativeType::Date => matches!(column.data_type, T::Date | T::Timestamp),
        NativeType::Timestamp => matches!(column.data_type, T::Timestamp | T::TimestampTz),
        NativeType::Array(_) | NativeType::Map(..) | NativeType::Struct(_) | NativeType::Union(_) => {
            column.data_type == T::Text
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::native::parse_native_type;

    fn col(data_type: DataType) -> ColumnDescriptor {
        ColumnDescriptor::new("c", data_type, 0)
    }

    fn check(column: &ColumnDescriptor, native: &str) -> bool {
        is_compatible(column, &parse_native_type(native).unwrap())
    }

    #[test]
    fn test_integers_widen_but_never_narrow() {
        assert!(check(&col(DataType::SmallInt), "tinyint"));
        assert!(check(&col(DataType::BigInt), "int"));
        assert!(check(&col(DataType::Integer), "int"));
        assert!(!check(&col(DataType::SmallInt), "int"));
        assert!(!check(&col(DataType::Integer), "bigint"));
        assert!(!check(&col(DataType::Real), "int"));
        assert!(check(&col(DataType::Double), "int"));
    }

    #[test]
    fn test_numeric_targets_respect_precision() {
        let unbounded = col(DataType::Numeric);
        assert!(check(&unbounded, "bigint"));
        assert!(check(&unbounded, "decimal(38,10)"));

        let narrow = col(DataType::Numeric).with_modifiers([5, 0]);
        assert!(check(&narrow, "smallint"));
        assert!(!check(&narrow, "int"));

        let money = col(DataType::Numeric).with_modifiers([12, 2]);
        assert!(check(&money, "decimal(10,2)"));
        assert!(check(&money, "decimal(8,1)"));
        assert!(!check(&money, "decimal(12,3)"));
        assert!(!check(&money, "decimal(14,2)"));
    }

    #[test]
    fn test_decimal_with_scale_above_precision_is_not_compatible() {
        // Only reachable by building the type directly; the parser rejects it.
        let odd = NativeType::Decimal { precision: 2, scale: 5 };
        assert!(!is_compatible(&col(DataType::Numeric).with_modifiers([12, 2]), &odd));
        assert!(is_compatible(&col(DataType::Numeric), &odd));
    }

    #[test]
    fn test_floats_only_widen_to_floats() {
        assert!(check(&col(DataType::Double), "float"));
        assert!(check(&col(DataType::Real), "float"));
        assert!(!check(&col(DataType::Real), "double"));
        assert!(!check(&col(DataType::Numeric), "double"));
    }

    #[test]
    fn test_strings_fit_into_longer_or_unbounded_text() {
        assert!(check(&col(DataType::Text), "string"));
        assert!(check(&col(DataType::Varchar), "string"));
        assert!(!check(&col(DataType::Varchar).with_modifiers([255]), "string"));

        assert!(check(&col(DataType::Varchar).with_modifiers([40]), "varchar(40)"));
        assert!(check(&col(DataType::Varchar).with_modifiers([80]), "varchar(40)"));
        assert!(!check(&col(DataType::Varchar).with_modifiers([20]), "varchar(40)"));

        assert!(check(&col(DataType::Bpchar).with_modifiers([8]), "char(8)"));
        assert!(check(&col(DataType::Text), "char(8)"));
        assert!(!check(&col(DataType::Bpchar).with_modifiers([4]), "char(8)"));
        assert!(!check(&col(DataType::Bpchar), "varchar(8)"));
    }

    #[test]
    fn test_temporal_and_binary_types() {
        assert!(check(&col(DataType::Date), "date"));
        assert!(check(&col(DataType::Timestamp), "date"));
        assert!(!check(&col(DataType::Date), "timestamp"));
        assert!(check(&col(DataType::TimestampTz), "timestamp"));
        assert!(check(&col(DataType::Bytea), "binary"));
        assert!(!check(&col(DataType::Text), "binary"));
    }

    #[test]
    fn test_complex_types_read_as_text_only() {
        assert!(check(&col(DataType::Text), "array<int>"));
        assert!(check(&col(DataType::Text), "map<string,int>"));
        assert!(!check(&col(DataType::Varchar), "struct<a:int>"));
        assert!(!check(&col(DataType::Integer), "array<int>"));
    }
}
