// Data structures describing a FoxPro table and its columns.

use std::fmt;

use crate::error::{ExtractError, Result};

/// Field separator used for headers and row values in the output files.
pub const SEPARATOR: &str = "|";

/// A FoxPro column data type.
///
/// The official documentation lists the field types but not their underlying
/// integer codes; these values were inspected manually in Visual FoxPro 9.
/// VFP9 actually declares 19 field types, but the extras reuse an existing
/// code: IntegerAutoInc = 3; Blob, MemoBin, VarBinary = 128; CharacterBinary,
/// Memo, VarChar, VarCharBin = 129; Float = 131. The enum is therefore keyed
/// by the semantic tag and the code lookup is many-to-one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Integer,
    Double,
    Currency,
    Logical,
    General,
    Character,
    Numeric,
    Date,
    DateTime,
}

impl DataType {
    /// Maps the engine's internal type code to a tag.
    ///
    /// An unmapped code is a configuration error, never a silent default.
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            3 => Ok(DataType::Integer),
            5 => Ok(DataType::Double),
            6 => Ok(DataType::Currency),
            11 => Ok(DataType::Logical),
            128 => Ok(DataType::General),
            129 => Ok(DataType::Character),
            131 => Ok(DataType::Numeric),
            133 => Ok(DataType::Date),
            135 => Ok(DataType::DateTime),
            other => Err(ExtractError::UnsupportedType(other)),
        }
    }

    /// Canonical tag name as written into header line 1.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Integer => "Integer",
            DataType::Double => "Double",
            DataType::Currency => "Currency",
            DataType::Logical => "Logical",
            DataType::General => "General",
            DataType::Character => "Character",
            DataType::Numeric => "Numeric",
            DataType::Date => "Date",
            DataType::DateTime => "DateTime",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A column from a FoxPro table. Immutable once created.
#[derive(Debug, Clone)]
pub struct FoxProColumn {
    pub name: String,
    pub data_type: DataType,
}

/// A table from a FoxPro database.
///
/// Column order is fixed at discovery time and determines both query column
/// order and output column order.
#[derive(Debug, Clone)]
pub struct FoxProTable {
    pub name: String,
    pub columns: Vec<FoxProColumn>,
}

impl FoxProTable {
    /// The SELECT command retrieving every row of this table.
    ///
    /// Fractional columns are coerced to text on the engine side: selecting
    /// Double, Currency or Numeric columns natively can make the driver fail
    /// to materialize a row holding a default, uncommitted value.
    pub fn select_statement(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|column| match column.data_type {
                DataType::Double | DataType::Currency | DataType::Numeric => {
                    format!("VAL(STR({}))", column.name)
                }
                _ => column.name.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ");

        format!("SELECT {} FROM {}", columns, self.name)
    }

    /// Header line 1: the column type tags, in column order.
    pub fn joined_column_types(&self) -> String {
        self.columns
            .iter()
            .map(|column| column.data_type.as_str())
            .collect::<Vec<_>>()
            .join(SEPARATOR)
    }

    /// Header line 2: the column names, in the same order.
    pub fn joined_column_names(&self) -> String {
        self.columns
            .iter()
            .map(|column| column.name.as_str())
            .collect::<Vec<_>>()
            .join(SEPARATOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> FoxProTable {
        FoxProTable {
            name: "invoices".to_string(),
            columns: vec![
                FoxProColumn {
                    name: "id".to_string(),
                    data_type: DataType::Integer,
                },
                FoxProColumn {
                    name: "price".to_string(),
                    data_type: DataType::Numeric,
                },
                FoxProColumn {
                    name: "active".to_string(),
                    data_type: DataType::Logical,
                },
            ],
        }
    }

    #[test]
    fn test_known_type_codes() {
        assert_eq!(DataType::from_code(3).unwrap(), DataType::Integer);
        assert_eq!(DataType::from_code(5).unwrap(), DataType::Double);
        assert_eq!(DataType::from_code(6).unwrap(), DataType::Currency);
        assert_eq!(DataType::from_code(11).unwrap(), DataType::Logical);
        assert_eq!(DataType::from_code(128).unwrap(), DataType::General);
        assert_eq!(DataType::from_code(129).unwrap(), DataType::Character);
        assert_eq!(DataType::from_code(131).unwrap(), DataType::Numeric);
        assert_eq!(DataType::from_code(133).unwrap(), DataType::Date);
        assert_eq!(DataType::from_code(135).unwrap(), DataType::DateTime);
    }

    #[test]
    fn test_unknown_type_code_is_rejected() {
        for code in [-1, 0, 1, 2, 4, 7, 100, 130, 132, 134, 136, 255] {
            match DataType::from_code(code) {
                Err(ExtractError::UnsupportedType(reported)) => assert_eq!(reported, code),
                other => panic!("code {} should be unsupported, got {:?}", code, other),
            }
        }
    }

    #[test]
    fn test_type_code_mapping_is_deterministic() {
        for code in [3, 5, 6, 11, 128, 129, 131, 133, 135] {
            assert_eq!(
                DataType::from_code(code).unwrap(),
                DataType::from_code(code).unwrap()
            );
        }
    }

    #[test]
    fn test_select_statement_wraps_fractional_columns() {
        let table = sample_table();
        assert_eq!(
            table.select_statement(),
            "SELECT id, VAL(STR(price)), active FROM invoices"
        );
    }

    #[test]
    fn test_select_statement_wraps_double_and_currency() {
        let table = FoxProTable {
            name: "rates".to_string(),
            columns: vec![
                FoxProColumn {
                    name: "factor".to_string(),
                    data_type: DataType::Double,
                },
                FoxProColumn {
                    name: "amount".to_string(),
                    data_type: DataType::Currency,
                },
            ],
        };
        assert_eq!(
            table.select_statement(),
            "SELECT VAL(STR(factor)), VAL(STR(amount)) FROM rates"
        );
    }

    #[test]
    fn test_joined_headers_follow_column_order() {
        let table = sample_table();
        assert_eq!(table.joined_column_types(), "Integer|Numeric|Logical");
        assert_eq!(table.joined_column_names(), "id|price|active");
    }
}
