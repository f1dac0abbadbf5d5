//! Data types for StudioDB
//!
//! Column types are declarative metadata: they are recorded in the catalog
//! and shown to users, but never enforced against stored values.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// SQL Data Types
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DataType {
    /// Unlimited text
    Text,
    /// Integer
    Integer,
    /// Floating point
    Real,
    /// Calendar date
    Date,
    /// Boolean
    Boolean,
    /// Variable-length string with optional max length
    Varchar(Option<u32>),
    /// Fixed-length string with optional length
    Char(Option<u32>),
    /// Exact numeric with optional precision and scale
    Numeric(Option<u32>, Option<u32>),
    /// Any other type name, kept upper-cased as written
    Other(String),
}

impl DataType {
    /// Build a type from its name and optional parenthesized arguments
    pub fn from_parts(name: &str, args: &[u32]) -> Self {
        let name = name.to_uppercase();
        match name.as_str() {
            "TEXT" => DataType::Text,
            "INTEGER" => DataType::Integer,
            "REAL" => DataType::Real,
            "DATE" => DataType::Date,
            "BOOLEAN" => DataType::Boolean,
            "VARCHAR" => DataType::Varchar(args.first().copied()),
            "CHAR" => DataType::Char(args.first().copied()),
            "NUMERIC" => DataType::Numeric(args.first().copied(), args.get(1).copied()),
            _ if args.is_empty() => DataType::Other(name),
            _ => {
                let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                DataType::Other(format!("{}({})", name, args.join(", ")))
            }
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Text => write!(f, "TEXT"),
            DataType::Integer => write!(f, "INTEGER"),
            DataType::Real => write!(f, "REAL"),
            DataType::Date => write!(f, "DATE"),
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::Varchar(None) => write!(f, "VARCHAR"),
            DataType::Varchar(Some(n)) => write!(f, "VARCHAR({})", n),
            DataType::Char(None) => write!(f, "CHAR"),
            DataType::Char(Some(n)) => write!(f, "CHAR({})", n),
            DataType::Numeric(None, _) => write!(f, "NUMERIC"),
            DataType::Numeric(Some(p), None) => write!(f, "NUMERIC({})", p),
            DataType::Numeric(Some(p), Some(s)) => write!(f, "NUMERIC({}, {})", p, s),
            DataType::Other(name) => write!(f, "{}", name),
        }
    }
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let Some(open) = s.find('(') else {
            return Ok(DataType::from_parts(s, &[]));
        };
        let name = s[..open].trim();
        let inner = s[open + 1..].trim_end().strip_suffix(')').ok_or_else(|| {
            Error::UnexpectedToken {
                expected: "')'".to_string(),
                found: s.to_string(),
            }
        })?;
        let args = inner
            .split(',')
            .map(|a| a.trim().parse::<u32>())
            .collect::<Result<Vec<_>, _>>();
        match args {
            Ok(args) => Ok(DataType::from_parts(name, &args)),
            // Unknown argument shapes are kept verbatim
            Err(_) => Ok(DataType::Other(s.to_uppercase())),
        }
    }
}

impl TryFrom<String> for DataType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DataType> for String {
    fn from(value: DataType) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(DataType::from_parts("integer", &[]), DataType::Integer);
        assert_eq!(DataType::from_parts("varchar", &[100]), DataType::Varchar(Some(100)));
        assert_eq!(
            DataType::from_parts("bigint", &[]),
            DataType::Other("BIGINT".to_string())
        );
    }

    #[test]
    fn test_type_display_parses_back() {
        for ty in [
            DataType::Text,
            DataType::Varchar(Some(255)),
            DataType::Numeric(Some(10), Some(2)),
            DataType::Other("TIMESTAMP".to_string()),
        ] {
            assert_eq!(ty.to_string().parse::<DataType>().unwrap(), ty);
        }
    }

    #[test]
    fn test_type_serializes_as_name() {
        let json = serde_json::to_string(&DataType::Char(Some(3))).unwrap();
        assert_eq!(json, "\"CHAR(3)\"");
        let ty: DataType = serde_json::from_str("\"DATE\"").unwrap();
        assert_eq!(ty, DataType::Date);
    }
}
