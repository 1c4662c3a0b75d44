//! # Summary
//!
//! This module defines the `Operation` type agreed upon by a consensus round.
//!
//! Internally an operation is a plain enum. It is only flattened into its
//! colon-delimited string form (`PUT:<key>:<value>` or `DELETE:<key>`) at the
//! transport edge, and parsed back on arrival. Keys and values are not
//! escaped, so neither may contain the delimiter.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

const DELIMITER: char = ':';

/// Mutation of the replicated key-value store.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Put { key: String, value: String },
    Delete { key: String },
}

impl Operation {
    /// Builds a `Put`, rejecting keys or values containing the delimiter.
    pub fn put<K: Into<String>, V: Into<String>>(key: K, value: V) -> Result<Self> {
        let key = checked(key.into())?;
        let value = checked(value.into())?;
        Ok(Operation::Put { key, value })
    }

    /// Builds a `Delete`, rejecting keys containing the delimiter.
    pub fn delete<K: Into<String>>(key: K) -> Result<Self> {
        let key = checked(key.into())?;
        Ok(Operation::Delete { key })
    }

    pub fn key(&self) -> &str {
        match self {
        | Operation::Put { key, .. } => key,
        | Operation::Delete { key } => key,
        }
    }
}

fn checked(field: String) -> Result<String> {
    if field.contains(DELIMITER) {
        Err(Error::Delimiter(field))
    } else {
        Ok(field)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
        | Operation::Put { key, value } => write!(fmt, "PUT{}{}{}{}", DELIMITER, key, DELIMITER, value),
        | Operation::Delete { key } => write!(fmt, "DELETE{}{}", DELIMITER, key),
        }
    }
}

impl FromStr for Operation {
    type Err = Error;
    fn from_str(encoded: &str) -> Result<Self> {
        let malformed = || Error::Malformed(encoded.to_string());
        let mut fields = encoded.split(DELIMITER);
        let operation = match (fields.next(), fields.next(), fields.next()) {
        | (Some("PUT"), Some(key), Some(value)) => Operation::Put {
            key: key.to_string(),
            value: value.to_string(),
        },
        | (Some("DELETE"), Some(key), None) => Operation::Delete {
            key: key.to_string(),
        },
        | _ => return Err(malformed()),
        };
        // Trailing fields mean a delimiter leaked into a key or value
        if fields.next().is_some() {
            return Err(malformed())
        }
        Ok(operation)
    }
}
