//! Task identifier model.
//!
//! Every check is named by a `Category/Subcategory/Name` triple. The string
//! form is what users type in overrides and what the report prints.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::domain::errors::DiagError;

/// Three-part task name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier {
    pub category: String,
    pub subcategory: String,
    pub name: String,
}

impl Identifier {
    pub fn new(
        category: impl Into<String>,
        subcategory: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            subcategory: subcategory.into(),
            name: name.into(),
        }
    }

    /// Parse `Category/Subcategory/Name`.
    ///
    /// Anything after the third `/` stays part of the name, so
    /// `Java/Config/Agent/Extra` names `Agent/Extra`. Fewer than three
    /// non-empty segments is an error.
    pub fn parse(raw: &str) -> Result<Self, DiagError> {
        let mut parts = raw.trim().splitn(3, '/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(category), Some(subcategory), Some(name))
                if !category.is_empty() && !subcategory.is_empty() && !name.is_empty() =>
            {
                Ok(Self::new(category, subcategory, name))
            }
            _ => Err(DiagError::InvalidIdentifier(raw.to_string())),
        }
    }

    /// Case-insensitive comparison against another identifier's string form.
    pub fn matches(&self, other: &Identifier) -> bool {
        self.category.eq_ignore_ascii_case(&other.category)
            && self.subcategory.eq_ignore_ascii_case(&other.subcategory)
            && self.name.eq_ignore_ascii_case(&other.name)
    }

    /// Lower-cased string form. Two identifiers have the same key exactly
    /// when they [`matches`](Self::matches) each other.
    pub fn key(&self) -> String {
        self.to_string().to_ascii_lowercase()
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.category, self.subcategory, self.name)
    }
}

impl FromStr for Identifier {
    type Err = DiagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
