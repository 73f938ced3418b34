use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::QuarryError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub instance_id: Uuid,
}

impl ServiceInfo {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
            instance_id: Uuid::new_v4(),
        }
    }
}

const MAX_COLLECTION_LEN: usize = 64;

/// Key of one remote collection (a Jira project key such as `HADOOP`).
///
/// Normalised to upper case and restricted to `[A-Z0-9_-]`, so it is safe to
/// use both inside a query and as a file-name component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CollectionId(String);

impl CollectionId {
    pub fn parse(raw: &str) -> Result<Self, QuarryError> {
        let key = raw.trim().to_uppercase();
        if key.is_empty() {
            return Err(QuarryError::Validation(
                "collection key must not be empty".to_string(),
            ));
        }
        if key.len() > MAX_COLLECTION_LEN {
            return Err(QuarryError::Validation(format!(
                "collection key exceeds {MAX_COLLECTION_LEN} characters: {key}"
            )));
        }
        if !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(QuarryError::Validation(format!(
                "collection key contains invalid characters: {raw}"
            )));
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CollectionId {
    type Err = QuarryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CollectionId {
    type Error = QuarryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CollectionId> for String {
    fn from(value: CollectionId) -> Self {
        value.0
    }
}
