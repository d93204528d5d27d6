use evees_cid::Value;
use serde::Serialize;

/// An object together with the id derived from it.
///
/// Entities are never mutated: a different object is a different entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub id: String,
    pub object: Value,
    /// The backend the entity was read from or is meant for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
}

impl Entity {
    pub fn new(id: impl Into<String>, object: Value) -> Self {
        Self {
            id: id.into(),
            object,
            remote: None,
        }
    }

    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = Some(remote.into());
        self
    }
}

/// An object waiting to be hashed.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityCreate {
    pub object: Value,
    pub remote: Option<String>,
}

impl EntityCreate {
    pub fn new(object: Value) -> Self {
        Self { object, remote: None }
    }
}
