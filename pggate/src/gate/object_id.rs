//! Relation identifier.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Identifies a table in the distributed catalog.
///
/// Supplied fully resolved by the catalog. Never re-resolved
/// by the gateway, so a statement keeps writing to the same
/// relation even if the catalog changes underneath it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId {
    database: String,
    object: String,
}

impl ObjectId {
    /// Create new object identifier.
    pub fn new(database: impl ToString, object: impl ToString) -> Self {
        Self {
            database: database.to_string(),
            object: object.to_string(),
        }
    }

    /// Database component.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Object (table) component.
    pub fn object(&self) -> &str {
        &self.object
    }

    /// Both components are set.
    pub fn is_valid(&self) -> bool {
        !self.database.is_empty() && !self.object.is_empty()
    }
}

impl Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.database, self.object)
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_object_id() {
        let id = ObjectId::new("app", "users");
        assert!(id.is_valid());
        assert_eq!(id.to_string(), "app.users");
        assert_eq!(id, ObjectId::new("app".to_string(), "users"));

        assert!(!ObjectId::new("", "users").is_valid());
        assert!(!ObjectId::new("app", "").is_valid());
    }

    #[test]
    fn test_routing_key() {
        let mut routes = HashMap::new();
        routes.insert(ObjectId::new("app", "users"), 1);
        routes.insert(ObjectId::new("app", "orders"), 2);

        assert_eq!(routes.get(&ObjectId::new("app", "users")), Some(&1));
        assert_eq!(routes.get(&ObjectId::new("other", "users")), None);
    }
}
