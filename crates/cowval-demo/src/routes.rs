//! Route table value: path prefixes mapped to backend names.

use cowval_common::{Operation, Value};
use std::collections::BTreeMap;
use std::ops::Bound;

/// A change to the route table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOp {
    /// Adds or replaces the backend for `prefix`.
    Upsert {
        /// Path prefix, must start with `/`.
        prefix: String,
        /// Backend name.
        backend: String,
    },
    /// Removes an existing route.
    Remove {
        /// Path prefix.
        prefix: String,
    },
}

impl RouteOp {
    /// Builds an upsert.
    pub fn upsert(prefix: impl Into<String>, backend: impl Into<String>) -> Self {
        Self::Upsert {
            prefix: prefix.into(),
            backend: backend.into(),
        }
    }

    /// Builds a removal.
    pub fn remove(prefix: impl Into<String>) -> Self {
        Self::Remove {
            prefix: prefix.into(),
        }
    }
}

impl Operation for RouteOp {
    type Context = Self;

    fn kind(&self) -> &str {
        match self {
            Self::Upsert { .. } => "upsert",
            Self::Remove { .. } => "remove",
        }
    }

    fn context(&self) -> &Self {
        self
    }
}

/// Route changes rejected in one batch. The accepted ones were applied.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{} route changes rejected, first: {}", .rejected.len(), .rejected.first().map_or("", String::as_str))]
pub struct RouteError {
    /// One message per rejected change.
    pub rejected: Vec<String>,
}

/// Path prefix to backend mapping with a revision counter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    routes: BTreeMap<String, String>,
    revision: u64,
}

impl RouteTable {
    /// Backend registered for exactly `prefix`.
    pub fn get(&self, prefix: &str) -> Option<&str> {
        self.routes.get(prefix).map(String::as_str)
    }

    /// Backend of the longest registered prefix of `path`.
    pub fn resolve(&self, path: &str) -> Option<&str> {
        // Every prefix of `path` sorts at or before it, longer ones later.
        self.routes
            .range::<str, _>((Bound::Unbounded, Bound::Included(path)))
            .rev()
            .find(|(prefix, _)| path.starts_with(prefix.as_str()))
            .map(|(_, backend)| backend.as_str())
    }

    /// Number of routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the table has no routes.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Number of batches that changed the table.
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    fn change(&mut self, op: RouteOp) -> Result<(), String> {
        match op {
            RouteOp::Upsert { prefix, backend } => {
                if !prefix.starts_with('/') {
                    return Err(format!("prefix {prefix:?} must start with '/'"));
                }
                if backend.is_empty() {
                    return Err(format!("empty backend for {prefix:?}"));
                }
                self.routes.insert(prefix, backend);
                Ok(())
            }
            RouteOp::Remove { prefix } => self
                .routes
                .remove(&prefix)
                .map(drop)
                .ok_or_else(|| format!("no route for {prefix:?}")),
        }
    }
}

impl Value for RouteTable {
    type Op = RouteOp;
    type Error = RouteError;

    fn copy(&self) -> Self {
        self.clone()
    }

    fn apply(&mut self, ops: Vec<RouteOp>) -> Result<(), RouteError> {
        let total = ops.len();
        let mut rejected = Vec::new();
        for op in ops {
            if let Err(reason) = self.change(op) {
                rejected.push(reason);
            }
        }
        if rejected.len() < total {
            self.revision += 1;
        }
        if rejected.is_empty() {
            Ok(())
        } else {
            Err(RouteError { rejected })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_longest_prefix() {
        let mut table = RouteTable::default();
        table
            .apply(vec![
                RouteOp::upsert("/", "default"),
                RouteOp::upsert("/api", "api"),
                RouteOp::upsert("/api/v2", "api-v2"),
                RouteOp::upsert("/static", "cdn"),
            ])
            .unwrap();

        assert_eq!(table.resolve("/api/v2/users"), Some("api-v2"));
        assert_eq!(table.resolve("/api/v1/users"), Some("api"));
        assert_eq!(table.resolve("/static/app.js"), Some("cdn"));
        assert_eq!(table.resolve("/other"), Some("default"));
        assert_eq!(table.revision(), 1);
    }

    #[test]
    fn test_rejected_changes_do_not_stop_batch() {
        let mut table = RouteTable::default();
        let err = table
            .apply(vec![
                RouteOp::remove("/missing"),
                RouteOp::upsert("/a", "alpha"),
                RouteOp::upsert("relative", "beta"),
            ])
            .unwrap_err();

        assert_eq!(err.rejected.len(), 2);
        assert_eq!(
            err.to_string(),
            "2 route changes rejected, first: no route for \"/missing\""
        );
        assert_eq!(table.get("/a"), Some("alpha"));
        assert_eq!(table.len(), 1);
        assert_eq!(table.revision(), 1);
    }

    #[test]
    fn test_fully_rejected_batch_keeps_revision() {
        let mut table = RouteTable::default();
        assert!(table.apply(vec![RouteOp::remove("/gone")]).is_err());
        assert_eq!(table.revision(), 0);
        assert!(table.is_empty());
    }

    #[test]
    fn test_op_kinds() {
        assert_eq!(RouteOp::upsert("/a", "b").kind(), "upsert");
        assert_eq!(RouteOp::remove("/a").kind(), "remove");
    }
}
