//! Capability traits for copy-on-write values and their operations.

use std::fmt;

/// A unit of change queued against a [`Value`].
///
/// Operations carry a kind tag and an opaque payload. They are moved into
/// the pending buffer on submission and are never mutated afterwards.
pub trait Operation: Send + 'static {
    /// Payload type handed to [`Value::apply`].
    type Context: ?Sized;

    /// Kind tag of this operation, e.g. `"insert"` or `"remove"`.
    fn kind(&self) -> &str;

    /// Payload of this operation.
    fn context(&self) -> &Self::Context;
}

/// Domain data maintained with a copy-on-write strategy.
///
/// A published value is shared read-only through an `Arc`. Every refresh
/// cycle calls [`Value::copy`] on the current value and then
/// [`Value::apply`] on the copy, so `copy` must duplicate all mutable state:
/// nothing reachable from the copy may alias the original. For owned data
/// this is usually `Clone::clone`.
pub trait Value: Sized + Send + Sync + 'static {
    /// Operation type accepted by this value.
    type Op: Operation;

    /// Error returned when a batch cannot be applied in full.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Produces an independent deep duplicate of `self`.
    fn copy(&self) -> Self;

    /// Applies a batch of operations in place.
    ///
    /// # Errors
    ///
    /// Implementations may stop or skip operations part way through. Whatever
    /// was mutated before the error is kept; the reloader publishes the
    /// partially applied value and reports the error.
    fn apply(&mut self, ops: Vec<Self::Op>) -> Result<(), Self::Error>;
}

/// A generic operation carrying a string kind and a typed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Op<C> {
    kind: String,
    context: C,
}

impl<C> Op<C> {
    /// Creates an operation of the given kind.
    pub fn new(kind: impl Into<String>, context: C) -> Self {
        Self {
            kind: kind.into(),
            context,
        }
    }

    /// Consumes the operation and returns its payload.
    pub fn into_context(self) -> C {
        self.context
    }
}

impl<C: Send + 'static> Operation for Op<C> {
    type Context = C;

    fn kind(&self) -> &str {
        &self.kind
    }

    fn context(&self) -> &C {
        &self.context
    }
}

impl<C: fmt::Debug> fmt::Display for Op<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.kind, self.context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_accessors() {
        let op = Op::new("insert", 42_i64);
        assert_eq!(op.kind(), "insert");
        assert_eq!(*op.context(), 42);
        assert_eq!(op.into_context(), 42);
    }

    #[test]
    fn test_op_display() {
        let op = Op::new("remove", "a/b");
        assert_eq!(op.to_string(), "remove(\"a/b\")");
    }
}
