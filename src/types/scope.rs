//! Lookup of field references against already-populated header trees.

use crate::error::{HeaderError, Result};
use crate::types::header::{HeaderTree, HeaderValue};

/// A chain of trees from the innermost record out to the root.
///
/// While parsing, the innermost tree only holds fields read so far, so a lookup can never
/// observe a field declared after the reference.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    tree: &'a HeaderTree,
    parent: Option<&'a Scope<'a>>,
}

impl<'a> Scope<'a> {
    pub fn new(tree: &'a HeaderTree, parent: Option<&'a Scope<'a>>) -> Self {
        Self { tree, parent }
    }

    pub fn root(tree: &'a HeaderTree) -> Self {
        Self { tree, parent: None }
    }

    pub fn tree(&self) -> &'a HeaderTree {
        self.tree
    }

    /// Innermost value named `name`.
    pub fn lookup(&self, name: &str) -> Option<&'a HeaderValue> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some(value) = current.tree.get(name) {
                return Some(value);
            }
            scope = current.parent;
        }
        None
    }

    pub fn resolve_int(&self, reference: &str, user: &str) -> Result<i64> {
        let value = self
            .lookup(reference)
            .ok_or_else(|| HeaderError::UnresolvedReference {
                field: user.to_string(),
                reference: reference.to_string(),
            })?;
        value.as_int().ok_or_else(|| HeaderError::TypeMismatch {
            field: reference.to_string(),
            expected: "int",
            actual: value.kind_name(),
        })
    }

    /// Resolves a repetition or length count. Negative counts are rejected.
    pub fn resolve_count(&self, reference: &str, user: &str) -> Result<usize> {
        let count = self.resolve_int(reference, user)?;
        usize::try_from(count).map_err(|_| HeaderError::InvalidCount {
            field: user.to_string(),
            reference: reference.to_string(),
            count,
        })
    }
}
