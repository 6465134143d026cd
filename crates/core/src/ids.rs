//! Identifier newtypes for documents, classes and spaces.

use crate::value::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(String);

        impl $name {
            /// Creates an identifier from any string-like value.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(v: &str) -> Self {
                Self(v.to_string())
            }
        }

        impl From<String> for $name {
            fn from(v: String) -> Self {
                Self(v)
            }
        }

        impl From<&$name> for $name {
            fn from(v: &$name) -> Self {
                v.clone()
            }
        }

        impl From<$name> for Value {
            fn from(v: $name) -> Self {
                Value::String(v.0)
            }
        }

        impl From<&$name> for Value {
            fn from(v: &$name) -> Self {
                Value::String(v.0.clone())
            }
        }
    };
}

string_id!(
    /// Identity of a document.
    DocId
);
string_id!(
    /// Reference to a class or mixin in the hierarchy.
    ClassRef
);
string_id!(
    /// Identity of a space (the partition a document lives in).
    SpaceRef
);

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

static NEXT_DOC_ID: AtomicU64 = AtomicU64::new(1);

impl DocId {
    /// Generates a new process-unique document id.
    pub fn generate() -> Self {
        let n = NEXT_DOC_ID.fetch_add(1, Ordering::SeqCst);
        Self(format!("doc-{:012}", n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_unique_and_ordered() {
        let a = DocId::generate();
        let b = DocId::generate();
        assert_ne!(a, b);
        assert!(a < b);
    }

    #[test]
    fn test_id_into_value() {
        let id = SpaceRef::from("space-1");
        assert_eq!(Value::from(&id), Value::String("space-1".into()));
        assert_eq!(id.to_string(), "space-1");
    }
}
