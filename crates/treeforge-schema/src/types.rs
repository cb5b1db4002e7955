//! Newtype wrappers for string identifiers, providing compile-time type safety.
//!
//! All newtypes serialize/deserialize as plain strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance from a string.
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Return the inner string as a slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_newtype!(
    /// Name of a pipeline, unique within its owning manifest.
    ///
    /// Pipelines refer to each other (build roots, stage inputs) by this name.
    PipelineName
);

string_newtype!(
    /// Algorithm-prefixed content checksum, e.g. `sha256:<hex>`.
    Checksum
);

impl PipelineName {
    /// The symbolic reference form used in serialized stage descriptions.
    pub fn reference(&self) -> String {
        format!("name:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_name_display_and_as_ref() {
        let name = PipelineName::new("build");
        assert_eq!(name.to_string(), "build");
        assert_eq!(name.as_str(), "build");
        assert_eq!(AsRef::<str>::as_ref(&name), "build");
    }

    #[test]
    fn pipeline_name_reference_form() {
        assert_eq!(PipelineName::new("build").reference(), "name:build");
    }

    #[test]
    fn pipeline_name_serde_is_transparent() {
        let name = PipelineName::new("os");
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"os\"");
        let back: PipelineName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, name);
    }

    #[test]
    fn checksum_into_inner() {
        let c = Checksum::new("sha256:abc".to_owned());
        assert_eq!(c.into_inner(), "sha256:abc");
    }

    #[test]
    fn borrow_allows_str_lookup() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(PipelineName::new("tree"), 1);
        assert_eq!(map.get("tree"), Some(&1));
    }
}
