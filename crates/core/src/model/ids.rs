use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Unique identifier for a Question (e.g. `B1-2024-1ST-Q01`)
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(String);

/// Identifier of a Qualification (e.g. `A1`)
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QualificationId(String);

/// Identifier of a Subject inside a qualification (e.g. `written`)
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

macro_rules! string_id {
    ($name:ident) => {
        impl $name {
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(QuestionId);
string_id!(QualificationId);
string_id!(SubjectId);

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn question_id_display() {
        let id = QuestionId::new("A1-2024-Q01");
        assert_eq!(id.to_string(), "A1-2024-Q01");
        assert_eq!(format!("{id:?}"), "QuestionId(A1-2024-Q01)");
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = QualificationId::new("A1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"A1\"");

        let mut map = BTreeMap::new();
        map.insert(SubjectId::new("written"), 3_u32);
        assert_eq!(serde_json::to_string(&map).unwrap(), r#"{"written":3}"#);
    }

    #[test]
    fn ids_can_be_looked_up_by_str() {
        let mut map = BTreeMap::new();
        map.insert(QuestionId::new("q1"), 1);
        assert_eq!(map.get("q1"), Some(&1));
    }
}
