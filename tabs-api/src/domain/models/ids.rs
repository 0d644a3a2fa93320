use serde::{Deserialize, Serialize};
use std::fmt;

/// Declares an opaque string identifier with the usual conversions.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

string_id!(
    /// Opaque identifier of a saved tab.
    TabId
);

string_id!(
    /// The user a tab belongs to. Every query and update is scoped by it.
    OwnerId
);

string_id!(
    /// Identifier of an enrichment batch (an import or a bulk regeneration).
    BatchId
);

impl BatchId {
    /// A fresh, time-ordered batch id.
    pub fn generate() -> Self {
        let nanos = time::OffsetDateTime::now_utc().unix_timestamp_nanos();
        let suffix: u32 = rand::random();
        Self(format!("batch_{:x}{:08x}", nanos, suffix))
    }
}
