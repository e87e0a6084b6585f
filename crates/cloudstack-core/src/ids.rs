//! Strongly-typed identifier wrappers for CloudStack resources.
//!
//! CloudStack hands out opaque string identifiers for every resource. Wrapping them keeps a
//! zone id from being passed where a template id is expected. The wrappers do not validate
//! their contents: whatever the caller supplies is sent to the management server verbatim.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to generate string-backed identifier types.
macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $doc:expr) => {
        $(#[$meta])*
        #[doc = $doc]
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps an identifier string.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Converts into the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }

            /// Returns true if the identifier is the empty string.
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
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

        impl From<$name> for String {
            fn from(wrapper: $name) -> Self {
                wrapper.0
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
    };
}

id_type!(VirtualMachineId, "Virtual machine identifier");
id_type!(JobId, "Asynchronous job identifier");
id_type!(ServiceOfferingId, "Service offering (compute sizing) identifier");
id_type!(TemplateId, "Template identifier");
id_type!(ZoneId, "Zone identifier");
id_type!(NetworkId, "Guest network identifier");
id_type!(DiskOfferingId, "Disk offering identifier");
id_type!(ProjectId, "Project identifier");
id_type!(NicId, "Network interface identifier");
id_type!(DomainId, "Domain identifier");
