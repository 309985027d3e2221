//! Namespace/name pairs identifying directives, events and context entries.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A `(namespace, name)` pair, e.g. `SpeechSynthesizer.Speak`.
///
/// Constants can be declared with [`NamespaceAndName::from_static`]; values
/// parsed off the wire own their strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamespaceAndName {
    pub namespace: Cow<'static, str>,
    pub name: Cow<'static, str>,
}

impl NamespaceAndName {
    /// Build a pair from owned or borrowed strings.
    pub fn new(
        namespace: impl Into<Cow<'static, str>>,
        name: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Build a pair usable in `const` position.
    #[must_use]
    pub const fn from_static(namespace: &'static str, name: &'static str) -> Self {
        Self {
            namespace: Cow::Borrowed(namespace),
            name: Cow::Borrowed(name),
        }
    }

    /// Whether this pair matches the given namespace and name.
    pub fn matches(&self, namespace: &str, name: &str) -> bool {
        self.namespace == namespace && self.name == name
    }
}

impl fmt::Display for NamespaceAndName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}
