//! Kernel metadata.
//!
//! Every analysis operation is exposed as a kernel carrying a `KernelMetadata`
//! record, which the registry and the CLI catalogue read.

use crate::domain::Domain;
use serde::{Deserialize, Serialize};

/// Kernel metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KernelMetadata {
    /// Unique kernel identifier (e.g., "circadian/cosinor-fit").
    pub id: String,

    /// Domain the kernel belongs to.
    pub domain: Domain,

    /// Human-readable description.
    pub description: String,

    /// Version of the kernel implementation.
    pub version: u32,
}

impl KernelMetadata {
    /// Create metadata for a batch analysis kernel.
    #[must_use]
    pub fn batch(id: impl Into<String>, domain: Domain) -> Self {
        Self {
            id: id.into(),
            domain,
            description: String::new(),
            version: 1,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the version.
    #[must_use]
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Returns the kernel name without its domain prefix, in PascalCase.
    ///
    /// `"circadian/cosinor-fit"` becomes `"CosinorFit"`.
    #[must_use]
    pub fn display_name(&self) -> String {
        let name = self.id.rsplit('/').next().unwrap_or(&self.id);
        to_pascal_case(name)
    }
}

/// Convert a kebab-case or snake_case string to PascalCase.
fn to_pascal_case(s: &str) -> String {
    s.split(|c| c == '-' || c == '_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}
