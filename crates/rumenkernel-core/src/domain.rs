//! Domain definitions for kernel categorization.
//!
//! Kernels are grouped by the analysis path they belong to. Domains are used for
//! kernel discovery and for prefixing kernel identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Analytical domain for kernel categorization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Domain {
    /// Signal conditioning: sensor artifact removal and gap interpolation
    SignalConditioning,

    /// Circadian rhythm: cosinor fitting and percentile extremes
    CircadianRhythm,

    /// Drinking behaviour: drop-and-recover event detection
    DrinkingBehaviour,

    /// Pipeline: per-animal-day orchestration of the other domains
    Pipeline,
}

impl Domain {
    /// All available domains.
    pub const ALL: &'static [Domain] = &[
        Domain::SignalConditioning,
        Domain::CircadianRhythm,
        Domain::DrinkingBehaviour,
        Domain::Pipeline,
    ];

    /// Returns the domain name as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Domain::SignalConditioning => "SignalConditioning",
            Domain::CircadianRhythm => "CircadianRhythm",
            Domain::DrinkingBehaviour => "DrinkingBehaviour",
            Domain::Pipeline => "Pipeline",
        }
    }

    /// Short prefix used in kernel identifiers (e.g. `circadian/cosinor-fit`).
    #[must_use]
    pub const fn id_prefix(&self) -> &'static str {
        match self {
            Domain::SignalConditioning => "signal",
            Domain::CircadianRhythm => "circadian",
            Domain::DrinkingBehaviour => "behaviour",
            Domain::Pipeline => "pipeline",
        }
    }

    /// Parse a domain from either its full name or its identifier prefix.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|d| d.as_str().eq_ignore_ascii_case(s) || d.id_prefix().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_all_count() {
        assert_eq!(Domain::ALL.len(), 4);
    }

    #[test]
    fn test_domain_parse() {
        assert_eq!(Domain::parse("CircadianRhythm"), Some(Domain::CircadianRhythm));
        assert_eq!(Domain::parse("behaviour"), Some(Domain::DrinkingBehaviour));
        assert_eq!(Domain::parse("Unknown"), None);
    }

    #[test]
    fn test_domain_display() {
        assert_eq!(Domain::SignalConditioning.to_string(), "SignalConditioning");
        assert_eq!(Domain::Pipeline.id_prefix(), "pipeline");
    }
}
