//! Requirement strength of a discovered reference

use crate::error::ScanError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// How strongly a reference is required
///
/// Totally ordered with the strongest first: `Load < Call < None`. When the
/// same reference is seen twice the registry keeps the minimum.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// The class must be loadable
    Load,
    /// The member is invoked or accessed
    #[default]
    Call,
    /// Mentioned in metadata only; presence not required
    None,
}

impl Phase {
    /// All phases, strongest first
    pub const ALL: [Phase; 3] = [Phase::Load, Phase::Call, Phase::None];

    /// The stronger of two phases
    #[inline]
    #[must_use]
    pub fn strongest(self, other: Phase) -> Phase {
        self.min(other)
    }

    /// The weaker of two phases
    #[inline]
    #[must_use]
    pub fn weakest(self, other: Phase) -> Phase {
        self.max(other)
    }

    /// True when this phase is at least as strong as `cutoff`
    #[inline]
    #[must_use]
    pub fn meets(self, cutoff: Phase) -> bool {
        self <= cutoff
    }

    /// Lowercase name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Load => "load",
            Phase::Call => "call",
            Phase::None => "none",
        }
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|phase| phase.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ScanError::UnknownPhase(s.to_string()))
    }
}
