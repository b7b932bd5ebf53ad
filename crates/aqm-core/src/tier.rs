//! Coin tiers, contact priorities, and the budget matrix.
//!
//! A tier names the cryptographic strength (and byte cost) of a coin; a
//! priority names how much inventory a contact is worth caching for. The
//! `(priority, tier)` budget matrix and the downward-only fallback chains are
//! protocol constants, not configuration.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coin strength tier.
///
/// Ordering of the variants is strongest-first; fallback only ever walks
/// downward (Gold → Silver → Bronze, never back up).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    /// Post-quantum KEM + post-quantum signature.
    Gold,
    /// Post-quantum KEM + classical signature.
    Silver,
    /// Classical KEM + classical signature.
    Bronze,
}

impl Tier {
    /// All tiers, strongest first.
    pub const ALL: [Tier; 3] = [Tier::Gold, Tier::Silver, Tier::Bronze];

    /// Candidate tiers for selection, in order: the desired tier followed by
    /// every weaker tier. Selection never falls back upward.
    pub fn fallback_chain(self) -> &'static [Tier] {
        match self {
            Tier::Gold => &[Tier::Gold, Tier::Silver, Tier::Bronze],
            Tier::Silver => &[Tier::Silver, Tier::Bronze],
            Tier::Bronze => &[Tier::Bronze],
        }
    }

    /// Canonical wire/storage name.
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Gold => "GOLD",
            Tier::Silver => "SILVER",
            Tier::Bronze => "BRONZE",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A string that names no known tier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid coin tier: {0:?}")]
pub struct ParseTierError(
    /// The rejected input.
    pub String,
);

impl FromStr for Tier {
    type Err = ParseTierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GOLD" => Ok(Tier::Gold),
            "SILVER" => Ok(Tier::Silver),
            "BRONZE" => Ok(Tier::Bronze),
            other => Err(ParseTierError(other.to_string())),
        }
    }
}

/// Contact classification controlling how many coins may be cached per tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    /// Close contact: full gold/silver stock plus a bronze reserve.
    Bestie,
    /// Regular contact: silver/bronze only.
    Mate,
    /// Unknown contact: nothing is pre-fetched.
    Stranger,
}

impl Priority {
    /// Numeric rank, best first. A priority change to a higher rank is a
    /// downgrade and triggers synchronous eviction of excess inventory.
    pub fn rank(self) -> u8 {
        match self {
            Priority::Bestie => 0,
            Priority::Mate => 1,
            Priority::Stranger => 2,
        }
    }

    /// Canonical wire/storage name.
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Bestie => "BESTIE",
            Priority::Mate => "MATE",
            Priority::Stranger => "STRANGER",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A string that names no known priority.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid contact priority: {0:?}")]
pub struct ParsePriorityError(
    /// The rejected input.
    pub String,
);

impl FromStr for Priority {
    type Err = ParsePriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BESTIE" => Ok(Priority::Bestie),
            "MATE" => Ok(Priority::Mate),
            "STRANGER" => Ok(Priority::Stranger),
            other => Err(ParsePriorityError(other.to_string())),
        }
    }
}

/// Maximum number of cached coins for a `(priority, tier)` cell.
///
/// A cap of zero means the tier is never cached for that priority; inventory
/// inserts fail immediately rather than entering the optimistic-lock loop.
pub const fn budget_cap(priority: Priority, tier: Tier) -> u32 {
    match (priority, tier) {
        (Priority::Bestie, Tier::Gold) => 5,
        (Priority::Bestie, Tier::Silver) => 4,
        (Priority::Bestie, Tier::Bronze) => 1,
        (Priority::Mate, Tier::Gold) => 0,
        (Priority::Mate, Tier::Silver) => 6,
        (Priority::Mate, Tier::Bronze) => 4,
        (Priority::Stranger, _) => 0,
    }
}

/// Approximate stored size of one coin at the given tier, in bytes.
///
/// Used by storage reports and GC accounting only; never enforced.
pub const fn coin_size_bytes(tier: Tier) -> u64 {
    match tier {
        // Kyber-768 pk (1184) + Dilithium sig (2420)
        Tier::Gold => 3_604,
        // Kyber-768 pk (1184) + Ed25519 sig (64)
        Tier::Silver => 1_248,
        // X25519 pk (32) + Ed25519 sig (64)
        Tier::Bronze => 96,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_roundtrip_through_str() {
        for tier in Tier::ALL {
            assert_eq!(tier.as_str().parse::<Tier>().unwrap(), tier);
        }
    }

    #[test]
    fn unknown_tier_is_rejected() {
        assert_eq!("PLATINUM".parse::<Tier>(), Err(ParseTierError("PLATINUM".to_string())));
        assert!("gold".parse::<Tier>().is_err()); // case-sensitive
    }

    #[test]
    fn priority_roundtrip_through_str() {
        for priority in [Priority::Bestie, Priority::Mate, Priority::Stranger] {
            assert_eq!(priority.as_str().parse::<Priority>().unwrap(), priority);
        }
    }

    #[test]
    fn fallback_never_goes_upward() {
        for tier in Tier::ALL {
            for candidate in tier.fallback_chain() {
                assert!(candidate >= &tier, "{candidate:?} is stronger than {tier:?}");
            }
        }
    }

    #[test]
    fn fallback_starts_at_desired_tier() {
        for tier in Tier::ALL {
            assert_eq!(tier.fallback_chain()[0], tier);
        }
    }

    #[test]
    fn budget_matrix_matches_protocol_table() {
        assert_eq!(budget_cap(Priority::Bestie, Tier::Gold), 5);
        assert_eq!(budget_cap(Priority::Bestie, Tier::Silver), 4);
        assert_eq!(budget_cap(Priority::Bestie, Tier::Bronze), 1);
        assert_eq!(budget_cap(Priority::Mate, Tier::Gold), 0);
        assert_eq!(budget_cap(Priority::Mate, Tier::Silver), 6);
        assert_eq!(budget_cap(Priority::Mate, Tier::Bronze), 4);
        for tier in Tier::ALL {
            assert_eq!(budget_cap(Priority::Stranger, tier), 0);
        }
    }

    #[test]
    fn downgrade_is_rank_increase() {
        assert!(Priority::Mate.rank() > Priority::Bestie.rank());
        assert!(Priority::Stranger.rank() > Priority::Mate.rank());
    }
}
