//! Birth/survive rule sets for Life-like automata.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Largest neighbor count in a Moore neighborhood.
pub const MAX_NEIGHBORS: u8 = 8;

/// Set of neighbor counts in `0..=8`, stored as a 9-bit mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct NeighborSet(u16);

impl NeighborSet {
    /// The empty set.
    pub const EMPTY: Self = Self(0);

    /// Build from a raw mask. Bits above 8 are dropped.
    #[inline]
    pub const fn from_mask(mask: u16) -> Self {
        Self(mask & 0x1FF)
    }

    /// Raw 9-bit mask.
    #[inline]
    pub const fn mask(self) -> u16 {
        self.0
    }

    #[inline]
    pub const fn contains(self, count: u8) -> bool {
        count <= MAX_NEIGHBORS && self.0 & (1 << count) != 0
    }

    /// Insert a neighbor count. Returns `false` if it is out of range.
    pub fn insert(&mut self, count: u8) -> bool {
        if count > MAX_NEIGHBORS {
            return false;
        }
        self.0 |= 1 << count;
        true
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterate counts in ascending order.
    pub fn iter(self) -> impl Iterator<Item = u8> {
        (0..=MAX_NEIGHBORS).filter(move |&c| self.contains(c))
    }
}

impl TryFrom<Vec<u8>> for NeighborSet {
    type Error = RuleParseError;

    fn try_from(counts: Vec<u8>) -> Result<Self, Self::Error> {
        let mut set = Self::EMPTY;
        for count in counts {
            if !set.insert(count) {
                return Err(RuleParseError::CountOutOfRange(count));
            }
        }
        Ok(set)
    }
}

impl From<NeighborSet> for Vec<u8> {
    fn from(set: NeighborSet) -> Self {
        set.iter().collect()
    }
}

impl FromIterator<u8> for NeighborSet {
    /// Counts above 8 are ignored.
    fn from_iter<I: IntoIterator<Item = u8>>(counts: I) -> Self {
        let mut set = Self::EMPTY;
        for count in counts {
            set.insert(count);
        }
        set
    }
}

/// Rule set of a Life-like automaton.
///
/// A dead cell comes alive when its live-neighbor count is in `born`; a live
/// cell stays alive when its count is in `survive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleSet {
    pub born: NeighborSet,
    pub survive: NeighborSet,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::conway()
    }
}

impl RuleSet {
    /// Build from neighbor-count lists. Counts above 8 are ignored.
    pub fn new(born: &[u8], survive: &[u8]) -> Self {
        Self {
            born: born.iter().copied().collect(),
            survive: survive.iter().copied().collect(),
        }
    }

    /// Classic Game of Life, B3/S23.
    pub fn conway() -> Self {
        Self::new(&[3], &[2, 3])
    }

    /// Next state of one cell.
    #[inline]
    pub fn next_state(&self, alive: bool, neighbors: u8) -> bool {
        if alive {
            self.survive.contains(neighbors)
        } else {
            self.born.contains(neighbors)
        }
    }

    /// Look up a named preset (case-insensitive).
    pub fn preset(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        PRESETS
            .iter()
            .find(|(preset, _)| *preset == name)
            .and_then(|(_, notation)| notation.parse().ok())
    }

    /// Names of all built-in presets.
    pub fn preset_names() -> impl Iterator<Item = &'static str> {
        PRESETS.iter().map(|(name, _)| *name)
    }
}

const PRESETS: &[(&str, &str)] = &[
    ("conway", "B3/S23"),
    ("highlife", "B36/S23"),
    ("seeds", "B2/S"),
    ("day-and-night", "B3678/S34678"),
    ("life-without-death", "B3/S012345678"),
    ("maze", "B3/S12345"),
    ("replicator", "B1357/S1357"),
    ("diamoeba", "B35678/S5678"),
];

impl fmt::Display for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B")?;
        for c in self.born.iter() {
            write!(f, "{c}")?;
        }
        write!(f, "/S")?;
        for c in self.survive.iter() {
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl FromStr for RuleSet {
    type Err = RuleParseError;

    /// Parse `B3/S23` notation. Parts may appear in either order and the
    /// letters are case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut born = None;
        let mut survive = None;

        for part in s.trim().split('/') {
            let mut chars = part.chars();
            let slot = match chars.next().map(|c| c.to_ascii_uppercase()) {
                Some('B') => &mut born,
                Some('S') => &mut survive,
                _ => return Err(RuleParseError::Malformed(s.to_string())),
            };
            if slot.is_some() {
                return Err(RuleParseError::Malformed(s.to_string()));
            }
            let mut set = NeighborSet::EMPTY;
            for c in chars {
                let digit = c
                    .to_digit(10)
                    .ok_or_else(|| RuleParseError::Malformed(s.to_string()))?
                    as u8;
                if !set.insert(digit) {
                    return Err(RuleParseError::CountOutOfRange(digit));
                }
            }
            *slot = Some(set);
        }

        match (born, survive) {
            (Some(born), Some(survive)) => Ok(Self { born, survive }),
            _ => Err(RuleParseError::Malformed(s.to_string())),
        }
    }
}

/// Rule parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleParseError {
    #[error("Malformed rule notation {0:?}, expected e.g. \"B3/S23\"")]
    Malformed(String),
    #[error("Neighbor count {0} is out of range (0-8)")]
    CountOutOfRange(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conway_transitions() {
        let rules = RuleSet::conway();
        assert!(rules.next_state(false, 3));
        assert!(!rules.next_state(false, 2));
        assert!(rules.next_state(true, 2));
        assert!(rules.next_state(true, 3));
        assert!(!rules.next_state(true, 1));
        assert!(!rules.next_state(true, 4));
    }

    #[test]
    fn test_notation_roundtrip() {
        let rules: RuleSet = "B36/S23".parse().unwrap();
        assert_eq!(rules, RuleSet::new(&[3, 6], &[2, 3]));
        assert_eq!(rules.to_string(), "B36/S23");

        // Order and case do not matter
        let swapped: RuleSet = "s23/b3".parse().unwrap();
        assert_eq!(swapped, RuleSet::conway());

        // Empty survive set is legal (Seeds)
        let seeds: RuleSet = "B2/S".parse().unwrap();
        assert!(seeds.survive.is_empty());
    }

    #[test]
    fn test_notation_errors() {
        assert!(matches!(
            "B9/S23".parse::<RuleSet>(),
            Err(RuleParseError::CountOutOfRange(9))
        ));
        assert!(matches!(
            "B3".parse::<RuleSet>(),
            Err(RuleParseError::Malformed(_))
        ));
        assert!(matches!(
            "B3/B3".parse::<RuleSet>(),
            Err(RuleParseError::Malformed(_))
        ));
        assert!(matches!(
            "B3x/S2".parse::<RuleSet>(),
            Err(RuleParseError::Malformed(_))
        ));
    }

    #[test]
    fn test_presets() {
        assert_eq!(RuleSet::preset("Conway"), Some(RuleSet::conway()));
        for name in RuleSet::preset_names() {
            assert!(RuleSet::preset(name).is_some(), "preset {name} must parse");
        }
        assert_eq!(RuleSet::preset("nope"), None);
    }

    #[test]
    fn test_serde_as_count_lists() {
        let json = serde_json::to_string(&RuleSet::conway()).unwrap();
        assert_eq!(json, r#"{"born":[3],"survive":[2,3]}"#);

        let parsed: RuleSet = serde_json::from_str(r#"{"born":[3,6],"survive":[2,3]}"#).unwrap();
        assert_eq!(parsed.to_string(), "B36/S23");

        assert!(serde_json::from_str::<RuleSet>(r#"{"born":[12],"survive":[]}"#).is_err());
    }
}
