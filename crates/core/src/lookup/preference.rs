//! Policies for choosing one identifier among those a service returns.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::types::{Identifier, IdentifierKind};

/// How to pick among multiple identifiers returned for a single match.
///
/// Ties among identifiers of the preferred kind are broken by the order in
/// which the service listed them: the first one wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierPreference {
    /// ISBN-13, falling back to ISBN-10.
    #[default]
    PreferIsbn13,
    /// ISBN-10, falling back to ISBN-13.
    PreferIsbn10,
    /// ISBN-13 only; anything else counts as not found.
    Isbn13Only,
    /// Whatever the service listed first, of any kind.
    FirstListed,
}

impl IdentifierPreference {
    /// Select the identifier to report, if any qualifies.
    pub fn select<'a>(&self, identifiers: &'a [Identifier]) -> Option<&'a Identifier> {
        let first_of = |kind: IdentifierKind| identifiers.iter().find(|id| id.kind == kind);

        match self {
            IdentifierPreference::PreferIsbn13 => {
                first_of(IdentifierKind::Isbn13).or_else(|| first_of(IdentifierKind::Isbn10))
            }
            IdentifierPreference::PreferIsbn10 => {
                first_of(IdentifierKind::Isbn10).or_else(|| first_of(IdentifierKind::Isbn13))
            }
            IdentifierPreference::Isbn13Only => first_of(IdentifierKind::Isbn13),
            IdentifierPreference::FirstListed => identifiers.iter().find(|id| !id.value.is_empty()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IdentifierPreference::PreferIsbn13 => "prefer_isbn13",
            IdentifierPreference::PreferIsbn10 => "prefer_isbn10",
            IdentifierPreference::Isbn13Only => "isbn13_only",
            IdentifierPreference::FirstListed => "first_listed",
        }
    }
}

impl fmt::Display for IdentifierPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdentifierPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "prefer_isbn13" | "isbn13" => Ok(IdentifierPreference::PreferIsbn13),
            "prefer_isbn10" | "isbn10" => Ok(IdentifierPreference::PreferIsbn10),
            "isbn13_only" => Ok(IdentifierPreference::Isbn13Only),
            "first_listed" | "first" => Ok(IdentifierPreference::FirstListed),
            other => Err(format!("unknown identifier preference: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> Vec<Identifier> {
        vec![
            Identifier::new(IdentifierKind::Other, "OCLC:1"),
            Identifier::new(IdentifierKind::Isbn10, "0441172717"),
            Identifier::new(IdentifierKind::Isbn13, "9780441172719"),
            Identifier::new(IdentifierKind::Isbn13, "9780441013593"),
        ]
    }

    #[test]
    fn test_prefer_isbn13() {
        let ids = ids();
        let chosen = IdentifierPreference::PreferIsbn13.select(&ids).unwrap();
        assert_eq!(chosen.value, "9780441172719");
    }

    #[test]
    fn test_prefer_isbn13_falls_back_to_isbn10() {
        let ids = vec![Identifier::new(IdentifierKind::Isbn10, "0441172717")];
        let chosen = IdentifierPreference::PreferIsbn13.select(&ids).unwrap();
        assert_eq!(chosen.value, "0441172717");
    }

    #[test]
    fn test_prefer_isbn10() {
        let ids = ids();
        let chosen = IdentifierPreference::PreferIsbn10.select(&ids).unwrap();
        assert_eq!(chosen.value, "0441172717");
    }

    #[test]
    fn test_isbn13_only() {
        let ids = vec![Identifier::new(IdentifierKind::Isbn10, "0441172717")];
        assert!(IdentifierPreference::Isbn13Only.select(&ids).is_none());
    }

    #[test]
    fn test_first_listed() {
        let ids = ids();
        let chosen = IdentifierPreference::FirstListed.select(&ids).unwrap();
        assert_eq!(chosen.value, "OCLC:1");
    }

    #[test]
    fn test_select_empty() {
        assert!(IdentifierPreference::PreferIsbn13.select(&[]).is_none());
        assert!(IdentifierPreference::FirstListed.select(&[]).is_none());
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            "prefer-isbn10".parse::<IdentifierPreference>().unwrap(),
            IdentifierPreference::PreferIsbn10
        );
        assert_eq!(
            "ISBN13_ONLY".parse::<IdentifierPreference>().unwrap(),
            IdentifierPreference::Isbn13Only
        );
        assert!("newest".parse::<IdentifierPreference>().is_err());
    }
}
