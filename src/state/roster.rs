use dashmap::DashMap;
use indexmap::IndexMap;
use thiserror::Error;

/// Longest skater number accepted on a roster.
pub const MAX_SKATER_NUMBER_LEN: usize = 4;

/// Failures while parsing a roster file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    /// The file has no team name line.
    #[error("roster `{id}` is empty")]
    Empty {
        /// Roster identifier.
        id: String,
    },
    /// A skater number is longer than [`MAX_SKATER_NUMBER_LEN`].
    #[error("roster `{id}` line {line}: skater number {number:?} is too long")]
    NumberTooLong {
        /// Roster identifier.
        id: String,
        /// One-based line number.
        line: usize,
        /// Offending number.
        number: String,
    },
}

/// Team roster loaded from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    /// Identifier, taken from the file name.
    pub id: String,
    /// Team name.
    pub name: String,
    /// Skater names keyed by number, sorted by number.
    pub skaters: IndexMap<String, String>,
}

impl Roster {
    /// Parse the text format: team name on the first line, then `number<TAB>name` lines.
    pub fn parse(id: impl Into<String>, contents: &str) -> Result<Self, RosterError> {
        let id = id.into();
        let mut lines = contents.lines();
        let name = lines
            .next()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| RosterError::Empty { id: id.clone() })?
            .to_owned();

        let mut skaters = IndexMap::new();
        for (index, line) in lines.enumerate() {
            let (number, skater_name) = line.split_once('\t').unwrap_or((line, ""));
            let number = number.trim();
            if number.is_empty() {
                continue;
            }
            if number.chars().count() > MAX_SKATER_NUMBER_LEN {
                return Err(RosterError::NumberTooLong {
                    id,
                    line: index + 2,
                    number: number.to_owned(),
                });
            }
            skaters.insert(number.to_owned(), skater_name.trim().to_owned());
        }
        skaters.sort_keys();

        Ok(Self { id, name, skaters })
    }

    /// Whether `number` skates for this team.
    pub fn has_skater(&self, number: &str) -> bool {
        self.skaters.contains_key(number)
    }
}

/// Concurrent registry of the rosters available to bouts.
#[derive(Debug, Default)]
pub struct RosterBook {
    rosters: DashMap<String, Roster>,
}

impl RosterBook {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a roster.
    pub fn insert(&self, roster: Roster) {
        self.rosters.insert(roster.id.clone(), roster);
    }

    /// Copy of the roster registered under `id`.
    pub fn get(&self, id: &str) -> Option<Roster> {
        self.rosters.get(id).map(|entry| entry.value().clone())
    }

    /// Whether a roster is registered under `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.rosters.contains_key(id)
    }

    /// `Some(true)` when the skater is on roster `id`, `None` when the roster is unknown.
    pub fn has_skater(&self, id: &str, number: &str) -> Option<bool> {
        self.rosters.get(id).map(|entry| entry.has_skater(number))
    }

    /// All rosters sorted by identifier.
    pub fn list(&self) -> Vec<Roster> {
        let mut rosters: Vec<Roster> = self
            .rosters
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        rosters.sort_by(|a, b| a.id.cmp(&b.id));
        rosters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_team_file() {
        let roster = Roster::parse(
            "toasters",
            "Toaster City\n34\tFred Fredney\n12\tBob Rodney\n\n",
        )
        .unwrap();

        assert_eq!(roster.name, "Toaster City");
        let numbers: Vec<_> = roster.skaters.keys().cloned().collect();
        assert_eq!(numbers, vec!["12", "34"]);
        assert_eq!(roster.skaters["12"], "Bob Rodney");
        assert!(roster.has_skater("34"));
        assert!(!roster.has_skater("99"));
    }

    #[test]
    fn number_longer_than_four_is_rejected() {
        let err = Roster::parse("long", "Longs\n12345\tToo Long\n").unwrap_err();
        assert_eq!(
            err,
            RosterError::NumberTooLong {
                id: "long".into(),
                line: 2,
                number: "12345".into(),
            }
        );
    }

    #[test]
    fn empty_file_is_rejected() {
        assert!(matches!(
            Roster::parse("empty", ""),
            Err(RosterError::Empty { .. })
        ));
    }

    #[test]
    fn book_answers_skater_lookups() {
        let book = RosterBook::new();
        book.insert(Roster::parse("b", "Bees\n7\tSting\n").unwrap());
        book.insert(Roster::parse("a", "Ants\n1\tHill\n").unwrap());

        assert_eq!(book.has_skater("b", "7"), Some(true));
        assert_eq!(book.has_skater("b", "8"), Some(false));
        assert_eq!(book.has_skater("c", "7"), None);
        let ids: Vec<_> = book.list().into_iter().map(|roster| roster.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
