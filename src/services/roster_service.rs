//! Roster loading at startup and roster lookups for the current bout.

use std::{io::ErrorKind, path::Path};

use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};

use crate::{
    dto::{
        roster::{RosterListItem, TeamRosterResponse},
        validation::validate_roster_id,
    },
    error::ServiceError,
    state::{
        SharedState,
        game::Team,
        roster::{Roster, RosterBook, RosterError},
    },
};

/// Load every roster file in `dir`. The file stem becomes the roster ID.
///
/// Files that cannot be read or parsed are skipped with a warning. A missing directory yields
/// an empty book, so bouts can still be run without rosters.
pub async fn load_rosters(dir: &Path) -> RosterBook {
    let book = RosterBook::new();
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            info!(dir = %dir.display(), "roster directory not found; no rosters loaded");
            return book;
        }
        Err(err) => {
            warn!(dir = %dir.display(), error = %err, "failed to read roster directory");
            return book;
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "failed to list roster directory");
                break;
            }
        };

        let path = entry.path();
        let is_file = entry
            .file_type()
            .await
            .is_ok_and(|file_type| file_type.is_file());
        let Some(id) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        if !is_file || id.starts_with('.') {
            continue;
        }
        if validate_roster_id(id).is_err() {
            warn!(path = %path.display(), "skipping roster with an unusable file name");
            continue;
        }

        match load_roster(&path, id).await {
            Ok(roster) => {
                info!(id = %roster.id, team = %roster.name, skaters = roster.skaters.len(), "loaded roster");
                book.insert(roster);
            }
            Err(err) => warn!(path = %path.display(), error = %err, "skipping roster"),
        }
    }

    book
}

#[derive(Debug, Error)]
enum RosterLoadError {
    #[error("failed to read roster file")]
    Read(#[from] std::io::Error),
    #[error(transparent)]
    Parse(#[from] RosterError),
}

async fn load_roster(path: &Path, id: &str) -> Result<Roster, RosterLoadError> {
    let contents = fs::read_to_string(path).await?;
    Ok(Roster::parse(id, &contents)?)
}

/// All loaded rosters sorted by ID.
pub fn list_rosters(state: &SharedState) -> Vec<RosterListItem> {
    state
        .rosters()
        .list()
        .iter()
        .map(RosterListItem::from)
        .collect()
}

/// Roster assigned to `team` in the current bout.
pub async fn team_roster(
    state: &SharedState,
    team: Team,
) -> Result<TeamRosterResponse, ServiceError> {
    let bout = state.snapshot().await;
    let id = bout
        .rosters
        .get(team)
        .ok_or_else(|| ServiceError::NotFound(format!("no roster assigned to the {team} team")))?;
    let roster = state
        .rosters()
        .get(id)
        .ok_or_else(|| ServiceError::NotFound(format!("roster `{id}` is not loaded")))?;

    Ok(TeamRosterResponse::new(team, roster))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn loads_valid_files_and_skips_the_rest() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("toasters.txt"),
            "Toaster City\n34\tFred Fredney\n12\tBob Rodney\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.txt"), "Broken\n12345\tToo Long\n").unwrap();
        std::fs::write(dir.path().join("empty.txt"), "").unwrap();
        std::fs::write(dir.path().join("bad name.txt"), "Whatever\n1\tOne\n").unwrap();

        let book = load_rosters(dir.path()).await;
        let ids: Vec<_> = book.list().into_iter().map(|roster| roster.id).collect();
        assert_eq!(ids, vec!["toasters".to_string()]);

        let roster = book.get("toasters").unwrap();
        assert_eq!(roster.name, "Toaster City");
        let numbers: Vec<_> = roster.skaters.keys().cloned().collect();
        assert_eq!(numbers, vec!["12", "34"]);
    }

    #[tokio::test]
    async fn missing_directory_means_no_rosters() {
        let dir = TempDir::new().unwrap();
        let book = load_rosters(&dir.path().join("nope")).await;
        assert!(book.list().is_empty());
    }
}
