//! Bout operations behind the REST API: commands, fresh bouts and read-only projections.

use time::{OffsetDateTime, Time};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        bout::{
            BoutListItem, BoutSnapshot, JamSheetRow, NewBoutRequest, PenaltyBoard,
            SkaterPenalties, StartAt, jam_sheet,
        },
        validation::validate_skater_number,
    },
    error::ServiceError,
    state::{
        SharedState,
        command::Command,
        game::{GameState, Team},
        roster::Roster,
    },
};

/// Current bout with clocks projected to now.
pub async fn current_bout(state: &SharedState) -> BoutSnapshot {
    snapshot_of(state, state.snapshot().await)
}

/// Apply one operator command to the live bout.
pub async fn apply_command(
    state: &SharedState,
    command: Command,
) -> Result<BoutSnapshot, ServiceError> {
    match state.apply_command(&command).await {
        Ok(next) => {
            info!(command = command.name(), version = next.version, "command applied");
            Ok(snapshot_of(state, next))
        }
        Err(err) => {
            info!(command = command.name(), kind = err.kind(), error = %err, "command rejected");
            Err(err.into())
        }
    }
}

/// Replace the live bout with a fresh one, optionally starting the time-to-derby countdown.
pub async fn new_bout(
    state: &SharedState,
    request: NewBoutRequest,
) -> Result<BoutSnapshot, ServiceError> {
    let rosters = request.rosters();
    for team in Team::BOTH {
        if let Some(id) = rosters.get(team)
            && !state.rosters().contains(id)
        {
            return Err(ServiceError::NotFound(format!("roster `{id}` is not loaded")));
        }
    }

    let countdown = match (request.time_to_derby_seconds, request.start_at) {
        (Some(_), Some(_)) => {
            return Err(ServiceError::InvalidInput(
                "give either time_to_derby_seconds or start_at, not both".into(),
            ));
        }
        (Some(seconds), None) => Some(seconds),
        (None, Some(start_at)) => Some(start_at.countdown_from(local_time_of_day())?),
        (None, None) => None,
    };

    let processor = state.processor();
    let mut bout = processor.new_bout(rosters);
    if let Some(seconds) = countdown {
        bout = processor.apply(&Command::StartTimeToDerby { seconds }, &bout)?;
    }

    info!(bout = %bout.id, home = ?bout.rosters.home, away = ?bout.rosters.away, "new bout");
    state.replace_bout(bout.clone()).await;
    Ok(snapshot_of(state, bout))
}

/// Count down to the next occurrence of a time of day on the server's clock.
pub async fn start_time_to_derby_at(
    state: &SharedState,
    start_at: StartAt,
) -> Result<BoutSnapshot, ServiceError> {
    let seconds = start_at.countdown_from(local_time_of_day())?;
    apply_command(state, Command::StartTimeToDerby { seconds }).await
}

/// Scoresheet of the live bout.
pub async fn jams(state: &SharedState) -> Vec<JamSheetRow> {
    jam_sheet(&state.snapshot().await)
}

/// Penalty board of one team.
pub async fn penalty_board(state: &SharedState, team: Team) -> PenaltyBoard {
    let bout = state.snapshot().await;
    let roster = assigned_roster(state, &bout, team);
    PenaltyBoard::new(&bout, team, roster.as_ref())
}

/// Penalties of one skater. Unknown skaters are rejected when the team has a roster.
pub async fn skater_penalties(
    state: &SharedState,
    team: Team,
    skater: &str,
) -> Result<SkaterPenalties, ServiceError> {
    validate_skater_number(skater)
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;

    let bout = state.snapshot().await;
    let roster = assigned_roster(state, &bout, team);
    if let Some(roster) = &roster
        && !roster.has_skater(skater)
    {
        return Err(ServiceError::NotFound(format!(
            "skater `{skater}` is not on the {team} roster `{}`",
            roster.id
        )));
    }

    Ok(crate::dto::bout::skater_penalties(
        &bout,
        team,
        skater,
        roster.as_ref(),
    ))
}

/// Bouts kept by the storage backend, most recently updated first.
pub async fn list_bouts(state: &SharedState) -> Result<Vec<BoutListItem>, ServiceError> {
    let store = state.bout_store().await.ok_or(ServiceError::Degraded)?;
    let bouts = store.list_bouts().await?;
    Ok(bouts.into_iter().map(BoutListItem::from).collect())
}

/// Make a stored bout the live one. Its clocks resume from the stored values.
pub async fn load_bout(state: &SharedState, id: Uuid) -> Result<BoutSnapshot, ServiceError> {
    let store = state.bout_store().await.ok_or(ServiceError::Degraded)?;
    let Some(entity) = store.find_bout(id).await? else {
        return Err(ServiceError::NotFound(format!("bout `{id}` not found")));
    };

    info!(bout = %id, version = entity.state.version, "loading stored bout");
    state.replace_bout(entity.state.clone()).await;
    Ok(snapshot_of(state, entity.state))
}

fn local_time_of_day() -> Time {
    match OffsetDateTime::now_local() {
        Ok(now) => now.time(),
        Err(err) => {
            warn!(error = %err, "local UTC offset unavailable; start times are read as UTC");
            OffsetDateTime::now_utc().time()
        }
    }
}

fn snapshot_of(state: &SharedState, bout: GameState) -> BoutSnapshot {
    BoutSnapshot::new(bout, state.processor().clock_rules())
}

fn assigned_roster(state: &SharedState, bout: &GameState, team: Team) -> Option<Roster> {
    bout.rosters
        .get(team)
        .and_then(|id| state.rosters().get(id))
}
