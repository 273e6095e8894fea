use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::{
    dto::roster::{RosterListItem, TeamRosterResponse},
    error::{AppError, ErrorBody},
    services::roster_service,
    state::{SharedState, game::Team},
};

/// Roster endpoints used by the scoreboard and penalty stations.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rosters", get(list_rosters))
        .route("/rosters/{team}", get(get_team_roster))
}

/// List every roster loaded at startup.
#[utoipa::path(
    get,
    path = "/rosters",
    tag = "rosters",
    responses((status = 200, description = "Loaded rosters", body = [RosterListItem]))
)]
pub async fn list_rosters(State(state): State<SharedState>) -> Json<Vec<RosterListItem>> {
    Json(roster_service::list_rosters(&state))
}

/// Skaters of the roster assigned to `team`, ordered by number.
#[utoipa::path(
    get,
    path = "/rosters/{team}",
    tag = "rosters",
    params(("team" = Team, Path, description = "`home` or `away`")),
    responses(
        (status = 200, description = "Assigned roster", body = TeamRosterResponse),
        (status = 404, description = "No roster assigned or roster not loaded", body = ErrorBody)
    )
)]
pub async fn get_team_roster(
    State(state): State<SharedState>,
    Path(team): Path<Team>,
) -> Result<Json<TeamRosterResponse>, AppError> {
    Ok(Json(roster_service::team_roster(&state, team).await?))
}
