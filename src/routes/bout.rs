use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    routing::{get, post},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::bout::{
        BoutListItem, BoutSnapshot, JamSheetRow, NewBoutRequest, PenaltyBoard, SkaterPenalties,
        StartAt,
    },
    error::{AppError, ErrorBody},
    services::bout_service,
    state::{SharedState, command::Command, game::Team},
};

/// Bout endpoints: the live state, operator commands and the sheets derived from them.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/bout", post(create_bout))
        .route("/bout/state", get(get_state))
        .route("/bout/commands", post(post_command))
        .route("/bout/start-at", post(start_at))
        .route("/bout/jams", get(get_jams))
        .route("/bout/penalties/{team}", get(get_penalty_board))
        .route("/bout/penalties/{team}/{skater}", get(get_skater_penalties))
        .route("/bouts", get(list_bouts))
        .route("/bouts/{id}/load", post(load_bout))
}

/// Full snapshot of the live bout with clocks projected to now.
#[utoipa::path(
    get,
    path = "/bout/state",
    tag = "bout",
    responses((status = 200, description = "Current bout", body = BoutSnapshot))
)]
pub async fn get_state(State(state): State<SharedState>) -> Json<BoutSnapshot> {
    Json(bout_service::current_bout(&state).await)
}

/// Apply one operator command, returning the updated snapshot.
#[utoipa::path(
    post,
    path = "/bout/commands",
    tag = "bout",
    request_body = Command,
    responses(
        (status = 200, description = "Command applied", body = BoutSnapshot),
        (status = 400, description = "Malformed command or value out of range", body = ErrorBody),
        (status = 404, description = "Skater or jam not found", body = ErrorBody),
        (status = 409, description = "Command not allowed in the current state", body = ErrorBody)
    )
)]
pub async fn post_command(
    State(state): State<SharedState>,
    payload: Result<Json<Command>, JsonRejection>,
) -> Result<Json<BoutSnapshot>, AppError> {
    let Json(command) = payload?;
    Ok(Json(bout_service::apply_command(&state, command).await?))
}

/// Start the time-to-derby countdown towards a time of day on the server's clock.
#[utoipa::path(
    post,
    path = "/bout/start-at",
    tag = "bout",
    request_body = StartAt,
    responses(
        (status = 200, description = "Countdown started", body = BoutSnapshot),
        (status = 400, description = "Hour or minute out of range", body = ErrorBody),
        (status = 409, description = "Countdown not allowed in the current state", body = ErrorBody)
    )
)]
pub async fn start_at(
    State(state): State<SharedState>,
    payload: Result<Json<StartAt>, JsonRejection>,
) -> Result<Json<BoutSnapshot>, AppError> {
    let Json(start_at) = payload?;
    Ok(Json(bout_service::start_time_to_derby_at(&state, start_at).await?))
}

/// Replace the live bout with a fresh one.
#[utoipa::path(
    post,
    path = "/bout",
    tag = "bout",
    request_body = NewBoutRequest,
    responses(
        (status = 200, description = "New bout started", body = BoutSnapshot),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 404, description = "Roster not loaded", body = ErrorBody)
    )
)]
pub async fn create_bout(
    State(state): State<SharedState>,
    payload: Result<Json<NewBoutRequest>, JsonRejection>,
) -> Result<Json<BoutSnapshot>, AppError> {
    let Json(request) = payload?;
    request.validate()?;
    Ok(Json(bout_service::new_bout(&state, request).await?))
}

/// Scoresheet: every jam with per-team jam and running totals.
#[utoipa::path(
    get,
    path = "/bout/jams",
    tag = "bout",
    responses((status = 200, description = "Jams in play order", body = [JamSheetRow]))
)]
pub async fn get_jams(State(state): State<SharedState>) -> Json<Vec<JamSheetRow>> {
    Json(bout_service::jams(&state).await)
}

/// Penalties of one team grouped by skater.
#[utoipa::path(
    get,
    path = "/bout/penalties/{team}",
    tag = "bout",
    params(("team" = Team, Path, description = "`home` or `away`")),
    responses((status = 200, description = "Penalty board", body = PenaltyBoard))
)]
pub async fn get_penalty_board(
    State(state): State<SharedState>,
    Path(team): Path<Team>,
) -> Json<PenaltyBoard> {
    Json(bout_service::penalty_board(&state, team).await)
}

/// Penalties of one skater.
#[utoipa::path(
    get,
    path = "/bout/penalties/{team}/{skater}",
    tag = "bout",
    params(
        ("team" = Team, Path, description = "`home` or `away`"),
        ("skater" = String, Path, description = "Skater number")
    ),
    responses(
        (status = 200, description = "Skater penalties", body = SkaterPenalties),
        (status = 400, description = "Malformed skater number", body = ErrorBody),
        (status = 404, description = "Skater not on the team roster", body = ErrorBody)
    )
)]
pub async fn get_skater_penalties(
    State(state): State<SharedState>,
    Path((team, skater)): Path<(Team, String)>,
) -> Result<Json<SkaterPenalties>, AppError> {
    Ok(Json(
        bout_service::skater_penalties(&state, team, &skater).await?,
    ))
}

/// Bouts kept by the storage backend.
#[utoipa::path(
    get,
    path = "/bouts",
    tag = "bout",
    responses(
        (status = 200, description = "Stored bouts, most recent first", body = [BoutListItem]),
        (status = 503, description = "Storage unavailable", body = ErrorBody)
    )
)]
pub async fn list_bouts(
    State(state): State<SharedState>,
) -> Result<Json<Vec<BoutListItem>>, AppError> {
    Ok(Json(bout_service::list_bouts(&state).await?))
}

/// Make a stored bout the live one.
#[utoipa::path(
    post,
    path = "/bouts/{id}/load",
    tag = "bout",
    params(("id" = Uuid, Path, description = "Bout identifier")),
    responses(
        (status = 200, description = "Bout loaded", body = BoutSnapshot),
        (status = 404, description = "Bout not found", body = ErrorBody),
        (status = 503, description = "Storage unavailable", body = ErrorBody)
    )
)]
pub async fn load_bout(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BoutSnapshot>, AppError> {
    Ok(Json(bout_service::load_bout(&state, id).await?))
}
