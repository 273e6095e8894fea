use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Derby Bout Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::public_stream,
        crate::routes::bout::get_state,
        crate::routes::bout::post_command,
        crate::routes::bout::start_at,
        crate::routes::bout::create_bout,
        crate::routes::bout::get_jams,
        crate::routes::bout::get_penalty_board,
        crate::routes::bout::get_skater_penalties,
        crate::routes::bout::list_bouts,
        crate::routes::bout::load_bout,
        crate::routes::roster::list_rosters,
        crate::routes::roster::get_team_roster,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dto::bout::BoutSnapshot,
            crate::dto::bout::NewBoutRequest,
            crate::dto::bout::StartAt,
            crate::dto::bout::Meridiem,
            crate::dto::bout::JamSheetRow,
            crate::dto::bout::PenaltyBoard,
            crate::dto::bout::SkaterPenalties,
            crate::dto::bout::BoutListItem,
            crate::dto::roster::RosterListItem,
            crate::dto::roster::TeamRosterResponse,
            crate::state::command::Command,
            crate::state::game::GameState,
            crate::error::ErrorBody,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "bout", description = "Bout state, operator commands and scoresheets"),
        (name = "rosters", description = "Team rosters"),
    )
)]
pub struct ApiDoc;
