pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;

use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post, put},
};
use state::AppState;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allowed.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(allowed)
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.settings.app.cors_origins);

    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/emaillogin", post(routes::auth::email_login))
        .route("/emailverify", post(routes::auth::email_verify))
        .route("/usersignup", post(routes::auth::user_signup))
        .route("/me", get(routes::auth::me).put(routes::auth::update_me));

    let team_routes = Router::new()
        .route("/", get(routes::team::list))
        .route("/create", post(routes::team::create))
        .route("/invite", post(routes::team::invite))
        .route("/invitation/{token}", get(routes::team::accept_invitation))
        .route(
            "/invitation/{token}/decline",
            post(routes::team::decline_invitation),
        )
        .route("/members/add", post(routes::team::add_members))
        .route("/members/update", put(routes::team::update_member))
        .route("/event", post(routes::team::create_team_event))
        .route(
            "/event/{event_id}/attendance",
            put(routes::team::update_attendance),
        )
        .route("/{team_id}", get(routes::team::get))
        .route("/{team_id}/events", get(routes::team::team_events));

    let event_routes = Router::new()
        .route("/", get(routes::event::list))
        .route("/create", post(routes::event::create))
        .route(
            "/{event_id}",
            get(routes::event::get)
                .put(routes::event::update)
                .delete(routes::event::delete),
        );

    let api = Router::new()
        .nest("/auth", auth_routes)
        .nest("/teams", team_routes)
        .nest("/events", event_routes);

    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api)
        .merge(health)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
