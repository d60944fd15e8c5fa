use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{certificates, events, health_check, registrations};
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    let event_routes = Router::new()
        .route("/", get(events::list_events).post(events::create_event))
        .route(
            "/:id",
            get(events::get_event)
                .put(events::update_event)
                .delete(events::delete_event),
        )
        .route("/:id/certificates/send", post(certificates::send_certificates))
        .route(
            "/:id/certificates/preview",
            get(certificates::preview_certificate),
        );

    let registration_routes = Router::new()
        .route(
            "/",
            get(registrations::list_registrations).post(registrations::register),
        )
        .route("/recent", get(registrations::recent_registrations))
        .route("/ticket/:token_id", get(registrations::get_ticket))
        .route("/ticket/:token_id/pdf", get(registrations::download_ticket))
        .route("/event/:event_id", get(registrations::event_registrations))
        .route("/checkin/:token_id", put(registrations::check_in))
        .route("/:id", axum::routing::delete(registrations::delete_registration))
        .route("/:id/attendance", put(registrations::update_attendance));

    let cors = create_cors_layer(&state.config);
    let security = create_security_headers_layer(&state.config);

    Router::new()
        .route("/health", get(health_check))
        .nest("/events", event_routes)
        .nest("/registrations", registration_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(security)
        .layer(cors)
}
