//! Route table
//!
//! Everything is mounted under `/api`, matching the web client's base URL.

mod memory;
mod processes;
mod simulation;

use axum::routing::{get, post, put};
use axum::Router;
use ossim_runtime::Controller;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the application router around a controller.
pub fn router(controller: Controller) -> Router {
    let api = Router::new()
        .route(
            "/processes",
            post(processes::create)
                .get(processes::list)
                .delete(processes::clear),
        )
        .route("/simulation/start", post(simulation::start))
        .route("/simulation/pause", post(simulation::pause))
        .route("/simulation/resume", post(simulation::resume))
        .route("/simulation/stop", post(simulation::stop))
        .route("/simulation/reset", post(simulation::reset))
        .route("/simulation/step", post(simulation::step))
        .route("/simulation/state", get(simulation::state))
        .route("/simulation/timeline", get(simulation::timeline))
        .route("/simulation/gantt", get(simulation::gantt))
        .route("/simulation/algorithm", put(simulation::set_algorithm))
        .route("/simulation/io-settings", post(simulation::io_settings))
        .route(
            "/simulation/mode",
            post(simulation::set_mode).get(simulation::get_mode),
        )
        .route("/interruptions", post(simulation::interrupt))
        .route("/memory/initialize", post(memory::initialize))
        .route("/memory/allocate", post(memory::allocate))
        .route("/memory/deallocate/{process_id}", post(memory::deallocate))
        .route("/memory/state", get(memory::state))
        .route("/memory/algorithm", put(memory::set_algorithm));

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(controller)
}
