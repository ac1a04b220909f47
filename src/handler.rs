// HTTP handler bindings for the solver API endpoints
//
// Thin wrappers that bind Rocket routes to the Engine: they deserialize the
// request, delegate, and map solver errors onto HTTP status codes.

use rocket::http::Status;
use rocket::serde::json::Json;
use serde_json::{json, Value};

use caro_solver::engine::Engine;
use caro_solver::error::SolverError;
use caro_solver::solver::MoveRequest;

/// GET / endpoint
/// Returns engine metadata and the configuration it solves
#[get("/")]
pub fn index(engine: &rocket::State<Engine>) -> Json<Value> {
    Json(engine.info())
}

/// POST /move endpoint
/// Computes the best move for the requested player
#[post("/move", format = "json", data = "<move_req>")]
pub async fn get_move(
    engine: &rocket::State<Engine>,
    move_req: Json<MoveRequest>,
) -> (Status, Json<Value>) {
    match engine.get_move(move_req.into_inner()).await {
        Ok(response) => (
            Status::Ok,
            Json(json!({
                "position": [response.position.row, response.position.col],
                "score": response.score,
                "mover": response.mover,
            })),
        ),
        Err(e) => (status_for(&e), Json(json!({ "error": e.to_string() }))),
    }
}

fn status_for(error: &SolverError) -> Status {
    match error {
        SolverError::InvalidRequest(_)
        | SolverError::InvalidMove { .. }
        | SolverError::NoMovesAvailable => Status::BadRequest,
        SolverError::ServiceStopped => Status::ServiceUnavailable,
        _ => Status::InternalServerError,
    }
}
