#[macro_use]
extern crate rocket;

use log::{error, info};
use rocket::fairing::AdHoc;
use std::env;

use caro_solver::config::Config;
use caro_solver::debug_logger::DebugLogger;
use caro_solver::engine::Engine;

mod handler;

#[rocket::main]
async fn main() {
    // Lots of web hosting services expect you to bind to the port specified by the `PORT`
    // environment variable. However, Rocket looks at the `ROCKET_PORT` environment variable.
    // If we find a value for `PORT`, we set `ROCKET_PORT` to that value.
    if let Ok(port) = env::var("PORT") {
        env::set_var("ROCKET_PORT", &port);
    }

    // We default to 'info' level logging. But if the `RUST_LOG` environment variable is set,
    // we keep that value instead.
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }

    env_logger::init();

    info!("Starting caro solver server...");

    // Load configuration once at startup
    let config = Config::load_or_default();
    let logger = DebugLogger::new(config.debug.enabled, &config.debug.log_file_path).await;

    let engine = match Engine::new(config, logger) {
        Ok(engine) => engine,
        Err(e) => {
            error!("Failed to start solver: {}", e);
            std::process::exit(1);
        }
    };

    let result = rocket::build()
        .manage(engine)
        .attach(AdHoc::on_response("Server ID Middleware", |_, res| {
            Box::pin(async move {
                res.set_raw_header("Server", "caro-solver");
            })
        }))
        .mount("/", routes![handler::index, handler::get_move])
        .launch()
        .await;

    if let Err(e) = result {
        error!("Server stopped: {}", e);
        std::process::exit(1);
    }
}
