// Library exports for the caro solver
// This allows the server, the generate tool and the tests to share the engine

pub mod codec;
pub mod config;
pub mod debug_logger;
pub mod engine;
pub mod error;
pub mod game;
pub mod rules;
pub mod scoring;
pub mod search;
pub mod solver;
pub mod table;
pub mod types;
