// Precomputes the value table of one configuration by solving the empty board
//
// Usage:
//   cargo run --release --bin generate -- [options]
//
// Options:
//   --size <N>          Board size (default: from config)
//   --players <P>       Number of players (default: from config)
//   --win-length <C>    Pieces in a row needed to win (default: from config)
//   --cache-dir <dir>   Where the table file is written (default: from config)
//   --config <path>     Path to Solver.toml (default: Solver.toml)

use std::env;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

use caro_solver::config::Config;
use caro_solver::solver::{MoveRequest, SolverService};
use caro_solver::types::Board;

fn print_usage() {
    eprintln!("Caro Value Table Generator");
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("  generate [OPTIONS]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("  --size <N>              Board size");
    eprintln!("  --players <P>           Number of players (2-20)");
    eprintln!("  --win-length <C>        Pieces in a row needed to win (at least 2)");
    eprintln!("  --cache-dir <dir>       Directory for the value table file");
    eprintln!("  --config <path>         Path to Solver.toml (default: Solver.toml)");
    eprintln!("  --help                  Show this help message");
    eprintln!();
    eprintln!("EXAMPLES:");
    eprintln!("  # Classic tic-tac-toe");
    eprintln!("  generate --size 3 --win-length 3 --players 2");
    eprintln!();
    eprintln!("  # Three players on a 4x4 board");
    eprintln!("  generate --size 4 --win-length 3 --players 3");
}

fn parse_number(flag: &str, value: Option<&String>) -> usize {
    let Some(value) = value else {
        eprintln!("Error: {} requires an argument", flag);
        process::exit(1);
    };
    value.parse::<usize>().unwrap_or_else(|e| {
        eprintln!("Error: Invalid value '{}' for {}: {}", value, flag, e);
        process::exit(1);
    })
}

fn main() {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.contains(&"--help".to_string()) {
        print_usage();
        process::exit(0);
    }

    let mut config_path = "Solver.toml".to_string();
    let mut size = None;
    let mut players = None;
    let mut win_length = None;
    let mut cache_dir = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--size" => {
                size = Some(parse_number("--size", args.get(i + 1)));
                i += 1;
            }
            "--players" => {
                players = Some(parse_number("--players", args.get(i + 1)));
                i += 1;
            }
            "--win-length" => {
                win_length = Some(parse_number("--win-length", args.get(i + 1)));
                i += 1;
            }
            "--cache-dir" => {
                let Some(dir) = args.get(i + 1) else {
                    eprintln!("Error: --cache-dir requires an argument");
                    process::exit(1);
                };
                cache_dir = Some(PathBuf::from(dir));
                i += 1;
            }
            "--config" => {
                let Some(path) = args.get(i + 1) else {
                    eprintln!("Error: --config requires an argument");
                    process::exit(1);
                };
                config_path = path.clone();
                i += 1;
            }
            _ => {
                eprintln!("Error: Unknown option '{}'", args[i]);
                print_usage();
                process::exit(1);
            }
        }
        i += 1;
    }

    let config = Config::from_file(&config_path).unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config from '{}': {}", config_path, e);
        eprintln!("Using default configuration");
        Config::default_hardcoded()
    });

    let mut solver_config = config.solver;
    solver_config.board_size = size.unwrap_or(solver_config.board_size);
    solver_config.n_players = players.unwrap_or(solver_config.n_players);
    solver_config.win_length = win_length.unwrap_or(solver_config.win_length);
    if let Some(dir) = cache_dir {
        solver_config.cache_dir = dir;
    }

    println!(
        "Generating {}x{} board, win length {}, {} players into {}",
        solver_config.board_size,
        solver_config.board_size,
        solver_config.win_length,
        solver_config.n_players,
        solver_config.cache_file().display()
    );

    let request = MoveRequest {
        board: Board::new(solver_config.board_size),
        mover: 0,
        win_length: solver_config.win_length,
    };

    let service = match SolverService::new(solver_config) {
        Ok(service) => service,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let start = Instant::now();
    match service.solve(&request) {
        Ok(response) => {
            println!(
                "First move ({}, {}), score {:.6}",
                response.position.row, response.position.col, response.score
            );
            println!(
                "{} entries in {:.2}s",
                service.table().len(),
                start.elapsed().as_secs_f64()
            );
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
