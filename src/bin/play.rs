// Terminal game against the solver
//
// Usage:
//   cargo run --release --bin play -- <name> <name> [name...] [options]
//
// A player named `auto` is driven by the solver, every other player types
// moves as `row col` on stdin.
//
// Options:
//   --size <N>          Board size (default: from config)
//   --win-length <C>    Pieces in a row needed to win (default: from config)
//   --config <path>     Path to Solver.toml (default: Solver.toml)

use std::env;
use std::io::{self, BufRead, Write};
use std::process;
use std::time::Duration;

use caro_solver::config::Config;
use caro_solver::game::Game;
use caro_solver::solver::SolverHandle;
use caro_solver::types::Coord;

fn print_usage() {
    eprintln!("Caro Terminal Game");
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("  play <NAME> <NAME> [NAME...] [OPTIONS]");
    eprintln!();
    eprintln!("Use `auto` as a name for a solver-driven player.");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("  --size <N>              Board size");
    eprintln!("  --win-length <C>        Pieces in a row needed to win");
    eprintln!("  --config <path>         Path to Solver.toml (default: Solver.toml)");
    eprintln!("  --help                  Show this help message");
    eprintln!();
    eprintln!("EXAMPLES:");
    eprintln!("  # Human against the solver on the default board");
    eprintln!("  play alice auto");
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

fn read_move(lines: &mut impl Iterator<Item = io::Result<String>>, game: &Game) -> Option<Coord> {
    loop {
        print!("row col> ");
        let _ = io::stdout().flush();

        let line = lines.next()?.ok()?;
        let parts: Vec<usize> = line
            .split_whitespace()
            .filter_map(|p| p.parse().ok())
            .collect();
        if let [row, col] = parts[..] {
            let coord = Coord::new(row, col);
            if game.is_valid(coord) {
                return Some(coord);
            }
        }
        println!("Not there");
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.contains(&"--help".to_string()) {
        print_usage();
        process::exit(0);
    }

    let mut config_path = "Solver.toml".to_string();
    let mut size = None;
    let mut win_length = None;
    let mut names = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--size" => {
                size = Some(parse_number("--size", args.get(i + 1)));
                i += 1;
            }
            "--win-length" => {
                win_length = Some(parse_number("--win-length", args.get(i + 1)));
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
            name if name.starts_with("--") => {
                eprintln!("Error: Unknown option '{}'", name);
                print_usage();
                process::exit(1);
            }
            name => names.push(name.to_string()),
        }
        i += 1;
    }

    let config = Config::from_file(&config_path).unwrap_or_else(|_| Config::default_hardcoded());
    let mut solver_config = config.solver;
    solver_config.board_size = size.unwrap_or(solver_config.board_size);
    solver_config.win_length = win_length.unwrap_or(solver_config.win_length);
    solver_config.n_players = names.len();

    let mut game = match Game::new(solver_config.board_size, solver_config.win_length, names.len()) {
        Ok(game) => game,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage();
            process::exit(1);
        }
    };

    let solver = if names.iter().any(|n| n.eq_ignore_ascii_case("auto")) {
        match SolverHandle::start(solver_config) {
            Ok(solver) => Some(solver),
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
    } else {
        None
    };

    let polling_interval = Duration::from_millis(config.timing.polling_interval_ms.max(1));
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("{}", game.board());
        let player = game.current_player();
        println!("{} (#{}) to move", names[player], player + 1);

        let coord = match &solver {
            Some(solver) if names[player].eq_ignore_ascii_case("auto") => {
                let response = solver.put_move(game.request()).and_then(|id| loop {
                    match solver.poll_for(id, polling_interval) {
                        Ok(Some(response)) => break Ok(response),
                        Ok(None) => {
                            print!(".");
                            let _ = io::stdout().flush();
                        }
                        Err(e) => break Err(e),
                    }
                });
                match response {
                    Ok(response) => {
                        println!(
                            "{} plays ({}, {}), score {:.4}",
                            names[player], response.position.row, response.position.col, response.score
                        );
                        response.position
                    }
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        process::exit(1);
                    }
                }
            }
            _ => match read_move(&mut lines, &game) {
                Some(coord) => coord,
                None => break,
            },
        };

        match game.play(coord) {
            Ok(Some(outcome)) => {
                print!("{}", game.board());
                match outcome.winner_player() {
                    Some(winner) => println!(
                        "{} wins from ({}, {}) to ({}, {})",
                        names[winner], outcome.start.row, outcome.start.col, outcome.end.row, outcome.end.col
                    ),
                    None => println!("Draw"),
                }
                break;
            }
            Ok(None) => game.advance(),
            Err(e) => println!("{}", e),
        }
    }
}
