//! The `deuspyd` binary: opens a `sled` database rooted at the current
//! working directory (created if missing) and serves the HTTP API on
//! `127.0.0.1:9990`. No environment variables, no CLI flags — a single
//! zero-argument entry point.

use std::process::ExitCode;
use std::sync::Arc;

use deuspy::Db;

const ADDR: &str = "127.0.0.1:9990";
const DB_PATH: &str = ".";

#[tokio::main]
async fn main() -> ExitCode {
    let db = match Db::open(DB_PATH, true) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            eprintln!("failed to open database at {DB_PATH}: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = deuspy::http::serve(ADDR, db).await {
        eprintln!("server error: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
