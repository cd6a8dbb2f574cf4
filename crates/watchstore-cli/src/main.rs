//! # Watchstore CLI
//!
//! A maintenance client for watchstore user stores kept in a local data
//! directory. The app itself talks to the library directly; this binary is for
//! inspecting stores, converting exported blobs, and moving data in and out.
//!
//! ## Workspace Structure
//!
//! - `crates/watchstore/`: the storage library (codec, driver, user store,
//!   migrations)
//! - `crates/watchstore-cli/`: this binary
//!
//! ## Layering
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI Layer (src/cli/)                                       │
//! │  - clap argument parsing + logging setup (setup.rs)         │
//! │  - Store wiring and per-command handlers (commands.rs)      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Library (crates/watchstore)                                │
//! │  - init::initialize opens a store over the data directory   │
//! │  - migrate::migrate for standalone blob conversion          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only the CLI layer writes to stdout/stderr or picks exit codes. Data goes to
//! stdout, logs to stderr (filtered by `WATCHSTORE_LOG`).

mod cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
