//! # CLI Behavior
//!
//! Every command except `migrate` works on one user's store inside the data
//! directory (`--data`, else `WATCHSTORE_DATA`, else the OS data dir).
//! Opening a store runs the sharded cutover, so pointing the CLI at a
//! directory holding a legacy `user_<id>_data.json` blob upgrades it.
//!
//! ### Offline Migration (`watchstore migrate <file>`)
//!
//! Runs an exported blob through the migration chain and prints the result.
//! Nothing is written. `--report` prints what was done instead of the data.
//!
//! ### Import / Export
//!
//! - `watchstore import --user 42 backup.json` migrates the blob if needed
//!   and bulk-loads it, replacing the user's collections.
//! - `watchstore export --user 42` prints the store as a v1.3 blob, which
//!   `import` accepts back unchanged.
//!
//! ### Inspection
//!
//! - `watchstore status --user 42`: schema version and collection sizes.
//! - `watchstore keys --user 42`: physical keys, including shard groups.
//! - `watchstore clear --user 42`: removes every key of the user.
//!
//! ## Module Structure
//!
//! - `setup`: Argument parsing via clap, version string, logging
//! - `commands`: Store wiring and per-command handlers

mod commands;
pub mod setup;

pub use commands::run;
