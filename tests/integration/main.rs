// Integration test suite for kindred-server
//
// Organized into focused modules by subsystem. REST surfaces go through
// rocket's local client; the engines are exercised through the library API
// against a temp store. All modules share common's temp-DB lifecycle
// management.

mod common;

mod frames;
mod friends_blocks;
mod health_stats;
mod matchmaking_engine;
mod notifications;
mod profiles_api;
mod reactions;
mod receipts;
mod scorer_determinism;
