// REST surface beside the socket gateway: liveness, counters, and the
// authed read paths (inbox, profile resolution, giver upkeep). Everything
// real-time lives in gateway.rs; nothing here mutates chat state.

mod inbox;
mod profiles;
mod system;

pub use inbox::get_inbox;
pub use profiles::{get_profile, upsert_giver, upsert_profile};
pub use system::{health, not_found, stats, unauthorized};
