//! Per-subject room naming.

use crate::ids::UserId;

/// Default prefix for per-user rooms.
pub const DEFAULT_ROOM_PREFIX: &str = "user_";

/// Derive the broadcast-room name for a subject (`"user_" + id` by default).
///
/// The room name only appears in logs and diagnostics; registry membership
/// is keyed by [`UserId`] directly.
pub fn room_name(prefix: &str, user: &UserId) -> String {
    format!("{prefix}{user}")
}
