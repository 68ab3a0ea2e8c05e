//! Device identity generation
//!
//! Camera and viewer identifiers are generated client-side as
//! `<prefix>_<unixTimeMillis>_<suffix>` where the suffix is a short random
//! alphanumeric string. Everything downstream treats the id as opaque;
//! only uniqueness matters.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Length of the random alphanumeric suffix
const SUFFIX_LEN: usize = 6;

/// Current unix time in milliseconds, also used for wire timestamps.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Generate a new device id with the given prefix.
pub fn generate_device_id(prefix: &str) -> String {
    let millis = unix_millis();

    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(char::from)
        .collect();

    format!("{}_{}_{}", prefix, millis, suffix)
}

/// Deterministic session id for a camera/viewer pairing.
///
/// The same pairing always maps to the same id, so a duplicate join
/// request lands on the existing session record instead of forking a
/// second one.
pub fn session_id_for(camera_id: &str, viewer_id: &str) -> String {
    format!("{}_{}", camera_id, viewer_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id_shape() {
        let id = generate_device_id("MIMO");
        let parts: Vec<&str> = id.splitn(3, '_').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "MIMO");
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), SUFFIX_LEN);
        assert!(parts[2].chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_device_ids_unique() {
        let a = generate_device_id("cam");
        let b = generate_device_id("cam");
        assert_ne!(a, b);
    }

    #[test]
    fn test_session_id_deterministic() {
        let a = session_id_for("MIMO_1000_abc", "viewer_1");
        let b = session_id_for("MIMO_1000_abc", "viewer_1");
        assert_eq!(a, b);
        assert_eq!(a, "MIMO_1000_abc_viewer_1");
    }
}
