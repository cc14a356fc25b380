//! Output file naming.
//!
//! Output names are random and never derived from the input name:
//! `vid_<12 lowercase alphanumerics>_<last 6 digits of unix time>.mp4`.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::OsRng;
use rand::Rng;

const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const RANDOM_LEN: usize = 12;
const PREFIX: &str = "vid_";
const EXTENSION: &str = ".mp4";

/// Generate a fresh output file name from the OS random source.
pub fn generate_output_name() -> String {
    let token: String = (0..RANDOM_LEN)
        .map(|_| CHARSET[OsRng.gen_range(0..CHARSET.len())] as char)
        .collect();
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    format!("{PREFIX}{token}_{:06}{EXTENSION}", secs % 1_000_000)
}

/// Whether `name` has the shape produced by [`generate_output_name`].
pub fn is_generated_name(name: &str) -> bool {
    let Some(body) = name
        .strip_prefix(PREFIX)
        .and_then(|rest| rest.strip_suffix(EXTENSION))
    else {
        return false;
    };
    let Some((token, stamp)) = body.split_once('_') else {
        return false;
    };
    token.len() == RANDOM_LEN
        && token.bytes().all(|b| CHARSET.contains(&b))
        && stamp.len() == 6
        && stamp.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn names_have_expected_shape() {
        let name = generate_output_name();
        assert!(is_generated_name(&name), "bad name: {name}");
        assert_eq!(name.len(), 4 + 12 + 1 + 6 + 4);
    }

    #[test]
    fn thousand_names_are_unique_and_unrelated_to_input() {
        let input_stem = "holiday_footage_final";
        let names: HashSet<String> = (0..1000).map(|_| generate_output_name()).collect();
        assert_eq!(names.len(), 1000);
        for name in &names {
            assert!(is_generated_name(name));
            assert!(!name.contains(input_stem));
            assert!(!name.contains("holiday"));
        }
    }

    #[test]
    fn recognizer_rejects_other_names() {
        for bad in [
            "clip.mp4",
            "vid_abc_123456.mp4",
            "vid_ABCDEFGHIJKL_123456.mp4",
            "vid_abcdefghijkl_12345.mp4",
            "vid_abcdefghijkl_123456.mkv",
            "step1_vid_abcdefghijkl_123456.mp4",
        ] {
            assert!(!is_generated_name(bad), "accepted {bad}");
        }
        assert!(is_generated_name("vid_abcdefghijk1_012345.mp4"));
    }
}
