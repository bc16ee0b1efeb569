// Cache path utilities.
// Maps arbitrary cache keys onto file names inside the cache directory.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// Extension used for every cache entry.
pub const ENTRY_EXTENSION: &str = "json";

/// Path of the entry file for `key` inside `dir`.
pub fn entry_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{}.{}", encode_key(key), ENTRY_EXTENSION))
}

/// Longest file stem written; keeps names under the usual 255-byte limit.
const MAX_STEM_LEN: usize = 200;
/// Encoded characters kept in front of the digest for long keys.
const HASHED_PREFIX_LEN: usize = 120;

/// Encode a key into a file-name-safe string.
///
/// ASCII alphanumerics, `-` and `.` pass through; every other byte,
/// including `_` itself, becomes `_xx`. Distinct keys never share a name.
///
/// Encodings longer than [`MAX_STEM_LEN`] are cut and suffixed with
/// `_h` plus the SHA-256 of the key. A plain encoding never contains `_h`,
/// so hashed names cannot collide with unhashed ones.
pub fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'.' => out.push(byte as char),
            _ => {
                let _ = write!(out, "_{:02x}", byte);
            }
        }
    }

    if out.len() > MAX_STEM_LEN {
        out.truncate(HASHED_PREFIX_LEN);
        out.push_str("_h");
        for byte in Sha256::digest(key.as_bytes()) {
            let _ = write!(out, "{:02x}", byte);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_key() {
        assert_eq!(encode_key("simple"), "simple");
        assert_eq!(encode_key("with/slash"), "with_2fslash");
        assert_eq!(encode_key("owner:name"), "owner_3aname");
        assert_eq!(encode_key("under_score"), "under_5fscore");
    }

    #[test]
    fn test_distinct_keys_do_not_collide() {
        let keys = ["a/b", "a:b", "a_b", "a_2fb", "a?b"];
        let encoded: std::collections::HashSet<String> =
            keys.iter().map(|k| encode_key(k)).collect();
        assert_eq!(encoded.len(), keys.len());
    }

    #[test]
    fn test_long_keys_are_hashed_to_bounded_names() {
        let underscores = format!("api_/repos/octocat/{}", "_".repeat(100));
        let encoded = encode_key(&underscores);
        assert!(encoded.len() <= MAX_STEM_LEN);
        assert!(encoded.contains("_h"));
        assert!(entry_path(Path::new("/tmp"), &underscores)
            .file_name()
            .is_some_and(|name| name.len() < 255));

        let other = format!("{}x", underscores);
        assert_ne!(encode_key(&other), encoded);
        assert_eq!(encode_key(&underscores), encoded);
    }

    #[test]
    fn test_short_keys_are_not_hashed() {
        let key = "gh_packages_/users/octocat/packages/container/hello";
        assert!(!encode_key(key).contains("_h"));
    }

    #[test]
    fn test_entry_path() {
        let path = entry_path(Path::new("/tmp/cache"), "api_/repos/a/b");
        assert!(path.ends_with("api_5f_2frepos_2fa_2fb.json"));
    }
}
