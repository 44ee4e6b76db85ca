//! Machine identity hash
//!
//! Two nodes started with the same name on different machines (or from
//! different working roots on one machine) must look different to the
//! coordinator. The hash mixes the canonical working root with every
//! locally configured IP and MAC address. It only disambiguates; it is
//! not a security boundary.

use sha2::{Digest, Sha256};
use std::path::Path;

/// Length of the identity hash in hex characters
pub const IDENTITY_HASH_LEN: usize = 8;

/// Derive the identity hash for a node rooted at `fs_root`
pub fn identity_hash(fs_root: &Path) -> String {
    let root = std::fs::canonicalize(fs_root).unwrap_or_else(|_| fs_root.to_path_buf());
    hash_identity(&root.to_string_lossy(), &local_addresses())
}

/// Hash a root path together with host addresses.
///
/// Addresses are sorted first so enumeration order does not change the result.
pub fn hash_identity(root: &str, addresses: &[String]) -> String {
    let mut sorted: Vec<&str> = addresses.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut hasher = Sha256::new();
    hasher.update(root.as_bytes());
    for address in sorted {
        hasher.update(b"\n");
        hasher.update(address.as_bytes());
    }
    let digest = hex::encode(hasher.finalize());
    digest[..IDENTITY_HASH_LEN].to_string()
}

/// All IP and hardware addresses of local interfaces.
///
/// Returns an empty list when interfaces cannot be enumerated.
fn local_addresses() -> Vec<String> {
    let networks = sysinfo::Networks::new_with_refreshed_list();
    let mut addresses = Vec::new();

    for (interface, data) in networks.list() {
        let mac = data.mac_address();
        if mac != sysinfo::MacAddr::UNSPECIFIED {
            addresses.push(mac.to_string());
        }
        for network in data.ip_networks() {
            addresses.push(network.addr.to_string());
        }
        tracing::trace!("Included addresses of interface {}", interface);
    }

    if addresses.is_empty() {
        tracing::debug!("No network addresses found; identity hash uses the root path only");
    }
    addresses
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_hash_is_eight_hex_chars() {
        let hash = hash_identity("/var/lib/node", &["10.0.0.5".to_string()]);
        assert_eq!(hash.len(), IDENTITY_HASH_LEN);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_ignores_address_order() {
        let a = hash_identity(
            "/srv",
            &["10.0.0.5".to_string(), "aa:bb:cc:dd:ee:ff".to_string()],
        );
        let b = hash_identity(
            "/srv",
            &["aa:bb:cc:dd:ee:ff".to_string(), "10.0.0.5".to_string()],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_hash_distinguishes_roots_and_hosts() {
        let addrs = vec!["10.0.0.5".to_string()];
        assert_ne!(hash_identity("/srv/a", &addrs), hash_identity("/srv/b", &addrs));
        assert_ne!(
            hash_identity("/srv", &addrs),
            hash_identity("/srv", &["10.0.0.6".to_string()])
        );
    }

    #[test]
    fn test_hash_without_addresses_uses_root_only() {
        assert_eq!(hash_identity("/srv", &[]), hash_identity("/srv", &[]));
    }

    #[test]
    fn test_identity_hash_is_stable_for_a_directory() {
        let dir = TempDir::new().unwrap();
        assert_eq!(identity_hash(dir.path()), identity_hash(dir.path()));
    }
}
