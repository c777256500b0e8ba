use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use sha1::Digest;
use std::fmt;

/// Number of hash bytes kept in a fingerprint
const FINGERPRINT_BYTES: usize = 6;

/// Short identifier of the hardware/topology a run was measured on
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigFingerprint(String);

impl ConfigFingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the fingerprint of (flag, host count, host list)
pub fn config_fingerprint(flag: &str, hosts: &[String]) -> ConfigFingerprint {
    let target = format!("{}|{}|{}", flag, hosts.len(), hosts.join(","));
    let escaped_str = utf8_percent_encode(&target, NON_ALPHANUMERIC).to_string();

    let hash = sha1::Sha1::digest(escaped_str.as_bytes());
    ConfigFingerprint(hex::encode(&hash[..FINGERPRINT_BYTES]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts(names: &[&str]) -> Vec<String> {
        names.iter().map(|h| h.to_string()).collect()
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = config_fingerprint("dfface", &hosts(&["192.168.1.1", "192.168.1.2"]));
        let b = config_fingerprint("dfface", &hosts(&["192.168.1.1", "192.168.1.2"]));
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), FINGERPRINT_BYTES * 2);
    }

    #[test]
    fn test_fingerprint_depends_on_topology() {
        let base = config_fingerprint("dfface", &hosts(&["h1", "h2"]));
        assert_ne!(base, config_fingerprint("other", &hosts(&["h1", "h2"])));
        assert_ne!(base, config_fingerprint("dfface", &hosts(&["h2", "h1"])));
        assert_ne!(base, config_fingerprint("dfface", &hosts(&["h1"])));
    }
}
