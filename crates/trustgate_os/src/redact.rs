#![forbid(unsafe_code)]

use sha2::{Digest, Sha256};

use trustgate_contracts::identity::VisitorId;

/// Stable redaction for visitor ids in log lines: a short digest is enough
/// to correlate entries without writing the raw fingerprint anywhere.
pub fn visitor_digest(visitor_id: &VisitorId) -> String {
    let digest = Sha256::digest(visitor_id.as_str().as_bytes());
    let mut out = String::with_capacity(18);
    out.push_str("v_");
    for byte in digest.iter().take(8) {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::visitor_digest;
    use trustgate_contracts::identity::VisitorId;

    #[test]
    fn at_redact_01_digest_is_stable_and_never_echoes_the_id() {
        let visitor = VisitorId::new("VisitorSecret123").unwrap();
        let a = visitor_digest(&visitor);
        let b = visitor_digest(&visitor);
        assert_eq!(a, b);
        assert_eq!(a.len(), 18);
        assert!(a.starts_with("v_"));
        assert!(!a.contains("VisitorSecret123"));
    }

    #[test]
    fn at_redact_02_distinct_ids_get_distinct_digests() {
        let a = visitor_digest(&VisitorId::new("V1").unwrap());
        let b = visitor_digest(&VisitorId::new("V2").unwrap());
        assert_ne!(a, b);
    }
}
