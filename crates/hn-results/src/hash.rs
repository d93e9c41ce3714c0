//! Content-based hashing for run IDs.

use sha2::{Digest, Sha256};

/// Run id for an INP text solved by a given engine version.
pub fn compute_run_id(inp: &str, engine_version: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(inp.as_bytes());
    hasher.update([0u8]);
    hasher.update(engine_version.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_stability() {
        let a = compute_run_id("[JUNCTIONS]\nJ1 0\n", "v1");
        assert_eq!(a, compute_run_id("[JUNCTIONS]\nJ1 0\n", "v1"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn hash_differs_for_different_inputs() {
        let a = compute_run_id("[JUNCTIONS]\nJ1 0\n", "v1");
        assert_ne!(a, compute_run_id("[JUNCTIONS]\nJ1 1\n", "v1"));
        assert_ne!(a, compute_run_id("[JUNCTIONS]\nJ1 0\n", "v2"));
    }
}
