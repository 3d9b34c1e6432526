//! Genesis fixtures: deterministic identities and canonical test records.
//!
//! The standard fixture is a four-validator pool with one trustee and one
//! steward in the domain sequence, matching the smallest realistic
//! permissioned pool.

use std::path::Path;

use genpool_types::{NodeEndpoint, NodeIdentity, SequenceName, TxRecord};

/// Endpoint used by probe/test identities that never run a real node.
#[must_use]
pub fn probe_endpoint() -> NodeEndpoint {
    NodeEndpoint { host: "127.0.0.1".to_string(), client_port: 0, node_port: 0 }
}

/// A deterministic identity whose verkey is stable across runs.
///
/// The seed is derived from the alias so distinct aliases get distinct keys.
#[must_use]
pub fn test_identity(alias: &str) -> NodeIdentity {
    let mut seed = [0u8; 32];
    for (i, b) in alias.bytes().enumerate().take(32) {
        seed[i] = b;
    }
    let endpoint = NodeEndpoint {
        host: "10.0.0.10".to_string(),
        client_port: 9702,
        node_port: 9701,
    };
    NodeIdentity::from_seed(alias, endpoint, seed)
}

/// A validator record for the pool sequence, shaped like the records the
/// enrollment coordinator writes.
#[must_use]
pub fn validator_record(n: usize) -> TxRecord {
    let identity = test_identity(&format!("Node{n}"));
    let body = serde_json::json!({
        "type": "NYM",
        "alias": identity.alias,
        "verkey": identity.verkey,
        "role": "VALIDATOR",
        "host": identity.endpoint.host,
        "client_port": 9700 + 2 * n,
        "node_port": 9699 + 2 * n,
        "sponsor": "Steward1",
        "nonce": format!("genesis-node{n}"),
    });
    TxRecord::new(serde_json::to_string(&body).unwrap()).unwrap()
}

/// A steward/trustee NYM record for the domain sequence.
#[must_use]
pub fn steward_record(alias: &str, role: &str) -> TxRecord {
    let identity = test_identity(alias);
    let body = serde_json::json!({
        "type": "NYM",
        "alias": identity.alias,
        "verkey": identity.verkey,
        "role": role,
        "nonce": format!("genesis-{}", alias.to_lowercase()),
    });
    TxRecord::new(serde_json::to_string(&body).unwrap()).unwrap()
}

/// Writes the standard fixture genesis files into `dir`: `validators` pool
/// records and a trustee + steward domain pair. Returns nothing; open a
/// `GenesisStore` on `dir` to consume them.
pub fn write_genesis_files(dir: &Path, validators: usize) {
    let mut pool_text = String::new();
    for n in 1..=validators {
        pool_text.push_str(validator_record(n).as_str());
        pool_text.push('\n');
    }
    std::fs::write(dir.join(SequenceName::Pool.genesis_file_name()), pool_text)
        .expect("write pool genesis fixture");

    let mut domain_text = String::new();
    for record in [steward_record("Trustee1", "TRUSTEE"), steward_record("Steward1", "STEWARD")] {
        domain_text.push_str(record.as_str());
        domain_text.push('\n');
    }
    std::fs::write(dir.join(SequenceName::Domain.genesis_file_name()), domain_text)
        .expect("write domain genesis fixture");
}
