//! Versioned, self-describing serialization of a `SchemaSnapshot` for
//! persistence in the primary registry's `databases.schema_blob` column
//! (§9 design note: "version prefixing is recommended").

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

use super::model::{ForeignKey, SchemaSnapshot, Table};

const CURRENT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct BlobV1 {
    version: u32,
    tables: Vec<Table>,
    foreign_keys: Vec<ForeignKey>,
    fts_indexed_tables: Vec<String>,
}

pub fn encode(snapshot: &SchemaSnapshot) -> Result<Vec<u8>, GatewayError> {
    let blob = BlobV1 {
        version: CURRENT_VERSION,
        tables: snapshot.tables.values().cloned().collect(),
        foreign_keys: snapshot.foreign_keys.values().flatten().cloned().collect(),
        fts_indexed_tables: snapshot.fts_indexed_tables.iter().cloned().collect(),
    };
    serde_json::to_vec(&blob).map_err(GatewayError::from)
}

pub fn decode(bytes: &[u8]) -> Result<SchemaSnapshot, GatewayError> {
    if bytes.is_empty() {
        return Ok(SchemaSnapshot::default());
    }
    let raw: serde_json::Value = serde_json::from_slice(bytes)?;
    let version = raw.get("version").and_then(|v| v.as_u64()).unwrap_or(0);
    match version {
        1 => {
            let blob: BlobV1 = serde_json::from_value(raw)?;
            let mut snapshot = SchemaSnapshot::default();
            for table in blob.tables {
                snapshot.tables.insert(table.name.clone(), table);
            }
            for fk in blob.foreign_keys {
                snapshot
                    .foreign_keys
                    .entry(fk.table.clone())
                    .or_default()
                    .push(fk);
            }
            snapshot.fts_indexed_tables = blob.fts_indexed_tables.into_iter().collect();
            Ok(snapshot)
        }
        other => Err(GatewayError::internal(format!(
            "unsupported schema blob version: {other}"
        ))),
    }
}
