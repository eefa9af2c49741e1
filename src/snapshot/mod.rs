//! Content-addressed snapshot storage over an embedded KV store.
//!
//! A snapshot is the gzip-compressed canonical JSON of a frozen graph, keyed
//! by a 16-hex-char project hash and snapshot ID:
//!
//! ```text
//! graph:snap:<projectHash>:<snapshotID>:data   gzip(JSON(SerializableGraph))
//! graph:snap:<projectHash>:<snapshotID>:meta   JSON(SnapshotMetadata)
//! graph:snap:<projectHash>:latest              <snapshotID>
//! graph:snap:index:<snapshotID>                <projectHash>
//! ```
//!
//! Every operation runs in a single KV transaction; loads verify the stored
//! content hash before decompressing.

pub mod serialize;

use std::io::{Read, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::SnapshotError;
use crate::graph::CodeGraph;
use serialize::SerializableGraph;

const SNAPSHOTS: TableDefinition<&str, &[u8]> = TableDefinition::new("snapshots");

/// `list` returns at most this many entries unless told otherwise.
pub const DEFAULT_LIST_LIMIT: usize = 100;

/// Everything needed to identify and verify one stored snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub snapshot_id: String,
    pub project_hash: String,
    pub project_root: String,
    pub graph_hash: String,
    /// SHA-256 hex of the compressed payload, re-checked on load.
    pub content_hash: String,
    pub created_at_milli: i64,
    pub node_count: usize,
    pub edge_count: usize,
    pub size_bytes: usize,
}

/// Snapshot manager over a single-file embedded KV database. Safe for
/// concurrent callers; every write is one transaction.
pub struct SnapshotStore {
    db: Database,
}

impl SnapshotStore {
    /// Create or open the store at `path`.
    pub fn open(path: &Path) -> Result<Self, SnapshotError> {
        let db = Database::create(path)?;
        Ok(SnapshotStore { db })
    }

    /// Persist a frozen graph. Returns the metadata written alongside it.
    pub fn save(&self, graph: &CodeGraph) -> Result<SnapshotMetadata, SnapshotError> {
        let record = serialize::to_serializable(graph);
        let json = serde_json::to_vec(&record)?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(&json)?;
        let compressed = encoder.finish()?;

        let project_hash = short_hash(record.project_root.as_bytes());
        let snapshot_id = short_hash(
            format!("{}:{}", record.project_root, record.built_at_milli).as_bytes(),
        );
        let metadata = SnapshotMetadata {
            snapshot_id: snapshot_id.clone(),
            project_hash: project_hash.clone(),
            project_root: record.project_root.clone(),
            graph_hash: record.graph_hash.clone(),
            content_hash: sha256_hex(&compressed),
            created_at_milli: now_millis(),
            node_count: record.nodes.len(),
            edge_count: record.edges.len(),
            size_bytes: compressed.len(),
        };
        let meta_json = serde_json::to_vec(&metadata)?;

        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SNAPSHOTS)?;
            table.insert(
                data_key(&project_hash, &snapshot_id).as_str(),
                compressed.as_slice(),
            )?;
            table.insert(
                meta_key(&project_hash, &snapshot_id).as_str(),
                meta_json.as_slice(),
            )?;
            table.insert(latest_key(&project_hash).as_str(), snapshot_id.as_bytes())?;
            table.insert(index_key(&snapshot_id).as_str(), project_hash.as_bytes())?;
        }
        txn.commit()?;
        Ok(metadata)
    }

    /// Load a snapshot by ID, or the project's latest when `snapshot_id` is
    /// `None`. Fails when the stored payload does not hash to the recorded
    /// content hash.
    pub fn load(
        &self,
        project_root: &str,
        snapshot_id: Option<&str>,
    ) -> Result<(CodeGraph, SnapshotMetadata), SnapshotError> {
        let project_hash = short_hash(project_root.as_bytes());
        let txn = self.db.begin_read()?;
        let table = match txn.open_table(SNAPSHOTS) {
            Ok(table) => table,
            Err(redb::TableError::TableDoesNotExist(_)) => {
                return Err(SnapshotError::NotFound(project_root.to_string()));
            }
            Err(err) => return Err(err.into()),
        };

        let id = match snapshot_id {
            Some(id) => id.to_string(),
            None => match table.get(latest_key(&project_hash).as_str())? {
                Some(guard) => String::from_utf8_lossy(guard.value()).into_owned(),
                None => return Err(SnapshotError::NotFound(project_root.to_string())),
            },
        };

        let metadata: SnapshotMetadata = match table.get(meta_key(&project_hash, &id).as_str())? {
            Some(guard) => serde_json::from_slice(guard.value())?,
            None => return Err(SnapshotError::NotFound(id)),
        };
        let compressed = match table.get(data_key(&project_hash, &id).as_str())? {
            Some(guard) => guard.value().to_vec(),
            None => return Err(SnapshotError::NotFound(id)),
        };

        let computed = sha256_hex(&compressed);
        if computed != metadata.content_hash {
            return Err(SnapshotError::IntegrityMismatch {
                stored: metadata.content_hash.clone(),
                computed,
            });
        }

        let mut decoder = GzDecoder::new(compressed.as_slice());
        let mut json = Vec::new();
        decoder.read_to_end(&mut json)?;
        let record: SerializableGraph = serde_json::from_slice(&json)?;
        let graph = serialize::from_serializable(&record)?;
        Ok((graph, metadata))
    }

    /// The project's most recent snapshot ID, if any.
    pub fn latest_id(&self, project_root: &str) -> Result<Option<String>, SnapshotError> {
        let project_hash = short_hash(project_root.as_bytes());
        let txn = self.db.begin_read()?;
        let table = match txn.open_table(SNAPSHOTS) {
            Ok(table) => table,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(table
            .get(latest_key(&project_hash).as_str())?
            .map(|guard| String::from_utf8_lossy(guard.value()).into_owned()))
    }

    /// Remove a snapshot's four keys. Returns false when the ID is unknown.
    pub fn delete(&self, snapshot_id: &str) -> Result<bool, SnapshotError> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(SNAPSHOTS)?;
            let project_hash = match table.get(index_key(snapshot_id).as_str())? {
                Some(guard) => Some(String::from_utf8_lossy(guard.value()).into_owned()),
                None => None,
            };
            match project_hash {
                Some(project_hash) => {
                    table.remove(data_key(&project_hash, snapshot_id).as_str())?;
                    table.remove(meta_key(&project_hash, snapshot_id).as_str())?;
                    table.remove(index_key(snapshot_id).as_str())?;
                    let latest = match table.get(latest_key(&project_hash).as_str())? {
                        Some(guard) => String::from_utf8_lossy(guard.value()).into_owned(),
                        None => String::new(),
                    };
                    if latest == snapshot_id {
                        table.remove(latest_key(&project_hash).as_str())?;
                    }
                    true
                }
                None => false,
            }
        };
        txn.commit()?;
        Ok(removed)
    }

    /// All stored snapshots, newest first, capped at `limit`
    /// (default [`DEFAULT_LIST_LIMIT`]).
    pub fn list(&self, limit: Option<usize>) -> Result<Vec<SnapshotMetadata>, SnapshotError> {
        let txn = self.db.begin_read()?;
        let table = match txn.open_table(SNAPSHOTS) {
            Ok(table) => table,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut snapshots = Vec::new();
        for entry in table.iter()? {
            let (key, value) = entry?;
            if !key.value().ends_with(":meta") {
                continue;
            }
            let metadata: SnapshotMetadata = serde_json::from_slice(value.value())?;
            snapshots.push(metadata);
        }
        snapshots.sort_by(|a, b| b.created_at_milli.cmp(&a.created_at_milli));
        snapshots.truncate(limit.unwrap_or(DEFAULT_LIST_LIMIT));
        Ok(snapshots)
    }
}

fn data_key(project_hash: &str, snapshot_id: &str) -> String {
    format!("graph:snap:{project_hash}:{snapshot_id}:data")
}

fn meta_key(project_hash: &str, snapshot_id: &str) -> String {
    format!("graph:snap:{project_hash}:{snapshot_id}:meta")
}

fn latest_key(project_hash: &str) -> String {
    format!("graph:snap:{project_hash}:latest")
}

fn index_key(snapshot_id: &str) -> String {
    format!("graph:snap:index:{snapshot_id}")
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// SHA-256 truncated to 16 hex characters, used for project and snapshot IDs.
fn short_hash(bytes: &[u8]) -> String {
    let mut hash = sha256_hex(bytes);
    hash.truncate(16);
    hash
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
