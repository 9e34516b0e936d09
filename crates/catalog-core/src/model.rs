//! Catalog records and snapshots.
//!
//! A [`Snapshot`] is the complete catalog at one point in time. It is built once
//! by the refresh path and never mutated afterwards; stores hand it out as
//! `Arc<Snapshot>`.

use std::borrow::Cow;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{CatalogError, Result};

/// One catalog entry.
///
/// Field names on the wire follow the upstream payload (`artc`, `units`), and the
/// same shape is used when decoded records are serialized back to clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    pub name: String,
    #[serde(rename = "artc")]
    pub code: String,
    #[serde(rename = "units")]
    pub unit: String,
}

impl Record {
    pub fn new(name: impl Into<String>, code: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
            unit: unit.into(),
        }
    }

    /// Natural identifier used as the per-record key.
    pub fn key(&self) -> &str {
        &self.name
    }
}

/// Decode an upstream catalog payload into records.
///
/// Every record must carry a non-empty, unique `name`, since the name is what the
/// keyed store indexes by.
pub fn decode_records(payload: &[u8]) -> Result<Vec<Record>> {
    let records: Vec<Record> = serde_json::from_slice(payload)
        .map_err(|e| CatalogError::decode(format!("malformed catalog payload: {e}")))?;

    {
        let mut seen = HashSet::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            if record.name.is_empty() {
                return Err(CatalogError::decode(format!(
                    "record at index {index} has an empty name"
                )));
            }
            if !seen.insert(record.name.as_str()) {
                return Err(CatalogError::decode(format!(
                    "duplicate record name '{}'",
                    record.name
                )));
            }
        }
    }

    Ok(records)
}

/// What a snapshot holds: the upstream bytes verbatim, or decoded records.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SnapshotBody {
    Raw(Vec<u8>),
    Records(Vec<Record>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    body: SnapshotBody,
    fetched_at: OffsetDateTime,
}

impl Snapshot {
    /// Snapshot holding the upstream payload without inspecting it.
    pub fn raw(payload: Vec<u8>, fetched_at: OffsetDateTime) -> Self {
        Self {
            body: SnapshotBody::Raw(payload),
            fetched_at,
        }
    }

    /// Snapshot holding already-decoded records.
    pub fn from_records(records: Vec<Record>, fetched_at: OffsetDateTime) -> Self {
        Self {
            body: SnapshotBody::Records(records),
            fetched_at,
        }
    }

    pub fn fetched_at(&self) -> OffsetDateTime {
        self.fetched_at
    }

    /// Number of records, if the snapshot has been decoded.
    pub fn record_count(&self) -> Option<usize> {
        match &self.body {
            SnapshotBody::Raw(_) => None,
            SnapshotBody::Records(records) => Some(records.len()),
        }
    }

    /// The records of this snapshot, decoding the raw payload if necessary.
    pub fn records(&self) -> Result<Cow<'_, [Record]>> {
        match &self.body {
            SnapshotBody::Raw(payload) => Ok(Cow::Owned(decode_records(payload)?)),
            SnapshotBody::Records(records) => Ok(Cow::Borrowed(records.as_slice())),
        }
    }

    /// JSON payload served to clients.
    ///
    /// Raw snapshots are returned byte-for-byte; decoded snapshots are serialized
    /// as a JSON array in the upstream record shape.
    pub fn payload(&self) -> Result<Cow<'_, [u8]>> {
        match &self.body {
            SnapshotBody::Raw(payload) => Ok(Cow::Borrowed(payload.as_slice())),
            SnapshotBody::Records(records) => serde_json::to_vec(records)
                .map(Cow::Owned)
                .map_err(|e| CatalogError::decode(format!("failed to encode records: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const WIDGET: &[u8] = br#"[{"name":"Widget","artc":"A1","units":"pcs"}]"#;

    #[test]
    fn decodes_upstream_field_names() {
        let records = decode_records(WIDGET).unwrap();
        assert_eq!(records, vec![Record::new("Widget", "A1", "pcs")]);
    }

    #[test]
    fn ignores_unknown_fields() {
        let payload = br#"[{"name":"Bolt","artc":"B2","units":"kg","price":12}]"#;
        let records = decode_records(payload).unwrap();
        assert_eq!(records[0].unit, "kg");
    }

    #[test]
    fn rejects_malformed_payloads() {
        assert!(matches!(
            decode_records(b"{\"not\":\"an array\"}"),
            Err(CatalogError::Decode(_))
        ));
        assert!(matches!(
            decode_records(br#"[{"name":"NoCode","units":"pcs"}]"#),
            Err(CatalogError::Decode(_))
        ));
    }

    #[test]
    fn rejects_empty_and_duplicate_names() {
        let empty = br#"[{"name":"","artc":"A1","units":"pcs"}]"#;
        assert!(matches!(decode_records(empty), Err(CatalogError::Decode(_))));

        let dup = br#"[{"name":"W","artc":"A1","units":"pcs"},{"name":"W","artc":"A2","units":"pcs"}]"#;
        let err = decode_records(dup).unwrap_err();
        assert!(err.to_string().contains("duplicate record name 'W'"));
    }

    #[test]
    fn raw_payload_is_served_verbatim() {
        let at = datetime!(2024-01-01 00:00:00 UTC);
        let snapshot = Snapshot::raw(WIDGET.to_vec(), at);
        assert_eq!(snapshot.payload().unwrap().as_ref(), WIDGET);
        assert_eq!(snapshot.record_count(), None);
        assert_eq!(snapshot.records().unwrap().len(), 1);
    }

    #[test]
    fn decoded_records_serialize_in_upstream_shape() {
        let at = datetime!(2024-01-01 00:00:00 UTC);
        let snapshot = Snapshot::from_records(vec![Record::new("Widget", "A1", "pcs")], at);
        let value: serde_json::Value = serde_json::from_slice(&snapshot.payload().unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!([{"name": "Widget", "artc": "A1", "units": "pcs"}])
        );
        assert_eq!(snapshot.record_count(), Some(1));
        assert_eq!(snapshot.fetched_at(), at);
    }
}
