//! Instance correlation through association tables.
//!
//! A [`MappingTable`] is built once per query from an association collection and then
//! used by [`correlate`] to semi-join one record set against another. Multi-hop topology
//! questions chain several `correlate` calls, each feeding its result forward as the next
//! reference set.

use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::client::{ignore_not_found, CimError, ManagementClient};
use super::indexer::{Indexer, Key};
use super::query::Query;
use super::record::Record;

#[derive(Debug, thiserror::Error)]
pub enum CorrelationError {
    #[error("cannot extract {kind} key from {record}: {reason}")]
    KeyExtraction {
        kind: String,
        record: String,
        reason: String,
    },
    #[error("listing association {association} failed: {source}")]
    AssociationQuery {
        association: String,
        #[source]
        source: CimError,
    },
    #[error(transparent)]
    Cim(#[from] CimError),
}

impl CorrelationError {
    pub(crate) fn key_extraction(record: &Record, reason: String) -> Self {
        CorrelationError::KeyExtraction {
            kind: record.class().to_string(),
            record: record.to_string(),
            reason,
        }
    }

    /// Reports whether the failure only means that nothing matched.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CorrelationError::Cim(e) if e.is_not_found())
    }
}

/// MappingTable relates source-side keys to target-side keys. One association row
/// contributes exactly one pair; a source key may map to several targets.
#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    pairs: HashMap<Key, Vec<Key>>,
    rows: usize,
}

impl MappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: Key, target: Key) {
        self.rows += 1;
        let targets = self.pairs.entry(source).or_default();
        if !targets.contains(&target) {
            targets.push(target);
        }
    }

    /// Target-side keys mapped from `source`; empty when no row references it.
    pub fn targets(&self, source: &Key) -> &[Key] {
        self.pairs.get(source).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of association rows the table was built from.
    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }
}

impl FromIterator<(Key, Key)> for MappingTable {
    fn from_iter<T: IntoIterator<Item = (Key, Key)>>(iter: T) -> Self {
        let mut table = MappingTable::new();
        for (source, target) in iter {
            table.insert(source, target);
        }
        table
    }
}

/// Lists every record of the association collection once and reduces each row to a
/// (source key, target key) pair. Any failure discards the partially built table.
pub async fn build_mapping<S, T>(
    client: &dyn ManagementClient,
    association: &Query,
    source_indexer: &S,
    target_indexer: &T,
) -> Result<MappingTable, CorrelationError>
where
    S: Indexer + ?Sized,
    T: Indexer + ?Sized,
{
    let rows = ignore_not_found(client.query_instances(association).await).map_err(|source| {
        CorrelationError::AssociationQuery {
            association: association.class().to_string(),
            source,
        }
    })?;

    let mut table = MappingTable::new();
    for row in &rows {
        let source = source_indexer.index(row)?;
        let target = target_indexer.index(row)?;
        table.insert(source, target);
    }

    debug!(
        component = "correlate",
        event = "mapping_built",
        association = association.class(),
        rows = table.len(),
        "association mapping built"
    );

    Ok(table)
}

/// Keeps the source records whose key maps, through `table`, to the key of at least one
/// reference record. The relative order of `sources` is preserved.
pub fn correlate<S, R>(
    sources: Vec<Record>,
    source_indexer: &S,
    references: &[Record],
    reference_indexer: &R,
    table: &MappingTable,
) -> Result<Vec<Record>, CorrelationError>
where
    S: Indexer + ?Sized,
    R: Indexer + ?Sized,
{
    let reference_keys = references
        .iter()
        .map(|r| reference_indexer.index(r))
        .collect::<Result<HashSet<Key>, _>>()?;

    if reference_keys.is_empty() {
        return Ok(Vec::new());
    }

    let mut matched = Vec::new();
    for record in sources {
        let key = source_indexer.index(&record)?;
        if table.targets(&key).iter().any(|t| reference_keys.contains(t)) {
            matched.push(record);
        }
    }

    Ok(matched)
}
