//! Destination en mémoire (usage local et tests)

use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::{ConflictKey, ObservationSink};
use crate::observations::Observation;

/// Table en mémoire avec insert-or-ignore selon la clé choisie
#[derive(Debug, Default)]
pub struct MemorySink {
    conflict_key: ConflictKey,
    rows: Mutex<Vec<Observation>>,
}

impl MemorySink {
    pub fn new(conflict_key: ConflictKey) -> Self {
        Self {
            conflict_key,
            rows: Mutex::new(Vec::new()),
        }
    }

    /// Copie des lignes stockées, dans l'ordre d'insertion
    pub fn rows(&self) -> Vec<Observation> {
        match self.rows.lock() {
            Ok(rows) => rows.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn conflicts(&self, a: &Observation, b: &Observation) -> bool {
        match self.conflict_key {
            ConflictKey::LocalId => a.local_id == b.local_id,
            ConflictKey::BusinessFields => {
                a.parcel_ref == b.parcel_ref
                    && a.crop == b.crop
                    && a.season == b.season
                    && a.area_ha == b.area_ha
                    && a.expected_yield == b.expected_yield
            }
        }
    }
}

#[async_trait]
impl ObservationSink for MemorySink {
    async fn insert_or_ignore(&self, record: &Observation) -> Result<bool> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| anyhow!("memory sink lock poisoned"))?;

        if rows.iter().any(|row| self.conflicts(row, record)) {
            return Ok(false);
        }

        // Côté serveur, `synced` n'a pas de sens
        rows.push(Observation {
            synced: false,
            ..record.clone()
        });
        Ok(true)
    }
}
