use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One historical discovery call from the knowledge base.
///
/// Created exclusively by the CSV import pipeline and never mutated
/// afterwards; the only delete path is dropping a whole import batch.
/// The four phase fields are independently optional — an absent phase
/// means that stage was not captured for that call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryCall {
    pub id: Uuid,
    pub entreprise: String,
    pub secteur: String,
    pub besoin: String,
    /// Verbatim client-info text the structured attributes were pulled from.
    pub contexte: String,
    pub phase_1_introduction: Option<String>,
    pub phase_2_exploration: Option<String>,
    pub phase_3_affinage: Option<String>,
    pub phase_4_next_steps: Option<String>,
    /// Audit blob: original row text + 1-based source line number.
    pub raw_data: serde_json::Value,
    pub batch_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl DiscoveryCall {
    pub fn new(
        entreprise: String,
        secteur: String,
        besoin: String,
        contexte: String,
        batch_id: Uuid,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            entreprise,
            secteur,
            besoin,
            contexte,
            phase_1_introduction: None,
            phase_2_exploration: None,
            phase_3_affinage: None,
            phase_4_next_steps: None,
            raw_data: serde_json::Value::Null,
            batch_id,
            created_at: Utc::now(),
        }
    }

    pub fn with_phases(
        mut self,
        phase_1: Option<String>,
        phase_2: Option<String>,
        phase_3: Option<String>,
        phase_4: Option<String>,
    ) -> Self {
        self.phase_1_introduction = phase_1;
        self.phase_2_exploration = phase_2;
        self.phase_3_affinage = phase_3;
        self.phase_4_next_steps = phase_4;
        self
    }

    pub fn with_raw_data(mut self, raw_data: serde_json::Value) -> Self {
        self.raw_data = raw_data;
        self
    }
}

/// Derived view over `discovery_calls_knowledge` grouped by batch.
/// Computed on read, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportBatchSummary {
    pub batch_id: Uuid,
    pub call_count: usize,
    pub first_imported_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_call_has_no_phases() {
        let call = DiscoveryCall::new(
            "Acme".into(),
            "retail".into(),
            "automatiser la facturation".into(),
            "Entreprise: Acme | Secteur: retail".into(),
            Uuid::now_v7(),
        );
        assert!(call.phase_1_introduction.is_none());
        assert!(call.phase_4_next_steps.is_none());
        assert_eq!(call.raw_data, serde_json::Value::Null);
    }

    #[test]
    fn test_with_phases_keeps_gaps() {
        let call = DiscoveryCall::new(
            "Acme".into(),
            "retail".into(),
            String::new(),
            String::new(),
            Uuid::now_v7(),
        )
        .with_phases(Some("intro".into()), None, Some("affinage".into()), None);
        assert_eq!(call.phase_1_introduction.as_deref(), Some("intro"));
        assert!(call.phase_2_exploration.is_none());
        assert_eq!(call.phase_3_affinage.as_deref(), Some("affinage"));
        assert!(call.phase_4_next_steps.is_none());
    }
}
