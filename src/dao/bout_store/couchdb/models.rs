use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{dao::models::BoutEntity, state::game::GameState};

pub const BOUT_PREFIX: &str = "bout::";
pub const END_SUFFIX: &str = "\u{ffff}";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    #[serde(default)]
    pub doc: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchBoutDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub updated_at: SystemTime,
    pub state: GameState,
}

impl CouchBoutDocument {
    pub fn from_entity(bout: BoutEntity) -> Self {
        Self {
            id: bout_doc_id(bout.id),
            rev: None,
            updated_at: bout.updated_at,
            state: bout.state,
        }
    }

    pub fn into_entity(self) -> BoutEntity {
        BoutEntity {
            id: self.state.id,
            updated_at: self.updated_at,
            state: self.state,
        }
    }
}

pub fn bout_doc_id(id: Uuid) -> String {
    format!("{BOUT_PREFIX}{id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{budget::BudgetRules, game::TeamRosters};

    #[test]
    fn document_keeps_couch_metadata_at_top_level() {
        let state = GameState::new(TeamRosters::default(), &BudgetRules::default());
        let id = state.id;
        let mut document = CouchBoutDocument::from_entity(BoutEntity::snapshot(state));
        let json = serde_json::to_value(&document).unwrap();
        assert_eq!(json["_id"], format!("bout::{id}"));
        assert!(json.get("_rev").is_none());

        document.rev = Some("1-abc".into());
        let json = serde_json::to_value(&document).unwrap();
        let back: CouchBoutDocument = serde_json::from_value(json).unwrap();
        assert_eq!(back.rev.as_deref(), Some("1-abc"));
        assert_eq!(back.into_entity().id, id);
    }
}
