use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{dao::models::BoutEntity, state::game::GameState};

/// Shape of a bout in the `bouts` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoBoutDocument {
    #[serde(rename = "_id")]
    id: String,
    updated_at: DateTime,
    state: GameState,
}

impl From<BoutEntity> for MongoBoutDocument {
    fn from(value: BoutEntity) -> Self {
        Self {
            id: value.id.to_string(),
            updated_at: DateTime::from_system_time(value.updated_at),
            state: value.state,
        }
    }
}

impl From<MongoBoutDocument> for BoutEntity {
    fn from(value: MongoBoutDocument) -> Self {
        Self {
            id: value.state.id,
            updated_at: value.updated_at.to_system_time(),
            state: value.state,
        }
    }
}

/// Filter matching a single bout.
pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}
