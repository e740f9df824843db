use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Item;

/// Frames exchanged over the WebSocket gateway, in both directions.
///
/// The payload is free-form JSON: clients relay whatever they like and the
/// server only enforces the envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    #[serde(rename = "itemUpdated")]
    ItemUpdated(serde_json::Value),
}

/// What happened to an item, as announced by the server after a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemChange {
    Created,
    Updated,
    Deleted,
}

/// Payload of a server-originated `itemUpdated` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemNotice {
    pub action: ItemChange,
    pub item_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<Item>,
}

impl GatewayEvent {
    pub fn item_changed(action: ItemChange, item_id: Uuid, item: Option<Item>) -> Self {
        let notice = ItemNotice { action, item_id, item };
        // ItemNotice only holds plain data; serialization cannot fail.
        Self::ItemUpdated(serde_json::to_value(notice).unwrap_or_default())
    }
}
