use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::db::entities::{entry_mac, generate_group, serial_entry};

/// One issued serial with its MAC addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialEntry {
    #[serde(rename = "serialNumber")]
    pub serial_number: String,
    #[serde(rename = "macIds")]
    pub mac_ids: Vec<String>,
    pub allocated: bool,
}

/// A batch as handed to API callers: the group header with its serials in
/// issuance order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub id: Uuid,
    pub model_number: String,
    pub telx_model_number: Option<String>,
    pub category_name: Option<String>,
    pub region_id: String,
    // Kept under its historical wire name.
    #[serde(rename = "suffix")]
    pub prefix: String,
    pub serial_prefix: String,
    pub generated_at: DateTime<Utc>,
    pub serials: Vec<SerialEntry>,
}

impl Batch {
    /// Assembles batches from their rows. `groups` order is preserved;
    /// entries are ordered by position and MACs by slot.
    pub fn assemble(
        groups: Vec<generate_group::Model>,
        entries: Vec<serial_entry::Model>,
        macs: Vec<entry_mac::Model>,
    ) -> Vec<Batch> {
        let mut macs_by_serial: HashMap<String, Vec<entry_mac::Model>> = HashMap::new();
        for mac in macs {
            macs_by_serial.entry(mac.serial_number.clone()).or_default().push(mac);
        }

        let mut entries_by_group: HashMap<Uuid, Vec<serial_entry::Model>> = HashMap::new();
        for entry in entries {
            entries_by_group.entry(entry.group_id).or_default().push(entry);
        }

        groups
            .into_iter()
            .map(|group| {
                let mut group_entries = entries_by_group.remove(&group.id).unwrap_or_default();
                group_entries.sort_by_key(|e| e.position);

                let serials = group_entries
                    .into_iter()
                    .map(|entry| {
                        let mut entry_macs = macs_by_serial
                            .remove(&entry.serial_number)
                            .unwrap_or_default();
                        entry_macs.sort_by_key(|m| m.slot);
                        SerialEntry {
                            serial_number: entry.serial_number,
                            mac_ids: entry_macs.into_iter().map(|m| m.mac_address).collect(),
                            allocated: entry.allocated,
                        }
                    })
                    .collect();

                Batch {
                    id: group.id,
                    model_number: group.model_number,
                    telx_model_number: group.telx_model_number,
                    category_name: group.category_name,
                    region_id: group.region_id,
                    prefix: group.prefix,
                    serial_prefix: group.serial_prefix,
                    generated_at: group.generated_at,
                    serials,
                }
            })
            .collect()
    }
}
