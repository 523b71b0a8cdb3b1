//! Request and response bodies of the HTTP API. Field names follow the wire
//! format existing clients already send.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::Batch;
use crate::db::services::IssueRequest;
use crate::web::error::AppError;

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(alias = "modelNumber")]
    pub model_number: String,
    pub count: i64,
    #[serde(rename = "regionId", alias = "region_id", default)]
    pub region_id: Option<String>,
    // Older clients send the prefix as `suffix`.
    #[serde(alias = "suffix", default)]
    pub prefix: Option<String>,
}

impl From<GenerateRequest> for IssueRequest {
    fn from(req: GenerateRequest) -> Self {
        IssueRequest {
            model_number: req.model_number,
            count: req.count,
            region_id: req.region_id,
            prefix: req.prefix,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub success: bool,
    pub group: Batch,
    #[serde(rename = "lastSerial")]
    pub last_serial: String,
    #[serde(rename = "lastMacHex")]
    pub last_mac_hex: String,
}

#[derive(Debug, Deserialize)]
pub struct GroupIdsRequest {
    #[serde(rename = "groupIds", alias = "group_ids", default)]
    pub group_ids: Vec<String>,
}

impl GroupIdsRequest {
    pub fn parse_ids(&self) -> Result<Vec<Uuid>, AppError> {
        self.group_ids
            .iter()
            .map(|raw| {
                Uuid::parse_str(raw.trim())
                    .map_err(|_| AppError::InvalidInput(format!("Invalid id: {raw}")))
            })
            .collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AllocateResponse {
    pub success: bool,
    pub message: String,
    pub model_number: String,
    pub allocated_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct GenerateGroupsQuery {
    pub model_number: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub term: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExportResponse {
    pub groups: Vec<Batch>,
}
