//! Management API body shared by the server and the bootstrap client.

use serde::{Deserialize, Serialize};

use crate::record::LicenseRecord;
use crate::status::LicenseStatus;

/// Route of the license management API.
pub const LICENSE_API_PATH: &str = "/v1/license";

/// `{record, status}` as returned by GET and by writes.
///
/// `record` is absent when no record is stored, or when a submitted record
/// was rejected on content grounds and therefore not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LicenseView {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<LicenseRecord>,
    pub status: LicenseStatus,
}
