//! Settings management group.
//!
//! Values are raw bytes; their encoding is up to the firmware subsystem that
//! owns the key.

use serde::{Deserialize, Serialize};

use crate::protocol::{group, Command, Op};

/// Read one setting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReadSetting {
    pub name: String,
    /// Largest value the client accepts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size: Option<usize>,
}

impl ReadSetting {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_size: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadSettingResponse {
    #[serde(with = "serde_bytes")]
    pub val: Vec<u8>,
    /// Device-side limit, reported when the value was truncated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<usize>,
}

impl Command for ReadSetting {
    type Response = ReadSettingResponse;
    const OP: Op = Op::Read;
    const GROUP: u16 = group::SETTINGS;
    const COMMAND: u8 = 0;
}

/// Write one setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteSetting {
    pub name: String,
    #[serde(with = "serde_bytes")]
    pub val: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteSettingResponse {}

impl Command for WriteSetting {
    type Response = WriteSettingResponse;
    const OP: Op = Op::Write;
    const GROUP: u16 = group::SETTINGS;
    const COMMAND: u8 = 0;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteSetting {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteSettingResponse {}

impl Command for DeleteSetting {
    type Response = DeleteSettingResponse;
    const OP: Op = Op::Write;
    const GROUP: u16 = group::SETTINGS;
    const COMMAND: u8 = 1;
}

/// Apply written settings to the running subsystems.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommitSettings {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSettingsResponse {}

impl Command for CommitSettings {
    type Response = CommitSettingsResponse;
    const OP: Op = Op::Write;
    const GROUP: u16 = group::SETTINGS;
    const COMMAND: u8 = 2;
}

/// Reload settings from persistent storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadSettings {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadSettingsResponse {}

impl Command for LoadSettings {
    type Response = LoadSettingsResponse;
    const OP: Op = Op::Read;
    const GROUP: u16 = group::SETTINGS;
    const COMMAND: u8 = 3;
}

/// Persist the current settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SaveSettings {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveSettingsResponse {}

impl Command for SaveSettings {
    type Response = SaveSettingsResponse;
    const OP: Op = Op::Write;
    const GROUP: u16 = group::SETTINGS;
    const COMMAND: u8 = 3;
}

return_codes! {
    /// Settings group return codes.
    pub enum SettingsMgmtRc {
        Ok = 0,
        Unknown = 1,
        KeyTooLong = 2,
        KeyNotFound = 3,
        ReadNotSupported = 4,
        RootKeyNotFound = 5,
        WriteNotSupported = 6,
        DeleteNotSupported = 7,
        SaveFailed = 8,
    }
}
