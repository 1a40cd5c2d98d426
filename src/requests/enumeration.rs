//! Enumeration management group: which groups does the device serve?

use serde::{Deserialize, Serialize};

use crate::protocol::{group, Command, Op};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CountSupportedGroups {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountSupportedGroupsResponse {
    pub count: usize,
}

impl Command for CountSupportedGroups {
    type Response = CountSupportedGroupsResponse;
    const OP: Op = Op::Read;
    const GROUP: u16 = group::ENUMERATION;
    const COMMAND: u8 = 0;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListSupportedGroups {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListSupportedGroupsResponse {
    pub groups: Vec<u16>,
}

impl Command for ListSupportedGroups {
    type Response = ListSupportedGroupsResponse;
    const OP: Op = Op::Read;
    const GROUP: u16 = group::ENUMERATION;
    const COMMAND: u8 = 1;
}

/// Group id at one index of the device's group list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupId {
    /// Index into the list; the first group when omitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupIdResponse {
    pub group: u16,
    /// Set on the last entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<bool>,
}

impl Command for GroupId {
    type Response = GroupIdResponse;
    const OP: Op = Op::Read;
    const GROUP: u16 = group::ENUMERATION;
    const COMMAND: u8 = 2;
}

/// Names and handler counts of the given groups, or of all of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<u16>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub group: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handlers: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDetailsResponse {
    pub groups: Vec<GroupInfo>,
}

impl Command for GroupDetails {
    type Response = GroupDetailsResponse;
    const OP: Op = Op::Read;
    const GROUP: u16 = group::ENUMERATION;
    const COMMAND: u8 = 3;
}

return_codes! {
    /// Enumeration group return codes.
    pub enum EnumMgmtRc {
        Ok = 0,
        Unknown = 1,
        TooManyGroupEntries = 2,
        InsufficientHeapForEntries = 3,
        IndexTooLarge = 4,
    }
}
