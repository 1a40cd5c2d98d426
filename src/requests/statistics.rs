//! Statistics management group.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::protocol::{group, Command, Op};

/// Read every counter of one statistics group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupData {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDataResponse {
    pub name: String,
    pub fields: BTreeMap<String, u64>,
}

impl Command for GroupData {
    type Response = GroupDataResponse;
    const OP: Op = Op::Read;
    const GROUP: u16 = group::STATISTICS;
    const COMMAND: u8 = 0;
}

/// List the statistics groups the device exposes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListOfGroups {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOfGroupsResponse {
    pub stat_list: Vec<String>,
}

impl Command for ListOfGroups {
    type Response = ListOfGroupsResponse;
    const OP: Op = Op::Read;
    const GROUP: u16 = group::STATISTICS;
    const COMMAND: u8 = 1;
}

return_codes! {
    /// Statistics group return codes.
    pub enum StatMgmtRc {
        Ok = 0,
        Unknown = 1,
        InvalidGroup = 2,
        InvalidStatName = 3,
        InvalidStatSize = 4,
        WalkAborted = 5,
    }
}
