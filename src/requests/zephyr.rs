//! Zephyr basic management group.

use serde::{Deserialize, Serialize};

use crate::protocol::{group, Command, Op};

/// Erase the storage partition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EraseStorage {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EraseStorageResponse {}

impl Command for EraseStorage {
    type Response = EraseStorageResponse;
    const OP: Op = Op::Write;
    const GROUP: u16 = group::ZEPHYR;
    const COMMAND: u8 = 0;
}

return_codes! {
    /// Zephyr basic group return codes.
    pub enum ZephyrMgmtRc {
        Ok = 0,
        Unknown = 1,
        FlashOpenFailed = 2,
        FlashConfigQueryFail = 3,
        FlashEraseFailed = 4,
    }
}
