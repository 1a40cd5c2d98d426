//! Shell management group.

use serde::{Deserialize, Serialize};

use crate::protocol::{group, Command, Op};

/// Run a shell command on the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Execute {
    pub argv: Vec<String>,
}

impl Execute {
    /// Split `line` on whitespace into the argument vector.
    pub fn new(line: &str) -> Self {
        Self {
            argv: line.split_whitespace().map(str::to_owned).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteResponse {
    /// Captured command output.
    pub o: String,
    /// Command exit status.
    pub ret: i32,
}

impl Command for Execute {
    type Response = ExecuteResponse;
    const OP: Op = Op::Write;
    const GROUP: u16 = group::SHELL;
    const COMMAND: u8 = 0;
}

return_codes! {
    /// Shell group return codes.
    pub enum ShellMgmtRc {
        Ok = 0,
        Unknown = 1,
        CommandTooLong = 2,
        EmptyCommand = 3,
    }
}
