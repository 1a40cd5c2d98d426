//! Request catalogue.
//!
//! Each request is a serde struct implementing [`Command`](crate::protocol::Command),
//! which ties it to its management group, command id and success body. Error
//! bodies are shared by every command (see [`ProtocolError`](crate::protocol::ProtocolError)).
//! The `rc` of a V2 error is scoped to its group; [`GroupRc`] gives it a name.
//!
//! # Example
//!
//! ```
//! use smp_client::protocol::{Op, Request};
//! use smp_client::requests::Echo;
//!
//! let request = Request::new(Echo::new("hello")).unwrap();
//! assert_eq!(request.header().op, Op::Write);
//! ```

use std::fmt;

use crate::protocol::group;

/// Declares a group's return code enum with a lossless `from_rc`.
macro_rules! return_codes {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident = $value:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(i32)]
        pub enum $name {
            $($variant = $value,)+
        }

        impl $name {
            pub fn from_rc(rc: i32) -> Option<Self> {
                match rc {
                    $($value => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

mod enumeration;
mod fs;
mod image;
mod os;
mod settings;
mod shell;
mod statistics;
mod zephyr;

pub use enumeration::{
    CountSupportedGroups, CountSupportedGroupsResponse, EnumMgmtRc, GroupDetails,
    GroupDetailsResponse, GroupId, GroupIdResponse, GroupInfo, ListSupportedGroups,
    ListSupportedGroupsResponse,
};
pub use fs::{
    FileClose, FileCloseResponse, FileDownload, FileDownloadResponse, FileHashChecksum,
    FileHashChecksumResponse, FileStatus, FileStatusResponse, FileUpload, FileUploadResponse,
    FsMgmtRc, HashOutput, HashType, SupportedFileHashChecksumTypes,
    SupportedFileHashChecksumTypesResponse,
};
pub use image::{
    ImageErase, ImageEraseResponse, ImageMgmtRc, ImageState, ImageStates, ImageStatesResponse,
    ImageStatesWrite, ImageUploadResponse, ImageUploadWrite,
};
pub use os::{
    Echo, EchoResponse, McuMgrParameters, McuMgrParametersResponse, OsMgmtRc, Reset,
    ResetResponse,
};
pub use settings::{
    CommitSettings, CommitSettingsResponse, DeleteSetting, DeleteSettingResponse, LoadSettings,
    LoadSettingsResponse, ReadSetting, ReadSettingResponse, SaveSettings, SaveSettingsResponse,
    SettingsMgmtRc, WriteSetting, WriteSettingResponse,
};
pub use shell::{Execute, ExecuteResponse, ShellMgmtRc};
pub use statistics::{GroupData, GroupDataResponse, ListOfGroups, ListOfGroupsResponse, StatMgmtRc};
pub use zephyr::{EraseStorage, EraseStorageResponse, ZephyrMgmtRc};

/// A V2 return code resolved against the group that raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupRc {
    Os(OsMgmtRc),
    Image(ImageMgmtRc),
    Statistics(StatMgmtRc),
    Settings(SettingsMgmtRc),
    Fs(FsMgmtRc),
    Shell(ShellMgmtRc),
    Enumeration(EnumMgmtRc),
    Zephyr(ZephyrMgmtRc),
}

impl GroupRc {
    /// `None` for groups without a catalogue entry and for codes the group
    /// does not define.
    pub fn new(group: u16, rc: i32) -> Option<Self> {
        match group {
            group::OS => OsMgmtRc::from_rc(rc).map(GroupRc::Os),
            group::IMAGE => ImageMgmtRc::from_rc(rc).map(GroupRc::Image),
            group::STATISTICS => StatMgmtRc::from_rc(rc).map(GroupRc::Statistics),
            group::SETTINGS => SettingsMgmtRc::from_rc(rc).map(GroupRc::Settings),
            group::FS => FsMgmtRc::from_rc(rc).map(GroupRc::Fs),
            group::SHELL => ShellMgmtRc::from_rc(rc).map(GroupRc::Shell),
            group::ENUMERATION => EnumMgmtRc::from_rc(rc).map(GroupRc::Enumeration),
            group::ZEPHYR => ZephyrMgmtRc::from_rc(rc).map(GroupRc::Zephyr),
            _ => None,
        }
    }
}

impl fmt::Display for GroupRc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupRc::Os(code) => write!(f, "{code:?}"),
            GroupRc::Image(code) => write!(f, "{code:?}"),
            GroupRc::Statistics(code) => write!(f, "{code:?}"),
            GroupRc::Settings(code) => write!(f, "{code:?}"),
            GroupRc::Fs(code) => write!(f, "{code:?}"),
            GroupRc::Shell(code) => write!(f, "{code:?}"),
            GroupRc::Enumeration(code) => write!(f, "{code:?}"),
            GroupRc::Zephyr(code) => write!(f, "{code:?}"),
        }
    }
}
