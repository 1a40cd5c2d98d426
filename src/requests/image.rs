//! Image management group.

use serde::{Deserialize, Serialize};

use crate::protocol::{group, ChunkedWrite, Command, Op};

/// State of one image slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<u32>,
    pub slot: u32,
    pub version: String,
    #[serde(
        default,
        with = "serde_bytes",
        skip_serializing_if = "Option::is_none"
    )]
    pub hash: Option<Vec<u8>>,
    #[serde(default)]
    pub bootable: bool,
    #[serde(default)]
    pub pending: bool,
    #[serde(default)]
    pub confirmed: bool,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub permanent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageStatesResponse {
    pub images: Vec<ImageState>,
    #[serde(
        default,
        rename = "splitStatus",
        skip_serializing_if = "Option::is_none"
    )]
    pub split_status: Option<i32>,
}

/// Read the state of every image slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageStates {}

impl Command for ImageStates {
    type Response = ImageStatesResponse;
    const OP: Op = Op::Read;
    const GROUP: u16 = group::IMAGE;
    const COMMAND: u8 = 0;
}

/// Mark an image pending for test, or confirm it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageStatesWrite {
    #[serde(with = "serde_bytes", skip_serializing_if = "Option::is_none")]
    pub hash: Option<Vec<u8>>,
    pub confirm: bool,
}

impl Command for ImageStatesWrite {
    type Response = ImageStatesResponse;
    const OP: Op = Op::Write;
    const GROUP: u16 = group::IMAGE;
    const COMMAND: u8 = 0;
}

/// Erase the secondary slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageErase {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageEraseResponse {}

impl Command for ImageErase {
    type Response = ImageEraseResponse;
    const OP: Op = Op::Write;
    const GROUP: u16 = group::IMAGE;
    const COMMAND: u8 = 5;
}

/// One chunk of an image upload.
///
/// `image`, `len`, `sha` and `upgrade` are only sent with the chunk at
/// offset 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageUploadWrite {
    pub off: usize,
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub len: Option<usize>,
    #[serde(with = "serde_bytes", skip_serializing_if = "Option::is_none")]
    pub sha: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgrade: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUploadResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub off: Option<usize>,
    /// Whether the uploaded image matches the announced SHA-256.
    #[serde(default, rename = "match", skip_serializing_if = "Option::is_none")]
    pub hash_match: Option<bool>,
}

impl Command for ImageUploadWrite {
    type Response = ImageUploadResponse;
    const OP: Op = Op::Write;
    const GROUP: u16 = group::IMAGE;
    const COMMAND: u8 = 1;
}

impl ChunkedWrite for ImageUploadWrite {
    fn offset(&self) -> usize {
        self.off
    }

    fn chunk(&self) -> &[u8] {
        &self.data
    }

    fn set_chunk(&mut self, chunk: Vec<u8>) {
        self.data = chunk;
    }
}

return_codes! {
    /// Image group return codes.
    pub enum ImageMgmtRc {
        Ok = 0,
        Unknown = 1,
        FlashConfigQueryFail = 2,
        NoImage = 3,
        NoTlvs = 4,
        InvalidTlv = 5,
        TlvMultipleHashesFound = 6,
        TlvInvalidSize = 7,
        HashNotFound = 8,
        NoFreeSlot = 9,
        FlashOpenFailed = 10,
        FlashReadFailed = 11,
        FlashWriteFailed = 12,
        FlashEraseFailed = 13,
        InvalidSlot = 14,
        NoFreeMemory = 15,
        FlashContextAlreadySet = 16,
        FlashContextNotSet = 17,
        FlashAreaDeviceNull = 18,
        InvalidPageOffset = 19,
        InvalidOffset = 20,
        InvalidLength = 21,
        InvalidImageHeader = 22,
        InvalidImageHeaderMagic = 23,
        InvalidHash = 24,
        InvalidFlashAddress = 25,
        VersionGetFailed = 26,
        CurrentVersionIsNewer = 27,
        ImageAlreadyPending = 28,
        InvalidImageVectorTable = 29,
        InvalidImageTooLarge = 30,
        InvalidImageDataOverrun = 31,
        ImageConfirmationDenied = 32,
        ImageSettingTestToActiveDenied = 33,
        ActiveSlotNotKnown = 34,
    }
}
