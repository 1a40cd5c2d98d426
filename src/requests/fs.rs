//! File system management group.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::protocol::{group, ChunkedWrite, Command, Op};

/// Read one chunk of a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDownload {
    pub off: usize,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDownloadResponse {
    pub off: usize,
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
    /// Total file length, sent with the chunk at offset 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub len: Option<usize>,
}

impl Command for FileDownload {
    type Response = FileDownloadResponse;
    const OP: Op = Op::Read;
    const GROUP: u16 = group::FS;
    const COMMAND: u8 = 0;
}

/// Write one chunk of a file. `len` is only sent at offset 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileUpload {
    pub off: usize,
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub len: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileUploadResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub off: Option<usize>,
}

impl Command for FileUpload {
    type Response = FileUploadResponse;
    const OP: Op = Op::Write;
    const GROUP: u16 = group::FS;
    const COMMAND: u8 = 0;
}

impl ChunkedWrite for FileUpload {
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

/// Query a file's length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileStatus {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStatusResponse {
    pub len: usize,
}

impl Command for FileStatus {
    type Response = FileStatusResponse;
    const OP: Op = Op::Read;
    const GROUP: u16 = group::FS;
    const COMMAND: u8 = 1;
}

/// Hash or checksum a file, or a range of it, on the device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileHashChecksum {
    pub name: String,
    /// Algorithm name such as `"sha256"` or `"crc32"`; the device picks its
    /// default when omitted.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub hash_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub off: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub len: Option<usize>,
}

/// Checksums come back as integers, hashes as byte strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HashOutput {
    Integer(u64),
    Bytes(#[serde(with = "serde_bytes")] Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHashChecksumResponse {
    #[serde(rename = "type")]
    pub hash_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub off: Option<usize>,
    pub len: usize,
    pub output: HashOutput,
}

impl Command for FileHashChecksum {
    type Response = FileHashChecksumResponse;
    const OP: Op = Op::Read;
    const GROUP: u16 = group::FS;
    const COMMAND: u8 = 2;
}

/// List the hash and checksum algorithms the device supports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SupportedFileHashChecksumTypes {}

/// Output shape of one algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashType {
    /// 0 for a numeric checksum, 1 for a byte string hash.
    pub format: u8,
    /// Output size in bytes.
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedFileHashChecksumTypesResponse {
    pub types: BTreeMap<String, HashType>,
}

impl Command for SupportedFileHashChecksumTypes {
    type Response = SupportedFileHashChecksumTypesResponse;
    const OP: Op = Op::Read;
    const GROUP: u16 = group::FS;
    const COMMAND: u8 = 3;
}

/// Close any file the device keeps open for an upload or download.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileClose {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCloseResponse {}

impl Command for FileClose {
    type Response = FileCloseResponse;
    const OP: Op = Op::Write;
    const GROUP: u16 = group::FS;
    const COMMAND: u8 = 4;
}

return_codes! {
    /// File system group return codes.
    pub enum FsMgmtRc {
        Ok = 0,
        Unknown = 1,
        FileInvalidName = 2,
        FileNotFound = 3,
        FileIsDirectory = 4,
        FileOpenFailed = 5,
        FileSeekFailed = 6,
        FileReadFailed = 7,
        FileTruncateFailed = 8,
        FileDeleteFailed = 9,
        FileWriteFailed = 10,
        FileOffsetNotValid = 11,
        FileOffsetLargerThanFile = 12,
        ChecksumHashNotFound = 13,
        MountPointNotFound = 14,
        ReadOnlyFilesystem = 15,
        FileEmpty = 16,
    }
}
