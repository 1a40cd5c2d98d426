//! Chunked upload and download sessions.
//!
//! Both directions are driven purely by the offsets the device reports. An
//! upload is a lazy sequence: each [`Upload::next`] performs one exchange
//! and yields the offset the device has accepted so far, so the caller can
//! show progress or stop early. Downloads run to completion and return the
//! whole file.
//!
//! Every failure is wrapped in `SmpError::Upload` or `SmpError::Download`.
//! Nothing is retried; a new upload always starts again from offset 0.

use std::time::Duration;

use sha2::{Digest, Sha256};

use crate::client::Client;
use crate::error::{Result, SmpError, TransferError};
use crate::protocol::{maximize, ChunkedWrite, Reply, Request};
use crate::requests::{
    FileDownload, FileDownloadResponse, FileUpload, FileUploadResponse, ImageUploadResponse,
    ImageUploadWrite,
};
use crate::transport::Transport;

type TransferResult<T> = std::result::Result<T, TransferError>;

/// Image upload options.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Target image slot.
    pub slot: u32,
    /// Only accept images with a newer version than the running one.
    pub upgrade: bool,
    /// Announce the SHA-256 of the whole image with the first chunk.
    pub use_sha: bool,
    /// Timeout of the first exchange; the device may erase the slot first.
    pub first_timeout: Duration,
    /// Timeout of every later exchange.
    pub subsequent_timeout: Duration,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            slot: 0,
            upgrade: false,
            use_sha: true,
            first_timeout: Duration::from_secs(40),
            subsequent_timeout: Duration::from_millis(2500),
        }
    }
}

impl UploadOptions {
    pub fn slot(mut self, slot: u32) -> Self {
        self.slot = slot;
        self
    }

    pub fn upgrade(mut self, upgrade: bool) -> Self {
        self.upgrade = upgrade;
        self
    }

    pub fn use_sha(mut self, use_sha: bool) -> Self {
        self.use_sha = use_sha;
        self
    }

    pub fn first_timeout(mut self, timeout: Duration) -> Self {
        self.first_timeout = timeout;
        self
    }

    pub fn subsequent_timeout(mut self, timeout: Duration) -> Self {
        self.subsequent_timeout = timeout;
        self
    }
}

/// Success body of an upload exchange.
pub trait UploadProgress {
    /// Bytes the device has accepted so far.
    fn offset(&self) -> Option<usize>;

    /// Whether the device found the announced hash to match.
    fn hash_match(&self) -> Option<bool> {
        None
    }
}

impl UploadProgress for ImageUploadResponse {
    fn offset(&self) -> Option<usize> {
        self.off
    }

    fn hash_match(&self) -> Option<bool> {
        self.hash_match
    }
}

impl UploadProgress for FileUploadResponse {
    fn offset(&self) -> Option<usize> {
        self.off
    }
}

/// How one kind of upload builds its exchanges.
pub trait UploadPlan {
    type Command: ChunkedWrite<Response = Self::Response>;
    type Response: UploadProgress;

    /// Exchange at `offset` with an empty chunk. The exchange at offset 0
    /// carries the upload metadata.
    fn template(&self, offset: usize) -> Self::Command;

    /// Reply timeout; `first` is set for the opening exchange.
    fn timeout(&self, first: bool) -> Duration;
}

/// Image upload to a slot.
#[derive(Debug, Clone)]
pub struct ImagePlan {
    total: usize,
    sha: Option<Vec<u8>>,
    options: UploadOptions,
}

impl ImagePlan {
    pub fn new(image: &[u8], options: UploadOptions) -> Self {
        let sha = options
            .use_sha
            .then(|| Sha256::digest(image).to_vec());
        Self {
            total: image.len(),
            sha,
            options,
        }
    }
}

impl UploadPlan for ImagePlan {
    type Command = ImageUploadWrite;
    type Response = ImageUploadResponse;

    fn template(&self, offset: usize) -> ImageUploadWrite {
        if offset != 0 {
            return ImageUploadWrite {
                off: offset,
                ..Default::default()
            };
        }
        ImageUploadWrite {
            off: 0,
            data: Vec::new(),
            image: Some(self.options.slot),
            len: Some(self.total),
            sha: self.sha.clone(),
            upgrade: Some(self.options.upgrade),
        }
    }

    fn timeout(&self, first: bool) -> Duration {
        if first {
            self.options.first_timeout
        } else {
            self.options.subsequent_timeout
        }
    }
}

/// File upload to a path on the device file system.
#[derive(Debug, Clone)]
pub struct FilePlan {
    name: String,
    total: usize,
    timeout: Duration,
}

impl FilePlan {
    pub fn new(name: impl Into<String>, total: usize, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            total,
            timeout,
        }
    }
}

impl UploadPlan for FilePlan {
    type Command = FileUpload;
    type Response = FileUploadResponse;

    fn template(&self, offset: usize) -> FileUpload {
        FileUpload {
            off: offset,
            data: Vec::new(),
            name: self.name.clone(),
            len: (offset == 0).then_some(self.total),
        }
    }

    fn timeout(&self, _first: bool) -> Duration {
        self.timeout
    }
}

/// A running upload.
///
/// Holds the client for the whole session, so no other request can slip
/// in between two exchanges.
pub struct Upload<'a, T, P> {
    client: &'a mut Client<T>,
    plan: P,
    data: &'a [u8],
    offset: usize,
    exchanges: usize,
    finished: bool,
}

impl<'a, T: Transport, P: UploadPlan> Upload<'a, T, P> {
    pub fn new(client: &'a mut Client<T>, data: &'a [u8], plan: P) -> Self {
        Self {
            client,
            plan,
            data,
            offset: 0,
            exchanges: 0,
            finished: false,
        }
    }

    /// Offset most recently accepted by the device.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn total(&self) -> usize {
        self.data.len()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Run one exchange and return the device's new offset.
    ///
    /// Returns `None` once the device has accepted every byte or after an
    /// error. The first call always exchanges, even for empty data.
    pub async fn next(&mut self) -> Option<Result<usize>> {
        if self.finished {
            return None;
        }

        let result = self.exchange().await.map_err(SmpError::Upload);
        match &result {
            Ok(offset) => self.finished = *offset == self.data.len(),
            Err(e) => {
                tracing::error!("Upload aborted at offset {}: {}", self.offset, e);
                self.finished = true;
            }
        }
        Some(result)
    }

    /// Drive the upload to completion and return the final offset.
    pub async fn finish(mut self) -> Result<usize> {
        while let Some(offset) = self.next().await {
            offset?;
        }
        Ok(self.offset)
    }

    async fn exchange(&mut self) -> TransferResult<usize> {
        let first = self.exchanges == 0;
        let total = self.data.len();

        let template = Request::new(self.plan.template(self.offset))?;
        let budget = self.client.transport().max_unencoded_size();
        let request = maximize(&template, self.data, budget)?;
        tracing::debug!(
            "Uploading {} B at offset {} of {}",
            request.command().chunk().len(),
            self.offset,
            total
        );

        let reply = self
            .client
            .request_with_timeout(&request, self.plan.timeout(first))
            .await?;
        self.exchanges += 1;

        let response = match reply {
            Reply::Success(response) => response,
            Reply::Error(e) => return Err(TransferError::Device(e)),
        };
        let offset = response.offset().ok_or(TransferError::MissingOffset)?;

        if offset > total {
            return Err(TransferError::OffsetOutOfRange { offset, total });
        }
        if offset < self.offset {
            return Err(TransferError::OffsetRegressed {
                previous: self.offset,
                reported: offset,
            });
        }
        self.offset = offset;

        if offset == total {
            if response.hash_match() == Some(false) {
                return Err(TransferError::HashMismatch);
            }
            tracing::info!("Upload of {} B complete", total);
        }
        Ok(offset)
    }
}

impl<T: Transport> Client<T> {
    /// Start an image upload. Nothing is sent until the first
    /// [`Upload::next`].
    pub fn upload<'a>(
        &'a mut self,
        image: &'a [u8],
        options: UploadOptions,
    ) -> Upload<'a, T, ImagePlan> {
        let plan = ImagePlan::new(image, options);
        Upload::new(self, image, plan)
    }

    /// Start a file upload to `path`.
    pub fn upload_file<'a>(
        &'a mut self,
        data: &'a [u8],
        path: impl Into<String>,
        timeout: Duration,
    ) -> Upload<'a, T, FilePlan> {
        let plan = FilePlan::new(path, data.len(), timeout);
        Upload::new(self, data, plan)
    }

    /// Download the file at `path`.
    ///
    /// Chunks are requested strictly one after the other until the received
    /// bytes reach the length announced with the first chunk.
    pub async fn download_file(&mut self, path: &str, timeout: Duration) -> Result<Vec<u8>> {
        self.download(path, timeout)
            .await
            .map_err(|e| {
                tracing::error!("Download of {} failed: {}", path, e);
                SmpError::Download(e)
            })
    }

    async fn download(&mut self, path: &str, timeout: Duration) -> TransferResult<Vec<u8>> {
        let first = self.download_chunk(path, 0, timeout).await?;
        let total = first.len.ok_or(TransferError::MissingLength)?;
        tracing::debug!("Downloading {} B from {}", total, path);

        let mut file = Vec::new();
        let mut offset = 0;
        let mut chunk = first.data;
        loop {
            let end = offset + chunk.len();
            if end > total {
                return Err(TransferError::OffsetOutOfRange { offset: end, total });
            }
            file.extend_from_slice(&chunk);
            if end == total {
                break;
            }
            if chunk.is_empty() {
                return Err(TransferError::EmptyChunk { offset });
            }

            offset = end;
            chunk = self.download_chunk(path, offset, timeout).await?.data;
        }

        tracing::info!("Downloaded {} B from {}", file.len(), path);
        Ok(file)
    }

    async fn download_chunk(
        &mut self,
        path: &str,
        offset: usize,
        timeout: Duration,
    ) -> TransferResult<FileDownloadResponse> {
        let request = Request::new(FileDownload {
            off: offset,
            name: path.to_owned(),
        })?;
        let response = match self.request_with_timeout(&request, timeout).await? {
            Reply::Success(response) => response,
            Reply::Error(e) => return Err(TransferError::Device(e)),
        };

        if response.off != offset {
            return Err(TransferError::UnexpectedOffset {
                requested: offset,
                reported: response.off,
            });
        }
        Ok(response)
    }
}
