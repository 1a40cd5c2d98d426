//! Integration tests for smp-client.
//!
//! These tests run whole sessions against an in-memory fake device that
//! speaks the server side of the image and file system groups.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use smp_client::codec::CborCodec;
use smp_client::protocol::{
    build_frame, group, ErrorV1, ErrorV2, GroupError, Header, Op, ProtocolError, Reply, Request,
    HEADER_SIZE,
};
use smp_client::requests::{
    Echo, EchoResponse, FileDownloadResponse, FileUploadResponse, ImageUploadResponse,
    McuMgrParametersResponse,
};
use smp_client::transport::Transport;
use smp_client::{Client, SmpError, TransferError, UploadOptions};

const TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Behavior {
    Normal,
    HashMismatch,
    NoOffset,
    DeviceError,
    NoLength,
    SkewSequence,
    BothErrorShapes,
}

/// One upload exchange as the device saw it.
#[derive(Debug, Clone)]
struct Exchange {
    off: usize,
    chunk: usize,
    encoded: usize,
    len: Option<usize>,
    sha: Option<Vec<u8>>,
    has_image: bool,
    has_upgrade: bool,
}

#[derive(Deserialize)]
struct UploadBody {
    off: usize,
    #[serde(with = "serde_bytes")]
    data: Vec<u8>,
    #[serde(default)]
    len: Option<usize>,
    #[serde(default, with = "serde_bytes")]
    sha: Option<Vec<u8>>,
    #[serde(default)]
    image: Option<u32>,
    #[serde(default)]
    upgrade: Option<bool>,
}

#[derive(Deserialize)]
struct DownloadBody {
    off: usize,
    name: String,
}

#[derive(Deserialize)]
struct EchoBody {
    d: String,
}

#[derive(Serialize)]
struct BothErrors {
    rc: i32,
    err: GroupError,
}

struct FakeDevice {
    behavior: Behavior,
    budget: usize,
    accept_limit: usize,
    received: Vec<u8>,
    exchanges: Vec<Exchange>,
    file: Vec<u8>,
    file_name: String,
    file_chunk: usize,
    downloads: usize,
    reply: Option<Vec<u8>>,
}

impl FakeDevice {
    fn new(budget: usize) -> Self {
        Self {
            behavior: Behavior::Normal,
            budget,
            accept_limit: usize::MAX,
            received: Vec::new(),
            exchanges: Vec::new(),
            file: Vec::new(),
            file_name: String::new(),
            file_chunk: 100,
            downloads: 0,
            reply: None,
        }
    }

    fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    fn with_file(mut self, name: &str, file: Vec<u8>, chunk: usize) -> Self {
        self.file_name = name.to_owned();
        self.file = file;
        self.file_chunk = chunk;
        self
    }

    fn respond<B: Serialize>(&mut self, request: &Header, body: &B) {
        let op = match request.op {
            Op::Read => Op::ReadRsp,
            _ => Op::WriteRsp,
        };
        let sequence = match self.behavior {
            Behavior::SkewSequence => request.sequence.wrapping_add(3),
            _ => request.sequence,
        };
        let body = CborCodec::encode(body).unwrap();
        let header = Header::new(
            op,
            request.version,
            body.len() as u16,
            request.group,
            sequence,
            request.command,
        );
        self.reply = Some(build_frame(&header, &body));
    }

    fn handle(&mut self, data: &[u8]) {
        let header = Header::decode(data).unwrap();
        let body = &data[HEADER_SIZE..];

        match self.behavior {
            Behavior::DeviceError => {
                let err = ErrorV2 {
                    err: GroupError {
                        group: header.group,
                        rc: 2,
                    },
                };
                return self.respond(&header, &err);
            }
            Behavior::BothErrorShapes => {
                let err = BothErrors {
                    rc: 6,
                    err: GroupError {
                        group: header.group,
                        rc: 9,
                    },
                };
                return self.respond(&header, &err);
            }
            _ => {}
        }

        match (header.group, header.command, header.op) {
            (group::OS, 0, Op::Write) => {
                let echo: EchoBody = CborCodec::decode(body).unwrap();
                self.respond(&header, &EchoResponse { r: echo.d });
            }
            (group::OS, 6, Op::Read) => {
                let params = McuMgrParametersResponse {
                    buf_size: 2048,
                    buf_count: 4,
                };
                self.respond(&header, &params);
            }
            (group::IMAGE, 1, Op::Write) => self.image_upload(&header, data),
            (group::FS, 0, Op::Write) => self.file_upload(&header, data),
            (group::FS, 0, Op::Read) => self.file_download(&header, body),
            other => panic!("unexpected request {other:?}"),
        }
    }

    fn accept(&mut self, data: &[u8]) -> UploadBody {
        let upload: UploadBody = CborCodec::decode(&data[HEADER_SIZE..]).unwrap();
        assert_eq!(upload.off, self.received.len(), "chunk at wrong offset");

        self.exchanges.push(Exchange {
            off: upload.off,
            chunk: upload.data.len(),
            encoded: data.len(),
            len: upload.len,
            sha: upload.sha.clone(),
            has_image: upload.image.is_some(),
            has_upgrade: upload.upgrade.is_some(),
        });

        let accepted = upload.data.len().min(self.accept_limit);
        self.received.extend_from_slice(&upload.data[..accepted]);
        upload
    }

    fn total(&self) -> usize {
        self.exchanges[0].len.unwrap()
    }

    fn image_upload(&mut self, header: &Header, data: &[u8]) {
        self.accept(data);
        let done = self.received.len() == self.total();
        let hash_match = match self.behavior {
            Behavior::HashMismatch if done => Some(false),
            _ if done => Some(true),
            _ => None,
        };
        let off = match self.behavior {
            Behavior::NoOffset => None,
            _ => Some(self.received.len()),
        };
        self.respond(header, &ImageUploadResponse { off, hash_match });
    }

    fn file_upload(&mut self, header: &Header, data: &[u8]) {
        self.accept(data);
        let off = Some(self.received.len());
        self.respond(header, &FileUploadResponse { off });
    }

    fn file_download(&mut self, header: &Header, body: &[u8]) {
        let request: DownloadBody = CborCodec::decode(body).unwrap();
        assert_eq!(request.name, self.file_name);
        self.downloads += 1;

        let end = (request.off + self.file_chunk).min(self.file.len());
        let len = match self.behavior {
            Behavior::NoLength => None,
            _ => (request.off == 0).then_some(self.file.len()),
        };
        let response = FileDownloadResponse {
            off: request.off,
            data: self.file[request.off..end].to_vec(),
            len,
        };
        self.respond(header, &response);
    }
}

#[async_trait]
impl Transport for FakeDevice {
    async fn connect(&mut self, _timeout: Duration) -> smp_client::Result<()> {
        Ok(())
    }

    async fn disconnect(&mut self) -> smp_client::Result<()> {
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> smp_client::Result<()> {
        assert!(
            data.len() <= self.budget,
            "{} B sent over a {} B budget",
            data.len(),
            self.budget
        );
        self.handle(data);
        Ok(())
    }

    async fn receive(&mut self) -> smp_client::Result<Bytes> {
        self.reply.take().map(Bytes::from).ok_or(SmpError::Disconnected)
    }

    fn initialize(&mut self, server_buffer_size: usize) {
        self.budget = server_buffer_size;
    }

    fn mtu(&self) -> usize {
        self.budget
    }

    fn max_unencoded_size(&self) -> usize {
        self.budget
    }
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 251) as u8).collect()
}

/// Upload of 4097 bytes at MTU 498 fills every packet but the last.
#[tokio::test]
async fn test_upload_4097_bytes_at_mtu_498() {
    let image = pattern(4097);
    let mut client = Client::new(FakeDevice::new(498));

    let mut offsets = Vec::new();
    let mut upload = client.upload(&image, UploadOptions::default());
    while let Some(offset) = upload.next().await {
        offsets.push(offset.unwrap());
    }

    assert!(offsets.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(*offsets.last().unwrap(), 4097);

    let device = client.transport();
    assert_eq!(device.received, image);
    assert_eq!(device.exchanges.iter().map(|e| e.chunk).sum::<usize>(), 4097);
    assert_eq!(device.exchanges.len(), offsets.len());

    let (last, full) = device.exchanges.split_last().unwrap();
    assert!(full.iter().all(|e| e.encoded == 498));
    assert!(last.encoded <= 498);
}

#[tokio::test]
async fn test_upload_metadata_only_on_first_exchange() {
    let image = pattern(1500);
    let mut client = Client::new(FakeDevice::new(256));
    let offset = client
        .upload(&image, UploadOptions::default().upgrade(true))
        .finish()
        .await
        .unwrap();
    assert_eq!(offset, 1500);

    let exchanges = &client.transport().exchanges;
    let first = &exchanges[0];
    assert_eq!(first.off, 0);
    assert_eq!(first.len, Some(1500));
    assert_eq!(first.sha.as_deref(), Some(&Sha256::digest(&image)[..]));
    assert!(first.has_image && first.has_upgrade);

    for later in &exchanges[1..] {
        assert!(later.len.is_none() && later.sha.is_none());
        assert!(!later.has_image && !later.has_upgrade);
    }
}

/// The loop follows the device's offset, not the chunk sizes it sent.
#[tokio::test]
async fn test_upload_follows_device_offset() {
    let image = pattern(1000);
    let mut device = FakeDevice::new(498);
    device.accept_limit = 100;
    let mut client = Client::new(device);

    let mut offsets = Vec::new();
    let mut upload = client.upload(&image, UploadOptions::default());
    while let Some(offset) = upload.next().await {
        offsets.push(offset.unwrap());
    }

    assert_eq!(offsets, (1..=10).map(|i| i * 100).collect::<Vec<_>>());
    assert_eq!(client.transport().received, image);
}

#[tokio::test]
async fn test_zero_byte_upload_with_sha() {
    let mut client = Client::new(FakeDevice::new(128));
    let mut upload = client.upload(&[], UploadOptions::default().use_sha(true));

    assert_eq!(upload.next().await.unwrap().unwrap(), 0);
    assert!(upload.is_finished());
    assert!(upload.next().await.is_none());

    let exchanges = &client.transport().exchanges;
    assert_eq!(exchanges.len(), 1);
    assert_eq!(exchanges[0].len, Some(0));
    assert_eq!(exchanges[0].chunk, 0);
    assert_eq!(exchanges[0].sha.as_deref(), Some(&Sha256::digest(b"")[..]));
}

#[tokio::test]
async fn test_upload_hash_mismatch_is_fatal() {
    let image = pattern(300);
    let mut client = Client::new(FakeDevice::new(128).with_behavior(Behavior::HashMismatch));

    let err = client
        .upload(&image, UploadOptions::default())
        .finish()
        .await
        .unwrap_err();
    assert!(matches!(err, SmpError::Upload(TransferError::HashMismatch)));
    assert_eq!(client.transport().received, image);
}

#[tokio::test]
async fn test_upload_missing_offset_is_fatal() {
    let mut client = Client::new(FakeDevice::new(128).with_behavior(Behavior::NoOffset));
    let image = pattern(300);
    let mut upload = client.upload(&image, UploadOptions::default());

    let err = upload.next().await.unwrap().unwrap_err();
    assert!(matches!(err, SmpError::Upload(TransferError::MissingOffset)));
    assert!(upload.next().await.is_none());
}

#[tokio::test]
async fn test_upload_device_error_wrapped() {
    let mut client = Client::new(FakeDevice::new(128).with_behavior(Behavior::DeviceError));
    let err = client
        .upload(&pattern(10), UploadOptions::default())
        .finish()
        .await
        .unwrap_err();

    match err {
        SmpError::Upload(TransferError::Device(ProtocolError::V2(e))) => {
            assert_eq!(e.err.group, group::IMAGE);
            assert_eq!(e.err.rc, 2);
        }
        other => panic!("expected device error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_upload_budget_too_small() {
    let mut client = Client::new(FakeDevice::new(20));
    let err = client
        .upload(&pattern(10), UploadOptions::default())
        .finish()
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SmpError::Upload(TransferError::Request(ref inner))
            if matches!(**inner, SmpError::MtuTooSmall { .. })
    ));
}

#[tokio::test]
async fn test_file_upload() {
    let data = pattern(700);
    let mut client = Client::new(FakeDevice::new(200));
    let offset = client
        .upload_file(&data, "/lfs/log.bin", TIMEOUT)
        .finish()
        .await
        .unwrap();

    assert_eq!(offset, 700);
    let device = client.transport();
    assert_eq!(device.received, data);
    assert_eq!(device.exchanges[0].len, Some(700));
    assert!(device.exchanges[1..].iter().all(|e| e.len.is_none()));
}

/// The last chunk lands exactly on the announced length: no extra request.
#[tokio::test]
async fn test_download_stops_at_total_length() {
    let file = pattern(1000);
    let device = FakeDevice::new(512).with_file("/lfs/a.bin", file.clone(), 100);
    let mut client = Client::new(device);

    let downloaded = client.download_file("/lfs/a.bin", TIMEOUT).await.unwrap();
    assert_eq!(downloaded, file);
    assert_eq!(client.transport().downloads, 10);
}

#[tokio::test]
async fn test_download_uneven_last_chunk() {
    let file = pattern(250);
    let device = FakeDevice::new(512).with_file("/lfs/b.bin", file.clone(), 100);
    let mut client = Client::new(device);

    assert_eq!(client.download_file("/lfs/b.bin", TIMEOUT).await.unwrap(), file);
    assert_eq!(client.transport().downloads, 3);
}

#[tokio::test]
async fn test_download_empty_file() {
    let device = FakeDevice::new(512).with_file("/lfs/empty", Vec::new(), 100);
    let mut client = Client::new(device);

    assert!(client.download_file("/lfs/empty", TIMEOUT).await.unwrap().is_empty());
    assert_eq!(client.transport().downloads, 1);
}

#[tokio::test]
async fn test_download_missing_length_is_fatal() {
    let device = FakeDevice::new(512)
        .with_file("/lfs/c.bin", pattern(10), 100)
        .with_behavior(Behavior::NoLength);
    let mut client = Client::new(device);

    let err = client.download_file("/lfs/c.bin", TIMEOUT).await.unwrap_err();
    assert!(matches!(err, SmpError::Download(TransferError::MissingLength)));
}

#[tokio::test]
async fn test_bad_sequence_never_accepted() {
    let mut client = Client::new(FakeDevice::new(512).with_behavior(Behavior::SkewSequence));
    let request = Request::new(Echo::new("hi")).unwrap();

    let err = client.request(&request).await.unwrap_err();
    assert!(matches!(
        err,
        SmpError::BadSequence { expected, received }
            if expected == request.sequence() && received == request.sequence().wrapping_add(3)
    ));
}

#[tokio::test]
async fn test_both_error_shapes_resolve_to_v1() {
    let mut client = Client::new(FakeDevice::new(512).with_behavior(Behavior::BothErrorShapes));
    let request = Request::new(Echo::new("hi")).unwrap();

    let reply = client.request(&request).await.unwrap();
    assert_eq!(
        reply,
        Reply::Error(ProtocolError::V1(ErrorV1 { rc: 6, rsn: None }))
    );
}

#[tokio::test]
async fn test_connect_adopts_device_buffer_size() {
    let mut client = Client::new(FakeDevice::new(512));
    client.connect().await.unwrap();
    assert_eq!(client.transport().max_unencoded_size(), 2048);

    let reply = client.send(Echo::new("after connect")).await.unwrap();
    assert_eq!(reply.r, "after connect");
}
