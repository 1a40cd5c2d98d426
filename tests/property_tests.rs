//! Property-based tests for smp-client.
//!
//! Uses proptest to check the packet maximizer, the serial demultiplexer and
//! reply resolution across arbitrary inputs.

use proptest::prelude::*;
use serde::Serialize;

use smp_client::codec::packet::{encode_packet, PacketDecoder};
use smp_client::codec::CborCodec;
use smp_client::protocol::{
    decode_reply, maximize, ErrorV1, ErrorV2, GroupError, ProtocolError, Reply, Request, Version,
    HEADER_SIZE,
};
use smp_client::requests::{EchoResponse, FileUpload, ImageUploadResponse};
use smp_client::transport::SerialDemux;
use smp_client::SmpError;

fn file_template(off: usize, total: usize) -> Request<FileUpload> {
    let command = FileUpload {
        off,
        data: Vec::new(),
        name: "/lfs/prop.bin".into(),
        len: (off == 0).then_some(total),
    };
    Request::build(command, Version::V2, 0).unwrap()
}

/// Chunk sizes whose next size needs a wider CBOR length prefix.
fn at_prefix_boundary(chunk: usize) -> bool {
    matches!(chunk, 23 | 255 | 65535)
}

// ============================================================================
// Packet maximizer
// ============================================================================

proptest! {
    /// A whole transfer never exceeds the budget, and every packet but the
    /// last fills it (one byte short only where the prefix widens).
    #[test]
    fn prop_maximized_packets_fill_budget(budget in 48usize..1200, len in 0usize..3000) {
        let data = vec![0x5A; len];
        let mut offset = 0;
        let mut exchanges = 0;

        loop {
            let request = maximize(&file_template(offset, len), &data, budget).unwrap();
            let chunk = request.command().data.len();
            exchanges += 1;

            prop_assert!(request.len() <= budget);
            prop_assert_eq!(&request.command().data[..], &data[offset..offset + chunk]);

            offset += chunk;
            if offset == len {
                break;
            }
            prop_assert!(
                request.len() == budget
                    || (request.len() == budget - 1 && at_prefix_boundary(chunk)),
                "packet of {} B at budget {} with chunk {}",
                request.len(),
                budget,
                chunk
            );
        }

        prop_assert!(exchanges >= 1);
        prop_assert_eq!(offset, len);
    }

    /// Around each prefix width change the result stays within budget and
    /// loses at most one byte.
    #[test]
    fn prop_prefix_boundaries_never_overshoot(
        available in prop::sample::select(vec![
            21usize, 22, 23, 24, 25, 26, 27,
            253, 254, 255, 256, 257, 258, 259,
            65_440, 65_460, 65_480,
        ]),
        surplus in 0usize..40,
    ) {
        let empty = file_template(0, 0);
        let budget = empty.len() + available;
        prop_assume!(budget - HEADER_SIZE <= u16::MAX as usize);

        let data = vec![1u8; available + surplus];
        let request = maximize(&file_template(0, data.len()), &data, budget).unwrap();

        prop_assert!(request.len() <= budget);
        prop_assert!(request.len() + 1 >= budget || request.command().data.len() == data.len());
    }

    /// A budget that cannot carry a single data byte is reported, never
    /// overshot.
    #[test]
    fn prop_tiny_budget_rejected(budget in 0usize..30) {
        let data = [7u8; 16];
        match maximize(&file_template(0, data.len()), &data, budget) {
            Ok(request) => prop_assert!(request.len() <= budget),
            Err(SmpError::MtuTooSmall { required, .. }) => prop_assert!(required > budget),
            Err(other) => prop_assert!(false, "unexpected error {other:?}"),
        }
    }
}

// ============================================================================
// Serial demultiplexer
// ============================================================================

#[derive(Debug, Clone)]
enum Item {
    Text(String),
    Packet(Vec<u8>),
}

fn item() -> impl Strategy<Value = Item> {
    prop_oneof![
        "[a-zA-Z0-9 :.]{0,40}".prop_map(Item::Text),
        prop::collection::vec(any::<u8>(), 0..300).prop_map(Item::Packet),
    ]
}

proptest! {
    /// Text lines and packet lines come out in order whatever the read sizes.
    #[test]
    fn prop_demux_fragmentation_invariant(
        items in prop::collection::vec(item(), 0..16),
        line_length in 16usize..160,
        reads in prop::collection::vec(1usize..64, 1..16),
    ) {
        let mut stream = Vec::new();
        let mut expected_text = Vec::new();
        let mut expected_lines = Vec::new();
        let mut expected_bodies = Vec::new();

        for item in &items {
            match item {
                Item::Text(text) => {
                    stream.extend_from_slice(text.as_bytes());
                    stream.push(b'\n');
                    expected_text.extend_from_slice(text.as_bytes());
                    expected_text.push(b'\n');
                }
                Item::Packet(body) => {
                    let lines = encode_packet(body, line_length).unwrap();
                    for line in &lines {
                        stream.extend_from_slice(line);
                    }
                    expected_lines.extend(lines);
                    expected_bodies.push(body.clone());
                }
            }
        }

        let mut demux = SerialDemux::new();
        let mut rest = &stream[..];
        for size in reads.iter().cycle() {
            if rest.is_empty() {
                break;
            }
            let (head, tail) = rest.split_at((*size).min(rest.len()));
            demux.push(head);
            rest = tail;
        }

        let lines: Vec<Vec<u8>> = std::iter::from_fn(|| demux.pop_frame())
            .map(|line| line.to_vec())
            .collect();
        prop_assert_eq!(&lines, &expected_lines);
        prop_assert_eq!(&demux.take_text()[..], &expected_text[..]);

        let mut decoder = PacketDecoder::new();
        let mut bodies = Vec::new();
        for line in &lines {
            if let Some(body) = decoder.push_line(line).unwrap() {
                bodies.push(body);
            }
        }
        prop_assert_eq!(bodies, expected_bodies);
    }
}

// ============================================================================
// Reply resolution
// ============================================================================

#[derive(Serialize)]
struct BothShapes {
    rc: i32,
    err: GroupError,
}

proptest! {
    /// A body carrying both error shapes always resolves to V1.
    #[test]
    fn prop_both_error_shapes_resolve_to_v1(rc in any::<i32>(), group in any::<u16>(), group_rc in any::<i32>()) {
        let body = CborCodec::encode(&BothShapes { rc, err: GroupError { group, rc: group_rc } }).unwrap();
        let reply: Reply<EchoResponse> = decode_reply(&body).unwrap();
        prop_assert_eq!(reply, Reply::Error(ProtocolError::V1(ErrorV1 { rc, rsn: None })));
    }

    /// Error replies are never mistaken for a response whose fields are all
    /// optional.
    #[test]
    fn prop_error_replies_never_success(
        rc in 1i32..=i32::MAX,
        rsn in prop::option::of("[a-z ]{0,20}"),
        group in any::<u16>(),
        group_rc in any::<i32>(),
    ) {
        let v1 = CborCodec::encode(&ErrorV1 { rc, rsn: rsn.clone() }).unwrap();
        let reply: Reply<ImageUploadResponse> = decode_reply(&v1).unwrap();
        prop_assert_eq!(reply, Reply::Error(ProtocolError::V1(ErrorV1 { rc, rsn })));

        let wire = ErrorV2 { err: GroupError { group, rc: group_rc } };
        let v2 = CborCodec::encode(&wire).unwrap();
        let reply: Reply<ImageUploadResponse> = decode_reply(&v2).unwrap();
        prop_assert_eq!(reply, Reply::Error(ProtocolError::V2(wire)));
    }

    /// Real success bodies resolve to success.
    #[test]
    fn prop_upload_progress_is_success(off in any::<u32>(), hash_match in prop::option::of(any::<bool>())) {
        let response = ImageUploadResponse { off: Some(off as usize), hash_match };
        let body = CborCodec::encode(&response).unwrap();
        let reply: Reply<ImageUploadResponse> = decode_reply(&body).unwrap();
        prop_assert_eq!(reply, Reply::Success(response));
    }

    /// Arbitrary bytes resolve or fail with a typed error, never panic.
    #[test]
    fn prop_arbitrary_reply_bytes_never_panic(body in prop::collection::vec(any::<u8>(), 0..64)) {
        match decode_reply::<EchoResponse>(&body) {
            Ok(_) | Err(SmpError::Decode(_)) => {}
            Err(other) => prop_assert!(false, "unexpected error {other:?}"),
        }
    }
}
