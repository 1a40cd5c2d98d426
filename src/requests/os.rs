//! OS management group.

use serde::{Deserialize, Serialize};

use crate::protocol::{group, Command, Op};

/// Echo a string back from the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Echo {
    pub d: String,
}

impl Echo {
    pub fn new(d: impl Into<String>) -> Self {
        Self { d: d.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EchoResponse {
    pub r: String,
}

impl Command for Echo {
    type Response = EchoResponse;
    const OP: Op = Op::Write;
    const GROUP: u16 = group::OS;
    const COMMAND: u8 = 0;
}

/// Reset the device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reset {
    /// Reset even if an application vetoes it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetResponse {}

impl Command for Reset {
    type Response = ResetResponse;
    const OP: Op = Op::Write;
    const GROUP: u16 = group::OS;
    const COMMAND: u8 = 5;
}

/// Read the SMP server's buffer parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct McuMgrParameters {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McuMgrParametersResponse {
    pub buf_size: usize,
    pub buf_count: usize,
}

impl Command for McuMgrParameters {
    type Response = McuMgrParametersResponse;
    const OP: Op = Op::Read;
    const GROUP: u16 = group::OS;
    const COMMAND: u8 = 6;
}

return_codes! {
    /// OS group return codes.
    pub enum OsMgmtRc {
        Ok = 0,
        Unknown = 1,
        InvalidFormat = 2,
        QueryYieldsNoAnswer = 3,
        RtcNotSet = 4,
        RtcCommandFailed = 5,
        QueryResponseValueNotValid = 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CborCodec;
    use crate::protocol::{Header, Request, HEADER_SIZE};

    #[test]
    fn test_echo_wire_format() {
        let request = Request::build(Echo::new("hi"), crate::protocol::Version::V2, 3).unwrap();
        let header = Header::decode(request.bytes()).unwrap();

        assert_eq!(header.op, Op::Write);
        assert_eq!(header.group, group::OS);
        assert_eq!(header.command, 0);
        // {"d": "hi"}
        assert_eq!(
            &request.bytes()[HEADER_SIZE..],
            &[0xA1, 0x61, b'd', 0x62, b'h', b'i']
        );
    }

    #[test]
    fn test_parameters_are_an_empty_read() {
        let request = Request::new(McuMgrParameters {}).unwrap();
        assert_eq!(request.header().op, Op::Read);
        assert_eq!(request.header().command, 6);
        assert_eq!(&request.bytes()[HEADER_SIZE..], &[0xA0]);
    }

    #[test]
    fn test_os_return_codes() {
        assert_eq!(OsMgmtRc::from_rc(4), Some(OsMgmtRc::RtcNotSet));
        assert_eq!(OsMgmtRc::from_rc(7), None);
        assert_eq!(OsMgmtRc::InvalidFormat as i32, 2);
    }

    #[test]
    fn test_reset_force_omitted_by_default() {
        assert_eq!(CborCodec::encode(&Reset::default()).unwrap(), vec![0xA0]);
    }
}
