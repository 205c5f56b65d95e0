//! Outbound frame builders
//!
//! Every builder produces a complete wire frame: header, body, XOR
//! checksum, byte stuffing, flag delimiters. Acks carry header sequence
//! 0; command frames take the per-device sequence assigned by the
//! session registry.

use bytes::BufMut;
use chrono::{
    DateTime,
    Utc,
};

use crate::{
    protocol::seal_frame,
    types::{
        DeviceId,
        MessageId,
        encode_bcd_timestamp,
    },
};

pub const RESULT_SUCCESS: u8 = 0x00;
pub const RESULT_FAILURE: u8 = 0x01;

/// Time calibration succeeded.
const TIME_SYNC_OK: u8 = 0x01;

fn build(message_id: MessageId, device_id: DeviceId, sequence: u16, body: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(12 + body.len());
    packet.put_u16(message_id.as_u16());
    packet.put_u16(body.len() as u16);
    packet.put_slice(&device_id.as_bytes());
    packet.put_u16(sequence);
    packet.put_slice(body);
    seal_frame(&packet)
}

/// Platform general response (0x8001), acknowledging one terminal
/// message by serial and id.
pub fn general_response(
    device_id: DeviceId,
    response_serial: u16,
    response_id: MessageId,
    result: u8,
) -> Vec<u8> {
    let mut body = Vec::with_capacity(5);
    body.put_u16(response_serial);
    body.put_u16(response_id.as_u16());
    body.put_u8(result);
    build(MessageId::GENERAL_RESPONSE, device_id, 0, &body)
}

/// Registration response (0x8100). The auth code is only present on
/// success; a failure body ends after the result byte.
pub fn registration_response(
    device_id: DeviceId,
    terminal_serial: u16,
    result: u8,
    auth_code: &str,
) -> Vec<u8> {
    let mut body = Vec::with_capacity(3 + auth_code.len());
    body.put_u16(terminal_serial);
    body.put_u8(result);
    if result == RESULT_SUCCESS {
        body.put_slice(auth_code.as_bytes());
    }
    build(MessageId::REGISTRATION_RESPONSE, device_id, 0, &body)
}

/// Time-sync response (0x8F01): calibration result plus the current
/// GMT+8 wall clock in BCD.
pub fn time_sync_response(device_id: DeviceId, now: DateTime<Utc>) -> Vec<u8> {
    let mut body = Vec::with_capacity(7);
    body.put_u8(TIME_SYNC_OK);
    body.put_slice(&encode_bcd_timestamp(now));
    build(MessageId::TIME_SYNC_RESPONSE, device_id, 0, &body)
}

/// Set terminal parameters (0x8103) with a pre-built parameter block.
pub fn set_parameters(device_id: DeviceId, sequence: u16, block: &ParameterBlock) -> Vec<u8> {
    build(MessageId::SET_PARAMETERS, device_id, sequence, &block.encode())
}

/// Query all terminal parameters (0x8104). Empty body.
pub fn request_parameters(device_id: DeviceId, sequence: u16) -> Vec<u8> {
    build(MessageId::REQUEST_PARAMETERS, device_id, sequence, &[])
}

/// Terminal control (0x8105): a single command-type byte.
pub fn terminal_control(device_id: DeviceId, sequence: u16, command: u8) -> Vec<u8> {
    build(MessageId::TERMINAL_CONTROL, device_id, sequence, &[command])
}

/// Query terminal attributes (0x8107). Empty body.
pub fn request_attributes(device_id: DeviceId, sequence: u16) -> Vec<u8> {
    build(MessageId::REQUEST_ATTRIBUTES, device_id, sequence, &[])
}

/// Position query (0x8201). Empty body; the terminal answers with a
/// 0x0201 location report.
pub fn position_request(device_id: DeviceId, sequence: u16) -> Vec<u8> {
    build(MessageId::POSITION_REQUEST, device_id, sequence, &[])
}

/// Vehicle control (0x8500): a two-byte control word.
pub fn vehicle_control(device_id: DeviceId, sequence: u16, command: u16) -> Vec<u8> {
    build(
        MessageId::VEHICLE_CONTROL,
        device_id,
        sequence,
        &command.to_be_bytes(),
    )
}

/// Logout request (0x0003). Empty body.
pub fn logout_request(device_id: DeviceId, sequence: u16) -> Vec<u8> {
    build(MessageId::LOGOUT, device_id, sequence, &[])
}

/// TLV parameter block for [`set_parameters`]: a record count followed
/// by (u32 id, u8 length, value) records.
#[derive(Clone, Debug, Default)]
pub struct ParameterBlock {
    records: Vec<(u32, Vec<u8>)>,
}

impl ParameterBlock {
    /// Heartbeat interval in seconds (DWORD).
    pub const HEARTBEAT_INTERVAL: u32 = 0x0001;
    /// Main server domain or IP (STRING).
    pub const SERVER_DOMAIN: u32 = 0x0013;
    /// Main server TCP port (DWORD).
    pub const SERVER_TCP_PORT: u32 = 0x0018;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn dword(mut self, id: u32, value: u32) -> Self {
        self.records.push((id, value.to_be_bytes().to_vec()));
        self
    }

    /// Value must fit the one-byte length prefix; callers validate
    /// operator input before it gets here.
    pub fn string(mut self, id: u32, value: &str) -> Self {
        debug_assert!(value.len() <= u8::MAX as usize);
        self.records.push((id, value.as_bytes().to_vec()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.put_u8(self.records.len() as u8);
        for (id, value) in &self.records {
            body.put_u32(*id);
            body.put_u8(value.len() as u8);
            body.put_slice(value);
        }
        body
    }
}

#[cfg(test)]
mod tests {
    use crate::protocol::{
        ChecksumMode,
        ProtocolConfig,
        message::{
            Frame,
            Message,
        },
        open_frame,
    };

    use super::*;

    fn device() -> DeviceId {
        "013800001234".parse().unwrap()
    }

    #[test]
    fn general_response_round_trips_through_the_decoder() {
        let raw = general_response(device(), 0x0042, MessageId::HEARTBEAT, RESULT_SUCCESS);

        let frame = Frame::decode(&raw, &ProtocolConfig::default()).unwrap();
        assert_eq!(frame.header.message_id, MessageId::GENERAL_RESPONSE);
        assert_eq!(frame.header.device_id, device());
        assert_eq!(frame.header.sequence, 0);
        assert_eq!(frame.header.body_properties.body_length(), 5);

        // 0x8001 is a platform message, so the generic decoder reports
        // it as unsupported; check the body bytes directly.
        let Message::Unsupported { body } = frame.message
        else {
            panic!("expected raw body");
        };
        assert_eq!(body, vec![0x00, 0x42, 0x00, 0x02, 0x00]);
    }

    #[test]
    fn registration_response_omits_the_auth_code_on_failure() {
        let ok = registration_response(device(), 3, RESULT_SUCCESS, "TR20240902090017");
        let ok = open_frame(&ok, ChecksumMode::Strict).unwrap();
        assert_eq!(&ok[12..], {
            let mut body = vec![0x00, 0x03, 0x00];
            body.extend_from_slice(b"TR20240902090017");
            body
        });

        let failed = registration_response(device(), 3, RESULT_FAILURE, "TR20240902090017");
        let failed = open_frame(&failed, ChecksumMode::Strict).unwrap();
        assert_eq!(&failed[12..], [0x00, 0x03, 0x01]);
    }

    #[test]
    fn bodies_containing_flag_bytes_are_escaped() {
        // serial 0x7e7d would put both reserved bytes in the body
        let raw = general_response(device(), 0x7e7d, MessageId::HEARTBEAT, RESULT_SUCCESS);

        assert!(!raw[1..raw.len() - 1].contains(&crate::protocol::FLAG));
        let packet = open_frame(&raw, ChecksumMode::Strict).unwrap();
        assert_eq!(&packet[12..14], [0x7e, 0x7d]);
    }

    #[test]
    fn time_sync_response_carries_the_bcd_clock() {
        use chrono::TimeZone;

        let now = chrono::Utc.with_ymd_and_hms(2024, 1, 15, 0, 30, 0).unwrap();
        let raw = time_sync_response(device(), now);
        let packet = open_frame(&raw, ChecksumMode::Strict).unwrap();

        assert_eq!(
            &packet[12..],
            [0x01, 0x24, 0x01, 0x15, 0x08, 0x30, 0x00]
        );
    }

    #[test]
    fn parameter_blocks_encode_count_and_records() {
        let block = ParameterBlock::new()
            .dword(ParameterBlock::HEARTBEAT_INTERVAL, 30)
            .string(ParameterBlock::SERVER_DOMAIN, "tracker.example.com")
            .dword(ParameterBlock::SERVER_TCP_PORT, 5054);

        let raw = set_parameters(device(), 11, &block);
        let packet = open_frame(&raw, ChecksumMode::Strict).unwrap();
        let body = &packet[12..];

        assert_eq!(body[0], 3);
        assert_eq!(&body[1..5], 0x0001u32.to_be_bytes());
        assert_eq!(body[5], 4);
        assert_eq!(&body[6..10], 30u32.to_be_bytes());
        assert_eq!(&body[10..14], 0x0013u32.to_be_bytes());
        assert_eq!(body[14], 19);
        assert_eq!(&body[15..34], b"tracker.example.com");
    }

    #[test]
    fn empty_body_commands_are_just_a_header() {
        let raw = position_request(device(), 5);
        let packet = open_frame(&raw, ChecksumMode::Strict).unwrap();

        assert_eq!(packet.len(), 12);
        assert_eq!(&packet[0..2], [0x82, 0x01]);
        assert_eq!(&packet[10..12], [0x00, 0x05]);
    }
}
