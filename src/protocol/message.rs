//! Message header and body decoding
//!
//! [`Frame::decode`] takes one raw delimited frame, opens it and
//! dispatches on the message id to the matching body parser. Unknown
//! message ids decode to [`Message::Unsupported`] — terminals send
//! vendor extensions we don't know, and a single odd message must never
//! abort the connection.

use bitflags::bitflags;
use bytes::Buf;

use crate::{
    protocol::{
        DecodeError,
        ProtocolConfig,
        location::{
            self,
            LocationReport,
        },
        open_frame,
        take_array,
        take_bytes,
        take_u8,
        take_u16,
        take_u32,
    },
    types::{
        DeviceId,
        MessageId,
        decode_bcd_timestamp,
    },
};

/// Message body properties word from the header.
///
/// The low 10 bits carry the body length; bit 10 flags an encrypted
/// body, bit 13 a fragmented message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BodyProperties(pub u16);

impl BodyProperties {
    pub fn body_length(&self) -> usize {
        usize::from(self.0 & 0x03ff)
    }

    pub fn is_encrypted(&self) -> bool {
        self.0 & 0x0400 != 0
    }

    pub fn is_fragmented(&self) -> bool {
        self.0 & 0x2000 != 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    pub message_id: MessageId,
    pub body_properties: BodyProperties,
    pub device_id: DeviceId,
    pub sequence: u16,
}

impl Header {
    pub fn decode<B: Buf>(buffer: &mut B) -> Result<Self, DecodeError> {
        if buffer.remaining() < 12 {
            return Err(DecodeError::PacketTooShort {
                length: buffer.remaining(),
            });
        }

        let message_id = MessageId(buffer.get_u16());
        let body_properties = BodyProperties(buffer.get_u16());
        let mut device_id = [0; 6];
        buffer.copy_to_slice(&mut device_id);
        let sequence = buffer.get_u16();

        Ok(Self {
            message_id,
            body_properties,
            device_id: DeviceId::from_bytes(device_id),
            sequence,
        })
    }
}

/// One decoded inbound frame.
#[derive(Clone, Debug)]
pub struct Frame {
    pub header: Header,
    pub message: Message,
}

impl Frame {
    /// Decodes a raw delimited frame as received from the socket.
    pub fn decode(raw: &[u8], config: &ProtocolConfig) -> Result<Self, DecodeError> {
        let packet = open_frame(raw, config.checksum_mode)?;
        let mut buffer = packet.as_slice();

        let header = Header::decode(&mut buffer)?;

        let declared = header.body_properties.body_length();
        if declared != buffer.remaining() {
            return Err(DecodeError::BodyLengthMismatch {
                declared,
                actual: buffer.remaining(),
            });
        }

        let message = Message::decode(&header, buffer, config)?;
        Ok(Self { header, message })
    }
}

#[derive(Clone, Debug)]
pub enum Message {
    Registration(Registration),
    Authentication { code: String },
    GeneralResponse(GeneralResponse),
    Heartbeat,
    Logout,
    SetParametersReply(SetParametersReply),
    AttributeReport(AttributeReport),
    LocationReport(LocationReport),
    Transparent(Transparent),
    TimeSyncRequest,
    /// Message id we don't implement. Kept with its raw body so the
    /// handler can log it; answered with a general ack like anything
    /// else.
    Unsupported { body: Vec<u8> },
}

impl Message {
    pub fn decode(
        header: &Header,
        mut body: &[u8],
        config: &ProtocolConfig,
    ) -> Result<Self, DecodeError> {
        let message = match header.message_id {
            MessageId::TERMINAL_RESPONSE => {
                Self::GeneralResponse(GeneralResponse::decode(&mut body)?)
            }
            MessageId::HEARTBEAT => Self::Heartbeat,
            MessageId::LOGOUT => Self::Logout,
            MessageId::REGISTRATION => Self::Registration(Registration::decode(body)?),
            MessageId::AUTHENTICATION => {
                Self::Authentication {
                    code: ascii_string(body),
                }
            }
            MessageId::SET_PARAMETERS_REPLY => {
                Self::SetParametersReply(SetParametersReply::decode(&mut body)?)
            }
            MessageId::ATTRIBUTE_REPORT => Self::AttributeReport(AttributeReport::decode(&mut body)?),
            MessageId::TRANSPARENT_TRANSMISSION => {
                Self::Transparent(Transparent::decode(&mut body)?)
            }
            MessageId::TIME_SYNC_REQUEST => Self::TimeSyncRequest,
            id if id.is_location_report() => {
                let with_response_serial = id == MessageId::LOCATION_QUERY_RESPONSE;
                Self::LocationReport(location::decode_location_report(
                    body,
                    with_response_serial,
                    config.alarm_dialect,
                )?)
            }
            _ => {
                Self::Unsupported {
                    body: body.to_vec(),
                }
            }
        };

        Ok(message)
    }
}

/// Decodes a fixed-width ASCII field, dropping NUL padding and
/// surrounding whitespace.
pub(crate) fn ascii_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_matches(|c: char| c == '\0' || c.is_whitespace())
        .to_owned()
}

/// Terminal registration body (0x0100).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Registration {
    pub province_id: u16,
    pub city_id: u16,
    pub manufacturer_id: String,
    pub terminal_model: String,
    pub terminal_id: String,
    pub license_plate_color: u8,
    pub license_plate: String,
}

impl Registration {
    fn decode(mut body: &[u8]) -> Result<Self, DecodeError> {
        let buffer = &mut body;

        let province_id = take_u16(buffer)?;
        let city_id = take_u16(buffer)?;
        let manufacturer_id = ascii_string(&take_bytes(buffer, 5)?);
        let terminal_model = ascii_string(&take_bytes(buffer, 20)?);
        let terminal_id = ascii_string(&take_bytes(buffer, 7)?);
        let license_plate_color = take_u8(buffer)?;
        let license_plate = ascii_string(buffer);

        Ok(Self {
            province_id,
            city_id,
            manufacturer_id,
            terminal_model,
            terminal_id,
            license_plate_color,
            license_plate,
        })
    }
}

/// Terminal general response body (0x0001).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GeneralResponse {
    pub response_serial: u16,
    pub response_id: MessageId,
    pub result: u8,
}

impl GeneralResponse {
    fn decode<B: Buf>(buffer: &mut B) -> Result<Self, DecodeError> {
        Ok(Self {
            response_serial: take_u16(buffer)?,
            response_id: MessageId(take_u16(buffer)?),
            result: take_u8(buffer)?,
        })
    }
}

/// Set-parameters reply body (0x0104): the terminal echoing parameter
/// values after a platform query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetParametersReply {
    pub reply_serial: u16,
    pub parameters: Vec<ParameterRecord>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParameterRecord {
    pub id: u32,
    pub value: Vec<u8>,
}

impl SetParametersReply {
    fn decode<B: Buf>(buffer: &mut B) -> Result<Self, DecodeError> {
        let reply_serial = take_u16(buffer)?;
        let count = take_u8(buffer)?;

        let mut parameters = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            let id = take_u32(buffer)?;
            let length = usize::from(take_u8(buffer)?);
            let value = take_bytes(buffer, length)?;
            parameters.push(ParameterRecord { id, value });
        }

        Ok(Self {
            reply_serial,
            parameters,
        })
    }
}

bitflags! {
    /// GNSS constellations the terminal claims to support.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct GnssSupport: u8 {
        const GPS = 0b0001;
        const BEIDOU = 0b0010;
        const GLONASS = 0b0100;
        const GALILEO = 0b1000;
    }
}

bitflags! {
    /// Radio access technologies the terminal claims to support.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct RadioSupport: u8 {
        const GPRS = 0b0000_0001;
        const CDMA = 0b0000_0010;
        const TDSCDMA = 0b0000_0100;
        const WCDMA = 0b0000_1000;
        const CDMA2000 = 0b0001_0000;
        const TDLTE = 0b0010_0000;
        const OTHER = 0b1000_0000;
    }
}

/// Terminal attribute report body (0x0107).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeReport {
    pub terminal_type: u16,
    pub manufacturer_id: String,
    pub terminal_model: String,
    pub terminal_id: String,
    /// ICCID, 20 BCD digits rendered as hex.
    pub iccid: String,
    pub hardware_version: String,
    pub firmware_version: String,
    pub gnss: GnssSupport,
    pub radio: RadioSupport,
    pub message_content: String,
}

impl AttributeReport {
    fn decode<B: Buf>(buffer: &mut B) -> Result<Self, DecodeError> {
        let terminal_type = take_u16(buffer)?;
        let manufacturer_id = ascii_string(&take_bytes(buffer, 5)?);
        let terminal_model = ascii_string(&take_bytes(buffer, 20)?);
        let terminal_id = ascii_string(&take_bytes(buffer, 7)?);
        let iccid = hex::encode(take_bytes(buffer, 10)?);

        let hardware_length = usize::from(take_u8(buffer)?);
        let hardware_version = ascii_string(&take_bytes(buffer, hardware_length)?);
        let firmware_length = usize::from(take_u8(buffer)?);
        let firmware_version = ascii_string(&take_bytes(buffer, firmware_length)?);

        let gnss = GnssSupport::from_bits_truncate(take_u8(buffer)?);
        let radio = RadioSupport::from_bits_truncate(take_u8(buffer)?);

        let message_content = ascii_string(&take_bytes(buffer, buffer.remaining())?);

        Ok(Self {
            terminal_type,
            manufacturer_id,
            terminal_model,
            terminal_id,
            iccid,
            hardware_version,
            firmware_version,
            gnss,
            radio,
            message_content,
        })
    }
}

/// Transparent transmission body (0x0900): a subtype byte followed by
/// payload in a subtype-specific layout.
#[derive(Clone, Debug)]
pub enum Transparent {
    Gnss(GnssDetail),
    RoadTransportLicense(RoadTransportLicense),
    SerialPort { port: u8, data: Vec<u8> },
    UserDefined { id: u16, data: Vec<u8> },
    Unknown { kind: u8, data: Vec<u8> },
}

/// GNSS module detail block carried in a transparent transmission.
#[derive(Clone, Debug)]
pub struct GnssDetail {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: u16,
    pub speed_kmh: f32,
    pub direction: u16,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Clone, Debug)]
pub struct RoadTransportLicense {
    pub license_number: String,
    pub issued: chrono::DateTime<chrono::Utc>,
    pub expires: chrono::DateTime<chrono::Utc>,
}

impl Transparent {
    fn decode<B: Buf>(buffer: &mut B) -> Result<Self, DecodeError> {
        let kind = take_u8(buffer)?;

        let transparent = match kind {
            0x00 => {
                Self::Gnss(GnssDetail {
                    latitude: f64::from(take_u32(buffer)?) / 1e6,
                    longitude: f64::from(take_u32(buffer)?) / 1e6,
                    altitude: take_u16(buffer)?,
                    speed_kmh: f32::from(take_u16(buffer)?) / 10.0,
                    direction: take_u16(buffer)?,
                    timestamp: decode_bcd_timestamp(take_array(buffer)?)
                        .map_err(|_| DecodeError::InvalidTimestamp)?,
                })
            }
            0x01 => {
                Self::RoadTransportLicense(RoadTransportLicense {
                    license_number: ascii_string(&take_bytes(buffer, 20)?),
                    issued: decode_bcd_timestamp(take_array(buffer)?)
                        .map_err(|_| DecodeError::InvalidTimestamp)?,
                    expires: decode_bcd_timestamp(take_array(buffer)?)
                        .map_err(|_| DecodeError::InvalidTimestamp)?,
                })
            }
            0x02 | 0x03 => {
                Self::SerialPort {
                    port: take_u8(buffer)?,
                    data: take_bytes(buffer, buffer.remaining())?,
                }
            }
            0xf0..=0xf4 => {
                let id = take_u16(buffer)?;
                let length = usize::from(take_u16(buffer)?);
                let data = take_bytes(buffer, length.min(buffer.remaining()))?;
                Self::UserDefined { id, data }
            }
            _ => {
                Self::Unknown {
                    kind,
                    data: take_bytes(buffer, buffer.remaining())?,
                }
            }
        };

        Ok(transparent)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        protocol::{
            ProtocolConfig,
            seal_frame,
        },
        types::MessageId,
    };

    use super::*;

    fn packet(message_id: u16, device_id: [u8; 6], sequence: u16, body: &[u8]) -> Vec<u8> {
        let mut packet = Vec::new();
        packet.extend_from_slice(&message_id.to_be_bytes());
        packet.extend_from_slice(&(body.len() as u16).to_be_bytes());
        packet.extend_from_slice(&device_id);
        packet.extend_from_slice(&sequence.to_be_bytes());
        packet.extend_from_slice(body);
        packet
    }

    #[test]
    fn it_decodes_a_registration_frame() {
        let mut body = Vec::new();
        body.extend_from_slice(&11u16.to_be_bytes());
        body.extend_from_slice(&100u16.to_be_bytes());
        body.extend_from_slice(b"ABCDE");
        body.extend_from_slice(b"TK905\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0");
        body.extend_from_slice(b"0001234");
        body.push(2);
        body.extend_from_slice(b"TESTPLATE");

        let raw = seal_frame(&packet(
            0x0100,
            [0x01, 0x38, 0x00, 0x00, 0x12, 0x34],
            7,
            &body,
        ));

        let frame = Frame::decode(&raw, &ProtocolConfig::default()).unwrap();
        assert_eq!(frame.header.message_id, MessageId::REGISTRATION);
        assert_eq!(frame.header.device_id.to_string(), "013800001234");
        assert_eq!(frame.header.sequence, 7);

        let Message::Registration(registration) = frame.message
        else {
            panic!("expected registration");
        };
        assert_eq!(registration.province_id, 11);
        assert_eq!(registration.city_id, 100);
        assert_eq!(registration.manufacturer_id, "ABCDE");
        assert_eq!(registration.terminal_model, "TK905");
        assert_eq!(registration.terminal_id, "0001234");
        assert_eq!(registration.license_plate_color, 2);
        assert_eq!(registration.license_plate, "TESTPLATE");
    }

    #[test]
    fn it_decodes_an_authentication_frame() {
        let raw = seal_frame(&packet(
            0x0102,
            [0x01, 0x38, 0x00, 0x00, 0x12, 0x34],
            2,
            b"TR20240902090017",
        ));

        let frame = Frame::decode(&raw, &ProtocolConfig::default()).unwrap();
        let Message::Authentication { code } = frame.message
        else {
            panic!("expected authentication");
        };
        assert_eq!(code, "TR20240902090017");
    }

    #[test]
    fn unknown_message_ids_decode_to_unsupported() {
        let raw = seal_frame(&packet(
            0x7777,
            [0x01, 0x38, 0x00, 0x00, 0x12, 0x34],
            9,
            &[0xde, 0xad],
        ));

        let frame = Frame::decode(&raw, &ProtocolConfig::default()).unwrap();
        assert_eq!(frame.header.message_id, MessageId(0x7777));
        let Message::Unsupported { body } = frame.message
        else {
            panic!("expected unsupported");
        };
        assert_eq!(body, vec![0xde, 0xad]);
    }

    #[test]
    fn body_length_must_match_the_header() {
        let mut packet = packet(0x0002, [0; 6], 1, &[]);
        // claim one body byte without carrying it
        packet[3] = 1;

        let raw = seal_frame(&packet);
        assert!(matches!(
            Frame::decode(&raw, &ProtocolConfig::default()),
            Err(DecodeError::BodyLengthMismatch {
                declared: 1,
                actual: 0
            })
        ));
    }

    #[test]
    fn it_decodes_a_set_parameters_reply() {
        let mut body = Vec::new();
        body.extend_from_slice(&3u16.to_be_bytes());
        body.push(2);
        body.extend_from_slice(&0x0001u32.to_be_bytes());
        body.push(4);
        body.extend_from_slice(&60u32.to_be_bytes());
        body.extend_from_slice(&0x0013u32.to_be_bytes());
        body.push(3);
        body.extend_from_slice(b"abc");

        let raw = seal_frame(&packet(0x0104, [0; 6], 3, &body));
        let frame = Frame::decode(&raw, &ProtocolConfig::default()).unwrap();

        let Message::SetParametersReply(reply) = frame.message
        else {
            panic!("expected set-parameters reply");
        };
        assert_eq!(reply.reply_serial, 3);
        assert_eq!(reply.parameters.len(), 2);
        assert_eq!(reply.parameters[0].id, 0x0001);
        assert_eq!(reply.parameters[0].value, 60u32.to_be_bytes());
        assert_eq!(reply.parameters[1].id, 0x0013);
        assert_eq!(reply.parameters[1].value, b"abc");
    }
}
