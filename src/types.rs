use std::{
    fmt::{
        Debug,
        Display,
    },
    str::FromStr,
};

use chrono::{
    DateTime,
    FixedOffset,
    NaiveDate,
    TimeZone,
    Utc,
};
use serde_with::{
    DeserializeFromStr,
    SerializeDisplay,
};

/// 6-byte terminal identifier from the message header.
///
/// Terminals put their SIM/serial number here. It's rendered as 12 hex
/// digits everywhere outside the wire format.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, SerializeDisplay, DeserializeFromStr,
)]
pub struct DeviceId([u8; 6]);

impl DeviceId {
    pub const fn from_bytes(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> [u8; 6] {
        self.0
    }

    /// Device class encoded in the first byte of the id by the
    /// manufacturer's numbering scheme.
    pub fn device_class(&self) -> DeviceClass {
        match self.0[0] {
            0x00 => DeviceClass::Obd,
            0x01 => DeviceClass::Usb,
            0x02 => DeviceClass::Other1,
            0x03 => DeviceClass::Other2,
            0x04 => DeviceClass::Other3,
            0x05 => DeviceClass::Other4,
            _ => DeviceClass::Unknown,
        }
    }
}

impl Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl Debug for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DeviceId({self})")
    }
}

impl FromStr for DeviceId {
    type Err = DeviceIdFromStrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || {
            DeviceIdFromStrError {
                input: s.to_owned(),
            }
        };

        let mut bytes = [0; 6];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| err())?;
        Ok(Self(bytes))
    }
}

#[derive(Clone, Debug, thiserror::Error)]
#[error("invalid device id: {input}")]
pub struct DeviceIdFromStrError {
    pub input: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeviceClass {
    Obd,
    Usb,
    Other1,
    Other2,
    Other3,
    Other4,
    Unknown,
}

impl DeviceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::Obd => "obd",
            DeviceClass::Usb => "usb",
            DeviceClass::Other1 => "other1",
            DeviceClass::Other2 => "other2",
            DeviceClass::Other3 => "other3",
            DeviceClass::Other4 => "other4",
            DeviceClass::Unknown => "unknown",
        }
    }
}

/// JT/T 808 message id.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(pub u16);

impl MessageId {
    // terminal → platform
    pub const TERMINAL_RESPONSE: Self = Self(0x0001);
    pub const HEARTBEAT: Self = Self(0x0002);
    pub const LOGOUT: Self = Self(0x0003);
    pub const REGISTRATION: Self = Self(0x0100);
    pub const AUTHENTICATION: Self = Self(0x0102);
    pub const SET_PARAMETERS_REPLY: Self = Self(0x0104);
    pub const ATTRIBUTE_REPORT: Self = Self(0x0107);
    pub const LOCATION_REPORT: Self = Self(0x0200);
    pub const LOCATION_QUERY_RESPONSE: Self = Self(0x0201);
    pub const LOCATION_REPORT_BATCH: Self = Self(0x0202);
    pub const LOCATION_REPORT_ALARM: Self = Self(0x0203);
    pub const TRANSPARENT_TRANSMISSION: Self = Self(0x0900);
    pub const TIME_SYNC_REQUEST: Self = Self(0x0F01);

    // platform → terminal
    pub const GENERAL_RESPONSE: Self = Self(0x8001);
    pub const REGISTRATION_RESPONSE: Self = Self(0x8100);
    pub const SET_PARAMETERS: Self = Self(0x8103);
    pub const REQUEST_PARAMETERS: Self = Self(0x8104);
    pub const TERMINAL_CONTROL: Self = Self(0x8105);
    pub const REQUEST_ATTRIBUTES: Self = Self(0x8107);
    pub const POSITION_REQUEST: Self = Self(0x8201);
    pub const VEHICLE_CONTROL: Self = Self(0x8500);
    pub const TIME_SYNC_RESPONSE: Self = Self(0x8F01);

    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// Location-report family: plain reports plus the query-response
    /// and batch/alarm resend variants, which share the same body.
    pub fn is_location_report(&self) -> bool {
        matches!(
            *self,
            Self::LOCATION_REPORT
                | Self::LOCATION_QUERY_RESPONSE
                | Self::LOCATION_REPORT_BATCH
                | Self::LOCATION_REPORT_ALARM
        )
    }
}

impl Debug for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MessageId(0x{:04x})", self.0)
    }
}

impl Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

/// Terminals report wall-clock time in GMT+8, BCD encoded.
const DEVICE_UTC_OFFSET_SECONDS: i32 = 8 * 3600;

fn device_offset() -> FixedOffset {
    FixedOffset::east_opt(DEVICE_UTC_OFFSET_SECONDS).expect("GMT+8 is a valid offset")
}

#[derive(Clone, Debug, thiserror::Error)]
#[error("invalid BCD timestamp: {bytes:02x?}")]
pub struct BcdTimestampError {
    pub bytes: [u8; 6],
}

fn bcd_digit(byte: u8) -> Option<u32> {
    let tens = u32::from(byte >> 4);
    let ones = u32::from(byte & 0x0f);
    (tens <= 9 && ones <= 9).then(|| tens * 10 + ones)
}

/// Decodes a BCD `YYMMDDhhmmss` timestamp, interpreting it as GMT+8
/// wall-clock time and converting to UTC.
pub fn decode_bcd_timestamp(bytes: [u8; 6]) -> Result<DateTime<Utc>, BcdTimestampError> {
    let err = || BcdTimestampError { bytes };

    let mut digits = [0u32; 6];
    for (slot, byte) in digits.iter_mut().zip(bytes) {
        *slot = bcd_digit(byte).ok_or_else(err)?;
    }
    let [year, month, day, hour, minute, second] = digits;

    let date = NaiveDate::from_ymd_opt(2000 + year as i32, month, day).ok_or_else(err)?;
    let naive = date.and_hms_opt(hour, minute, second).ok_or_else(err)?;

    let local = device_offset()
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(err)?;
    Ok(local.with_timezone(&Utc))
}

/// Encodes a UTC instant as the BCD `YYMMDDhhmmss` GMT+8 wall-clock
/// timestamp the terminal expects.
pub fn encode_bcd_timestamp(time: DateTime<Utc>) -> [u8; 6] {
    use chrono::{
        Datelike,
        Timelike,
    };

    let local = time.with_timezone(&device_offset());

    fn bcd(value: u32) -> u8 {
        (((value / 10) << 4) | (value % 10)) as u8
    }

    [
        bcd(local.year() as u32 % 100),
        bcd(local.month()),
        bcd(local.day()),
        bcd(local.hour()),
        bcd(local.minute()),
        bcd(local.second()),
    ]
}

#[cfg(test)]
mod tests {
    use chrono::{
        TimeZone,
        Utc,
    };

    use super::*;

    #[test]
    fn it_parses_and_formats_device_ids() {
        let id: DeviceId = "013800001234".parse().unwrap();
        assert_eq!(id.as_bytes(), [0x01, 0x38, 0x00, 0x00, 0x12, 0x34]);
        assert_eq!(id.to_string(), "013800001234");
        assert_eq!(id.device_class(), DeviceClass::Usb);

        assert!("01380000123".parse::<DeviceId>().is_err());
        assert!("01380000123g".parse::<DeviceId>().is_err());
    }

    #[test]
    fn it_decodes_bcd_timestamps_to_utc() {
        let time = decode_bcd_timestamp([0x24, 0x01, 0x15, 0x08, 0x30, 0x00]).unwrap();
        assert_eq!(time, Utc.with_ymd_and_hms(2024, 1, 15, 0, 30, 0).unwrap());
    }

    #[test]
    fn it_rejects_non_decimal_bcd() {
        assert!(decode_bcd_timestamp([0x24, 0x0a, 0x15, 0x08, 0x30, 0x00]).is_err());
        assert!(decode_bcd_timestamp([0x24, 0x13, 0x15, 0x08, 0x30, 0x00]).is_err());
    }

    #[test]
    fn bcd_encoding_round_trips() {
        let time = Utc.with_ymd_and_hms(2024, 9, 2, 1, 0, 17).unwrap();
        let bytes = encode_bcd_timestamp(time);
        assert_eq!(bytes, [0x24, 0x09, 0x02, 0x09, 0x00, 0x17]);
        assert_eq!(decode_bcd_timestamp(bytes).unwrap(), time);
    }
}
