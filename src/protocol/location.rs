//! Location report decoding
//!
//! A location report is a 28-byte fixed block (alarm word, status word,
//! scaled coordinates, altitude, speed, heading, BCD time) optionally
//! followed by a stream of tag-length-value extension records. The
//! extension stream uses 1-byte tags; the OBD record nested under tag
//! 0xF3 is its own TLV stream with 2-byte tags and a separate tag
//! space. The two dialects must not be confused.
//!
//! Extension records are field-device-controlled data: every length is
//! bounds-checked, a truncated trailing record is dropped rather than
//! failing the report, and unknown tags are kept verbatim.

use bitflags::bitflags;
use bytes::Buf;
use chrono::{
    DateTime,
    Utc,
};

use crate::{
    protocol::{
        AlarmDialect,
        DecodeError,
        message::ascii_string,
        take_array,
        take_i16,
        take_u8,
        take_u16,
        take_u32,
    },
    types::decode_bcd_timestamp,
};

#[derive(Clone, Debug)]
pub struct LocationReport {
    /// Serial of the platform query this report answers (0x0201 only).
    pub response_serial: Option<u16>,
    pub alarm_word: u32,
    pub alarm: AlarmState,
    pub status: StatusFlags,
    /// Degrees, raw value scaled by 1e-6.
    pub latitude: f64,
    pub longitude: f64,
    /// Meters.
    pub altitude: u16,
    /// km/h, raw value scaled by 0.1.
    pub speed_kmh: f32,
    /// Degrees clockwise from north, 0-359.
    pub direction: u16,
    pub timestamp: DateTime<Utc>,
    pub extended: ExtendedData,
}

pub fn decode_location_report(
    mut body: &[u8],
    with_response_serial: bool,
    dialect: AlarmDialect,
) -> Result<LocationReport, DecodeError> {
    let buffer = &mut body;

    let response_serial = with_response_serial
        .then(|| take_u16(buffer))
        .transpose()?;

    if buffer.remaining() < 28 {
        return Err(DecodeError::TruncatedBody);
    }

    let alarm_word = buffer.get_u32();
    let status_word = buffer.get_u32();
    let latitude = f64::from(buffer.get_u32()) / 1e6;
    let longitude = f64::from(buffer.get_u32()) / 1e6;
    let altitude = buffer.get_u16();
    let speed_kmh = f32::from(buffer.get_u16()) / 10.0;
    let direction = buffer.get_u16();
    let timestamp = decode_bcd_timestamp(take_array(buffer)?)
        .map_err(|_| DecodeError::InvalidTimestamp)?;

    let extended = decode_extended_data(buffer);

    Ok(LocationReport {
        response_serial,
        alarm_word,
        alarm: AlarmState::from_word(alarm_word, dialect),
        status: StatusFlags::from_bits_retain(status_word),
        latitude,
        longitude,
        altitude,
        speed_kmh,
        direction,
        timestamp,
        extended,
    })
}

bitflags! {
    /// Status word of the fixed block.
    ///
    /// Bits 6-7 are the two-bit load state, exposed through
    /// [`StatusFlags::load_state`].
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct StatusFlags: u32 {
        const ACC_ON = 1 << 0;
        const POSITIONED = 1 << 1;
        const SOUTH_LATITUDE = 1 << 2;
        const WEST_LONGITUDE = 1 << 3;
        const STOPPED = 1 << 4;
        const COORDINATES_ENCRYPTED = 1 << 5;
        const OIL_LINE_DISCONNECTED = 1 << 10;
        const CIRCUIT_DISCONNECTED = 1 << 11;
        const DOOR_1_OPEN = 1 << 12;
        const DOOR_2_OPEN = 1 << 13;
        const DOOR_3_OPEN = 1 << 14;
        const DOOR_4_OPEN = 1 << 15;
        const DOOR_5_OPEN = 1 << 16;
        const GPS_FIX = 1 << 17;
        const BEIDOU_FIX = 1 << 18;
        const GLONASS_FIX = 1 << 19;
        const GALILEO_FIX = 1 << 20;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadState {
    Empty,
    Half,
    Reserved,
    Full,
}

impl StatusFlags {
    pub fn load_state(&self) -> LoadState {
        match (self.bits() >> 6) & 0b11 {
            0b00 => LoadState::Empty,
            0b01 => LoadState::Half,
            0b10 => LoadState::Reserved,
            _ => LoadState::Full,
        }
    }
}

/// Alarm word exploded into named conditions.
///
/// The set of fields is the union of both dialects; a dialect only sets
/// the conditions its layout can express.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AlarmState {
    pub emergency: bool,
    pub overspeed: bool,
    pub fatigue_driving: bool,
    pub risk_warning: bool,
    pub gnss_fault: bool,
    pub gnss_antenna_open: bool,
    pub gnss_antenna_short: bool,
    pub main_power_undervoltage: bool,
    pub main_power_off: bool,
    pub lcd_fault: bool,
    pub tts_fault: bool,
    pub camera_fault: bool,
    pub ic_card_fault: bool,
    pub overspeed_warning: bool,
    pub fatigue_warning: bool,
    pub cumulative_driving_timeout: bool,
    pub timeout_parking: bool,
    pub area_violation: bool,
    pub route_violation: bool,
    pub route_time_violation: bool,
    pub off_route: bool,
    pub vss_fault: bool,
    pub fuel_abnormal: bool,
    pub vehicle_stolen: bool,
    pub illegal_ignition: bool,
    pub illegal_movement: bool,
    pub collision: bool,
    pub rollover: bool,
    pub door_alarm: bool,
    pub high_water_temperature: bool,
    pub idling: bool,
    pub vibration: bool,
    pub sharp_turn: bool,
}

impl AlarmState {
    pub fn from_word(word: u32, dialect: AlarmDialect) -> Self {
        let bit = |n: u32| word & (1 << n) != 0;

        match dialect {
            AlarmDialect::Standard2013 => {
                Self {
                    emergency: bit(0),
                    overspeed: bit(1),
                    fatigue_driving: bit(2),
                    risk_warning: bit(3),
                    gnss_fault: bit(4),
                    gnss_antenna_open: bit(5),
                    gnss_antenna_short: bit(6),
                    main_power_undervoltage: bit(7),
                    main_power_off: bit(8),
                    lcd_fault: bit(9),
                    tts_fault: bit(10),
                    camera_fault: bit(11),
                    ic_card_fault: bit(12),
                    overspeed_warning: bit(13),
                    fatigue_warning: bit(14),
                    // bit 15 reserved
                    cumulative_driving_timeout: bit(16),
                    timeout_parking: bit(17),
                    area_violation: bit(18),
                    route_violation: bit(19),
                    route_time_violation: bit(20),
                    off_route: bit(21),
                    vss_fault: bit(22),
                    fuel_abnormal: bit(23),
                    vehicle_stolen: bit(24),
                    illegal_ignition: bit(25),
                    illegal_movement: bit(26),
                    collision: bit(27),
                    rollover: bit(28),
                    door_alarm: bit(29),
                    ..Default::default()
                }
            }
            AlarmDialect::VendorLegacy => {
                Self {
                    overspeed: bit(0),
                    fatigue_driving: bit(1),
                    main_power_undervoltage: bit(7),
                    main_power_off: bit(8),
                    high_water_temperature: bit(12),
                    idling: bit(13),
                    vibration: bit(16),
                    sharp_turn: bit(17),
                    illegal_movement: bit(24),
                    collision: bit(25),
                    ..Default::default()
                }
            }
        }
    }
}

bitflags! {
    /// Extended alarm word (extension tag 0xF4).
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ExtendedAlarm: u16 {
        const RAPID_ACCELERATION = 0x0001;
        const RAPID_DECELERATION = 0x0002;
        const SUDDEN_BRAKE = 0x0004;
        const SHARP_TURN = 0x0008;
        const COLLISION = 0x0010;
        const ROLLOVER = 0x0020;
        const HIGH_TEMPERATURE = 0x0100;
    }
}

bitflags! {
    /// Vehicle signal word (extension tag 0x25).
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct VehicleSignals: u32 {
        const LOW_BEAM = 1 << 0;
        const HIGH_BEAM = 1 << 1;
        const RIGHT_INDICATOR = 1 << 2;
        const LEFT_INDICATOR = 1 << 3;
        const BRAKE = 1 << 4;
        const REVERSE = 1 << 5;
        const FOG_LIGHT = 1 << 6;
        const OUTLINE_MARKERS = 1 << 7;
        const HORN = 1 << 8;
        const AIR_CONDITIONER = 1 << 9;
        const NEUTRAL_GEAR = 1 << 10;
        const RETARDER = 1 << 11;
        const ABS = 1 << 12;
        const HEATER = 1 << 13;
        const CLUTCH = 1 << 14;
    }
}

bitflags! {
    /// IO state word (extension tag 0x2A).
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct IoState: u16 {
        const DEEP_SLEEP = 1 << 0;
        const SLEEP = 1 << 1;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fortification {
    Fortified,
    Withdrawn,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellInfo {
    pub mcc: u16,
    pub mnc: u8,
    pub lac: u16,
    pub cell_id: u32,
    pub signal_strength: u8,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WifiInfo {
    /// Access point MAC, 12 hex digits.
    pub mac: String,
    pub signal_strength: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatteryLevel {
    /// 0-10 scale.
    pub level: u8,
    /// 1-100, when the firmware supports it.
    pub percentage: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GSensor {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WirelessMode {
    pub device_mode: u8,
    pub positioning_mode: u8,
}

/// ASCII cell report (extension tag 0x9F): serving cell fields followed
/// by neighbor entries, comma separated.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CellReport {
    pub mcc: String,
    pub mnc: String,
    pub lac: String,
    pub cell_id: String,
    pub signal_strength: String,
    pub neighbors: Vec<String>,
}

/// Decoded extension records, one field per known tag. Unknown tags are
/// preserved as raw `(tag, value)` pairs.
#[derive(Clone, Debug, Default)]
pub struct ExtendedData {
    pub mileage_km: Option<f64>,
    pub fuel_level_l: Option<f32>,
    pub recorder_speed_kmh: Option<f32>,
    pub manual_alarm_count: Option<u16>,
    pub vehicle_signals: Option<VehicleSignals>,
    pub io_state: Option<IoState>,
    pub analog_word: Option<u32>,
    pub signal_strength: Option<u8>,
    pub satellites: Option<u8>,
    pub temperatures: Option<Vec<u16>>,
    pub forward_reversal: Option<u8>,
    pub cells_2g: Option<Vec<CellInfo>>,
    pub wifi: Option<Vec<WifiInfo>>,
    pub battery: Option<BatteryLevel>,
    pub cells_4g: Option<Vec<CellInfo>>,
    pub main_power_voltage: Option<f32>,
    pub instantaneous_speed_kmh: Option<u8>,
    pub engine_speed_rpm: Option<u16>,
    pub battery_voltage: Option<f32>,
    pub engine_load_percent: Option<u8>,
    pub coolant_temperature_c: Option<i16>,
    pub instant_fuel_ml_h: Option<u16>,
    pub intake_temperature_c: Option<i16>,
    pub airflow_g_s: Option<u16>,
    pub manifold_pressure_kpa: Option<u8>,
    pub throttle_percent: Option<u8>,
    pub fuel_pressure_kpa: Option<u16>,
    pub vin: Option<String>,
    pub total_mileage_km: Option<f64>,
    pub remaining_mileage_km: Option<u16>,
    pub fuel_percent: Option<u8>,
    pub rapid_accelerations: Option<u8>,
    pub rapid_decelerations: Option<u8>,
    pub sharp_turns: Option<u8>,
    pub trip_distance_km: Option<f64>,
    pub trip_fuel_ml: Option<u16>,
    pub average_speed_kmh: Option<u16>,
    pub max_speed_kmh: Option<u16>,
    pub overspeed_events: Option<u8>,
    pub idle_events: Option<u8>,
    pub total_fuel_l: Option<f64>,
    pub cell_report: Option<CellReport>,
    pub fault_codes: Option<Vec<String>>,
    pub iccid: Option<String>,
    pub fortification: Option<Fortification>,
    pub obd: Option<ObdData>,
    pub extended_alarm: Option<ExtendedAlarm>,
    pub g_sensor: Option<GSensor>,
    pub wireless_mode: Option<WirelessMode>,
    pub unknown: Vec<(u8, Vec<u8>)>,
}

/// Iterates the 1-byte-tag extension stream. A record whose declared
/// length overruns the buffer is dropped and iteration stops; a record
/// whose value is shorter than its field layout is skipped.
pub fn decode_extended_data(mut buffer: &[u8]) -> ExtendedData {
    let mut extended = ExtendedData::default();

    while buffer.remaining() >= 2 {
        let tag = buffer.get_u8();
        let length = usize::from(buffer.get_u8());

        if length > buffer.remaining() {
            tracing::debug!(
                tag = format_args!("0x{tag:02x}"),
                length,
                remaining = buffer.remaining(),
                "dropping truncated trailing extension record"
            );
            break;
        }

        let value = &buffer[..length];
        buffer.advance(length);

        if let Err(error) = extended.apply(tag, value) {
            tracing::debug!(
                tag = format_args!("0x{tag:02x}"),
                ?error,
                "skipping malformed extension record"
            );
        }
    }

    extended
}

impl ExtendedData {
    fn apply(&mut self, tag: u8, mut value: &[u8]) -> Result<(), DecodeError> {
        let buffer = &mut value;

        match tag {
            0x01 => self.mileage_km = Some(f64::from(take_u32(buffer)?) / 10.0),
            0x02 => self.fuel_level_l = Some(f32::from(take_u16(buffer)?) / 10.0),
            0x03 => self.recorder_speed_kmh = Some(f32::from(take_u16(buffer)?) / 10.0),
            0x04 => self.manual_alarm_count = Some(take_u16(buffer)?),
            0x25 => {
                self.vehicle_signals = Some(VehicleSignals::from_bits_retain(take_u32(buffer)?))
            }
            0x2a => self.io_state = Some(IoState::from_bits_retain(take_u16(buffer)?)),
            0x2b => self.analog_word = Some(take_u32(buffer)?),
            0x30 => self.signal_strength = Some(take_u8(buffer)?),
            0x31 => self.satellites = Some(take_u8(buffer)?),
            0x51 => {
                let mut temperatures = Vec::with_capacity(buffer.remaining() / 2);
                while buffer.remaining() >= 2 {
                    temperatures.push(buffer.get_u16());
                }
                self.temperatures = Some(temperatures);
            }
            0x52 => self.forward_reversal = Some(take_u8(buffer)?),
            0x53 => {
                let count = take_u8(buffer)?;
                let mut cells = Vec::with_capacity(usize::from(count));
                for _ in 0..count {
                    cells.push(CellInfo {
                        mcc: take_u16(buffer)?,
                        mnc: take_u8(buffer)?,
                        lac: take_u16(buffer)?,
                        cell_id: u32::from(take_u16(buffer)?),
                        signal_strength: take_u8(buffer)?,
                    });
                }
                self.cells_2g = Some(cells);
            }
            0x54 => {
                let count = take_u8(buffer)?;
                let mut wifi = Vec::with_capacity(usize::from(count));
                for _ in 0..count {
                    wifi.push(WifiInfo {
                        mac: hex::encode(take_array::<_, 6>(buffer)?),
                        signal_strength: take_u8(buffer)?,
                    });
                }
                self.wifi = Some(wifi);
            }
            0x56 => {
                self.battery = Some(BatteryLevel {
                    level: take_u8(buffer)?,
                    percentage: take_u8(buffer)?,
                })
            }
            0x5d => {
                let count = take_u8(buffer)?;
                let mut cells = Vec::with_capacity(usize::from(count));
                for _ in 0..count {
                    cells.push(CellInfo {
                        mcc: take_u16(buffer)?,
                        mnc: take_u8(buffer)?,
                        lac: take_u16(buffer)?,
                        cell_id: take_u32(buffer)?,
                        signal_strength: take_u8(buffer)?,
                    });
                }
                self.cells_4g = Some(cells);
            }
            0x61 => self.main_power_voltage = Some(f32::from(take_u16(buffer)?) * 0.01),
            0x80 => self.instantaneous_speed_kmh = Some(take_u8(buffer)?),
            0x81 => self.engine_speed_rpm = Some(take_u16(buffer)?),
            0x82 => self.battery_voltage = Some(f32::from(take_u16(buffer)?) / 10.0),
            0x83 => self.engine_load_percent = Some(take_u8(buffer)?),
            0x84 => self.coolant_temperature_c = Some(i16::from(take_u8(buffer)?) - 40),
            0x85 => self.instant_fuel_ml_h = Some(take_u16(buffer)?),
            0x86 => self.intake_temperature_c = Some(i16::from(take_u8(buffer)?) - 40),
            0x87 => self.airflow_g_s = Some(take_u16(buffer)?),
            0x88 => self.manifold_pressure_kpa = Some(take_u8(buffer)?),
            0x89 => self.throttle_percent = Some(take_u8(buffer)?),
            0x8a => self.fuel_pressure_kpa = Some(take_u16(buffer)?),
            0x8b => self.vin = Some(ascii_string(value)),
            0x8c => self.total_mileage_km = Some(f64::from(take_u32(buffer)?) / 10.0),
            0x8d => self.remaining_mileage_km = Some(take_u16(buffer)?),
            0x8e => self.fuel_percent = Some(take_u8(buffer)?),
            0x8f => self.rapid_accelerations = Some(take_u8(buffer)?),
            0x90 => self.rapid_decelerations = Some(take_u8(buffer)?),
            0x91 => self.sharp_turns = Some(take_u8(buffer)?),
            0x92 => self.trip_distance_km = Some(f64::from(take_u32(buffer)?) / 10.0),
            0x93 => self.trip_fuel_ml = Some(take_u16(buffer)?),
            0x94 => self.average_speed_kmh = Some(take_u16(buffer)?),
            0x95 => self.max_speed_kmh = Some(take_u16(buffer)?),
            0x96 => self.overspeed_events = Some(take_u8(buffer)?),
            0x97 => self.idle_events = Some(take_u8(buffer)?),
            0x98 => self.total_fuel_l = Some(f64::from(take_u32(buffer)?) / 10.0),
            0x9f => {
                let report = ascii_string(value);
                let mut parts = report.split(',').map(str::to_owned);
                self.cell_report = Some(CellReport {
                    mcc: parts.next().unwrap_or_default(),
                    mnc: parts.next().unwrap_or_default(),
                    lac: parts.next().unwrap_or_default(),
                    cell_id: parts.next().unwrap_or_default(),
                    signal_strength: parts.next().unwrap_or_default(),
                    neighbors: parts.collect(),
                });
            }
            0xa0 => {
                self.fault_codes = Some(
                    ascii_string(value)
                        .split(',')
                        .filter(|code| !code.is_empty())
                        .map(str::to_owned)
                        .collect(),
                )
            }
            0xcc | 0xf1 => self.iccid = Some(ascii_string(value)),
            0xf3 => {
                if value.len() == 1 {
                    self.fortification = Some(if value[0] == 0x01 {
                        Fortification::Fortified
                    }
                    else {
                        Fortification::Withdrawn
                    });
                }
                else {
                    self.obd = Some(decode_obd_data(value));
                }
            }
            0xf4 => self.extended_alarm = Some(ExtendedAlarm::from_bits_retain(take_u16(buffer)?)),
            0xf5 => {
                self.g_sensor = Some(GSensor {
                    x: take_i16(buffer)?,
                    y: take_i16(buffer)?,
                    z: take_i16(buffer)?,
                })
            }
            0xf6 => {
                self.wireless_mode = Some(WirelessMode {
                    device_mode: take_u8(buffer)?,
                    positioning_mode: take_u8(buffer)?,
                })
            }
            _ => self.unknown.push((tag, value.to_vec())),
        }

        Ok(())
    }
}

/// OBD sub-record carried under extension tag 0xF3. Same TLV shape as
/// the outer stream but with 2-byte tags and its own tag space.
#[derive(Clone, Debug, Default)]
pub struct ObdData {
    pub speed_kmh: Option<f32>,
    pub engine_speed_rpm: Option<u16>,
    pub battery_voltage: Option<f32>,
    pub total_mileage_km: Option<f64>,
    pub idle_fuel_rate_l_h: Option<f32>,
    pub driving_fuel_rate_l_100km: Option<f32>,
    pub engine_load_percent: Option<u8>,
    pub coolant_temperature_c: Option<i16>,
    pub intake_pressure_kpa: Option<u16>,
    pub intake_temperature_c: Option<i16>,
    pub intake_flow_g_s: Option<f32>,
    pub throttle_percent: Option<f32>,
    pub ignition_advance_deg: Option<f32>,
    pub vin: Option<String>,
    pub fault_codes: Option<String>,
    pub trip_id: Option<u32>,
    pub trip_mileage_km: Option<f32>,
    pub mileage_since_connect_km: Option<f64>,
    pub trip_fuel_l: Option<f32>,
    pub total_fuel_l: Option<f64>,
    pub average_fuel_l_100km: Option<f32>,
    pub overspeed_duration_s: Option<u32>,
    pub high_rpm_count: Option<u16>,
    pub high_rpm_duration_s: Option<u32>,
    pub excessive_idle_count: Option<u16>,
    pub idle_duration_s: Option<u32>,
    pub idle_fuel_l: Option<f32>,
    pub fatigue_duration_s: Option<u32>,
    pub trip_average_speed_kmh: Option<f32>,
    pub trip_max_speed_kmh: Option<f32>,
    pub max_engine_speed_rpm: Option<u16>,
    pub max_coolant_temperature_c: Option<i16>,
    pub max_voltage: Option<f32>,
    pub overspeed_count: Option<u16>,
    pub sudden_acceleration_count: Option<u16>,
    pub sudden_deceleration_count: Option<u16>,
    pub sharp_turn_count: Option<u16>,
    pub lane_change_count: Option<u16>,
    pub sudden_brake_count: Option<u16>,
    pub unknown: Vec<(u16, Vec<u8>)>,
}

pub fn decode_obd_data(mut buffer: &[u8]) -> ObdData {
    let mut obd = ObdData::default();

    while buffer.remaining() >= 3 {
        let tag = buffer.get_u16();
        let length = usize::from(buffer.get_u8());

        if length > buffer.remaining() {
            tracing::debug!(
                tag = format_args!("0x{tag:04x}"),
                length,
                remaining = buffer.remaining(),
                "dropping truncated trailing OBD record"
            );
            break;
        }

        let value = &buffer[..length];
        buffer.advance(length);

        if let Err(error) = obd.apply(tag, value) {
            tracing::debug!(
                tag = format_args!("0x{tag:04x}"),
                ?error,
                "skipping malformed OBD record"
            );
        }
    }

    obd
}

impl ObdData {
    fn apply(&mut self, tag: u16, mut value: &[u8]) -> Result<(), DecodeError> {
        let buffer = &mut value;

        match tag {
            0x0002 => self.speed_kmh = Some(f32::from(take_u16(buffer)?) / 10.0),
            0x0003 => self.engine_speed_rpm = Some(take_u16(buffer)?),
            0x0004 => self.battery_voltage = Some(f32::from(take_u16(buffer)?) * 0.001),
            0x0005 => self.total_mileage_km = Some(f64::from(take_u32(buffer)?) / 10.0),
            0x0006 => self.idle_fuel_rate_l_h = Some(f32::from(take_u16(buffer)?) / 10.0),
            0x0007 => self.driving_fuel_rate_l_100km = Some(f32::from(take_u16(buffer)?) / 10.0),
            0x0008 => self.engine_load_percent = Some(take_u8(buffer)?),
            0x0009 => self.coolant_temperature_c = Some(take_i16(buffer)?.saturating_sub(40)),
            0x000b => self.intake_pressure_kpa = Some(take_u16(buffer)?),
            0x000c => self.intake_temperature_c = Some(take_i16(buffer)?.saturating_sub(40)),
            0x000d => self.intake_flow_g_s = Some(f32::from(take_u16(buffer)?) / 100.0),
            0x000e => {
                self.throttle_percent = Some(f32::from(take_u8(buffer)?) * 100.0 / 255.0)
            }
            0x000f => self.ignition_advance_deg = Some(f32::from(take_u8(buffer)?) * 0.5 - 64.0),
            0x0050 => self.vin = Some(ascii_string(value)),
            0x0051 => self.fault_codes = Some(hex::encode(value)),
            0x0052 => self.trip_id = Some(take_u32(buffer)?),
            0x0100 => self.trip_mileage_km = Some(f32::from(take_u16(buffer)?) / 10.0),
            0x0101 => self.mileage_since_connect_km = Some(f64::from(take_u32(buffer)?) / 10.0),
            0x0102 => self.trip_fuel_l = Some(f32::from(take_u16(buffer)?) / 10.0),
            0x0103 => self.total_fuel_l = Some(f64::from(take_u32(buffer)?) / 10.0),
            0x0104 => self.average_fuel_l_100km = Some(f32::from(take_u16(buffer)?) / 10.0),
            0x0105 => self.overspeed_duration_s = Some(take_u32(buffer)?),
            0x0106 => self.high_rpm_count = Some(take_u16(buffer)?),
            0x0107 => self.high_rpm_duration_s = Some(take_u32(buffer)?),
            0x0108 => self.excessive_idle_count = Some(take_u16(buffer)?),
            0x0109 => self.idle_duration_s = Some(take_u32(buffer)?),
            0x010a => self.idle_fuel_l = Some(f32::from(take_u16(buffer)?) / 10.0),
            0x010b => self.fatigue_duration_s = Some(take_u32(buffer)?),
            0x010c => self.trip_average_speed_kmh = Some(f32::from(take_u16(buffer)?) / 10.0),
            0x010d => self.trip_max_speed_kmh = Some(f32::from(take_u16(buffer)?) / 10.0),
            0x010e => self.max_engine_speed_rpm = Some(take_u16(buffer)?),
            0x010f => self.max_coolant_temperature_c = Some(take_i16(buffer)?),
            0x0110 => self.max_voltage = Some(f32::from(take_u16(buffer)?) * 0.001),
            0x0111 => self.overspeed_count = Some(take_u16(buffer)?),
            0x0112 => self.sudden_acceleration_count = Some(take_u16(buffer)?),
            0x0113 => self.sudden_deceleration_count = Some(take_u16(buffer)?),
            0x0114 => self.sharp_turn_count = Some(take_u16(buffer)?),
            0x0115 => self.lane_change_count = Some(take_u16(buffer)?),
            0x0116 => self.sudden_brake_count = Some(take_u16(buffer)?),
            _ => self.unknown.push((tag, value.to_vec())),
        }

        Ok(())
    }
}
