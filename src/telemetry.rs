//! Location report normalization
//!
//! Different firmware populates different subsets of the extension
//! records, and several physical quantities have more than one wire
//! encoding: total mileage can arrive as extension tag 0x8C, inside the
//! OBD sub-record, or as the legacy tag 0x01; engine figures and the
//! VIN exist both as top-level extensions and OBD fields. [`normalize`]
//! folds one decoded report into a device update and a position record,
//! preferring the dedicated extension field, then the OBD sub-record
//! field. Values absent from the report stay `None` so the storage
//! layer can fall back to what it already has.

use chrono::{
    DateTime,
    Utc,
};

use crate::protocol::location::{
    LocationReport,
    StatusFlags,
};

/// Fields to fold into the device row after a location report.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceUpdate {
    pub vin: Option<String>,
    pub iccid: Option<String>,
    /// Preferred odometer reading (dedicated extension, then OBD).
    pub odometer_km: Option<f64>,
    /// Legacy mileage record, used only when the preferred reading and
    /// the stored value are both absent.
    pub odometer_fallback_km: Option<f64>,
    pub latitude: f64,
    pub longitude: f64,
    pub direction: u16,
    pub speed_kmh: Option<f32>,
    pub acc_on: bool,
    pub signal_strength: Option<u8>,
    pub fuel_level_l: Option<f32>,
    pub last_position: DateTime<Utc>,
}

/// One appended position row.
#[derive(Clone, Debug, PartialEq)]
pub struct PositionRecord {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: u16,
    pub direction: u16,
    pub device_time: DateTime<Utc>,
    pub speed_kmh: Option<f32>,
    pub battery_voltage: Option<f32>,
    pub signal_strength: Option<u8>,
    pub fuel_level_l: Option<f32>,
    pub engine_load_percent: Option<u8>,
    pub engine_speed_rpm: Option<u16>,
    pub coolant_temperature_c: Option<i16>,
    pub odometer_km: Option<f64>,
    pub odometer_fallback_km: Option<f64>,
    pub fuel_percent: Option<u8>,
    pub rapid_accelerations: Option<u8>,
    pub rapid_decelerations: Option<u8>,
    pub sharp_turns: Option<u8>,
    pub average_speed_kmh: Option<u16>,
    pub max_speed_kmh: Option<u16>,
    /// JSON array of fault code strings.
    pub fault_codes: Option<String>,
    /// JSON array of raw temperature channel readings.
    pub temperatures: Option<String>,
    pub door_open: bool,
    pub idling: bool,
    pub collision: bool,
    pub acc_on: bool,
    pub circuit_disconnected: bool,
}

pub fn normalize(report: &LocationReport) -> (DeviceUpdate, PositionRecord) {
    let extended = &report.extended;
    let obd = extended.obd.as_ref();

    let vin = extended
        .vin
        .clone()
        .or_else(|| obd.and_then(|obd| obd.vin.clone()));
    let odometer_km = extended
        .total_mileage_km
        .or_else(|| obd.and_then(|obd| obd.total_mileage_km));
    let odometer_fallback_km = extended.mileage_km;
    let battery_voltage = extended
        .battery_voltage
        .or_else(|| obd.and_then(|obd| obd.battery_voltage));
    let engine_load_percent = extended
        .engine_load_percent
        .or_else(|| obd.and_then(|obd| obd.engine_load_percent));
    let engine_speed_rpm = extended
        .engine_speed_rpm
        .or_else(|| obd.and_then(|obd| obd.engine_speed_rpm));
    let coolant_temperature_c = extended
        .coolant_temperature_c
        .or_else(|| obd.and_then(|obd| obd.coolant_temperature_c));

    let acc_on = report.status.contains(StatusFlags::ACC_ON);

    let device = DeviceUpdate {
        vin,
        iccid: extended.iccid.clone(),
        odometer_km,
        odometer_fallback_km,
        latitude: report.latitude,
        longitude: report.longitude,
        direction: report.direction,
        speed_kmh: extended.recorder_speed_kmh,
        acc_on,
        signal_strength: extended.signal_strength,
        fuel_level_l: extended.fuel_level_l,
        last_position: report.timestamp,
    };

    let position = PositionRecord {
        latitude: report.latitude,
        longitude: report.longitude,
        altitude: report.altitude,
        direction: report.direction,
        device_time: report.timestamp,
        speed_kmh: extended.recorder_speed_kmh,
        battery_voltage,
        signal_strength: extended.signal_strength,
        fuel_level_l: extended.fuel_level_l,
        engine_load_percent,
        engine_speed_rpm,
        coolant_temperature_c,
        odometer_km: device.odometer_km,
        odometer_fallback_km: device.odometer_fallback_km,
        fuel_percent: extended.fuel_percent,
        rapid_accelerations: extended.rapid_accelerations,
        rapid_decelerations: extended.rapid_decelerations,
        sharp_turns: extended.sharp_turns,
        average_speed_kmh: extended.average_speed_kmh,
        max_speed_kmh: extended.max_speed_kmh,
        fault_codes: extended
            .fault_codes
            .as_ref()
            .and_then(|codes| serde_json::to_string(codes).ok()),
        temperatures: extended
            .temperatures
            .as_ref()
            .and_then(|channels| serde_json::to_string(channels).ok()),
        door_open: report.status.contains(StatusFlags::DOOR_1_OPEN),
        idling: report.alarm.idling,
        collision: report.alarm.collision,
        acc_on,
        circuit_disconnected: report.status.contains(StatusFlags::CIRCUIT_DISCONNECTED),
    };

    (device, position)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use chrono::{
        TimeZone,
        Utc,
    };

    use crate::protocol::{
        AlarmDialect,
        location::{
            AlarmState,
            ExtendedData,
            ObdData,
        },
    };

    use super::*;

    fn report(extended: ExtendedData) -> LocationReport {
        LocationReport {
            response_serial: None,
            alarm_word: 0,
            alarm: AlarmState::from_word(0, AlarmDialect::Standard2013),
            status: StatusFlags::ACC_ON | StatusFlags::POSITIONED,
            latitude: 39.908692,
            longitude: 116.397477,
            altitude: 52,
            speed_kmh: 35.5,
            direction: 90,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 15, 0, 30, 0).unwrap(),
            extended,
        }
    }

    #[test]
    fn dedicated_fields_win_over_obd_fields() {
        let extended = ExtendedData {
            total_mileage_km: Some(1000.0),
            engine_speed_rpm: Some(2000),
            vin: Some("TOPLEVEL".into()),
            obd: Some(ObdData {
                total_mileage_km: Some(2000.0),
                engine_speed_rpm: Some(3000),
                vin: Some("NESTED".into()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let (device, position) = normalize(&report(extended));
        assert_relative_eq!(device.odometer_km.unwrap(), 1000.0);
        assert_eq!(position.engine_speed_rpm, Some(2000));
        assert_eq!(device.vin.as_deref(), Some("TOPLEVEL"));
    }

    #[test]
    fn obd_fields_fill_in_missing_dedicated_fields() {
        let extended = ExtendedData {
            obd: Some(ObdData {
                total_mileage_km: Some(2000.0),
                battery_voltage: Some(12.6),
                coolant_temperature_c: Some(88),
                vin: Some("NESTED".into()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let (device, position) = normalize(&report(extended));
        assert_relative_eq!(device.odometer_km.unwrap(), 2000.0);
        assert_relative_eq!(position.battery_voltage.unwrap(), 12.6);
        assert_eq!(position.coolant_temperature_c, Some(88));
        assert_eq!(device.vin.as_deref(), Some("NESTED"));
    }

    #[test]
    fn legacy_mileage_only_reaches_the_fallback_slot() {
        let extended = ExtendedData {
            mileage_km: Some(500.0),
            ..Default::default()
        };

        let (device, _) = normalize(&report(extended));
        assert!(device.odometer_km.is_none());
        assert_relative_eq!(device.odometer_fallback_km.unwrap(), 500.0);
    }

    #[test]
    fn status_bits_map_onto_the_position_row() {
        let (device, position) = normalize(&report(ExtendedData::default()));
        assert!(device.acc_on);
        assert!(position.acc_on);
        assert!(!position.door_open);
        assert!(!position.circuit_disconnected);
    }

    #[test]
    fn fault_codes_serialize_as_json() {
        let extended = ExtendedData {
            fault_codes: Some(vec!["P0301".into(), "P0420".into()]),
            ..Default::default()
        };

        let (_, position) = normalize(&report(extended));
        assert_eq!(position.fault_codes.as_deref(), Some(r#"["P0301","P0420"]"#));
    }
}
