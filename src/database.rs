//! Storage collaborator
//!
//! The connection handlers talk to storage through the [`Storage`]
//! trait: resolve a device row, fold in telemetry, append positions and
//! raw frames. [`Database`] is the Postgres implementation. Fallback to
//! already-stored values (VIN, ICCID, odometer) is expressed as SQL
//! `coalesce` so the read-modify-write stays a single statement.

use sqlx::postgres::{
    PgPool,
    PgPoolOptions,
};

use crate::{
    protocol::message::Registration,
    telemetry::{
        DeviceUpdate,
        PositionRecord,
    },
    types::DeviceId,
};

#[derive(Debug, thiserror::Error)]
#[error("database error")]
pub enum Error {
    Sqlx(#[from] sqlx::Error),
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Opaque reference to a device row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub i64);

/// The storage operations the protocol core needs.
pub trait Storage: Clone + Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    fn find_or_create_device(
        &self,
        device_id: DeviceId,
    ) -> impl Future<Output = Result<DeviceHandle, Self::Error>> + Send;

    fn register_device(
        &self,
        device_id: DeviceId,
        registration: &Registration,
    ) -> impl Future<Output = Result<DeviceHandle, Self::Error>> + Send;

    fn update_device(
        &self,
        device: DeviceHandle,
        update: &DeviceUpdate,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn update_device_iccid(
        &self,
        device: DeviceHandle,
        iccid: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn create_position(
        &self,
        device: DeviceHandle,
        position: &PositionRecord,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn append_raw_frame(
        &self,
        device: DeviceHandle,
        frame_hex: &str,
        source_ip: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

#[derive(Clone, Debug)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(16)
            .connect(url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }
}

impl Storage for Database {
    type Error = Error;

    async fn find_or_create_device(&self, device_id: DeviceId) -> Result<DeviceHandle, Error> {
        // upsert so concurrent first frames from the same device can't race
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            insert into devices (device_id, device_class)
            values ($1, $2)
            on conflict (device_id) do update set device_id = excluded.device_id
            returning id
            "#,
        )
        .bind(device_id.to_string())
        .bind(device_id.device_class().as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(DeviceHandle(id))
    }

    async fn register_device(
        &self,
        device_id: DeviceId,
        registration: &Registration,
    ) -> Result<DeviceHandle, Error> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            insert into devices (
                device_id,
                device_class,
                province_id,
                city_id,
                manufacturer_id,
                terminal_model,
                terminal_id,
                license_plate_color,
                license_plate
            ) values ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            on conflict (device_id) do update set
                province_id = excluded.province_id,
                city_id = excluded.city_id,
                manufacturer_id = excluded.manufacturer_id,
                terminal_model = excluded.terminal_model,
                terminal_id = excluded.terminal_id,
                license_plate_color = excluded.license_plate_color,
                license_plate = excluded.license_plate
            returning id
            "#,
        )
        .bind(device_id.to_string())
        .bind(device_id.device_class().as_str())
        .bind(i32::from(registration.province_id))
        .bind(i32::from(registration.city_id))
        .bind(&registration.manufacturer_id)
        .bind(&registration.terminal_model)
        .bind(&registration.terminal_id)
        .bind(i16::from(registration.license_plate_color))
        .bind(&registration.license_plate)
        .fetch_one(&self.pool)
        .await?;

        Ok(DeviceHandle(id))
    }

    async fn update_device(&self, device: DeviceHandle, update: &DeviceUpdate) -> Result<(), Error> {
        sqlx::query(
            r#"
            update devices set
                vin = coalesce($2, vin),
                iccid = coalesce($3, iccid),
                odometer_km = coalesce($4, odometer_km, $5),
                latitude = $6,
                longitude = $7,
                direction = $8,
                speed_kmh = coalesce($9, speed_kmh),
                acc_on = $10,
                signal_strength = coalesce($11, signal_strength),
                fuel_level_l = coalesce($12, fuel_level_l),
                last_position = $13,
                last_connect = now(),
                last_acc = case when $10 then now() else last_acc end
            where id = $1
            "#,
        )
        .bind(device.0)
        .bind(&update.vin)
        .bind(&update.iccid)
        .bind(update.odometer_km)
        .bind(update.odometer_fallback_km)
        .bind(update.latitude)
        .bind(update.longitude)
        .bind(i32::from(update.direction))
        .bind(update.speed_kmh)
        .bind(update.acc_on)
        .bind(update.signal_strength.map(i16::from))
        .bind(update.fuel_level_l)
        .bind(update.last_position)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_device_iccid(&self, device: DeviceHandle, iccid: &str) -> Result<(), Error> {
        sqlx::query("update devices set iccid = $2 where id = $1")
            .bind(device.0)
            .bind(iccid)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn create_position(
        &self,
        device: DeviceHandle,
        position: &PositionRecord,
    ) -> Result<(), Error> {
        sqlx::query(
            r#"
            insert into positions (
                device_id,
                latitude,
                longitude,
                altitude,
                direction,
                device_time,
                speed_kmh,
                battery_voltage,
                signal_strength,
                fuel_level_l,
                engine_load_percent,
                engine_speed_rpm,
                coolant_temperature_c,
                odometer_km,
                fuel_percent,
                rapid_accelerations,
                rapid_decelerations,
                sharp_turns,
                average_speed_kmh,
                max_speed_kmh,
                fault_codes,
                temperatures,
                door_open,
                idling,
                collision,
                acc_on,
                circuit_disconnected
            ) values (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                coalesce($14, (select odometer_km from devices where id = $1), $15),
                $16, $17, $18, $19, $20, $21, $22, $23,
                $24, $25, $26, $27, $28
            )
            "#,
        )
        .bind(device.0)
        .bind(position.latitude)
        .bind(position.longitude)
        .bind(i32::from(position.altitude))
        .bind(i32::from(position.direction))
        .bind(position.device_time)
        .bind(position.speed_kmh)
        .bind(position.battery_voltage)
        .bind(position.signal_strength.map(i16::from))
        .bind(position.fuel_level_l)
        .bind(position.engine_load_percent.map(i16::from))
        .bind(position.engine_speed_rpm.map(i32::from))
        .bind(position.coolant_temperature_c)
        .bind(position.odometer_km)
        .bind(position.odometer_fallback_km)
        .bind(position.fuel_percent.map(i16::from))
        .bind(position.rapid_accelerations.map(i16::from))
        .bind(position.rapid_decelerations.map(i16::from))
        .bind(position.sharp_turns.map(i16::from))
        .bind(position.average_speed_kmh.map(i32::from))
        .bind(position.max_speed_kmh.map(i32::from))
        .bind(&position.fault_codes)
        .bind(&position.temperatures)
        .bind(position.door_open)
        .bind(position.idling)
        .bind(position.collision)
        .bind(position.acc_on)
        .bind(position.circuit_disconnected)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn append_raw_frame(
        &self,
        device: DeviceHandle,
        frame_hex: &str,
        source_ip: &str,
    ) -> Result<(), Error> {
        sqlx::query(
            r#"
            insert into raw_frames (device_id, frame, source_ip)
            values ($1, $2, $3)
            "#,
        )
        .bind(device.0)
        .bind(frame_hex)
        .bind(source_ip)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
