//! Operator control plane
//!
//! Small HTTP API for pushing commands to connected terminals: change
//! the reporting interval or server endpoint (0x8103), terminal/vehicle
//! control, position queries, forced logout. Commands are built with
//! the protocol encoders and queued on the device's live connection;
//! a device without one is a 404.

use axum::{
    Json,
    Router,
    extract::{
        Path,
        State,
    },
    http::StatusCode,
    response::{
        IntoResponse,
        Response,
    },
    routing,
};
use serde::{
    Deserialize,
    Serialize,
};
use tokio::net::{
    TcpListener,
    ToSocketAddrs,
};
use tokio_util::sync::CancellationToken;

use crate::{
    protocol::encode::{
        self,
        ParameterBlock,
    },
    session::{
        CommandError,
        Sessions,
    },
    types::DeviceId,
};

#[derive(Clone, Debug)]
pub struct Api {
    sessions: Sessions,
    shutdown: CancellationToken,
}

impl Api {
    pub fn new(sessions: Sessions, shutdown: CancellationToken) -> Self {
        Self { sessions, shutdown }
    }

    pub fn router(&self) -> Router<()> {
        Router::new()
            .nest(
                "/v1/devices/{device_id}",
                Router::new()
                    .route("/parameters", routing::post(post_parameters))
                    .route("/parameters-request", routing::post(post_parameters_request))
                    .route("/attributes-request", routing::post(post_attributes_request))
                    .route("/control", routing::post(post_control))
                    .route("/vehicle-control", routing::post(post_vehicle_control))
                    .route("/position-request", routing::post(post_position_request))
                    .route("/logout", routing::post(post_logout)),
            )
            .fallback(routing::get(not_found))
            .with_state(self.clone())
    }

    pub async fn serve(&self, listen_addresses: impl ToSocketAddrs) -> Result<(), crate::Error> {
        let tcp_listener = TcpListener::bind(listen_addresses).await?;
        tracing::info!(address = %tcp_listener.local_addr()?, "control api listening");
        let shutdown = self.shutdown.clone();

        axum::serve(tcp_listener, self.router().into_make_service())
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
            })
            .await?;

        Ok(())
    }
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "not found")
}

/// Queued command acknowledgement: which frame went out under which
/// per-device sequence.
#[derive(Debug, Serialize)]
pub struct CommandQueued {
    pub device_id: DeviceId,
    pub sequence: u16,
}

#[derive(Debug, Deserialize)]
pub struct ParametersRequest {
    /// Heartbeat/reporting interval in seconds (parameter 0x0001).
    pub heartbeat_interval: Option<u32>,
    /// New server domain or IP (parameter 0x0013).
    pub server_host: Option<String>,
    /// New server TCP port (parameter 0x0018).
    pub server_port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct ControlRequest {
    /// Terminal control command byte, e.g. 0x64 to lock the vehicle.
    pub command: u8,
}

#[derive(Debug, Deserialize)]
pub struct VehicleControlRequest {
    /// Vehicle control word, e.g. 0x1000 for power off.
    pub command: u16,
}

async fn post_parameters(
    State(api): State<Api>,
    Path(device_id): Path<String>,
    Json(request): Json<ParametersRequest>,
) -> Result<Json<CommandQueued>, ApiError> {
    let device_id = parse_device_id(&device_id)?;

    let mut block = ParameterBlock::new();
    if let Some(interval) = request.heartbeat_interval {
        block = block.dword(ParameterBlock::HEARTBEAT_INTERVAL, interval);
    }
    if let Some(host) = &request.server_host {
        if host.is_empty() || host.len() > u8::MAX as usize {
            return Err(ApiError::InvalidServerHost);
        }
        block = block.string(ParameterBlock::SERVER_DOMAIN, host);
    }
    if let Some(port) = request.server_port {
        block = block.dword(ParameterBlock::SERVER_TCP_PORT, u32::from(port));
    }

    if block.is_empty() {
        return Err(ApiError::EmptyCommand);
    }

    let sequence = api.sessions.push_command(device_id, |sequence| {
        encode::set_parameters(device_id, sequence, &block)
    })?;

    Ok(Json(CommandQueued {
        device_id,
        sequence,
    }))
}

async fn post_parameters_request(
    State(api): State<Api>,
    Path(device_id): Path<String>,
) -> Result<Json<CommandQueued>, ApiError> {
    push_simple(&api, &device_id, encode::request_parameters)
}

async fn post_attributes_request(
    State(api): State<Api>,
    Path(device_id): Path<String>,
) -> Result<Json<CommandQueued>, ApiError> {
    push_simple(&api, &device_id, encode::request_attributes)
}

async fn post_control(
    State(api): State<Api>,
    Path(device_id): Path<String>,
    Json(request): Json<ControlRequest>,
) -> Result<Json<CommandQueued>, ApiError> {
    push_simple(&api, &device_id, |device_id, sequence| {
        encode::terminal_control(device_id, sequence, request.command)
    })
}

async fn post_vehicle_control(
    State(api): State<Api>,
    Path(device_id): Path<String>,
    Json(request): Json<VehicleControlRequest>,
) -> Result<Json<CommandQueued>, ApiError> {
    push_simple(&api, &device_id, |device_id, sequence| {
        encode::vehicle_control(device_id, sequence, request.command)
    })
}

async fn post_position_request(
    State(api): State<Api>,
    Path(device_id): Path<String>,
) -> Result<Json<CommandQueued>, ApiError> {
    push_simple(&api, &device_id, encode::position_request)
}

async fn post_logout(
    State(api): State<Api>,
    Path(device_id): Path<String>,
) -> Result<Json<CommandQueued>, ApiError> {
    push_simple(&api, &device_id, encode::logout_request)
}

fn push_simple(
    api: &Api,
    device_id: &str,
    build: impl Fn(DeviceId, u16) -> Vec<u8>,
) -> Result<Json<CommandQueued>, ApiError> {
    let device_id = parse_device_id(device_id)?;
    let sequence = api
        .sessions
        .push_command(device_id, |sequence| build(device_id, sequence))?;

    Ok(Json(CommandQueued {
        device_id,
        sequence,
    }))
}

fn parse_device_id(input: &str) -> Result<DeviceId, ApiError> {
    input.parse().map_err(|_| ApiError::InvalidDeviceId)
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    error: ErrorResponseInner,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponseInner {
    message: String,
    error: ApiError,
}

impl From<ApiError> for ErrorResponse {
    fn from(value: ApiError) -> Self {
        Self {
            error: ErrorResponseInner {
                message: value.to_string(),
                error: value,
            },
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.error.error.status_code(), Json(self)).into_response()
    }
}

#[derive(Debug, thiserror::Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiError {
    #[error("device id must be 12 hex digits")]
    InvalidDeviceId,
    #[error("no parameter fields provided")]
    EmptyCommand,
    #[error("server host must be 1-255 bytes")]
    InvalidServerHost,
    #[error("device has no live connection")]
    DeviceNotConnected,
    #[error("internal server error")]
    InternalServerError,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidDeviceId | Self::EmptyCommand | Self::InvalidServerHost => {
                StatusCode::BAD_REQUEST
            }
            Self::DeviceNotConnected => StatusCode::NOT_FOUND,
            Self::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CommandError> for ApiError {
    fn from(value: CommandError) -> Self {
        match value {
            CommandError::NotConnected { .. } => Self::DeviceNotConnected,
            CommandError::QueueUnavailable { .. } => Self::InternalServerError,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        ErrorResponse::from(self).into_response()
    }
}
