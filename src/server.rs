//! TCP gateway
//!
//! One task per terminal connection. Frames from a single connection
//! are handled strictly in arrival order: registration must precede
//! authentication and acks echo the inbound sequence, so there is no
//! concurrent handling within a connection. Across connections nothing
//! is shared but the session registry.
//!
//! Per-frame errors — bad framing, checksum mismatches, malformed
//! bodies, storage failures — are logged and dropped. A misbehaving
//! terminal keeps its socket; only EOF, I/O errors, the idle timeout or
//! shutdown end a connection.

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{
            AtomicUsize,
            Ordering,
        },
    },
    time::Duration,
};

use chrono::Utc;
use futures_util::TryStreamExt;
use tokio::{
    io::{
        AsyncWriteExt,
        BufReader,
    },
    net::{
        TcpListener,
        TcpStream,
        ToSocketAddrs,
        tcp::OwnedReadHalf,
    },
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;

use crate::{
    database::{
        DeviceHandle,
        Storage,
    },
    protocol::{
        ProtocolConfig,
        encode,
        message::{
            Header,
            Message,
        },
        open_frame,
        stream::FrameReader,
    },
    session::Sessions,
    telemetry,
    types::DeviceId,
};

const OUTBOUND_QUEUE_SIZE: usize = 32;

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// Auth code sent in registration responses and expected back in
    /// authentication messages.
    pub auth_code: String,
    pub protocol: ProtocolConfig,
    /// Connections with no complete inbound frame for this long are
    /// closed. `None` disables reaping.
    pub idle_timeout: Option<Duration>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            auth_code: "TR20240902090017".to_owned(),
            protocol: ProtocolConfig::default(),
            idle_timeout: Some(Duration::from_secs(600)),
        }
    }
}

/// The terminal-facing TCP server. Cheap to clone; all clones share the
/// session registry and shutdown token.
#[derive(Clone, Debug)]
pub struct Gateway<S> {
    storage: S,
    sessions: Sessions,
    config: Arc<GatewayConfig>,
    shutdown: CancellationToken,
    next_connection_id: Arc<AtomicUsize>,
}

impl<S: Storage> Gateway<S> {
    pub fn new(
        storage: S,
        sessions: Sessions,
        config: GatewayConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            storage,
            sessions,
            config: Arc::new(config),
            shutdown,
            next_connection_id: Arc::new(AtomicUsize::new(1)),
        }
    }

    pub async fn serve(&self, listen_addresses: impl ToSocketAddrs) -> Result<(), crate::Error> {
        let listener = TcpListener::bind(listen_addresses).await?;
        tracing::info!(address = %listener.local_addr()?, "listening for terminals");

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let gateway = self.clone();
                            tokio::spawn(async move {
                                gateway.handle_connection(stream, peer).await;
                            });
                        }
                        Err(error) => {
                            tracing::warn!(?error, "accept failed");
                        }
                    }
                }
            }
        }

        Ok(())
    }

    async fn handle_connection(self, stream: TcpStream, peer: SocketAddr) {
        let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        tracing::info!(connection_id, %peer, "terminal connected");

        let (read_half, mut write_half) = stream.into_split();
        let (outbound_sender, mut outbound_receiver) = mpsc::channel::<Vec<u8>>(OUTBOUND_QUEUE_SIZE);

        let writer = tokio::spawn(async move {
            while let Some(frame) = outbound_receiver.recv().await {
                tracing::debug!(frame = %hex::encode_upper(&frame), "server frame");
                if let Err(error) = write_half.write_all(&frame).await {
                    tracing::warn!(?error, "write failed");
                    break;
                }
            }
        });

        let connection = Connection {
            storage: self.storage.clone(),
            sessions: self.sessions.clone(),
            config: self.config.clone(),
            connection_id,
            source_ip: peer.ip().to_string(),
            outbound: outbound_sender,
        };

        let mut frames = FrameReader::new(BufReader::new(read_half));
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                next = next_frame(&mut frames, self.config.idle_timeout) => {
                    match next {
                        FrameEvent::Frame(raw) => connection.handle_frame(&raw).await,
                        FrameEvent::Eof => {
                            tracing::info!(connection_id, "terminal disconnected");
                            break;
                        }
                        FrameEvent::Error(error) => {
                            tracing::warn!(connection_id, ?error, "read failed");
                            break;
                        }
                        FrameEvent::IdleTimeout => {
                            tracing::info!(connection_id, "closing idle connection");
                            break;
                        }
                    }
                }
            }
        }

        // in-flight storage writes complete on their own; the session
        // entries die with the connection
        self.sessions.remove_connection(connection_id);
        drop(connection);
        let _ = writer.await;
    }
}

enum FrameEvent {
    Frame(Vec<u8>),
    Eof,
    Error(std::io::Error),
    IdleTimeout,
}

async fn next_frame(
    frames: &mut FrameReader<BufReader<OwnedReadHalf>>,
    idle_timeout: Option<Duration>,
) -> FrameEvent {
    let next = async {
        match frames.try_next().await {
            Ok(Some(frame)) => FrameEvent::Frame(frame),
            Ok(None) => FrameEvent::Eof,
            Err(error) => FrameEvent::Error(error),
        }
    };

    if let Some(idle) = idle_timeout {
        match tokio::time::timeout(idle, next).await {
            Ok(event) => event,
            Err(_) => FrameEvent::IdleTimeout,
        }
    }
    else {
        next.await
    }
}

/// Per-connection message handling.
struct Connection<S> {
    storage: S,
    sessions: Sessions,
    config: Arc<GatewayConfig>,
    connection_id: usize,
    source_ip: String,
    outbound: mpsc::Sender<Vec<u8>>,
}

impl<S: Storage> Connection<S> {
    async fn handle_frame(&self, raw: &[u8]) {
        tracing::debug!(frame = %hex::encode_upper(raw), "client frame");

        let packet = match open_frame(raw, self.config.protocol.checksum_mode) {
            Ok(packet) => packet,
            Err(error) => {
                tracing::warn!(connection_id = self.connection_id, ?error, "dropping frame");
                return;
            }
        };

        let mut buffer = packet.as_slice();
        let header = match Header::decode(&mut buffer) {
            Ok(header) => header,
            Err(error) => {
                tracing::warn!(connection_id = self.connection_id, ?error, "dropping frame");
                return;
            }
        };

        // every frame is archived and binds the device to this
        // connection, before (and regardless of) body handling
        let device = self.resolve_device(header.device_id, raw).await;
        self.sessions
            .bind(header.device_id, self.connection_id, self.outbound.clone());

        let declared = header.body_properties.body_length();
        if declared != buffer.len() {
            tracing::warn!(
                connection_id = self.connection_id,
                declared,
                actual = buffer.len(),
                "dropping frame with inconsistent body length"
            );
            return;
        }

        let message = match Message::decode(&header, buffer, &self.config.protocol) {
            Ok(message) => message,
            Err(error) => {
                tracing::warn!(
                    connection_id = self.connection_id,
                    message_id = %header.message_id,
                    ?error,
                    "dropping undecodable message"
                );
                return;
            }
        };

        self.handle_message(device, &header, &message).await;
    }

    /// Resolves (auto-creating) the device row and archives the raw
    /// frame. Storage failures are logged, never fatal to the frame.
    async fn resolve_device(&self, device_id: DeviceId, raw: &[u8]) -> Option<DeviceHandle> {
        let device = match self.storage.find_or_create_device(device_id).await {
            Ok(device) => device,
            Err(error) => {
                tracing::error!(%device_id, %error, "failed to resolve device");
                return None;
            }
        };

        if let Err(error) = self
            .storage
            .append_raw_frame(device, &hex::encode_upper(raw), &self.source_ip)
            .await
        {
            tracing::error!(%device_id, %error, "failed to archive raw frame");
        }

        Some(device)
    }

    async fn handle_message(&self, device: Option<DeviceHandle>, header: &Header, message: &Message) {
        let device_id = header.device_id;

        match message {
            Message::Registration(registration) => {
                if let Err(error) = self.storage.register_device(device_id, registration).await {
                    tracing::error!(%device_id, %error, "failed to store registration");
                }
                self.sessions.mark_registered(device_id);

                self.send(encode::registration_response(
                    device_id,
                    header.sequence,
                    encode::RESULT_SUCCESS,
                    &self.config.auth_code,
                ))
                .await;
            }

            Message::Authentication { code } => {
                if !self.sessions.is_registered(device_id) {
                    tracing::warn!(%device_id, "authentication before registration");
                    self.send_general_response(header, encode::RESULT_FAILURE)
                        .await;
                    return;
                }

                if *code == self.config.auth_code {
                    self.sessions.mark_authenticated(device_id);
                    self.send_general_response(header, encode::RESULT_SUCCESS)
                        .await;
                }
                else {
                    tracing::warn!(%device_id, "authentication code mismatch");
                    self.send_general_response(header, encode::RESULT_FAILURE)
                        .await;
                }
            }

            Message::LocationReport(report) => {
                let (update, position) = telemetry::normalize(report);

                if let Some(device) = device {
                    if let Err(error) = self.storage.update_device(device, &update).await {
                        tracing::error!(%device_id, %error, "failed to update device");
                    }
                    if let Err(error) = self.storage.create_position(device, &position).await {
                        tracing::error!(%device_id, %error, "failed to append position");
                    }
                }

                self.send_general_response(header, encode::RESULT_SUCCESS)
                    .await;
            }

            Message::TimeSyncRequest => {
                self.send(encode::time_sync_response(device_id, Utc::now()))
                    .await;
            }

            Message::Heartbeat | Message::GeneralResponse(_) => {
                self.send_general_response(header, self.gated_result(device_id))
                    .await;
            }

            Message::AttributeReport(report) => {
                if !report.iccid.is_empty() {
                    if let Some(device) = device {
                        if let Err(error) =
                            self.storage.update_device_iccid(device, &report.iccid).await
                        {
                            tracing::error!(%device_id, %error, "failed to update iccid");
                        }
                    }
                }

                self.send_general_response(header, self.gated_result(device_id))
                    .await;
            }

            Message::Logout => {
                tracing::info!(%device_id, "terminal logged out");
                self.sessions.clear(device_id);
                self.send_general_response(header, encode::RESULT_SUCCESS)
                    .await;
            }

            Message::SetParametersReply(reply) => {
                tracing::debug!(
                    %device_id,
                    parameters = reply.parameters.len(),
                    "parameter reply"
                );
                self.send_general_response(header, encode::RESULT_SUCCESS)
                    .await;
            }

            Message::Transparent(_) => {
                self.send_general_response(header, encode::RESULT_SUCCESS)
                    .await;
            }

            Message::Unsupported { body } => {
                tracing::debug!(
                    message_id = %header.message_id,
                    body = %hex::encode_upper(body),
                    "unsupported message"
                );
                self.send_general_response(header, encode::RESULT_SUCCESS)
                    .await;
            }
        }
    }

    /// Heartbeats and attribute reports answer failure until the
    /// device has completed both registration and authentication.
    fn gated_result(&self, device_id: DeviceId) -> u8 {
        if self.sessions.is_registered(device_id) && self.sessions.is_authenticated(device_id) {
            encode::RESULT_SUCCESS
        }
        else {
            encode::RESULT_FAILURE
        }
    }

    async fn send_general_response(&self, header: &Header, result: u8) {
        self.send(encode::general_response(
            header.device_id,
            header.sequence,
            header.message_id,
            result,
        ))
        .await;
    }

    async fn send(&self, frame: Vec<u8>) {
        if self.outbound.send(frame).await.is_err() {
            tracing::warn!(
                connection_id = self.connection_id,
                "outbound queue closed, dropping reply"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        convert::Infallible,
        sync::Mutex,
    };

    use bytes::BufMut;

    use crate::{
        protocol::{
            ProtocolConfig,
            message::Frame,
            seal_frame,
        },
        types::MessageId,
    };

    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq)]
    enum StorageEvent {
        FindOrCreate(DeviceId),
        Register(DeviceId),
        UpdateDevice,
        UpdateIccid(String),
        CreatePosition,
        AppendRawFrame,
    }

    #[derive(Clone, Debug, Default)]
    struct RecordingStorage {
        events: Arc<Mutex<Vec<StorageEvent>>>,
    }

    impl RecordingStorage {
        fn events(&self) -> Vec<StorageEvent> {
            self.events.lock().unwrap().clone()
        }

        fn record(&self, event: StorageEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl Storage for RecordingStorage {
        type Error = Infallible;

        async fn find_or_create_device(
            &self,
            device_id: DeviceId,
        ) -> Result<DeviceHandle, Infallible> {
            self.record(StorageEvent::FindOrCreate(device_id));
            Ok(DeviceHandle(1))
        }

        async fn register_device(
            &self,
            device_id: DeviceId,
            _registration: &crate::protocol::message::Registration,
        ) -> Result<DeviceHandle, Infallible> {
            self.record(StorageEvent::Register(device_id));
            Ok(DeviceHandle(1))
        }

        async fn update_device(
            &self,
            _device: DeviceHandle,
            _update: &crate::telemetry::DeviceUpdate,
        ) -> Result<(), Infallible> {
            self.record(StorageEvent::UpdateDevice);
            Ok(())
        }

        async fn update_device_iccid(
            &self,
            _device: DeviceHandle,
            iccid: &str,
        ) -> Result<(), Infallible> {
            self.record(StorageEvent::UpdateIccid(iccid.to_owned()));
            Ok(())
        }

        async fn create_position(
            &self,
            _device: DeviceHandle,
            _position: &crate::telemetry::PositionRecord,
        ) -> Result<(), Infallible> {
            self.record(StorageEvent::CreatePosition);
            Ok(())
        }

        async fn append_raw_frame(
            &self,
            _device: DeviceHandle,
            _frame_hex: &str,
            _source_ip: &str,
        ) -> Result<(), Infallible> {
            self.record(StorageEvent::AppendRawFrame);
            Ok(())
        }
    }

    struct Fixture {
        connection: Connection<RecordingStorage>,
        storage: RecordingStorage,
        sessions: Sessions,
        outbound: mpsc::Receiver<Vec<u8>>,
    }

    fn fixture() -> Fixture {
        let storage = RecordingStorage::default();
        let sessions = Sessions::new();
        let (outbound_sender, outbound) = mpsc::channel(8);

        let connection = Connection {
            storage: storage.clone(),
            sessions: sessions.clone(),
            config: Arc::new(GatewayConfig::default()),
            connection_id: 1,
            source_ip: "198.51.100.7".to_owned(),
            outbound: outbound_sender,
        };

        Fixture {
            connection,
            storage,
            sessions,
            outbound,
        }
    }

    fn device() -> DeviceId {
        "013800001234".parse().unwrap()
    }

    fn raw_frame(message_id: u16, sequence: u16, body: &[u8]) -> Vec<u8> {
        let mut packet = Vec::new();
        packet.put_u16(message_id);
        packet.put_u16(body.len() as u16);
        packet.put_slice(&device().as_bytes());
        packet.put_u16(sequence);
        packet.put_slice(body);
        seal_frame(&packet)
    }

    fn registration_body() -> Vec<u8> {
        let mut body = Vec::new();
        body.put_u16(11);
        body.put_u16(100);
        body.put_slice(b"ABCDE");
        body.put_slice(b"TK905\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0");
        body.put_slice(b"0001234");
        body.put_u8(2);
        body.put_slice(b"TESTPLATE");
        body
    }

    fn location_body() -> Vec<u8> {
        let mut body = Vec::new();
        body.put_u32(0);
        body.put_u32(0x0000_0003);
        body.put_u32(39908692);
        body.put_u32(116397477);
        body.put_u16(52);
        body.put_u16(355);
        body.put_u16(90);
        body.put_slice(&[0x24, 0x01, 0x15, 0x08, 0x30, 0x00]);
        body
    }

    fn decode_reply(raw: &[u8]) -> Frame {
        Frame::decode(raw, &ProtocolConfig::default()).unwrap()
    }

    fn general_result(raw: &[u8]) -> (u16, MessageId, u8) {
        let frame = decode_reply(raw);
        assert_eq!(frame.header.message_id, MessageId::GENERAL_RESPONSE);
        let Message::Unsupported { body } = frame.message
        else {
            panic!("platform messages decode as raw bodies");
        };
        (
            u16::from_be_bytes([body[0], body[1]]),
            MessageId(u16::from_be_bytes([body[2], body[3]])),
            body[4],
        )
    }

    #[tokio::test]
    async fn authentication_before_registration_is_rejected() {
        let mut fixture = fixture();

        fixture
            .connection
            .handle_frame(&raw_frame(0x0102, 5, b"TR20240902090017"))
            .await;

        let reply = fixture.outbound.try_recv().unwrap();
        let (serial, response_id, result) = general_result(&reply);
        assert_eq!(serial, 5);
        assert_eq!(response_id, MessageId::AUTHENTICATION);
        assert_eq!(result, encode::RESULT_FAILURE);
        assert!(!fixture.sessions.is_authenticated(device()));
    }

    #[tokio::test]
    async fn registration_then_authentication_succeeds() {
        let mut fixture = fixture();

        fixture
            .connection
            .handle_frame(&raw_frame(0x0100, 1, &registration_body()))
            .await;

        let reply = fixture.outbound.try_recv().unwrap();
        let frame = decode_reply(&reply);
        assert_eq!(frame.header.message_id, MessageId::REGISTRATION_RESPONSE);
        let Message::Unsupported { body } = frame.message
        else {
            panic!("expected raw body");
        };
        assert_eq!(body[..3], [0x00, 0x01, encode::RESULT_SUCCESS]);
        assert_eq!(&body[3..], b"TR20240902090017");
        assert!(fixture.sessions.is_registered(device()));

        fixture
            .connection
            .handle_frame(&raw_frame(0x0102, 2, b"TR20240902090017"))
            .await;

        let reply = fixture.outbound.try_recv().unwrap();
        assert_eq!(general_result(&reply).2, encode::RESULT_SUCCESS);
        assert!(fixture.sessions.is_authenticated(device()));

        assert!(
            fixture
                .storage
                .events()
                .contains(&StorageEvent::Register(device()))
        );
    }

    #[tokio::test]
    async fn wrong_auth_code_is_rejected() {
        let mut fixture = fixture();

        fixture
            .connection
            .handle_frame(&raw_frame(0x0100, 1, &registration_body()))
            .await;
        let _ = fixture.outbound.try_recv().unwrap();

        fixture
            .connection
            .handle_frame(&raw_frame(0x0102, 2, b"WRONGCODE"))
            .await;

        let reply = fixture.outbound.try_recv().unwrap();
        assert_eq!(general_result(&reply).2, encode::RESULT_FAILURE);
        assert!(!fixture.sessions.is_authenticated(device()));
    }

    #[tokio::test]
    async fn heartbeat_result_is_gated_on_full_authentication() {
        let mut fixture = fixture();

        fixture.connection.handle_frame(&raw_frame(0x0002, 1, &[])).await;
        let reply = fixture.outbound.try_recv().unwrap();
        assert_eq!(general_result(&reply).2, encode::RESULT_FAILURE);

        fixture
            .connection
            .handle_frame(&raw_frame(0x0100, 2, &registration_body()))
            .await;
        let _ = fixture.outbound.try_recv().unwrap();
        fixture
            .connection
            .handle_frame(&raw_frame(0x0102, 3, b"TR20240902090017"))
            .await;
        let _ = fixture.outbound.try_recv().unwrap();

        fixture.connection.handle_frame(&raw_frame(0x0002, 4, &[])).await;
        let reply = fixture.outbound.try_recv().unwrap();
        assert_eq!(general_result(&reply).2, encode::RESULT_SUCCESS);
    }

    #[tokio::test]
    async fn location_reports_are_persisted_and_acked() {
        let mut fixture = fixture();

        fixture
            .connection
            .handle_frame(&raw_frame(0x0200, 9, &location_body()))
            .await;

        let reply = fixture.outbound.try_recv().unwrap();
        let (serial, response_id, result) = general_result(&reply);
        assert_eq!(serial, 9);
        assert_eq!(response_id, MessageId::LOCATION_REPORT);
        assert_eq!(result, encode::RESULT_SUCCESS);

        let events = fixture.storage.events();
        assert_eq!(
            events,
            vec![
                StorageEvent::FindOrCreate(device()),
                StorageEvent::AppendRawFrame,
                StorageEvent::UpdateDevice,
                StorageEvent::CreatePosition,
            ]
        );
    }

    #[tokio::test]
    async fn every_frame_is_archived_before_dispatch() {
        let mut fixture = fixture();

        fixture.connection.handle_frame(&raw_frame(0x0002, 1, &[])).await;
        let _ = fixture.outbound.try_recv().unwrap();

        let events = fixture.storage.events();
        assert_eq!(events[0], StorageEvent::FindOrCreate(device()));
        assert_eq!(events[1], StorageEvent::AppendRawFrame);
    }

    #[tokio::test]
    async fn undecodable_frames_are_dropped_without_reply() {
        let mut fixture = fixture();

        // truncated location body: fixed block cut short
        fixture
            .connection
            .handle_frame(&raw_frame(0x0200, 1, &location_body()[..10]))
            .await;

        assert!(fixture.outbound.try_recv().is_err());
        // the raw frame was still archived
        assert!(
            fixture
                .storage
                .events()
                .contains(&StorageEvent::AppendRawFrame)
        );
    }

    #[tokio::test]
    async fn logout_clears_the_session() {
        let mut fixture = fixture();

        fixture
            .connection
            .handle_frame(&raw_frame(0x0100, 1, &registration_body()))
            .await;
        let _ = fixture.outbound.try_recv().unwrap();
        assert!(!fixture.sessions.is_empty());

        fixture.connection.handle_frame(&raw_frame(0x0003, 2, &[])).await;
        let reply = fixture.outbound.try_recv().unwrap();
        assert_eq!(general_result(&reply).2, encode::RESULT_SUCCESS);
        assert!(fixture.sessions.is_empty());
    }

    #[tokio::test]
    async fn attribute_reports_update_the_iccid() {
        let mut fixture = fixture();

        let mut body = Vec::new();
        body.put_u16(0x0001);
        body.put_slice(b"ABCDE");
        body.put_slice(b"TK905\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0");
        body.put_slice(b"0001234");
        body.put_slice(&[0x89, 0x86, 0x02, 0x42, 0x10, 0x91, 0x23, 0x45, 0x67, 0x89]);
        body.put_u8(2);
        body.put_slice(b"v1");
        body.put_u8(3);
        body.put_slice(b"2.1");
        body.put_u8(0b0011);
        body.put_u8(0b0001);

        fixture.connection.handle_frame(&raw_frame(0x0107, 1, &body)).await;

        let reply = fixture.outbound.try_recv().unwrap();
        // not authenticated yet, so the ack result is forced negative
        assert_eq!(general_result(&reply).2, encode::RESULT_FAILURE);
        assert!(
            fixture
                .storage
                .events()
                .contains(&StorageEvent::UpdateIccid(
                    "89860242109123456789".to_owned()
                ))
        );
    }

    #[tokio::test]
    async fn unknown_messages_get_a_positive_ack() {
        let mut fixture = fixture();

        fixture
            .connection
            .handle_frame(&raw_frame(0x0777, 4, &[0x01, 0x02]))
            .await;

        let reply = fixture.outbound.try_recv().unwrap();
        let (serial, response_id, result) = general_result(&reply);
        assert_eq!(serial, 4);
        assert_eq!(response_id, MessageId(0x0777));
        assert_eq!(result, encode::RESULT_SUCCESS);
    }

    #[tokio::test]
    async fn time_sync_requests_get_a_time_sync_response() {
        let mut fixture = fixture();

        fixture.connection.handle_frame(&raw_frame(0x0f01, 1, &[])).await;

        let reply = fixture.outbound.try_recv().unwrap();
        let frame = decode_reply(&reply);
        assert_eq!(frame.header.message_id, MessageId::TIME_SYNC_RESPONSE);
        let Message::Unsupported { body } = frame.message
        else {
            panic!("expected raw body");
        };
        assert_eq!(body.len(), 7);
        assert_eq!(body[0], 0x01);
    }
}
