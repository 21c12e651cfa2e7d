use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use mmwave_frame::{sync, DecodeError, DecoderConfig, Frame, FrameDecoder};
use mmwave_transport::{ByteSource, TransportError};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigLines, SessionConfig, DEFAULT_POLL_INTERVAL};
use crate::connector::{Connector, SerialConnector};
use crate::error::{Result, SessionError};
use crate::handshake::{send_with_retries, HandshakeReport};
use crate::rate::RateEstimator;
use crate::slot::FrameSlot;

/// Sensor model driven by this session.
pub const MODEL: &str = "IWR6843AOP";

const STOP_COMMAND: &[u8] = b"sensorStop\n";
const STOP_REPLY_BYTES: usize = 100;

/// Lifecycle of a sensor session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    ConfigConnected,
    DataConnected,
    Configured,
    Streaming,
    /// An unrecoverable I/O error occurred; reconnect to continue.
    Faulted,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::ConfigConnected => "config-connected",
            SessionState::DataConnected => "data-connected",
            SessionState::Configured => "configured",
            SessionState::Streaming => "streaming",
            SessionState::Faulted => "faulted",
        };
        f.write_str(name)
    }
}

struct Inner {
    config_port: Option<Box<dyn ByteSource>>,
    data_port: Option<Box<dyn ByteSource>>,
    state: SessionState,
    config_sent: bool,
    /// The data port is out of `data_port` for a read in progress.
    reading: bool,
}

impl Inner {
    fn is_alive(&self) -> bool {
        self.config_port.is_some()
            && (self.data_port.is_some() || self.reading)
            && self.state != SessionState::Faulted
    }

    fn connected_state(&self) -> SessionState {
        match (&self.config_port, &self.data_port) {
            (Some(_), Some(_)) => SessionState::DataConnected,
            (Some(_), None) => SessionState::ConfigConnected,
            _ => SessionState::Disconnected,
        }
    }
}

/// What one acquisition iteration produced.
enum Step {
    Stopped,
    Idle,
    /// A frame went into the slot, replacing an undelivered one if `true`.
    Published(bool),
    Dropped(DecodeError),
    Failed(DecodeError),
}

/// One radar sensor: a command port, a data port and the latest frame.
///
/// All methods take `&self`; share the session through an `Arc` to run
/// [`start_sensor`](Self::start_sensor) on one task and
/// [`get_data`](Self::get_data) on another. Port state sits behind a mutex
/// that is never held across an `.await` or a data-port read. Serial reads
/// inside the acquisition loop block the worker thread for at most the
/// port timeout.
pub struct SensorSession {
    name: String,
    connector: Box<dyn Connector>,
    decoder: FrameDecoder,
    poll_interval: Duration,
    inner: Mutex<Inner>,
    slot: FrameSlot<Frame>,
    rate: Mutex<RateEstimator>,
}

impl SensorSession {
    /// Create a disconnected session that opens serial ports.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_connector(name, SerialConnector)
    }

    /// Create a disconnected session that opens ports through `connector`.
    pub fn with_connector(name: impl Into<String>, connector: impl Connector + 'static) -> Self {
        Self {
            name: name.into(),
            connector: Box::new(connector),
            decoder: FrameDecoder::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            inner: Mutex::new(Inner {
                config_port: None,
                data_port: None,
                state: SessionState::Disconnected,
                config_sent: false,
                reading: false,
            }),
            slot: FrameSlot::new(),
            rate: Mutex::new(RateEstimator::new(Instant::now())),
        }
    }

    pub fn with_decoder(mut self, config: DecoderConfig) -> Self {
        self.decoder = FrameDecoder::new(config);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Connect both serial ports and send the configuration.
    pub fn open(config: &SessionConfig, lines: &ConfigLines) -> Result<(Self, HandshakeReport)> {
        Self::open_with(SerialConnector, config, lines)
    }

    /// [`open`](Self::open) through an explicit connector.
    pub fn open_with(
        connector: impl Connector + 'static,
        config: &SessionConfig,
        lines: &ConfigLines,
    ) -> Result<(Self, HandshakeReport)> {
        let session = Self::with_connector(config.data_port.clone(), connector)
            .with_decoder(config.decoder)
            .with_poll_interval(config.poll_interval);

        session.connect_config(&config.config_port, config.config_baud, config.timeout)?;
        session.connect_data(&config.data_port, config.data_baud, config.timeout)?;
        let report = session.send_config(lines, config.max_retries, config.autoretry_swap)?;
        Ok((session, report))
    }

    /// Open the command port.
    pub fn connect_config(&self, port: &str, baud_rate: u32, timeout: Duration) -> Result<()> {
        let source = self.open_port("config", port, baud_rate, timeout)?;
        let mut inner = self.lock();
        inner.config_port = Some(source);
        inner.config_sent = false;
        inner.state = inner.connected_state();
        Ok(())
    }

    /// Open the data port.
    pub fn connect_data(&self, port: &str, baud_rate: u32, timeout: Duration) -> Result<()> {
        let source = self.open_port("data", port, baud_rate, timeout)?;
        let mut inner = self.lock();
        inner.data_port = Some(source);
        inner.state = inner.connected_state();
        Ok(())
    }

    fn open_port(
        &self,
        role: &'static str,
        port: &str,
        baud_rate: u32,
        timeout: Duration,
    ) -> Result<Box<dyn ByteSource>> {
        match self.connector.open(port, baud_rate, timeout) {
            Ok(source) => {
                info!(session = %self.name, role, port, baud_rate, "port connected");
                Ok(source)
            }
            Err(err) => {
                warn!(
                    session = %self.name,
                    role,
                    port,
                    baud_rate,
                    error = %err,
                    "failed to connect port"
                );
                Err(err.into())
            }
        }
    }

    /// Send the configuration script, retrying and swapping ports if needed.
    ///
    /// Each pass makes `max(max_retries, 1)` attempts. When a pass fails and
    /// `autoretry_swap` is set, both buffers are cleared, the ports trade
    /// baud rates and roles, and one more pass runs with swapping disabled.
    pub fn send_config(
        &self,
        lines: &ConfigLines,
        max_retries: u32,
        autoretry_swap: bool,
    ) -> Result<HandshakeReport> {
        let mut inner = self.lock();
        if !inner.is_alive() {
            return Err(SessionError::Disconnected);
        }

        let result = configure(&mut inner, lines, max_retries, autoretry_swap);
        match &result {
            Ok(report) => info!(
                session = %self.name,
                attempts = report.attempts,
                swapped = report.swapped,
                "sensor configured"
            ),
            Err(SessionError::Transport(err)) => {
                inner.state = SessionState::Faulted;
                error!(session = %self.name, error = %err, "configuration aborted");
            }
            Err(err) => error!(session = %self.name, error = %err, "configuration failed"),
        }
        result
    }

    /// Run the acquisition loop until the session is stopped.
    ///
    /// Returns `Ok(())` once [`stop_sensor`](Self::stop_sensor) closes the
    /// ports, or an error when the data link fails for good.
    pub async fn start_sensor(&self) -> Result<()> {
        self.begin_streaming()?;

        loop {
            tokio::time::sleep(self.poll_interval).await;

            match self.poll_once() {
                Step::Stopped => {
                    info!(session = %self.name, "acquisition stopped");
                    return Ok(());
                }
                Step::Idle => {}
                Step::Published(overwrote) => {
                    if overwrote {
                        debug!(session = %self.name, "overwrote undelivered frame");
                    }
                }
                Step::Dropped(err) => {
                    warn!(session = %self.name, error = %err, "dropping frame");
                }
                Step::Failed(err) => {
                    error!(session = %self.name, error = %err, "data link failed");
                    return Err(match err {
                        DecodeError::Transport(err) => SessionError::Transport(err),
                        other => SessionError::Decode(other),
                    });
                }
            }
        }
    }

    fn begin_streaming(&self) -> Result<()> {
        {
            let mut inner = self.lock();
            if !inner.is_alive() {
                return Err(SessionError::Disconnected);
            }
            if !inner.config_sent {
                return Err(SessionError::ConfigNotSent);
            }
            inner.state = SessionState::Streaming;
        }
        self.rate_lock().reset(Instant::now());
        info!(session = %self.name, "acquisition started");
        Ok(())
    }

    fn poll_once(&self) -> Step {
        let mut data = {
            let mut inner = self.lock();
            if inner.state != SessionState::Streaming {
                return Step::Stopped;
            }
            let Some(data) = inner.data_port.take() else {
                return Step::Stopped;
            };
            inner.reading = true;
            data
        };

        let result = read_frame(&self.decoder, &mut *data);

        let mut inner = self.lock();
        inner.reading = false;
        // Stopped or reconnected while reading: the port taken out is stale.
        if inner.state != SessionState::Streaming {
            return Step::Stopped;
        }
        inner.data_port = Some(data);

        match result {
            // Published under the lock so a concurrent stop cannot be followed by a frame.
            Ok(Some(frame)) => Step::Published(self.slot.publish(frame).is_some()),
            Ok(None) => Step::Idle,
            Err(err) if err.is_recoverable() => Step::Dropped(err),
            Err(err) => {
                inner.state = SessionState::Faulted;
                Step::Failed(err)
            }
        }
    }

    /// Wait for the next frame and update the frequency estimate.
    pub async fn get_data(&self) -> Frame {
        let frame = self.slot.recv().await;
        self.observe_delivery();
        frame
    }

    /// Take the pending frame, if any, without waiting.
    pub fn get_data_nowait(&self) -> Option<Frame> {
        let frame = self.slot.take()?;
        self.observe_delivery();
        Some(frame)
    }

    fn observe_delivery(&self) {
        let freq = self.rate_lock().observe(Instant::now());
        debug!(session = %self.name, freq, "frame delivered");
    }

    /// Stop the sensor and close both ports.
    ///
    /// With `send_stop`, `sensorStop` is written to the command port first;
    /// failures there are logged and otherwise ignored. Does not wait for a
    /// data read in progress; the acquisition loop drops that port and its
    /// frame when the read returns. An undelivered frame is discarded.
    pub fn stop_sensor(&self, send_stop: bool) {
        let mut inner = self.lock();
        if send_stop {
            if let Some(config) = inner.config_port.as_mut() {
                if let Err(err) = send_stop_command(&mut **config) {
                    debug!(session = %self.name, error = %err, "stop command failed");
                }
            }
        }

        inner.config_port = None;
        inner.data_port = None;
        inner.state = SessionState::Disconnected;
        inner.config_sent = false;
        drop(inner);

        if self.slot.take().is_some() {
            debug!(session = %self.name, "discarded undelivered frame");
        }
        info!(session = %self.name, "sensor stopped");
    }

    /// Both ports are open and no fatal error has occurred.
    pub fn is_alive(&self) -> bool {
        self.lock().is_alive()
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// Current smoothed frame rate in Hz.
    pub fn update_freq(&self) -> f64 {
        self.rate_lock().frequency()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &'static str {
        MODEL
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn rate_lock(&self) -> MutexGuard<'_, RateEstimator> {
        self.rate.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Display for SensorSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} alive: {} at {:.2}Hz",
            MODEL,
            self.name,
            self.is_alive(),
            self.update_freq()
        )
    }
}

impl fmt::Debug for SensorSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("SensorSession")
            .field("name", &self.name)
            .field("state", &inner.state)
            .field("config_sent", &inner.config_sent)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

fn configure(
    inner: &mut Inner,
    lines: &ConfigLines,
    max_retries: u32,
    autoretry_swap: bool,
) -> Result<HandshakeReport> {
    let per_pass = max_retries.max(1);
    let mut attempts = 0;
    let mut swapped = false;

    loop {
        let config = inner
            .config_port
            .as_mut()
            .ok_or(SessionError::Disconnected)?;

        if let Some(used) = send_with_retries(&mut **config, lines, per_pass)? {
            inner.config_sent = true;
            inner.state = SessionState::Configured;
            return Ok(HandshakeReport {
                attempts: attempts + used,
                swapped,
            });
        }
        attempts += per_pass;

        if !autoretry_swap || swapped {
            return Err(SessionError::HandshakeFailed { attempts, swapped });
        }
        swap_ports(inner)?;
        swapped = true;
    }
}

/// Exchange the command and data ports, including their baud rates.
fn swap_ports(inner: &mut Inner) -> std::result::Result<(), TransportError> {
    let (Some(config), Some(data)) = (inner.config_port.as_mut(), inner.data_port.as_mut()) else {
        return Ok(());
    };

    config.clear()?;
    data.clear()?;

    let config_baud = config.baud_rate();
    let data_baud = data.baud_rate();
    config.set_baud_rate(data_baud)?;
    data.set_baud_rate(config_baud)?;

    warn!(
        config_port = config.name(),
        data_port = data.name(),
        "configuration not acknowledged, swapping ports"
    );
    std::mem::swap(&mut inner.config_port, &mut inner.data_port);
    Ok(())
}

fn read_frame(
    decoder: &FrameDecoder,
    data: &mut dyn ByteSource,
) -> std::result::Result<Option<Frame>, DecodeError> {
    if !sync(data)? {
        return Ok(None);
    }
    decoder.decode(data).map(Some)
}

fn send_stop_command(config: &mut dyn ByteSource) -> std::result::Result<(), TransportError> {
    config.write(STOP_COMMAND)?;
    let reply = config.read(STOP_REPLY_BYTES)?;
    let reply = String::from_utf8_lossy(&reply);
    debug!(port = config.name(), reply = %reply.trim(), "stop acknowledged");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, OnceLock, Weak};

    use bytes::BytesMut;
    use mmwave_frame::{encode_frame, FrameHeader, SideInfo, SphericalPoint, TlvRecord};
    use mmwave_transport::MemorySource;

    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(50);

    #[derive(Default)]
    struct FakeConnector {
        ports: HashMap<String, MemorySource>,
    }

    impl FakeConnector {
        fn with(mut self, source: &MemorySource) -> Self {
            self.ports.insert(source.name().to_string(), source.clone());
            self
        }
    }

    impl Connector for FakeConnector {
        fn open(
            &self,
            port: &str,
            baud_rate: u32,
            _timeout: Duration,
        ) -> std::result::Result<Box<dyn ByteSource>, TransportError> {
            let mut source = self
                .ports
                .get(port)
                .cloned()
                .ok_or_else(|| TransportError::NotFound {
                    port: port.to_string(),
                })?;
            source.set_baud_rate(baud_rate)?;
            Ok(Box::new(source))
        }
    }

    fn sensor_port(name: &str) -> MemorySource {
        MemorySource::new(name, 0).with_responder(|line: &[u8]| {
            let mut out = line.to_vec();
            out.extend_from_slice(b"Done\n");
            out
        })
    }

    fn silent_port(name: &str) -> MemorySource {
        MemorySource::new(name, 0)
    }

    fn script() -> ConfigLines {
        ConfigLines::from_text("sensorStop\nflushCfg\n% tuning\nsensorStart\n")
    }

    fn frame_bytes(frame_number: u32, records: &[TlvRecord]) -> BytesMut {
        let mut wire = BytesMut::new();
        let header = FrameHeader {
            frame_number,
            ..FrameHeader::default()
        };
        encode_frame(&header, records, &mut wire).unwrap();
        wire
    }

    fn one_point(range: f32) -> TlvRecord {
        TlvRecord::DynamicPoints(vec![SphericalPoint {
            range,
            angle: 0.0,
            elev: 0.0,
            doppler: 0.0,
        }])
    }

    /// A session already connected and configured on `cfg` / `data`.
    fn configured() -> (Arc<SensorSession>, MemorySource, MemorySource) {
        let cfg = sensor_port("cfg");
        let data = silent_port("data");
        let session = SensorSession::with_connector(
            "test",
            FakeConnector::default().with(&cfg).with(&data),
        );
        session.connect_config("cfg", 115_200, TIMEOUT).unwrap();
        session.connect_data("data", 921_600, TIMEOUT).unwrap();
        session.send_config(&script(), 1, false).unwrap();
        (Arc::new(session), cfg, data)
    }

    #[test]
    fn connecting_both_ports_makes_session_alive() {
        let cfg = sensor_port("cfg");
        let data = silent_port("data");
        let session = SensorSession::with_connector(
            "test",
            FakeConnector::default().with(&cfg).with(&data),
        );
        assert_eq!(session.state(), SessionState::Disconnected);

        session.connect_config("cfg", 115_200, TIMEOUT).unwrap();
        assert_eq!(session.state(), SessionState::ConfigConnected);
        assert!(!session.is_alive());

        session.connect_data("data", 921_600, TIMEOUT).unwrap();
        assert_eq!(session.state(), SessionState::DataConnected);
        assert!(session.is_alive());
        assert_eq!(cfg.baud_rate(), 115_200);
        assert_eq!(data.baud_rate(), 921_600);
    }

    #[test]
    fn data_port_alone_is_not_alive() {
        let data = silent_port("data");
        let session = SensorSession::with_connector("test", FakeConnector::default().with(&data));

        session.connect_data("data", 921_600, TIMEOUT).unwrap();

        assert!(!session.is_alive());
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn connect_failure_is_returned() {
        let session = SensorSession::with_connector("test", FakeConnector::default());

        let err = session
            .connect_config("/dev/missing", 115_200, TIMEOUT)
            .unwrap_err();

        assert!(matches!(
            err,
            SessionError::Transport(TransportError::NotFound { .. })
        ));
        assert!(!session.is_alive());
    }

    #[test]
    fn send_config_requires_both_ports() {
        let cfg = sensor_port("cfg");
        let session = SensorSession::with_connector("test", FakeConnector::default().with(&cfg));
        session.connect_config("cfg", 115_200, TIMEOUT).unwrap();

        let err = session.send_config(&script(), 1, true).unwrap_err();

        assert!(matches!(err, SessionError::Disconnected));
        assert!(cfg.written().is_empty());
    }

    #[test]
    fn handshake_succeeds_on_first_attempt() {
        let cfg = sensor_port("cfg");
        let data = silent_port("data");
        let session = SensorSession::with_connector(
            "test",
            FakeConnector::default().with(&cfg).with(&data),
        );
        session.connect_config("cfg", 115_200, TIMEOUT).unwrap();
        session.connect_data("data", 921_600, TIMEOUT).unwrap();

        let report = session.send_config(&script(), 3, true).unwrap();

        assert_eq!(
            report,
            HandshakeReport {
                attempts: 1,
                swapped: false
            }
        );
        assert_eq!(session.state(), SessionState::Configured);
        assert_eq!(cfg.written(), b"sensorStop\nflushCfg\nsensorStart\n");
        assert!(data.written().is_empty());
    }

    #[test]
    fn handshake_swaps_miswired_ports() {
        // The command port was plugged in as "data" and vice versa.
        let wrong = silent_port("a");
        let right = sensor_port("b");
        let session = SensorSession::with_connector(
            "test",
            FakeConnector::default().with(&wrong).with(&right),
        );
        session.connect_config("a", 115_200, TIMEOUT).unwrap();
        session.connect_data("b", 921_600, TIMEOUT).unwrap();

        let report = session.send_config(&script(), 1, true).unwrap();

        assert_eq!(
            report,
            HandshakeReport {
                attempts: 2,
                swapped: true
            }
        );
        assert_eq!(right.baud_rate(), 115_200);
        assert_eq!(wrong.baud_rate(), 921_600);
        assert_eq!((wrong.clear_count(), right.clear_count()), (1, 1));
        assert_eq!(right.written(), b"sensorStop\nflushCfg\nsensorStart\n");
        assert_eq!(session.state(), SessionState::Configured);

        // The swapped command port now receives the stop command.
        session.stop_sensor(true);
        assert!(right.written().ends_with(b"sensorStart\nsensorStop\n"));
        assert_eq!(wrong.written(), b"sensorStop\n");
    }

    #[test]
    fn handshake_fails_after_one_swap() {
        let a = silent_port("a");
        let b = silent_port("b");
        let session =
            SensorSession::with_connector("test", FakeConnector::default().with(&a).with(&b));
        session.connect_config("a", 115_200, TIMEOUT).unwrap();
        session.connect_data("b", 921_600, TIMEOUT).unwrap();

        let err = session.send_config(&script(), 2, true).unwrap_err();

        assert!(matches!(
            err,
            SessionError::HandshakeFailed {
                attempts: 4,
                swapped: true
            }
        ));
        assert_eq!(a.written(), b"sensorStop\nsensorStop\n");
        assert_eq!(b.written(), b"sensorStop\nsensorStop\n");
        assert_eq!(session.state(), SessionState::DataConnected);
    }

    #[test]
    fn handshake_without_swap_gives_up() {
        let a = silent_port("a");
        let b = sensor_port("b");
        let session =
            SensorSession::with_connector("test", FakeConnector::default().with(&a).with(&b));
        session.connect_config("a", 115_200, TIMEOUT).unwrap();
        session.connect_data("b", 921_600, TIMEOUT).unwrap();

        let err = session.send_config(&script(), 0, false).unwrap_err();

        assert!(matches!(
            err,
            SessionError::HandshakeFailed {
                attempts: 1,
                swapped: false
            }
        ));
        assert!(b.written().is_empty());
        assert_eq!(a.baud_rate(), 115_200);
    }

    #[test]
    fn handshake_io_error_faults_session() {
        let cfg = sensor_port("cfg");
        let data = silent_port("data");
        let session = SensorSession::with_connector(
            "test",
            FakeConnector::default().with(&cfg).with(&data),
        );
        session.connect_config("cfg", 115_200, TIMEOUT).unwrap();
        session.connect_data("data", 921_600, TIMEOUT).unwrap();
        cfg.close();

        let err = session.send_config(&script(), 1, true).unwrap_err();

        assert!(matches!(
            err,
            SessionError::Transport(TransportError::Closed)
        ));
        assert_eq!(session.state(), SessionState::Faulted);
        assert!(!session.is_alive());
    }

    #[tokio::test]
    async fn start_requires_configuration() {
        let session = SensorSession::with_connector("test", FakeConnector::default());
        assert!(matches!(
            session.start_sensor().await,
            Err(SessionError::Disconnected)
        ));

        let cfg = sensor_port("cfg");
        let data = silent_port("data");
        let session = SensorSession::with_connector(
            "test",
            FakeConnector::default().with(&cfg).with(&data),
        );
        session.connect_config("cfg", 115_200, TIMEOUT).unwrap();
        session.connect_data("data", 921_600, TIMEOUT).unwrap();
        assert!(matches!(
            session.start_sensor().await,
            Err(SessionError::ConfigNotSent)
        ));
        assert_eq!(session.state(), SessionState::DataConnected);
    }

    #[tokio::test]
    async fn streams_frames_until_stopped() {
        let (session, cfg, data) = configured();
        data.inject(b"\x00\x00boot noise");
        data.inject(frame_bytes(1, &[one_point(1.5)]));

        let runner = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.start_sensor().await }
        });

        let first = session.get_data().await;
        assert_eq!(first.header.frame_number, 1);
        assert_eq!(first.dynamic_points[0].range, 1.5);
        assert_eq!(session.state(), SessionState::Streaming);

        data.inject(frame_bytes(2, &[one_point(2.5)]));
        let second = session.get_data().await;
        assert_eq!(second.header.frame_number, 2);

        session.stop_sensor(true);
        runner.await.unwrap().unwrap();

        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(cfg.written().ends_with(b"sensorStop\n"));
    }

    #[tokio::test]
    async fn marker_split_across_polls_is_found() {
        let (session, _cfg, data) = configured();
        let wire = frame_bytes(7, &[one_point(7.0)]);
        data.inject(b"noise");
        data.inject(&wire[..4]);

        let runner = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.start_sensor().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(data.pending(), 4);

        data.inject(&wire[4..]);
        let frame = session.get_data().await;
        assert_eq!(frame.header.frame_number, 7);

        session.stop_sensor(false);
        runner.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn bad_frames_are_dropped() {
        let (session, _cfg, data) = configured();
        data.inject(frame_bytes(
            1,
            &[TlvRecord::DynamicSideInfo(vec![SideInfo::default()])],
        ));
        data.inject(frame_bytes(
            2,
            &[
                one_point(3.0),
                TlvRecord::Unknown {
                    tlv_type: 99,
                    payload: bytes::Bytes::from_static(b"ignored"),
                },
            ],
        ));

        let runner = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.start_sensor().await }
        });

        let frame = session.get_data().await;
        assert_eq!(frame.header.frame_number, 2);
        assert_eq!(frame.dynamic_points.len(), 1);

        session.stop_sensor(false);
        runner.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn closed_data_link_faults_session() {
        let (session, _cfg, data) = configured();
        data.close();

        let err = session.start_sensor().await.unwrap_err();

        assert!(matches!(
            err,
            SessionError::Transport(TransportError::Closed)
        ));
        assert_eq!(session.state(), SessionState::Faulted);
        assert!(!session.is_alive());
    }

    #[tokio::test(start_paused = true)]
    async fn frequency_estimate_follows_deliveries() {
        let (session, _cfg, _data) = configured();
        assert_eq!(session.update_freq(), 10.0);
        assert!(session.get_data_nowait().is_none());

        session.rate_lock().reset(Instant::now());
        session.slot.publish(Frame::default());
        tokio::time::advance(Duration::from_millis(500)).await;

        assert!(session.get_data_nowait().is_some());
        assert!((session.update_freq() - 6.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn get_data_smooths_delivery_rate() {
        let (session, _cfg, _data) = configured();
        session.rate_lock().reset(Instant::now());

        session.slot.publish(Frame::default());
        session.get_data().await;
        assert_eq!(session.update_freq(), 10.0);

        tokio::time::advance(Duration::from_millis(500)).await;
        session.slot.publish(Frame::default());
        session.get_data().await;

        assert!((session.update_freq() - 6.0).abs() < 1e-9);
    }

    #[test]
    fn stop_discards_undelivered_frame() {
        let (session, _cfg, _data) = configured();
        session.slot.publish(Frame::default());

        session.stop_sensor(false);

        assert!(session.get_data_nowait().is_none());
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    /// Data link that stops its own session from inside a read.
    struct StopOnRead {
        inner: MemorySource,
        session: Arc<OnceLock<Weak<SensorSession>>>,
    }

    impl ByteSource for StopOnRead {
        fn read(&mut self, n: usize) -> std::result::Result<bytes::Bytes, TransportError> {
            self.inner.read(n)
        }

        fn read_until(
            &mut self,
            delimiter: &[u8],
        ) -> std::result::Result<bytes::Bytes, TransportError> {
            if let Some(session) = self.session.get().and_then(Weak::upgrade) {
                assert!(session.is_alive());
                assert_eq!(session.state(), SessionState::Streaming);
                session.stop_sensor(false);
            }
            self.inner.read_until(delimiter)
        }

        fn write(&mut self, data: &[u8]) -> std::result::Result<(), TransportError> {
            self.inner.write(data)
        }

        fn clear(&mut self) -> std::result::Result<(), TransportError> {
            self.inner.clear()
        }

        fn baud_rate(&self) -> u32 {
            self.inner.baud_rate()
        }

        fn set_baud_rate(&mut self, baud_rate: u32) -> std::result::Result<(), TransportError> {
            self.inner.set_baud_rate(baud_rate)
        }

        fn name(&self) -> &str {
            self.inner.name()
        }
    }

    #[tokio::test]
    async fn session_usable_during_data_read() {
        let (session, _cfg, data) = configured();
        let handle = Arc::new(OnceLock::new());
        handle.set(Arc::downgrade(&session)).unwrap();
        session.lock().data_port = Some(Box::new(StopOnRead {
            inner: data.clone(),
            session: handle,
        }));
        data.inject(frame_bytes(1, &[one_point(1.0)]));

        session.start_sensor().await.unwrap();

        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(!session.is_alive());
        assert!(session.get_data_nowait().is_none());
    }

    #[test]
    fn undelivered_frame_is_overwritten() {
        let (session, _cfg, _data) = configured();
        let mut older = Frame::default();
        older.header.frame_number = 1;
        let mut newer = Frame::default();
        newer.header.frame_number = 2;

        session.slot.publish(older);
        session.slot.publish(newer);

        assert_eq!(session.get_data_nowait().unwrap().header.frame_number, 2);
        assert!(session.get_data_nowait().is_none());
    }

    #[test]
    fn display_summarises_session() {
        let session = SensorSession::with_connector("lab", FakeConnector::default());
        assert_eq!(session.to_string(), "IWR6843AOP lab alive: false at 10.00Hz");
        assert_eq!(session.model(), "IWR6843AOP");
        assert_eq!(session.name(), "lab");
    }

    #[test]
    fn open_with_connects_and_configures() {
        let cfg = sensor_port("/dev/ttyUSB0");
        let data = silent_port("/dev/ttyUSB1");
        let config = SessionConfig::new("/dev/ttyUSB0", "/dev/ttyUSB1");

        let (session, report) = SensorSession::open_with(
            FakeConnector::default().with(&cfg).with(&data),
            &config,
            &script(),
        )
        .unwrap();

        assert!(!report.swapped);
        assert_eq!(session.state(), SessionState::Configured);
        assert_eq!(data.baud_rate(), 921_600);
    }

    #[test]
    fn start_sensor_future_is_send() {
        fn assert_send<T: Send>(_: &T) {}
        let session = SensorSession::with_connector("test", FakeConnector::default());
        let fut = session.start_sensor();
        assert_send(&fut);
    }
}
