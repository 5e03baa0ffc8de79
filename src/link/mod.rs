//! The wireless link to the sensor board.
//!
//! The rest of the crate only sees the [`Link`] and [`Connection`] traits.
//! Notifications are delivered through [`Connection::listen`], which calls the
//! payload callback on the calling thread for as long as the dwell window
//! lasts. Nothing else runs while it does, so whatever the callback touches
//! needs no locking.

pub mod replay;
pub mod serial;
pub mod simulated;

use crate::args::Transport;
use replay::ReplayLink;
use serial::SerialLink;
use simulated::SimulatedLink;

use log::info;

use std::{fmt, io, time::Duration};

/// Service advertised by the sensor firmware.
pub const SENSOR_SERVICE_UUID: &str = "6e400001-b5a3-f393-e0a9-e50e24dcca9e";

/// Characteristic the firmware pushes readings on.
pub const NOTIFY_CHARACTERISTIC_UUID: &str = "6e400003-b5a3-f393-e0a9-e50e24dcca9e";

/// Characteristic for commands to the firmware. Nothing is written to it.
pub const WRITE_CHARACTERISTIC_UUID: &str = "6e400002-b5a3-f393-e0a9-e50e24dcca9e";

/// A device found while scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    /// Human readable name.
    pub name: String,
    /// Transport specific address (a port path, a file, ...).
    pub address: String,
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

/// Everything that can go wrong on the link. All of these end the session.
#[derive(Debug)]
pub enum ConnectionError {
    /// No device offers the requested service.
    DeviceNotFound {
        /// The service that was scanned for.
        service: String,
    },
    /// Scanning for devices failed.
    ScanFailed(io::Error),
    /// The device was found but could not be connected.
    ConnectFailed {
        /// The device we tried.
        device: DeviceHandle,
        /// What went wrong.
        source: io::Error,
    },
    /// Notifications could not be enabled.
    SubscribeFailed(io::Error),
    /// The link failed while waiting for notifications.
    ListenFailed(io::Error),
    /// Notifications could not be disabled.
    UnsubscribeFailed(io::Error),
    /// Closing the connection failed.
    DisconnectFailed(io::Error),
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ConnectionError as CE;
        match self {
            CE::DeviceNotFound { service } => {
                write!(f, "no device found with service {}", service)
            }
            CE::ScanFailed(error) => write!(f, "scan failed: {}", error),
            CE::ConnectFailed { device, source } => {
                write!(f, "failed to connect to {}: {}", device, source)
            }
            CE::SubscribeFailed(error) => write!(f, "failed to start notifications: {}", error),
            CE::ListenFailed(error) => write!(f, "link failed while streaming: {}", error),
            CE::UnsubscribeFailed(error) => write!(f, "failed to stop notifications: {}", error),
            CE::DisconnectFailed(error) => write!(f, "failed to disconnect: {}", error),
        }
    }
}

impl std::error::Error for ConnectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        use ConnectionError as CE;
        match self {
            CE::DeviceNotFound { .. } => None,
            CE::ConnectFailed { source, .. } => Some(source),
            CE::ScanFailed(error)
            | CE::SubscribeFailed(error)
            | CE::ListenFailed(error)
            | CE::UnsubscribeFailed(error)
            | CE::DisconnectFailed(error) => Some(error),
        }
    }
}

/// An open connection to the sensor board.
pub trait Connection {
    /// Enable notifications on `characteristic`.
    fn subscribe(&mut self, characteristic: &str) -> Result<(), ConnectionError>;

    /// Wait for `dwell`, handing every notification that arrives to
    /// `on_payload`. Returns once the window has elapsed.
    fn listen(
        &mut self,
        dwell: Duration,
        on_payload: &mut dyn FnMut(&[u8]),
    ) -> Result<(), ConnectionError>;

    /// Disable notifications on `characteristic`.
    fn unsubscribe(&mut self, characteristic: &str) -> Result<(), ConnectionError>;

    /// Close the connection.
    fn disconnect(&mut self) -> Result<(), ConnectionError>;
}

/// A way of finding and connecting to the sensor board.
pub trait Link {
    /// The connection type this link produces.
    type Conn: Connection;

    /// Look for a device offering `service`.
    fn scan_for_service(&mut self, service: &str) -> Result<Option<DeviceHandle>, ConnectionError>;

    /// Connect to a device returned by [`Link::scan_for_service`].
    fn connect(&mut self, device: &DeviceHandle) -> Result<Self::Conn, ConnectionError>;
}

/// Scan for the sensor service and connect to whatever offers it.
pub fn connect_to_sensor<L: Link>(link: &mut L) -> Result<L::Conn, ConnectionError> {
    let device = link
        .scan_for_service(SENSOR_SERVICE_UUID)?
        .ok_or_else(|| ConnectionError::DeviceNotFound {
            service: SENSOR_SERVICE_UUID.to_owned(),
        })?;

    info!("Found device with the wanted service: {}", device);
    let connection = link.connect(&device)?;
    info!("Connected to {}", device);

    Ok(connection)
}

impl<C: Connection + ?Sized> Connection for Box<C> {
    fn subscribe(&mut self, characteristic: &str) -> Result<(), ConnectionError> {
        (**self).subscribe(characteristic)
    }

    fn listen(
        &mut self,
        dwell: Duration,
        on_payload: &mut dyn FnMut(&[u8]),
    ) -> Result<(), ConnectionError> {
        (**self).listen(dwell, on_payload)
    }

    fn unsubscribe(&mut self, characteristic: &str) -> Result<(), ConnectionError> {
        (**self).unsubscribe(characteristic)
    }

    fn disconnect(&mut self) -> Result<(), ConnectionError> {
        (**self).disconnect()
    }
}

/// Connect to the sensor over whichever transport was asked for.
///
/// Interactive port selection is the caller's job; by the time this is
/// called a serial transport either names its port or takes the first one.
pub fn open_transport(transport: &Transport) -> Result<Box<dyn Connection>, ConnectionError> {
    let connection: Box<dyn Connection> = match transport {
        Transport::Serial(cmd) => {
            let mut link = SerialLink::new(cmd.baud_rate);
            if let Some(port) = &cmd.port {
                link = link.with_port(port);
            }
            Box::new(connect_to_sensor(&mut link)?)
        }
        Transport::Simulate(cmd) => {
            let mut builder = SimulatedLink::builder()
                .rate_hz(cmd.rate_hz)
                .noise(cmd.noise)
                .malformed_ratio(cmd.malformed_ratio);
            if let Some(seed) = cmd.seed {
                builder = builder.seed(seed);
            }
            Box::new(connect_to_sensor(&mut builder.build())?)
        }
        Transport::Replay(cmd) => {
            let mut link = ReplayLink::from_path(&cmd.file, cmd.per_window)
                .map_err(ConnectionError::ScanFailed)?;
            Box::new(connect_to_sensor(&mut link)?)
        }
    };
    Ok(connection)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptyLink;

    struct NeverConnection;

    impl Connection for NeverConnection {
        fn subscribe(&mut self, _: &str) -> Result<(), ConnectionError> {
            Ok(())
        }
        fn listen(&mut self, _: Duration, _: &mut dyn FnMut(&[u8])) -> Result<(), ConnectionError> {
            Ok(())
        }
        fn unsubscribe(&mut self, _: &str) -> Result<(), ConnectionError> {
            Ok(())
        }
        fn disconnect(&mut self) -> Result<(), ConnectionError> {
            Ok(())
        }
    }

    impl Link for EmptyLink {
        type Conn = NeverConnection;

        fn scan_for_service(&mut self, _: &str) -> Result<Option<DeviceHandle>, ConnectionError> {
            Ok(None)
        }

        fn connect(&mut self, _: &DeviceHandle) -> Result<NeverConnection, ConnectionError> {
            panic!("nothing to connect to");
        }
    }

    #[test]
    fn missing_device_is_reported() {
        match connect_to_sensor(&mut EmptyLink) {
            Err(ConnectionError::DeviceNotFound { service }) => {
                assert_eq!(service, SENSOR_SERVICE_UUID)
            }
            _ => panic!("expected DeviceNotFound"),
        }
    }

    #[test]
    fn errors_keep_their_source() {
        use std::error::Error;

        let err = ConnectionError::ListenFailed(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "link failed while streaming: gone");
    }

    #[test]
    fn boxed_connections_still_stream() {
        use crate::args::SimulateCommand;

        let transport = Transport::Simulate(SimulateCommand {
            seed: Some(3),
            rate_hz: 1000.0,
            noise: 0.0,
            malformed_ratio: 0.0,
        });
        let mut connection = open_transport(&transport).unwrap();

        let mut payloads = 0;
        connection.subscribe(NOTIFY_CHARACTERISTIC_UUID).unwrap();
        connection
            .listen(Duration::from_millis(20), &mut |_: &[u8]| payloads += 1)
            .unwrap();
        connection.unsubscribe(NOTIFY_CHARACTERISTIC_UUID).unwrap();
        connection.disconnect().unwrap();
        assert!(payloads > 0);
    }

    #[test]
    fn missing_replay_files_fail_the_scan() {
        use crate::args::ReplayCommand;

        let dir = tempfile::tempdir().unwrap();
        let transport = Transport::Replay(ReplayCommand {
            file: dir.path().join("missing.log"),
            per_window: 1,
        });
        assert!(matches!(
            open_transport(&transport),
            Err(ConnectionError::ScanFailed(_))
        ));
    }
}
