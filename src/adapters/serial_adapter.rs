//! Hardware serial port link for the MP-285.

use super::SerialLink;
use crate::error::{Mp285Error, Mp285Result};
use std::time::Duration;
use tracing::debug;

#[cfg(feature = "instrument_serial")]
use serialport::SerialPort;
#[cfg(feature = "instrument_serial")]
use std::io::{Read, Write};

/// Upper bound on a single blocking read; the session loops until its own deadline.
#[cfg(feature = "instrument_serial")]
const PORT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Serial line settings for the MP-285 (8 data bits, no parity, 1 stop bit, no flow control).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    /// Port name (e.g., "/dev/ttyUSB0", "COM5")
    pub port_name: String,

    /// Baud rate set by the controller's DIP switches
    pub baud_rate: u32,

    /// Overall reply timeout for one exchange
    pub timeout: Duration,
}

impl SerialSettings {
    /// Settings for `port_name` at `baud_rate` with a per-exchange `timeout`.
    pub fn new(port_name: impl Into<String>, baud_rate: u32, timeout: Duration) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            timeout,
        }
    }

    /// Open the port. On failure nothing is left open.
    #[cfg(feature = "instrument_serial")]
    pub fn open(&self) -> Mp285Result<Box<dyn SerialLink>> {
        let port = serialport::new(&self.port_name, self.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(PORT_POLL_TIMEOUT.min(self.timeout))
            .open()
            .map_err(|e| Mp285Error::Connection {
                port: self.port_name.clone(),
                reason: e.to_string(),
            })?;

        debug!(
            "Serial port '{}' opened at {} baud",
            self.port_name, self.baud_rate
        );
        Ok(Box::new(SerialPortLink {
            name: self.port_name.clone(),
            port,
        }))
    }

    /// Always fails: serial support is disabled in this build.
    #[cfg(not(feature = "instrument_serial"))]
    pub fn open(&self) -> Mp285Result<Box<dyn SerialLink>> {
        debug!("Refusing to open '{}': serial support disabled", self.port_name);
        Err(Mp285Error::FeatureNotEnabled("instrument_serial".to_string()))
    }
}

/// A hardware serial port opened through the `serialport` crate.
#[cfg(feature = "instrument_serial")]
pub struct SerialPortLink {
    name: String,
    port: Box<dyn SerialPort>,
}

#[cfg(feature = "instrument_serial")]
impl Read for SerialPortLink {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.port.read(buf)
    }
}

#[cfg(feature = "instrument_serial")]
impl Write for SerialPortLink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.port.flush()
    }
}

#[cfg(feature = "instrument_serial")]
impl SerialLink for SerialPortLink {
    fn clear_input(&mut self) -> std::io::Result<()> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(std::io::Error::from)
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_creation() {
        let settings = SerialSettings::new("/dev/ttyUSB0", 9600, Duration::from_secs(10));
        assert_eq!(settings.port_name, "/dev/ttyUSB0");
        assert_eq!(settings.baud_rate, 9600);
        assert_eq!(settings.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_open_missing_port_fails() {
        let settings = SerialSettings::new(
            "/dev/this-port-does-not-exist",
            9600,
            Duration::from_millis(100),
        );
        match settings.open() {
            #[cfg(feature = "instrument_serial")]
            Err(Mp285Error::Connection { port, .. }) => {
                assert_eq!(port, "/dev/this-port-does-not-exist");
            }
            #[cfg(not(feature = "instrument_serial"))]
            Err(Mp285Error::FeatureNotEnabled(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("opened a port that does not exist"),
        }
    }
}
