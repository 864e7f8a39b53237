//! Serial port enumeration.
//!
//! A side helper for choosing the controller's port before opening a session.
//! Returns structured descriptors; presentation is up to the caller.

use crate::error::AppResult;
use serde::Serialize;

/// One serial port visible to the operating system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortDescriptor {
    /// Identifier to pass as `serial.port`.
    pub name: String,
    /// Short description (USB product string, or the port type).
    pub description: String,
    /// Hardware identity, e.g. `USB VID:PID=2341:0043 SER=...`.
    pub hardware_id: String,
}

/// List available serial ports.
#[cfg(feature = "instrument_serial")]
pub fn list_ports() -> AppResult<Vec<PortDescriptor>> {
    use serialport::SerialPortType;

    let ports = serialport::available_ports()?;
    let descriptors: Vec<PortDescriptor> = ports
        .into_iter()
        .map(|info| {
            let (description, hardware_id) = match info.port_type {
                SerialPortType::UsbPort(usb) => {
                    let description = usb
                        .product
                        .clone()
                        .or_else(|| usb.manufacturer.clone())
                        .unwrap_or_else(|| "USB serial".to_string());
                    let mut hwid = format!("USB VID:PID={:04X}:{:04X}", usb.vid, usb.pid);
                    if let Some(serial) = usb.serial_number {
                        hwid.push_str(&format!(" SER={}", serial));
                    }
                    (description, hwid)
                }
                SerialPortType::PciPort => ("PCI serial".to_string(), "PCI".to_string()),
                SerialPortType::BluetoothPort => {
                    ("Bluetooth serial".to_string(), "BLUETOOTH".to_string())
                }
                SerialPortType::Unknown => ("n/a".to_string(), "n/a".to_string()),
            };
            PortDescriptor {
                name: info.port_name,
                description,
                hardware_id,
            }
        })
        .collect();

    tracing::debug!("Found {} serial ports", descriptors.len());
    Ok(descriptors)
}

/// List available serial ports.
#[cfg(not(feature = "instrument_serial"))]
pub fn list_ports() -> AppResult<Vec<PortDescriptor>> {
    Err(crate::error::PositionerError::FeatureNotEnabled(
        "instrument_serial".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_serializes() {
        let port = PortDescriptor {
            name: "/dev/ttyACM0".to_string(),
            description: "Arduino Uno".to_string(),
            hardware_id: "USB VID:PID=2341:0043".to_string(),
        };
        let json = serde_json::to_value(&port).unwrap();
        assert_eq!(json["name"], "/dev/ttyACM0");
        assert_eq!(json["hardware_id"], "USB VID:PID=2341:0043");
    }
}
