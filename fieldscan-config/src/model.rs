use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use fieldscan_codec::{Adjust, RegisterFormat};

use crate::error::ConfigError;

/// Modbus read function codes, in dispatch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum FunctionCode {
    /// Function 1, single-bit outputs.
    Coils = 1,
    /// Function 2, single-bit inputs.
    DiscreteInputs = 2,
    /// Function 3, 16-bit read/write registers.
    HoldingRegisters = 3,
    /// Function 4, 16-bit read-only registers.
    InputRegisters = 4,
}

impl FunctionCode {
    /// All four codes in wire order; cycle dispatch follows this order.
    pub const ALL: [Self; 4] = [
        Self::Coils,
        Self::DiscreteInputs,
        Self::HoldingRegisters,
        Self::InputRegisters,
    ];

    /// Wire value of the function code.
    pub const fn code(&self) -> u8 {
        *self as u8
    }

    /// Whether responses arrive as bits rather than 16-bit words.
    pub const fn is_bits(&self) -> bool {
        matches!(self, Self::Coils | Self::DiscreteInputs)
    }
}

impl core::fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "fn{}", self.code())
    }
}

/// One configured point, spanning [`RegisterFormat::word_len`] registers.
#[derive(Debug, Clone, Deserialize)]
pub struct Register {
    /// Stable opaque identity; generated when the file carries none.
    #[serde(default = "fresh_id")]
    pub id: String,
    /// Display name; feeds the column name.
    pub name: String,
    /// Inactive points are never polled and never get a column.
    pub active: bool,
    /// Wire format tag.
    pub format: RegisterFormat,
    /// SQL column type, passed to the DDL verbatim.
    #[serde(rename = "type")]
    pub sql_type: String,
    /// Ordered adjustment chain; applied after decoding.
    #[serde(default)]
    pub adjustments: Vec<Adjust>,
}

fn fresh_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// The four per-function register maps of a device.
///
/// `BTreeMap` keeps each group in ascending address order; the request
/// planner's contiguity detection relies on that ordering.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterGroups {
    /// Function 1 points.
    #[serde(rename = "01 Read Coils", default, deserialize_with = "group")]
    pub coils: BTreeMap<u16, Register>,
    /// Function 2 points.
    #[serde(rename = "02 Read Discrete Inputs", default, deserialize_with = "group")]
    pub discrete_inputs: BTreeMap<u16, Register>,
    /// Function 3 points.
    #[serde(rename = "03 Read Holding Registers", default, deserialize_with = "group")]
    pub holding_registers: BTreeMap<u16, Register>,
    /// Function 4 points.
    #[serde(rename = "04 Read Input Registers", default, deserialize_with = "group")]
    pub input_registers: BTreeMap<u16, Register>,
}

/// Hand-edited files often leave a group header with no entries under it;
/// YAML reads that as null rather than an empty map.
fn group<'de, D>(deserializer: D) -> Result<BTreeMap<u16, Register>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let maybe: Option<BTreeMap<u16, Register>> = Option::deserialize(deserializer)?;
    Ok(maybe.unwrap_or_default())
}

impl RegisterGroups {
    /// The group belonging to one function code.
    pub const fn group(&self, function: FunctionCode) -> &BTreeMap<u16, Register> {
        match function {
            FunctionCode::Coils => &self.coils,
            FunctionCode::DiscreteInputs => &self.discrete_inputs,
            FunctionCode::HoldingRegisters => &self.holding_registers,
            FunctionCode::InputRegisters => &self.input_registers,
        }
    }

    /// Groups in dispatch order.
    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (FunctionCode, &BTreeMap<u16, Register>)> {
        FunctionCode::ALL.into_iter().map(|fc| (fc, self.group(fc)))
    }
}

/// Physical transport of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Transport {
    /// Modbus/TCP.
    #[serde(rename = "TCP")]
    Tcp,
    /// Modbus RTU over a serial line.
    #[serde(rename = "serial")]
    Serial,
}

/// Serial parity, `N`/`O`/`E` in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Parity {
    /// No parity bit.
    N,
    /// Odd parity.
    O,
    /// Even parity.
    E,
}

/// Slave address, timing and (for serial) line parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    /// Modbus unit id of the target device.
    pub address: u8,
    /// Per-request timeout in milliseconds.
    pub timeout: u64,
    /// Serial line speed.
    #[serde(default)]
    pub baudrate: Option<u32>,
    /// Serial data bits.
    #[serde(default)]
    pub bytesize: Option<u8>,
    /// Serial parity.
    #[serde(default)]
    pub parity: Option<Parity>,
    /// Serial stop bits.
    #[serde(default)]
    pub stopbits: Option<u8>,
}

/// Where and how to reach a device.
#[derive(Debug, Clone, Deserialize)]
pub struct Connection {
    /// TCP or serial.
    pub transport: Transport,
    /// Hostname for TCP, device path for serial. Devices sharing a `src`
    /// share one client.
    pub src: String,
    /// Slave/timing/line parameters.
    pub config: ChannelConfig,
}

impl Connection {
    /// Per-request timeout as a [`Duration`].
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.config.timeout)
    }
}

/// One field device and its register map.
#[derive(Debug, Clone, Deserialize)]
pub struct Device {
    /// Unique name within the fleet; feeds column names.
    pub name: String,
    /// Inactive devices are never polled.
    pub active: bool,
    /// Endpoint and channel parameters.
    pub connection: Connection,
    /// The four function-code register groups.
    #[serde(default)]
    pub registers: RegisterGroups,
}

/// Root of the fleet configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Log verbosity, Python-logging numbering (10 debug … 40 error).
    #[serde(rename = "log level")]
    pub log_level: u8,
    /// Target time-series table.
    pub table: String,
    /// Nominal cycle period in milliseconds.
    #[serde(rename = "scan rate", default = "default_scan_rate")]
    pub scan_rate: u64,
    /// The device fleet.
    pub devices: Vec<Device>,
}

const fn default_scan_rate() -> u64 {
    1000
}

const BAUDRATES: [u32; 7] = [9600, 14400, 19200, 38400, 56000, 57600, 115200];

impl Config {
    /// Load and validate a fleet description from a YAML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_yaml(&raw)
    }

    /// Parse and validate a fleet description from YAML text.
    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Nominal cycle period as a [`Duration`].
    pub const fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_rate)
    }

    /// Devices that take part in the cycle, in file order.
    pub fn active_devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter().filter(|d| d.active)
    }

    /// Structural checks beyond what serde enforces.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for device in &self.devices {
            if !names.insert(device.name.as_str()) {
                return Err(ConfigError::DuplicateDevice(device.name.clone()));
            }
            validate_channel(device)?;
        }
        Ok(())
    }
}

fn validate_channel(device: &Device) -> Result<(), ConfigError> {
    let channel = &device.connection.config;
    let device_name = || device.name.clone();
    match device.connection.transport {
        Transport::Serial => {
            let baudrate = channel.baudrate.ok_or_else(|| {
                ConfigError::MissingSerialField {
                    device: device_name(),
                    field: "baudrate",
                }
            })?;
            if !BAUDRATES.contains(&baudrate) {
                return Err(ConfigError::InvalidBaudrate {
                    device: device_name(),
                    value: baudrate,
                });
            }
            let bytesize = channel.bytesize.ok_or_else(|| {
                ConfigError::MissingSerialField {
                    device: device_name(),
                    field: "bytesize",
                }
            })?;
            if !matches!(bytesize, 7 | 8) {
                return Err(ConfigError::InvalidBytesize {
                    device: device_name(),
                    value: bytesize,
                });
            }
            if channel.parity.is_none() {
                return Err(ConfigError::MissingSerialField {
                    device: device_name(),
                    field: "parity",
                });
            }
            let stopbits = channel.stopbits.ok_or_else(|| {
                ConfigError::MissingSerialField {
                    device: device_name(),
                    field: "stopbits",
                }
            })?;
            if !matches!(stopbits, 1 | 2) {
                return Err(ConfigError::InvalidStopbits {
                    device: device_name(),
                    value: stopbits,
                });
            }
        }
        Transport::Tcp => {
            let misplaced = [
                ("baudrate", channel.baudrate.is_some()),
                ("bytesize", channel.bytesize.is_some()),
                ("parity", channel.parity.is_some()),
                ("stopbits", channel.stopbits.is_some()),
            ];
            if let Some((field, _)) = misplaced.into_iter().find(|(_, set)| *set) {
                return Err(ConfigError::UnexpectedSerialField {
                    device: device_name(),
                    field,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLEET: &str = r#"
log level: 20
scan rate: 500
table: plant_data
devices:
  - name: Boiler room
    active: true
    connection:
      transport: TCP
      src: 192.168.0.10
      config:
        address: 1
        timeout: 1000
    registers:
      03 Read Holding Registers:
        101:
          name: Feed pump speed
          active: true
          format: Float AB CD
          type: REAL
          adjustments:
            - "*": "0.1"
        100:
          name: Mode
          active: true
          format: Unsigned
          type: SMALLINT
  - name: Meter
    active: false
    connection:
      transport: serial
      src: /dev/ttyUSB0
      config:
        address: 5
        timeout: 200
        baudrate: 19200
        bytesize: 8
        parity: E
        stopbits: 1
"#;

    #[test]
    fn fleet_file_parses() {
        let config = Config::from_yaml(FLEET).unwrap();
        assert_eq!(config.scan_rate, 500);
        assert_eq!(config.table, "plant_data");
        assert_eq!(config.devices.len(), 2);
        assert_eq!(config.active_devices().count(), 1);

        let boiler = &config.devices[0];
        let holding: Vec<u16> = boiler
            .registers
            .holding_registers
            .keys()
            .copied()
            .collect();
        // Address order, not file order.
        assert_eq!(holding, vec![100, 101]);
        assert!(!boiler.registers.holding_registers[&101].adjustments.is_empty());
        assert!(!boiler.registers.holding_registers[&100].id.is_empty());
    }

    #[test]
    fn an_empty_group_header_reads_as_no_registers() {
        let sparse = FLEET.replace(
            "      03 Read Holding Registers:",
            "      01 Read Coils:\n      03 Read Holding Registers:",
        );
        let config = Config::from_yaml(&sparse).unwrap();
        assert!(config.devices[0].registers.coils.is_empty());
        assert_eq!(config.devices[0].registers.holding_registers.len(), 2);
    }

    #[test]
    fn scan_rate_defaults_to_one_second() {
        let trimmed = FLEET.replace("scan rate: 500\n", "");
        let config = Config::from_yaml(&trimmed).unwrap();
        assert_eq!(config.scan_interval(), Duration::from_millis(1000));
    }

    #[test]
    fn duplicate_device_names_are_fatal() {
        let doubled = FLEET.replace("name: Meter", "name: Boiler room");
        assert!(matches!(
            Config::from_yaml(&doubled),
            Err(ConfigError::DuplicateDevice(name)) if name == "Boiler room"
        ));
    }

    #[test]
    fn serial_demands_its_line_parameters() {
        let broken = FLEET.replace("        baudrate: 19200\n", "");
        assert!(matches!(
            Config::from_yaml(&broken),
            Err(ConfigError::MissingSerialField { field: "baudrate", .. })
        ));
    }

    #[test]
    fn off_menu_baudrate_is_fatal() {
        let broken = FLEET.replace("baudrate: 19200", "baudrate: 31250");
        assert!(matches!(
            Config::from_yaml(&broken),
            Err(ConfigError::InvalidBaudrate { value: 31250, .. })
        ));
    }

    #[test]
    fn tcp_rejects_serial_leftovers() {
        let broken = FLEET.replace(
            "        address: 1\n        timeout: 1000\n",
            "        address: 1\n        timeout: 1000\n        baudrate: 9600\n",
        );
        assert!(matches!(
            Config::from_yaml(&broken),
            Err(ConfigError::UnexpectedSerialField { field: "baudrate", .. })
        ));
    }

    #[test]
    fn unknown_format_tag_is_fatal() {
        let broken = FLEET.replace("format: Float AB CD", "format: Float AD BC");
        assert!(matches!(Config::from_yaml(&broken), Err(ConfigError::Parse(_))));
    }
}
