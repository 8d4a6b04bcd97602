use std::path::PathBuf;

use thiserror::Error;

/// Configuration rejection variants. All of these are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read at all.
    #[error("cannot read config file `{path}`: {source}")]
    Io {
        /// Path handed to the loader.
        path: PathBuf,
        /// Underlying filesystem error.
        source: std::io::Error,
    },
    /// The YAML did not deserialize into the fleet model.
    #[error("malformed config: {0}")]
    Parse(#[from] serde_yaml::Error),
    /// Two devices share one name.
    #[error("device `{0}` is declared twice")]
    DuplicateDevice(String),
    /// A serial connection is missing one of its line parameters.
    #[error("device `{device}`: serial transport requires `{field}`")]
    MissingSerialField {
        /// Offending device.
        device: String,
        /// The absent field.
        field: &'static str,
    },
    /// A TCP connection carries serial line parameters.
    #[error("device `{device}`: `{field}` is only meaningful for serial transport")]
    UnexpectedSerialField {
        /// Offending device.
        device: String,
        /// The misplaced field.
        field: &'static str,
    },
    /// Baudrate outside the supported line speeds.
    #[error("device `{device}`: unsupported baudrate {value}")]
    InvalidBaudrate {
        /// Offending device.
        device: String,
        /// Rejected value.
        value: u32,
    },
    /// Data bits outside {7, 8}.
    #[error("device `{device}`: unsupported data bits {value}")]
    InvalidBytesize {
        /// Offending device.
        device: String,
        /// Rejected value.
        value: u8,
    },
    /// Stop bits outside {1, 2}.
    #[error("device `{device}`: unsupported stop bits {value}")]
    InvalidStopbits {
        /// Offending device.
        device: String,
        /// Rejected value.
        value: u8,
    },
}
