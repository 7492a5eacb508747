//! Configuration record grammar.
//!
//! The record is persisted as a single NUL-terminated line:
//!
//! ```text
//! <token>;<baud rate>;8;<stop bits>;0
//! ```
//!
//! The token may contain any byte except `;` and NUL, and is not required
//! to be UTF-8. The baud rate has 1 to 8
//! digits without a leading zero, data bits and parity are fixed, and the
//! stop bit count is `1` or `2`. Anything else leaves the device
//! unconfigured, which re-opens provisioning for the next client.
//!
//! # Example
//!
//! ```
//! use serial_bridge_esp32::config::{ConfigurationRecord, StopBits, StoredConfig};
//!
//! let record: ConfigurationRecord = "secret;9600;8;1;0".parse().unwrap();
//! assert_eq!(record.token(), b"secret");
//! assert_eq!(record.framing().baud_rate, 9600);
//! assert_eq!(record.framing().stop_bits, StopBits::One);
//!
//! assert!(!StoredConfig::from_bytes(b"secret;096;8;1;0").is_configured());
//! assert!(StoredConfig::from_bytes(b"pa\xdf;9600;8;1;0").is_configured());
//! ```

use log::debug;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Separator between record fields.
pub const FIELD_SEPARATOR: u8 = b';';

/// Number of fields in a record line.
pub const FIELD_COUNT: usize = 5;

/// Maximum number of digits in the baud rate field.
pub const MAX_BAUD_DIGITS: usize = 8;

/// Data bits are fixed.
pub const DATA_BITS: u8 = 8;

/// Parity is fixed to none.
pub const PARITY_NONE: u8 = 0;

/// Baud rate used while the device is unconfigured.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Longest serialized record that survives the 100-byte store (one byte is
/// reserved for the terminating NUL).
pub const MAX_RECORD_LEN: usize = 99;

/// UART stop bit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}

impl StopBits {
    /// Number of stop bits.
    pub fn count(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }

    fn from_field(field: &[u8]) -> Option<Self> {
        match field {
            b"1" => Some(Self::One),
            b"2" => Some(Self::Two),
            _ => None,
        }
    }
}

/// UART framing derived from the stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialFraming {
    pub baud_rate: u32,
    pub data_bits: u8,
    pub stop_bits: StopBits,
    pub parity: u8,
}

impl SerialFraming {
    pub const fn new(baud_rate: u32, stop_bits: StopBits) -> Self {
        Self {
            baud_rate,
            data_bits: DATA_BITS,
            stop_bits,
            parity: PARITY_NONE,
        }
    }
}

impl Default for SerialFraming {
    /// 115200 8N1.
    fn default() -> Self {
        Self::new(DEFAULT_BAUD_RATE, StopBits::One)
    }
}

impl fmt::Display for SerialFraming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}N{}",
            self.baud_rate,
            self.data_bits,
            self.stop_bits.count()
        )
    }
}

/// A usable configuration: access token plus UART framing.
///
/// The token is wiped from memory when the record is dropped.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ConfigurationRecord {
    token: Vec<u8>,
    #[zeroize(skip)]
    framing: SerialFraming,
}

impl ConfigurationRecord {
    /// Create a record, validating it against the record grammar.
    pub fn new(
        token: impl Into<Vec<u8>>,
        baud_rate: u32,
        stop_bits: StopBits,
    ) -> Result<Self, ConfigError> {
        let token = token.into();
        validate_token(&token)?;
        if baud_rate == 0 || baud_rate.to_string().len() > MAX_BAUD_DIGITS {
            return Err(ConfigError::BaudOutOfRange(baud_rate));
        }

        let record = Self {
            token,
            framing: SerialFraming::new(baud_rate, stop_bits),
        };

        let len = record.to_line().len();
        if len > MAX_RECORD_LEN {
            return Err(ConfigError::TooLong {
                len,
                max: MAX_RECORD_LEN,
            });
        }
        Ok(record)
    }

    /// The access token clients must present.
    pub fn token(&self) -> &[u8] {
        &self.token
    }

    /// UART framing for this record.
    pub fn framing(&self) -> SerialFraming {
        self.framing
    }

    /// Canonical serialized form.
    pub fn to_line(&self) -> Zeroizing<Vec<u8>> {
        let sep = FIELD_SEPARATOR as char;
        let tail = format!(
            "{sep}{}{sep}{}{sep}{}{sep}{}",
            self.framing.baud_rate,
            self.framing.data_bits,
            self.framing.stop_bits.count(),
            self.framing.parity,
        );

        let mut line = Zeroizing::new(Vec::with_capacity(self.token.len() + tail.len()));
        line.extend_from_slice(&self.token);
        line.extend_from_slice(tail.as_bytes());
        line
    }

    /// Parse a record line. The whole input must match; there is no
    /// trimming.
    pub fn parse_line(line: &[u8]) -> Result<Self, ConfigError> {
        let fields: Vec<&[u8]> = line.split(|&b| b == FIELD_SEPARATOR).collect();
        let [token, baud, data_bits, stop_bits, parity] = fields[..] else {
            return Err(ConfigError::FieldCount {
                found: fields.len(),
                expected: FIELD_COUNT,
            });
        };

        if token.is_empty() {
            return Err(ConfigError::TokenEmpty);
        }
        let baud_rate = parse_baud(baud)?;
        if data_bits != b"8" {
            return Err(ConfigError::invalid("data bits", data_bits));
        }
        let stop_bits = StopBits::from_field(stop_bits)
            .ok_or_else(|| ConfigError::invalid("stop bits", stop_bits))?;
        if parity != b"0" {
            return Err(ConfigError::invalid("parity", parity));
        }

        Self::new(token, baud_rate, stop_bits)
    }
}

impl fmt::Debug for ConfigurationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationRecord")
            .field("token", &"<redacted>")
            .field("framing", &self.framing)
            .finish()
    }
}

impl std::str::FromStr for ConfigurationRecord {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_line(s.as_bytes())
    }
}

/// Baud rate field: `[1-9][0-9]{0,7}`.
fn parse_baud(field: &[u8]) -> Result<u32, ConfigError> {
    if field.is_empty()
        || field.len() > MAX_BAUD_DIGITS
        || field[0] == b'0'
        || !field.iter().all(u8::is_ascii_digit)
    {
        return Err(ConfigError::invalid("baud rate", field));
    }
    Ok(field
        .iter()
        .fold(0u32, |acc, &digit| acc * 10 + u32::from(digit - b'0')))
}

fn validate_token(token: &[u8]) -> Result<(), ConfigError> {
    if token.is_empty() {
        return Err(ConfigError::TokenEmpty);
    }
    if token.contains(&FIELD_SEPARATOR) {
        return Err(ConfigError::TokenContainsSeparator);
    }
    if token.contains(&0) {
        return Err(ConfigError::TokenContainsNul);
    }
    Ok(())
}

/// What the non-volatile store currently holds.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StoredConfig {
    /// Empty, erased or malformed buffer. The next client provisions the
    /// device.
    #[default]
    Unconfigured,
    /// A record that matched the grammar.
    Configured(ConfigurationRecord),
}

impl StoredConfig {
    /// Interpret a raw buffer with C string semantics.
    ///
    /// Never fails: anything that is not a valid record line degrades to
    /// [`StoredConfig::Unconfigured`].
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        let line = &bytes[..end];
        if line.is_empty() {
            return Self::Unconfigured;
        }

        match ConfigurationRecord::parse_line(line) {
            Ok(record) => Self::Configured(record),
            Err(e) => {
                debug!("Stored configuration rejected: {}", e);
                Self::Unconfigured
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, Self::Configured(_))
    }

    pub fn record(&self) -> Option<&ConfigurationRecord> {
        match self {
            Self::Configured(record) => Some(record),
            Self::Unconfigured => None,
        }
    }

    /// Token to challenge clients with, if configured.
    pub fn token(&self) -> Option<&[u8]> {
        self.record().map(ConfigurationRecord::token)
    }

    /// UART framing, falling back to 115200 8N1 when unconfigured.
    pub fn framing(&self) -> SerialFraming {
        self.record()
            .map(ConfigurationRecord::framing)
            .unwrap_or_default()
    }
}

impl From<&StoredConfig> for SerialFraming {
    fn from(config: &StoredConfig) -> Self {
        config.framing()
    }
}

/// Errors that can occur while validating a configuration record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Wrong number of `;`-separated fields.
    FieldCount { found: usize, expected: usize },
    /// Token is empty.
    TokenEmpty,
    /// Token contains the field separator.
    TokenContainsSeparator,
    /// Token contains a NUL byte and would be cut short in storage.
    TokenContainsNul,
    /// Baud rate is zero or has more than eight digits.
    BaudOutOfRange(u32),
    /// A field does not match its grammar.
    InvalidField { field: &'static str, value: String },
    /// Serialized record does not fit the store.
    TooLong { len: usize, max: usize },
}

impl ConfigError {
    fn invalid(field: &'static str, value: &[u8]) -> Self {
        Self::InvalidField {
            field,
            value: String::from_utf8_lossy(value).into_owned(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FieldCount { found, expected } => {
                write!(f, "expected {} fields, found {}", expected, found)
            }
            Self::TokenEmpty => write!(f, "token cannot be empty"),
            Self::TokenContainsSeparator => write!(f, "token cannot contain ';'"),
            Self::TokenContainsNul => write!(f, "token cannot contain NUL"),
            Self::BaudOutOfRange(baud) => write!(f, "baud rate out of range: {}", baud),
            Self::InvalidField { field, value } => write!(f, "invalid {}: {:?}", field, value),
            Self::TooLong { len, max } => {
                write!(f, "record too long: {} bytes (max {})", len, max)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_parse_valid_record() {
        let record = ConfigurationRecord::from_str("secret;9600;8;1;0").unwrap();
        assert_eq!(record.token(), b"secret");
        assert_eq!(record.framing(), SerialFraming::new(9600, StopBits::One));
    }

    #[test]
    fn test_parse_two_stop_bits() {
        let record = ConfigurationRecord::from_str("t;115200;8;2;0").unwrap();
        assert_eq!(record.framing().stop_bits, StopBits::Two);
        assert_eq!(record.framing().data_bits, 8);
        assert_eq!(record.framing().parity, 0);
    }

    #[test]
    fn test_token_may_contain_spaces_and_symbols() {
        let record = ConfigurationRecord::from_str("my pass-word!;1;8;1;0").unwrap();
        assert_eq!(record.token(), b"my pass-word!");
        assert_eq!(record.framing().baud_rate, 1);
    }

    #[test]
    fn test_token_is_not_limited_to_utf8() {
        let record = ConfigurationRecord::parse_line(b"pa\xdf\xff;9600;8;1;0").unwrap();
        assert_eq!(record.token(), b"pa\xdf\xff");
        assert_eq!(record.to_line().as_slice(), b"pa\xdf\xff;9600;8;1;0");
    }

    #[test]
    fn test_invalid_field_value_is_lossy_text() {
        assert_eq!(
            ConfigurationRecord::parse_line(b"s;9600;\xff;1;0"),
            Err(ConfigError::InvalidField {
                field: "data bits",
                value: "\u{FFFD}".to_string(),
            })
        );
    }

    #[test]
    fn test_baud_digit_bound() {
        assert!(ConfigurationRecord::from_str("s;99999999;8;1;0").is_ok());
        assert!(matches!(
            ConfigurationRecord::from_str("s;999999999;8;1;0"),
            Err(ConfigError::InvalidField { field: "baud rate", .. })
        ));
        assert!(ConfigurationRecord::from_str("secret;99999999999;8;1;0").is_err());
    }

    #[test]
    fn test_baud_rejects_leading_zero_and_signs() {
        for baud in ["0", "09600", "+9600", "-9600", "96a0", ""] {
            let line = format!("s;{};8;1;0", baud);
            assert!(
                ConfigurationRecord::from_str(&line).is_err(),
                "accepted baud {:?}",
                baud
            );
        }
    }

    #[test]
    fn test_fixed_fields() {
        assert!(ConfigurationRecord::from_str("s;9600;7;1;0").is_err());
        assert!(ConfigurationRecord::from_str("s;9600;8;3;0").is_err());
        assert!(ConfigurationRecord::from_str("s;9600;8;0;0").is_err());
        assert!(ConfigurationRecord::from_str("s;9600;8;1;1").is_err());
    }

    #[test]
    fn test_anchored_at_both_ends() {
        assert!(ConfigurationRecord::from_str("s;9600;8;1;0;").is_err());
        assert!(ConfigurationRecord::from_str("s;9600;8;1;0 ").is_err());
        assert!(ConfigurationRecord::from_str(" s;9600;8;1;0").is_ok());
        assert!(ConfigurationRecord::from_str("s;9600;8;1;0\r").is_err());
        assert!(ConfigurationRecord::from_str(";9600;8;1;0").is_err());
    }

    #[test]
    fn test_field_count() {
        assert_eq!(
            ConfigurationRecord::from_str("secret"),
            Err(ConfigError::FieldCount {
                found: 1,
                expected: FIELD_COUNT
            })
        );
    }

    #[test]
    fn test_new_validates_token() {
        assert_eq!(
            ConfigurationRecord::new("", 9600, StopBits::One),
            Err(ConfigError::TokenEmpty)
        );
        assert_eq!(
            ConfigurationRecord::new("a;b", 9600, StopBits::One),
            Err(ConfigError::TokenContainsSeparator)
        );
        assert_eq!(
            ConfigurationRecord::new("a\0b", 9600, StopBits::One),
            Err(ConfigError::TokenContainsNul)
        );
        assert_eq!(
            ConfigurationRecord::new("a", 100_000_000, StopBits::One),
            Err(ConfigError::BaudOutOfRange(100_000_000))
        );
    }

    #[test]
    fn test_new_rejects_oversized_record() {
        let token = "t".repeat(90);
        let result = ConfigurationRecord::new(token, 9600, StopBits::One);
        assert!(matches!(result, Err(ConfigError::TooLong { .. })));
    }

    #[test]
    fn test_to_line_is_canonical() {
        let record = ConfigurationRecord::new("secret", 57600, StopBits::Two).unwrap();
        assert_eq!(record.to_line().as_slice(), b"secret;57600;8;2;0");
        assert_eq!(ConfigurationRecord::parse_line(&record.to_line()).unwrap(), record);
    }

    #[test]
    fn test_debug_redacts_token() {
        let record = ConfigurationRecord::new("hunter2", 9600, StopBits::One).unwrap();
        let debug = format!("{:?}", record);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("redacted"));
    }

    #[test]
    fn test_stored_config_from_bytes() {
        let config = StoredConfig::from_bytes(b"secret;9600;8;1;0\0garbage");
        assert_eq!(config.token(), Some(&b"secret"[..]));

        assert_eq!(StoredConfig::from_bytes(b""), StoredConfig::Unconfigured);
        assert_eq!(StoredConfig::from_bytes(b"\0secret;9600;8;1;0"), StoredConfig::Unconfigured);
        assert_eq!(StoredConfig::from_bytes(&[0xFF, 0xFE, 0]), StoredConfig::Unconfigured);
    }

    #[test]
    fn test_unconfigured_framing_defaults() {
        let config = StoredConfig::Unconfigured;
        assert_eq!(config.framing(), SerialFraming::default());
        assert_eq!(config.framing().to_string(), "115200 8N1");
        assert_eq!(config.token(), None);
    }

    #[test]
    fn test_framing_from_stored_config() {
        let config = StoredConfig::from_bytes(b"secret;9600;8;2;0");
        let framing = SerialFraming::from(&config);
        assert_eq!(framing.baud_rate, 9600);
        assert_eq!(framing.stop_bits.count(), 2);
        assert_eq!(framing.to_string(), "9600 8N2");
    }
}
