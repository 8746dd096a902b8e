//! Host-facing parameter surface.
//!
//! A [`Configuration`] is a batch of updates handed to
//! [`Ds1961Host::apply`](crate::host::Ds1961Host::apply). It can be built
//! field by field or from `key` / raw value pairs as a parameter registry
//! delivers them.

use core::str::FromStr;

use crate::auth::Challenge;
use crate::error::Error;
use crate::mac::Mac;
use crate::secret::PrintableSecret;

/// Registry keys understood by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    /// 3 raw bytes: nonce for the next authenticated read
    AuthChallenge,
    /// Integer: page to authenticate
    AuthAddress,
    /// 16-byte printable secret used to recompute the MAC
    AuthSecret,
    /// 16-byte printable secret, written to the device immediately
    Secret,
    /// Generate a random printable secret and write it
    GenerateSecret,
    /// Integer: target of the next data write
    DataAddress,
    /// 20 raw bytes accompanying the next data write
    DataMac,
    /// 8 raw bytes, written immediately
    Data,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 8] = [
        Self::AuthChallenge,
        Self::AuthAddress,
        Self::AuthSecret,
        Self::Secret,
        Self::GenerateSecret,
        Self::DataAddress,
        Self::DataMac,
        Self::Data,
    ];

    /// Registry name
    pub fn name(self) -> &'static str {
        match self {
            Self::AuthChallenge => "auth_challenge",
            Self::AuthAddress => "auth_address",
            Self::AuthSecret => "auth_secret",
            Self::Secret => "secret",
            Self::GenerateSecret => "generate_secret",
            Self::DataAddress => "data_address",
            Self::DataMac => "data_mac",
            Self::Data => "data",
        }
    }
}

impl FromStr for ConfigKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.name() == s)
            .ok_or(Error::UnknownKey)
    }
}

/// One batch of parameter updates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Configuration {
    pub auth_challenge: Option<Challenge>,
    pub auth_address: Option<u16>,
    pub auth_secret: Option<PrintableSecret>,
    pub secret: Option<PrintableSecret>,
    pub generate_secret: bool,
    pub data_address: Option<u16>,
    pub data_mac: Option<Mac>,
    pub data: Option<[u8; 8]>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when nothing in this batch would change state or touch the device
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Set one parameter from its raw registry value
    pub fn set(&mut self, key: ConfigKey, value: &[u8]) -> Result<(), Error> {
        match key {
            ConfigKey::AuthChallenge => self.auth_challenge = Some(fixed(key, value)?),
            ConfigKey::AuthAddress => self.auth_address = Some(parse_address(key, value)?),
            ConfigKey::AuthSecret => self.auth_secret = Some(PrintableSecret::from_bytes(value)?),
            ConfigKey::Secret => self.secret = Some(PrintableSecret::from_bytes(value)?),
            ConfigKey::GenerateSecret => self.generate_secret = true,
            ConfigKey::DataAddress => self.data_address = Some(parse_address(key, value)?),
            ConfigKey::DataMac => self.data_mac = Some(fixed(key, value)?),
            ConfigKey::Data => self.data = Some(fixed(key, value)?),
        }
        Ok(())
    }

    /// [`set`](Self::set) with the key given by name
    pub fn set_named(&mut self, key: &str, value: &[u8]) -> Result<(), Error> {
        self.set(key.parse()?, value)
    }
}

fn fixed<const N: usize>(key: ConfigKey, value: &[u8]) -> Result<[u8; N], Error> {
    value.try_into().map_err(|_| Error::InvalidLength {
        field: key.name(),
        expected: N,
        actual: value.len(),
    })
}

/// Decimal, or hex with a `0x` prefix
fn parse_address(key: ConfigKey, value: &[u8]) -> Result<u16, Error> {
    let invalid = || Error::InvalidValue { field: key.name() };

    let text = core::str::from_utf8(value).map_err(|_| invalid())?.trim();
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => text.parse::<u16>(),
    };
    parsed.map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_names_round_trip() {
        for key in ConfigKey::ALL {
            assert_eq!(key.name().parse::<ConfigKey>().unwrap(), key);
        }
        assert!(matches!("auth_mac".parse::<ConfigKey>(), Err(Error::UnknownKey)));
    }

    #[test]
    fn test_addresses() {
        let mut config = Configuration::new();
        config.set(ConfigKey::AuthAddress, b"32").unwrap();
        config.set(ConfigKey::DataAddress, b"0x60").unwrap();
        assert_eq!(config.auth_address, Some(0x20));
        assert_eq!(config.data_address, Some(0x60));

        assert!(matches!(
            config.set(ConfigKey::AuthAddress, b"page one"),
            Err(Error::InvalidValue { field: "auth_address" })
        ));
        assert!(config.set(ConfigKey::DataAddress, b"70000").is_err());
    }

    #[test]
    fn test_raw_lengths() {
        let mut config = Configuration::new();
        config.set(ConfigKey::AuthChallenge, &[1, 2, 3]).unwrap();
        config.set(ConfigKey::DataMac, &[0xAB; 20]).unwrap();
        config.set(ConfigKey::Data, &[0xCD; 8]).unwrap();
        assert_eq!(config.auth_challenge, Some([1, 2, 3]));
        assert_eq!(config.data_mac, Some([0xAB; 20]));
        assert_eq!(config.data, Some([0xCD; 8]));

        assert!(matches!(
            config.set(ConfigKey::DataMac, &[0xAB; 19]),
            Err(Error::InvalidLength { field: "data_mac", expected: 20, actual: 19 })
        ));
        assert!(config.set(ConfigKey::AuthChallenge, &[1, 2]).is_err());
        assert!(config.set(ConfigKey::Data, &[0; 9]).is_err());
    }

    #[test]
    fn test_secrets_and_flags() {
        let mut config = Configuration::new();
        assert!(config.is_empty());

        config.set_named("auth_secret", b"ABCDEFGHIJKLMNOP").unwrap();
        config.set_named("generate_secret", b"").unwrap();
        assert!(config.auth_secret.is_some());
        assert!(config.generate_secret);
        assert!(!config.is_empty());

        assert!(matches!(
            config.set_named("secret", b"short"),
            Err(Error::InvalidSecret)
        ));
        assert!(config.secret.is_none());
    }
}
