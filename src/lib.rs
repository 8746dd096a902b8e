pub mod auth;
pub mod config;
pub mod error;
pub mod host;
pub mod mac;
pub mod onewire;
pub mod secret;

pub use embedded_hal::delay as eh_delay;
pub use auth::{Challenge, DeviceId};
pub use config::{ConfigKey, Configuration};
pub use error::Error;
pub use host::{Authenticated, DeviceState, Ds1961Host, ReportRecord};
pub use mac::Mac;
pub use onewire::backend::OneWireBackend;
pub use onewire::ds1961::{AuthPage, Ds1961, Phase, Scratchpad};
pub use secret::{BinarySecret, PrintableSecret};
