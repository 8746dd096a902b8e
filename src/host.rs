//! Parameter-driven front end.
//!
//! [`Ds1961Host::apply`] folds a [`Configuration`] into a new
//! [`DeviceState`], running whatever device writes the batch asks for.
//! [`Ds1961Host::report`] performs the authenticated read a state
//! describes and returns the values a report sink would publish.

use core::fmt;

use embedded_hal::delay::DelayNs;
use log::debug;
use rand::RngCore;

use crate::auth::{self, Challenge, DeviceId};
use crate::config::Configuration;
use crate::error::Error;
use crate::mac::Mac;
use crate::onewire::backend::OneWireBackend;
use crate::onewire::ds1961::Ds1961;
use crate::secret::PrintableSecret;

/// Host-side parameters that persist between batches
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceState {
    pub auth_challenge: Option<Challenge>,
    pub auth_address: u16,
    pub auth_secret: Option<PrintableSecret>,
    pub data_address: u16,
    pub data_mac: Option<Mac>,
    /// Last secret produced by `generate_secret` and written to the device
    pub generated_secret: Option<PrintableSecret>,
}

/// Outcome of the authenticated read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authenticated {
    Yes,
    No,
    /// The read itself failed; carries the failing phase's code
    Error(u8),
}

impl fmt::Display for Authenticated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yes => f.write_str("YES"),
            Self::No => f.write_str("NO"),
            Self::Error(code) => write!(f, "ERROR #{code}"),
        }
    }
}

/// Authenticated read results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthReport {
    pub authenticated: Authenticated,
    /// Challenge actually used for this read
    pub challenge: Challenge,
    pub data: Option<[u8; 32]>,
    pub mac: Option<Mac>,
}

/// Values published on read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRecord {
    pub generated_secret: Option<PrintableSecret>,
    /// Present only when an `auth_secret` is known
    pub auth: Option<AuthReport>,
}

impl ReportRecord {
    /// Flatten into `(name, raw value)` pairs in publication order
    pub fn entries(&self) -> Vec<(&'static str, Vec<u8>)> {
        let mut entries = Vec::new();
        if let Some(secret) = &self.generated_secret {
            entries.push(("generated_secret", secret.as_bytes().to_vec()));
        }
        if let Some(auth) = &self.auth {
            entries.push(("authenticated", auth.authenticated.to_string().into_bytes()));
            if let Some(data) = &auth.data {
                entries.push(("auth_data", data.to_vec()));
            }
            if let Some(mac) = &auth.mac {
                entries.push(("auth_mac", mac.to_vec()));
            }
        }
        entries
    }
}

/// DS1961S with an identity and a random source, driven by configuration batches
pub struct Ds1961Host<B: OneWireBackend, D: DelayNs, R: RngCore> {
    device: Ds1961<B, D>,
    device_id: DeviceId,
    rng: R,
}

impl<B: OneWireBackend, D: DelayNs, R: RngCore> Ds1961Host<B, D, R> {
    pub fn new(device: Ds1961<B, D>, device_id: DeviceId, rng: R) -> Self {
        Self {
            device,
            device_id,
            rng,
        }
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    pub fn device_mut(&mut self) -> &mut Ds1961<B, D> {
        &mut self.device
    }

    pub fn release(self) -> (Ds1961<B, D>, R) {
        (self.device, self.rng)
    }

    /// Apply one batch on top of `state`.
    ///
    /// Plain parameters are merged first, then device writes run in the
    /// order `secret`, `data`, `generate_secret`. On error `state` is left
    /// as it was and the caller should retry the whole batch.
    pub fn apply(&mut self, state: &DeviceState, config: &Configuration) -> Result<DeviceState, Error> {
        let mut next = state.clone();

        if let Some(challenge) = config.auth_challenge {
            next.auth_challenge = Some(challenge);
        }
        if let Some(addr) = config.auth_address {
            next.auth_address = addr;
        }
        if let Some(secret) = config.auth_secret {
            next.auth_secret = Some(secret);
        }
        if let Some(addr) = config.data_address {
            next.data_address = addr;
        }
        if let Some(mac) = config.data_mac {
            next.data_mac = Some(mac);
        }

        if let Some(secret) = &config.secret {
            debug!("Writing configured secret");
            self.device.write_secret16(secret)?;
        }

        if let Some(data) = &config.data {
            let mac = next.data_mac.ok_or(Error::MissingParameter("data_mac"))?;
            debug!("Writing data at {:#06X}", next.data_address);
            self.device.write_data(next.data_address, data, &mac)?;
        }

        if config.generate_secret {
            let secret = PrintableSecret::generate(&mut self.rng);
            debug!("Writing generated secret");
            self.device.write_secret16(&secret)?;
            next.generated_secret = Some(secret);
        }

        Ok(next)
    }

    /// Build the report for `state`, reading the device if an auth secret is known.
    ///
    /// Without a configured challenge a fresh one is drawn for this read
    /// only; it is returned in the report but never stored.
    pub fn report(&mut self, state: &DeviceState) -> ReportRecord {
        let auth = state
            .auth_secret
            .as_ref()
            .map(|secret| self.authenticate(state, secret));

        ReportRecord {
            generated_secret: state.generated_secret,
            auth,
        }
    }

    fn authenticate(&mut self, state: &DeviceState, secret: &PrintableSecret) -> AuthReport {
        let challenge = match state.auth_challenge {
            Some(challenge) => challenge,
            None => {
                debug!("No challenge configured, generating one");
                let mut challenge = [0u8; 3];
                self.rng.fill_bytes(&mut challenge);
                challenge
            }
        };

        let page = match self.device.read_auth_with_challenge(state.auth_address, &challenge) {
            Ok(page) => page,
            Err(err) => {
                return AuthReport {
                    authenticated: Authenticated::Error(err.code().unwrap_or(0)),
                    challenge,
                    data: None,
                    mac: None,
                };
            }
        };

        let expected = auth::compute_expected_mac(
            state.auth_address,
            &page.data,
            &secret.to_binary(),
            &challenge,
            self.device_id,
        );
        debug!("device mac: {}", hex::encode(page.mac));
        debug!("local mac:  {}", hex::encode(expected));

        let authenticated = if auth::verify(&expected, &page.mac) {
            Authenticated::Yes
        } else {
            Authenticated::No
        };

        AuthReport {
            authenticated,
            challenge,
            data: Some(page.data),
            mac: Some(page.mac),
        }
    }
}
