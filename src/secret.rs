//! Host-side secret representations.
//!
//! Callers hand secrets around as 16 printable bytes; the device stores
//! 8 binary bytes. The two types never convert implicitly.

use rand::Rng;

use crate::error::Error;

/// Printable 16-byte secret, every byte non-zero
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PrintableSecret([u8; 16]);

/// 8-byte secret as written to the secret register
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct BinarySecret([u8; 8]);

impl PrintableSecret {
    pub const LEN: usize = 16;

    /// Accept exactly 16 bytes with no zero byte among them.
    ///
    /// Any byte in 1..=255 is accepted, including values above the 1..=126
    /// range [`generate`](Self::generate) draws from.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != Self::LEN || bytes.contains(&0) {
            return Err(Error::InvalidSecret);
        }

        let mut secret = [0u8; 16];
        secret.copy_from_slice(bytes);
        Ok(Self(secret))
    }

    /// Draw every byte uniformly from 1..=126
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(core::array::from_fn(|_| rng.random_range(1..=126u8)))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Device form of this secret, see [`pack16_to_8`]
    pub fn to_binary(&self) -> BinarySecret {
        BinarySecret(pack16_to_8(&self.0))
    }
}

impl BinarySecret {
    pub const fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

// Secrets stay out of logs.
impl core::fmt::Debug for PrintableSecret {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("PrintableSecret(..)")
    }
}

impl core::fmt::Debug for BinarySecret {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("BinarySecret(..)")
    }
}

/// Pack the 16-byte printable form into the 8 bytes the device stores.
///
/// Each pair is combined as `(hi << 8) | lo` and then truncated to a byte,
/// so only the even-indexed bytes survive. Real devices were provisioned
/// with this exact mapping; widening it would change every stored secret.
/// The mapping has no inverse: the odd-indexed bytes are gone.
pub fn pack16_to_8(input: &[u8; 16]) -> [u8; 8] {
    let mut out = [0u8; 8];
    for (i, slot) in out.iter_mut().enumerate() {
        let pair = ((input[2 * i + 1] as u16) << 8) | input[2 * i] as u16;
        *slot = pair as u8;
    }
    out
}
