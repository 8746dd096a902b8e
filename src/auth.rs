//! Host-side recomputation of the Read Authenticated Page MAC.

use crate::error::Error;
use crate::mac::{self, Mac};
use crate::secret::BinarySecret;

/// 3-byte host nonce mixed into the MAC
pub type Challenge = [u8; 3];

/// Factory-lasered 64-bit registration number
///
/// Byte 0 (least significant) is the family code and byte 7 the ROM CRC;
/// the MAC covers bytes 0..7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(u64);

impl DeviceId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// The seven bytes that enter the MAC, least significant first
    pub fn payload(&self) -> [u8; 7] {
        let bytes = self.0.to_le_bytes();
        let mut payload = [0u8; 7];
        payload.copy_from_slice(&bytes[..7]);
        payload
    }
}

/// Memory page class (0x40) ORed with the 3-bit page index
fn page_type(addr: u16) -> u8 {
    (0b1000 << 3) | ((addr >> 5) & 0b111) as u8
}

/// Build the 16-word message the device hashes for an authenticated read.
pub fn auth_block(
    addr: u16,
    page: &[u8; 32],
    secret: &BinarySecret,
    challenge: &Challenge,
    device_id: DeviceId,
) -> [u32; 16] {
    let ss = secret.as_bytes();
    let id = device_id.payload();

    let mut block = [0u32; 16];
    block[0] = u32::from_be_bytes([ss[0], ss[1], ss[2], ss[3]]);
    for (word, chunk) in block[1..9].iter_mut().zip(page.chunks_exact(4)) {
        *word = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    block[9] = 0xFFFF_FFFF;
    block[10] = u32::from_be_bytes([page_type(addr), id[0], id[1], id[2]]);
    block[11] = u32::from_be_bytes([id[3], id[4], id[5], id[6]]);
    block[12] = u32::from_be_bytes([ss[4], ss[5], ss[6], ss[7]]);
    block[13] = u32::from_be_bytes([challenge[0], challenge[1], challenge[2], 0x80]);
    block[14] = 0;
    // Device constant, not a message length.
    block[15] = 0x1B8;
    block
}

/// MAC the device should return for `page` read at `addr`
pub fn compute_expected_mac(
    addr: u16,
    page: &[u8; 32],
    secret: &BinarySecret,
    challenge: &Challenge,
    device_id: DeviceId,
) -> Mac {
    mac::compute_mac(&auth_block(addr, page, secret, challenge, device_id))
}

/// Byte-exact comparison. A mismatch is an ordinary outcome.
pub fn verify(expected: &Mac, device_mac: &Mac) -> bool {
    expected == device_mac
}

/// [`verify`], turned into an [`Error::AuthenticationFailed`] on mismatch
pub fn ensure_authentic(expected: &Mac, device_mac: &Mac) -> Result<(), Error> {
    if verify(expected, device_mac) {
        Ok(())
    } else {
        Err(Error::AuthenticationFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    const DEVICE_ID: DeviceId = DeviceId::new(0x0123456789ABCDEF);

    #[test]
    fn test_device_id_payload() {
        assert_eq!(DEVICE_ID.payload(), hex!("EF CD AB 89 67 45 23"));
    }

    #[test]
    fn test_page_type() {
        assert_eq!(page_type(0x00), 0x40);
        assert_eq!(page_type(0x20), 0x41);
        assert_eq!(page_type(0x60), 0x43);
        assert_eq!(page_type(0x7F), 0x43);
    }

    #[test]
    fn test_block_layout() {
        let page: [u8; 32] = core::array::from_fn(|i| i as u8);
        let secret = BinarySecret::new(hex!("11 22 33 44 55 66 77 88"));
        let block = auth_block(0x40, &page, &secret, &[0xAB, 0xCD, 0xEF], DEVICE_ID);

        assert_eq!(block[0], 0x11223344);
        assert_eq!(block[1], 0x00010203);
        assert_eq!(block[8], 0x1C1D1E1F);
        assert_eq!(block[9], 0xFFFFFFFF);
        assert_eq!(block[10], 0x42EFCDAB);
        assert_eq!(block[11], 0x89674523);
        assert_eq!(block[12], 0x55667788);
        assert_eq!(block[13], 0xABCDEF80);
        assert_eq!(block[14], 0);
        assert_eq!(block[15], 0x1B8);
    }

    #[test]
    fn test_pinned_page1_mac() {
        let mac = compute_expected_mac(
            0x20,
            &[0u8; 32],
            &BinarySecret::new([0u8; 8]),
            &[0x01, 0x02, 0x03],
            DEVICE_ID,
        );
        assert_eq!(mac, hex!("5310697c336833fdd7a17f1990c1e96a9f08ec6e"));
    }

    #[test]
    fn test_verify() {
        let expected = hex!("5310697c336833fdd7a17f1990c1e96a9f08ec6e");
        assert!(verify(&expected, &expected));

        let mut tampered = expected;
        tampered[19] ^= 0x01;
        assert!(!verify(&expected, &tampered));
        assert!(matches!(
            ensure_authentic(&expected, &tampered),
            Err(Error::AuthenticationFailed)
        ));
        assert!(ensure_authentic(&expected, &expected).is_ok());
    }

    #[test]
    fn test_every_input_is_bound() {
        let page = [0x5Au8; 32];
        let secret = BinarySecret::new([0x33; 8]);
        let challenge = [0x01, 0x02, 0x03];
        let reference = compute_expected_mac(0x20, &page, &secret, &challenge, DEVICE_ID);

        assert_ne!(compute_expected_mac(0x40, &page, &secret, &challenge, DEVICE_ID), reference);
        assert_ne!(
            compute_expected_mac(0x20, &[0x5B; 32], &secret, &challenge, DEVICE_ID),
            reference
        );
        assert_ne!(
            compute_expected_mac(0x20, &page, &BinarySecret::new([0x34; 8]), &challenge, DEVICE_ID),
            reference
        );
        assert_ne!(
            compute_expected_mac(0x20, &page, &secret, &[0x01, 0x02, 0x04], DEVICE_ID),
            reference
        );
        assert_ne!(
            compute_expected_mac(0x20, &page, &secret, &challenge, DeviceId::new(0x0123456789ABCDEE)),
            reference
        );
    }
}
