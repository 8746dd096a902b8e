//! SHA-1 variant used by the DS1961S MAC engine.
//!
//! The device runs the FIPS-180 compression function over a single
//! 16-word block but skips the final addition of the initial state. The
//! result is then emitted least significant byte first, last word first.
//! Both quirks are part of the wire contract.

/// A 20-byte message authentication code as the iButton sends it
pub type Mac = [u8; 20];

/// Raw compression output (A, B, C, D, E)
pub type Digest = [u32; 5];

const INITIAL_STATE: Digest = [0x67452301, 0xEFCDAB89, 0x98BADCFE, 0x10325476, 0xC3D2E1F0];

const ROUND_CONSTANTS: [u32; 4] = [0x5A827999, 0x6ED9EBA1, 0x8F1BBCDC, 0xCA62C1D6];

/// Non-linear round function
fn nlf(b: u32, c: u32, d: u32, round: usize) -> u32 {
    match round {
        0..=19 => (b & c) | (!b & d),
        40..=59 => (b & c) | (b & d) | (c & d),
        _ => b ^ c ^ d,
    }
}

/// Run the 80 compression rounds over `block`.
///
/// The initial state is not added back at the end.
pub fn compute_digest(block: &[u32; 16]) -> Digest {
    let mut schedule = [0u32; 80];
    schedule[..16].copy_from_slice(block);
    for i in 16..80 {
        schedule[i] =
            (schedule[i - 3] ^ schedule[i - 8] ^ schedule[i - 14] ^ schedule[i - 16]).rotate_left(1);
    }

    let [mut a, mut b, mut c, mut d, mut e] = INITIAL_STATE;
    for (round, word) in schedule.iter().enumerate() {
        let temp = nlf(b, c, d, round)
            .wrapping_add(e)
            .wrapping_add(ROUND_CONSTANTS[round / 20])
            .wrapping_add(*word)
            .wrapping_add(a.rotate_left(5));
        e = d;
        d = c;
        c = b.rotate_left(30);
        b = a;
        a = temp;
    }

    [a, b, c, d, e]
}

/// Fold a digest into the MAC byte order: E, D, C, B, A, each little-endian.
pub fn fold_to_mac(hash: &Digest) -> Mac {
    let mut mac = [0u8; 20];
    for (chunk, word) in mac.chunks_exact_mut(4).zip(hash.iter().rev()) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
    mac
}

/// `fold_to_mac(compute_digest(block))`
pub fn compute_mac(block: &[u32; 16]) -> Mac {
    fold_to_mac(&compute_digest(block))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    fn counting_block() -> [u32; 16] {
        core::array::from_fn(|i| (i as u32).wrapping_mul(0x01010101))
    }

    #[test]
    fn test_pinned_digest() {
        assert_eq!(
            compute_digest(&counting_block()),
            [0xF10D7148, 0x5A9B5C4D, 0xB411E0F7, 0x96A0C5F4, 0x9B3178A4]
        );
    }

    #[test]
    fn test_pinned_mac() {
        assert_eq!(
            compute_mac(&counting_block()),
            hex!("a478319bf4c5a096f7e011b44d5c9b5a48710df1")
        );
        assert_eq!(
            compute_mac(&[0u32; 16]),
            hex!("a3582446f2ead2ae50f05fd364e18a66e4e16e2b")
        );
    }

    #[test]
    fn test_final_addition_is_omitted() {
        // Padded empty message. Adding the initial state back yields the
        // standard SHA-1 of "", so the raw output must differ from it.
        let mut block = [0u32; 16];
        block[0] = 0x8000_0000;
        let digest = compute_digest(&block);

        let mut standard = [0u8; 20];
        for (chunk, (word, init)) in standard
            .chunks_exact_mut(4)
            .zip(digest.iter().zip(INITIAL_STATE.iter()))
        {
            chunk.copy_from_slice(&word.wrapping_add(*init).to_be_bytes());
        }
        assert_eq!(standard, hex!("da39a3ee5e6b4b0d3255bfef95601890afd80709"));
        assert_ne!(digest, [0xDA39A3EE, 0x5E6B4B0D, 0x3255BFEF, 0x95601890, 0xAFD80709]);
    }

    #[test]
    fn test_fold_order() {
        let mac = fold_to_mac(&[0x03020100, 0x07060504, 0x0B0A0908, 0x0F0E0D0C, 0x13121110]);
        assert_eq!(
            mac,
            hex!("10111213 0C0D0E0F 08090A0B 04050607 00010203")
        );
    }

    #[test]
    fn test_single_bit_changes_mac() {
        let block = counting_block();
        let reference = compute_mac(&block);
        assert_eq!(
            compute_mac(&{
                let mut flipped = block;
                flipped[0] ^= 1;
                flipped
            }),
            hex!("96b04f0e0e860487b92a188935a962b7147d660e")
        );

        for word in 0..16 {
            for bit in 0..32 {
                let mut flipped = block;
                flipped[word] ^= 1 << bit;
                assert_ne!(compute_mac(&flipped), reference, "word {word} bit {bit}");
            }
        }
    }
}
