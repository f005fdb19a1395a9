//! Bit-packed encoding of boolean sequences.
//!
//! Layout: `[compact-size length][ceil(length / 8) bytes]`, where bit `k` of byte `i`
//! (least significant first) carries entry `8 * i + k`. Unused high bits of the trailing byte
//! are written as zero and ignored on read.

use bitcoin::consensus::encode::{self, MAX_VEC_SIZE, VarInt};
use bitcoin::consensus::{Decodable, Encodable};
use bitcoin::io::{self, Read, Write};

/// Writes `flags` to `writer`, returning the number of bytes written.
pub fn encode_bool_vec<W: Write + ?Sized>(
    writer: &mut W,
    flags: &[bool],
) -> Result<usize, io::Error> {
    let mut len = VarInt(flags.len() as u64).consensus_encode(writer)?;

    for chunk in flags.chunks(8) {
        let byte = chunk
            .iter()
            .enumerate()
            .fold(0u8, |acc, (bit, &flag)| acc | ((flag as u8) << bit));
        len += byte.consensus_encode(writer)?;
    }

    Ok(len)
}

/// Reads a sequence written by [`encode_bool_vec`].
///
/// Returns the flags together with the number of `false` entries, which callers use as the
/// count of unspent outputs without a second pass.
pub fn decode_bool_vec<R: Read + ?Sized>(
    reader: &mut R,
) -> Result<(Vec<bool>, u64), encode::Error> {
    let VarInt(len) = VarInt::consensus_decode(reader)?;
    let len = usize::try_from(len)
        .map_err(|_| encode::Error::ParseFailed("bool vector length exceeds usize"))?;

    // The length prefix is untrusted, only the payload actually read grows the vector.
    let mut flags = Vec::with_capacity(len.min(MAX_VEC_SIZE));
    let mut trues = 0u64;

    while flags.len() < len {
        let mut byte = u8::consensus_decode(reader)?;
        let take = (len - flags.len()).min(8);
        for _ in 0..take {
            let flag = byte & 1 == 1;
            trues += flag as u64;
            flags.push(flag);
            byte >>= 1;
        }
    }

    Ok((flags, len as u64 - trues))
}
