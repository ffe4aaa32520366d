// codec.rs — Signal packing and scaling primitives
//
// Bit-level pack/unpack of signal raw values into a message payload, plus the
// affine encode/decode between raw and physical values. These mirror the
// functions the database's C codec exposes to generated blocks, so the
// reference interpreter (`sim`) behaves like the emitted C.
//
// Preconditions: signals come from a loaded catalog.
// Postconditions: `unpack(pack(raws))` returns the raws truncated to each
//   signal's width (sign-extended for signed signals).
// Failure modes: none. Bits that fall outside the payload are dropped on
//   pack and read as zero on unpack.
// Side effects: none.

use crate::catalog::{ByteOrder, MessageDescriptor, SignalDescriptor};

/// Absolute payload bit positions of a signal, listed from the raw value's
/// least significant bit upward.
fn bit_positions(sig: &SignalDescriptor) -> Vec<u32> {
    let len = sig.bit_length;
    match sig.byte_order {
        ByteOrder::LittleEndian => (0..len).map(|i| sig.start_bit + i).collect(),
        ByteOrder::BigEndian => {
            // Start bit is the MSB; walk toward the LSB in sawtooth order.
            let mut msb_first = Vec::with_capacity(len as usize);
            let mut pos = sig.start_bit;
            for _ in 0..len {
                msb_first.push(pos);
                pos = if pos % 8 == 0 { pos + 15 } else { pos - 1 };
            }
            msb_first.reverse();
            msb_first
        }
    }
}

fn width_mask(bit_length: u32) -> u64 {
    if bit_length >= 64 {
        u64::MAX
    } else {
        (1u64 << bit_length) - 1
    }
}

/// Write one signal's raw value into `data`.
pub fn insert_raw(data: &mut [u8], sig: &SignalDescriptor, raw: i64) {
    let bits = raw as u64 & width_mask(sig.bit_length);
    for (i, pos) in bit_positions(sig).into_iter().enumerate() {
        let byte = (pos / 8) as usize;
        let Some(slot) = data.get_mut(byte) else {
            continue;
        };
        let mask = 1u8 << (pos % 8);
        if bits.checked_shr(i as u32).unwrap_or(0) & 1 == 1 {
            *slot |= mask;
        } else {
            *slot &= !mask;
        }
    }
}

/// Read one signal's raw value from `data`, sign-extending signed signals.
pub fn extract_raw(data: &[u8], sig: &SignalDescriptor) -> i64 {
    let mut bits = 0u64;
    for (i, pos) in bit_positions(sig).into_iter().enumerate() {
        let byte = (pos / 8) as usize;
        if let (Some(b), true) = (data.get(byte), i < 64) {
            if (b >> (pos % 8)) & 1 == 1 {
                bits |= 1u64 << i;
            }
        }
    }
    let len = sig.bit_length;
    if sig.is_signed && len > 0 && len < 64 && (bits >> (len - 1)) & 1 == 1 {
        bits |= !width_mask(len);
    }
    bits as i64
}

/// Pack raw values (one per signal, in signal order) into a payload of
/// `length` bytes.
pub fn pack(message: &MessageDescriptor, raws: &[i64], length: usize) -> Vec<u8> {
    let mut data = vec![0u8; length];
    for (sig, &raw) in message.signals.iter().zip(raws) {
        insert_raw(&mut data, sig, raw);
    }
    data
}

/// Unpack every signal of `message` from `data`, in signal order.
pub fn unpack(message: &MessageDescriptor, data: &[u8], length: usize) -> Vec<i64> {
    let data = &data[..length.min(data.len())];
    message
        .signals
        .iter()
        .map(|sig| extract_raw(data, sig))
        .collect()
}

/// Physical value to raw value: `(value - offset) / scale`, truncated toward
/// zero like a C integer cast.
pub fn encode(sig: &SignalDescriptor, value: f64) -> i64 {
    ((value - sig.offset) / sig.scale) as i64
}

/// Raw value to physical value: `raw * scale + offset`.
pub fn decode(sig: &SignalDescriptor, raw: i64) -> f64 {
    raw as f64 * sig.scale + sig.offset
}
