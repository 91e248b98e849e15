//! Compact per-message read state.
//!
//! A [`ReadBitmap`] records which members of a conversation have read a message.
//! Group members are addressed through a hash of their identifier, so the bitmap
//! never needs the member list itself. Direct conversations only ever store the
//! single-byte [`DIRECT_READ_SENTINEL`].

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::domain::errors::BitmapError;

/// Capacity used when no explicit size is requested (2000 bits).
pub const DEFAULT_SIZE_BYTES: usize = 250;

/// Hard ceiling on bitmap size (256 MiB).
pub const MAX_SIZE_BYTES: usize = 1 << 28;

/// Read state stored for a message in a direct conversation once read.
pub const DIRECT_READ_SENTINEL: [u8; 1] = [1];

const HASH_SEED: u32 = 5381;

/// Lock acquisition order for binary operations.
static NEXT_LOCK_ORDER: AtomicU64 = AtomicU64::new(0);

/// Hashes a member identifier with the `hash * 33 + byte` scheme.
#[must_use]
pub fn member_hash(id: &str) -> u32 {
    id.bytes().fold(HASH_SEED, |hash, byte| {
        (hash << 5).wrapping_add(hash).wrapping_add(u32::from(byte))
    })
}

fn hash_position(id: &str, size_bits: usize) -> usize {
    let hash = member_hash(id) as usize;
    if size_bits.is_power_of_two() {
        hash & (size_bits - 1)
    } else {
        hash % size_bits
    }
}

struct BitmapState {
    bits: Vec<u8>,
    version: u32,
}

impl BitmapState {
    fn size_bits(&self) -> usize {
        self.bits.len() * 8
    }

    fn check(&self, position: usize) -> Result<(usize, u8), BitmapError> {
        if position >= self.size_bits() {
            return Err(BitmapError::out_of_range(position, self.size_bits()));
        }
        Ok((position / 8, 1 << (position % 8)))
    }

    fn set(&mut self, position: usize) -> Result<(), BitmapError> {
        let (byte, mask) = self.check(position)?;
        self.bits[byte] |= mask;
        Ok(())
    }

    fn clear(&mut self, position: usize) -> Result<(), BitmapError> {
        let (byte, mask) = self.check(position)?;
        self.bits[byte] &= !mask;
        Ok(())
    }

    fn is_set(&self, position: usize) -> Result<bool, BitmapError> {
        let (byte, mask) = self.check(position)?;
        Ok(self.bits[byte] & mask != 0)
    }
}

/// Thread-safe, resizable bit vector.
pub struct ReadBitmap {
    lock_order: u64,
    state: RwLock<BitmapState>,
}

impl ReadBitmap {
    /// Creates a zeroed bitmap of `size_bytes` bytes; `0` selects
    /// [`DEFAULT_SIZE_BYTES`].
    ///
    /// # Errors
    ///
    /// Returns `BitmapError::InvalidSize` above [`MAX_SIZE_BYTES`].
    pub fn new(size_bytes: usize) -> Result<Self, BitmapError> {
        let size_bytes = if size_bytes == 0 {
            DEFAULT_SIZE_BYTES
        } else {
            size_bytes
        };
        if size_bytes > MAX_SIZE_BYTES {
            return Err(BitmapError::invalid_size(size_bytes, MAX_SIZE_BYTES));
        }
        Ok(Self::from_bits(vec![0; size_bytes]))
    }

    /// Wraps persisted read state. The vector is taken over as-is, so the
    /// capacity is exactly `8 * bytes.len()` bits. Empty input yields a fresh
    /// default-sized bitmap.
    ///
    /// # Errors
    ///
    /// Returns `BitmapError::InvalidSize` above [`MAX_SIZE_BYTES`].
    pub fn load(bytes: Vec<u8>) -> Result<Self, BitmapError> {
        if bytes.is_empty() {
            return Self::new(0);
        }
        if bytes.len() > MAX_SIZE_BYTES {
            return Err(BitmapError::invalid_size(bytes.len(), MAX_SIZE_BYTES));
        }
        Ok(Self::from_bits(bytes))
    }

    fn from_bits(bits: Vec<u8>) -> Self {
        Self {
            lock_order: NEXT_LOCK_ORDER.fetch_add(1, Ordering::Relaxed),
            state: RwLock::new(BitmapState { bits, version: 1 }),
        }
    }

    /// Marks the member `id` as having read.
    ///
    /// # Errors
    ///
    /// Never fails for a well-formed bitmap; the error is kept for parity with
    /// positional access.
    pub fn set_by_hash(&self, id: &str) -> Result<(), BitmapError> {
        let mut state = self.state.write();
        let position = hash_position(id, state.size_bits());
        state.set(position)
    }

    /// Returns whether the member `id` is marked.
    ///
    /// # Errors
    ///
    /// See [`ReadBitmap::set_by_hash`].
    pub fn is_set_by_hash(&self, id: &str) -> Result<bool, BitmapError> {
        let state = self.state.read();
        state.is_set(hash_position(id, state.size_bits()))
    }

    /// Unmarks the member `id`.
    ///
    /// # Errors
    ///
    /// See [`ReadBitmap::set_by_hash`].
    pub fn clear_by_hash(&self, id: &str) -> Result<(), BitmapError> {
        let mut state = self.state.write();
        let position = hash_position(id, state.size_bits());
        state.clear(position)
    }

    /// Sets the bit at `position`.
    ///
    /// # Errors
    ///
    /// Returns `BitmapError::IndexOutOfRange` outside `[0, size_bits)`.
    pub fn set_bit(&self, position: usize) -> Result<(), BitmapError> {
        self.state.write().set(position)
    }

    /// Clears the bit at `position`.
    ///
    /// # Errors
    ///
    /// Returns `BitmapError::IndexOutOfRange` outside `[0, size_bits)`.
    pub fn clear_bit(&self, position: usize) -> Result<(), BitmapError> {
        self.state.write().clear(position)
    }

    /// Returns whether the bit at `position` is set.
    ///
    /// # Errors
    ///
    /// Returns `BitmapError::IndexOutOfRange` outside `[0, size_bits)`.
    pub fn is_bit_set(&self, position: usize) -> Result<bool, BitmapError> {
        self.state.read().is_set(position)
    }

    /// Clears every bit, keeping the capacity.
    pub fn reset(&self) {
        self.state.write().bits.fill(0);
    }

    /// Number of set bits.
    #[must_use]
    pub fn count(&self) -> usize {
        let state = self.state.read();
        let mut count = 0;
        for &byte in &state.bits {
            let mut byte = byte;
            while byte != 0 {
                byte &= byte - 1;
                count += 1;
            }
        }
        count
    }

    /// Reallocates to `new_size_bytes`, keeping the common prefix and
    /// zero-filling any growth.
    ///
    /// # Errors
    ///
    /// Returns `BitmapError::InvalidSize` for zero or above [`MAX_SIZE_BYTES`].
    pub fn resize(&self, new_size_bytes: usize) -> Result<(), BitmapError> {
        if new_size_bytes == 0 || new_size_bytes > MAX_SIZE_BYTES {
            return Err(BitmapError::invalid_size(new_size_bytes, MAX_SIZE_BYTES));
        }

        let mut state = self.state.write();
        if state.bits.len() == new_size_bytes {
            return Ok(());
        }

        let mut bits = vec![0; new_size_bytes];
        let keep = state.bits.len().min(new_size_bytes);
        bits[..keep].copy_from_slice(&state.bits[..keep]);
        state.bits = bits;
        state.version = state.version.wrapping_add(1);
        Ok(())
    }

    /// Bitwise AND into a new bitmap.
    ///
    /// # Errors
    ///
    /// Returns `BitmapError::SizeMismatch` if the bit lengths differ.
    pub fn and(&self, other: &Self) -> Result<Self, BitmapError> {
        self.combine(other, |a, b| a & b)
    }

    /// Bitwise OR into a new bitmap.
    ///
    /// # Errors
    ///
    /// Returns `BitmapError::SizeMismatch` if the bit lengths differ.
    pub fn or(&self, other: &Self) -> Result<Self, BitmapError> {
        self.combine(other, |a, b| a | b)
    }

    fn combine(&self, other: &Self, op: impl Fn(u8, u8) -> u8) -> Result<Self, BitmapError> {
        if std::ptr::eq(self, other) {
            let state = self.state.read();
            return Ok(Self::from_bits(
                state.bits.iter().map(|&b| op(b, b)).collect(),
            ));
        }

        let self_first = self.lock_order < other.lock_order;
        let (first, second) = if self_first {
            (self, other)
        } else {
            (other, self)
        };
        let first_guard = first.state.read();
        let second_guard = second.state.read();
        let (lhs, rhs) = if self_first {
            (&*first_guard, &*second_guard)
        } else {
            (&*second_guard, &*first_guard)
        };

        if lhs.bits.len() != rhs.bits.len() {
            return Err(BitmapError::SizeMismatch {
                left: lhs.size_bits(),
                right: rhs.size_bits(),
            });
        }

        Ok(Self::from_bits(
            lhs.bits
                .iter()
                .zip(&rhs.bits)
                .map(|(&a, &b)| op(a, b))
                .collect(),
        ))
    }

    /// Copy of the backing bytes.
    #[must_use]
    pub fn export(&self) -> Vec<u8> {
        self.state.read().bits.clone()
    }

    /// Capacity in bits.
    #[must_use]
    pub fn size_bits(&self) -> usize {
        self.state.read().size_bits()
    }

    /// Capacity in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.state.read().bits.len()
    }

    /// Incremented on every effective resize.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.state.read().version
    }
}

impl Clone for ReadBitmap {
    fn clone(&self) -> Self {
        let state = self.state.read();
        let copy = Self::from_bits(state.bits.clone());
        copy.state.write().version = state.version;
        copy
    }
}

impl std::fmt::Debug for ReadBitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("ReadBitmap")
            .field("size_bits", &state.size_bits())
            .field("version", &state.version)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use test_case::test_case;
    use tokio_test::{assert_err, assert_ok};

    fn bitmap_where(size_bytes: usize, predicate: impl Fn(usize) -> bool) -> ReadBitmap {
        let bitmap = ReadBitmap::new(size_bytes).unwrap();
        for position in (0..bitmap.size_bits()).filter(|&p| predicate(p)) {
            bitmap.set_bit(position).unwrap();
        }
        bitmap
    }

    #[test_case(0, DEFAULT_SIZE_BYTES ; "zero_uses_default")]
    #[test_case(1, 1 ; "single_byte")]
    #[test_case(100, 100 ; "explicit")]
    fn test_new_sizes(requested: usize, expected_bytes: usize) {
        let bitmap = ReadBitmap::new(requested).unwrap();
        assert_eq!(bitmap.size_bytes(), expected_bytes);
        assert_eq!(bitmap.size_bits(), expected_bytes * 8);
        assert_eq!(bitmap.version(), 1);
    }

    #[test]
    fn test_new_rejects_oversized() {
        assert_eq!(
            ReadBitmap::new(MAX_SIZE_BYTES + 1).unwrap_err(),
            BitmapError::invalid_size(MAX_SIZE_BYTES + 1, MAX_SIZE_BYTES)
        );
    }

    #[test_case(vec![1] ; "direct_sentinel")]
    #[test_case(vec![0b1010_0101, 0, 0xff] ; "mixed")]
    #[test_case(vec![0; 250] ; "default_sized")]
    fn test_load_export_round_trip(bytes: Vec<u8>) {
        let bitmap = ReadBitmap::load(bytes.clone()).unwrap();
        assert_eq!(bitmap.export(), bytes);
        assert_eq!(bitmap.size_bits(), bytes.len() * 8);
    }

    #[test]
    fn test_load_empty_is_default_capacity() {
        let bitmap = ReadBitmap::load(Vec::new()).unwrap();
        assert_eq!(bitmap.size_bytes(), DEFAULT_SIZE_BYTES);
        assert_eq!(bitmap.count(), 0);
    }

    #[test]
    fn test_export_is_a_copy() {
        let bitmap = ReadBitmap::new(4).unwrap();
        let mut exported = bitmap.export();
        exported[0] = 0xff;
        assert_eq!(bitmap.count(), 0);
    }

    #[test]
    fn test_set_bit_is_idempotent() {
        let bitmap = ReadBitmap::new(8).unwrap();
        bitmap.set_bit(13).unwrap();
        bitmap.set_bit(13).unwrap();

        assert!(bitmap.is_bit_set(13).unwrap());
        assert_eq!(bitmap.count(), 1);
    }

    #[test]
    fn test_clear_bit() {
        let bitmap = ReadBitmap::new(2).unwrap();
        bitmap.set_bit(9).unwrap();
        bitmap.clear_bit(9).unwrap();
        assert!(!bitmap.is_bit_set(9).unwrap());
    }

    #[test_case(16 ; "first_outside")]
    #[test_case(usize::MAX ; "far_outside")]
    fn test_positional_access_out_of_range(position: usize) {
        let bitmap = ReadBitmap::new(2).unwrap();
        let expected = BitmapError::out_of_range(position, 16);
        assert_eq!(bitmap.set_bit(position).unwrap_err(), expected);
        assert_eq!(bitmap.clear_bit(position).unwrap_err(), expected);
        assert_eq!(bitmap.is_bit_set(position).unwrap_err(), expected);
    }

    #[test]
    fn test_set_by_hash() {
        let bitmap = ReadBitmap::new(0).unwrap();
        assert!(!bitmap.is_set_by_hash("alice").unwrap());

        bitmap.set_by_hash("alice").unwrap();
        assert!(bitmap.is_set_by_hash("alice").unwrap());
        assert_eq!(bitmap.count(), 1);

        bitmap.clear_by_hash("alice").unwrap();
        assert!(!bitmap.is_set_by_hash("alice").unwrap());
    }

    #[test]
    fn test_hash_masks_power_of_two_capacity() {
        let bitmap = ReadBitmap::new(256).unwrap();
        bitmap.set_by_hash("member-42").unwrap();

        let expected = member_hash("member-42") as usize & (2048 - 1);
        assert!(bitmap.is_bit_set(expected).unwrap());
    }

    #[test]
    fn test_hash_falls_back_to_modulo() {
        let bitmap = ReadBitmap::new(DEFAULT_SIZE_BYTES).unwrap();
        bitmap.set_by_hash("member-42").unwrap();

        let expected = member_hash("member-42") as usize % 2000;
        assert!(bitmap.is_bit_set(expected).unwrap());
    }

    #[test]
    fn test_member_hash_known_values() {
        assert_eq!(member_hash(""), 5381);
        assert_eq!(member_hash("a"), 5381 * 33 + 97);
    }

    #[test]
    fn test_hash_distribution() {
        let size_bits = 800;
        let mut buckets = [0usize; 10];
        for i in 0..1000 {
            let position = hash_position(&format!("user-{i}"), size_bits);
            buckets[position / (size_bits / 10)] += 1;
        }

        for (bucket, hits) in buckets.iter().enumerate() {
            assert!(
                (50..=150).contains(hits),
                "bucket {bucket} received {hits} of 1000 ids"
            );
        }
    }

    #[test]
    fn test_count() {
        let bitmap = ReadBitmap::load(vec![0xff, 0b0001_0001, 0]).unwrap();
        assert_eq!(bitmap.count(), 10);

        bitmap.reset();
        assert_eq!(bitmap.count(), 0);
        assert_eq!(bitmap.size_bytes(), 3);
    }

    #[test]
    fn test_and_or_algebra() {
        let evens = bitmap_where(100, |p| p % 2 == 0);
        let threes = bitmap_where(100, |p| p % 3 == 0);

        let and = evens.and(&threes).unwrap();
        let or = evens.or(&threes).unwrap();

        for position in 0..800 {
            assert_eq!(and.is_bit_set(position).unwrap(), position % 6 == 0);
            assert_eq!(
                or.is_bit_set(position).unwrap(),
                position % 2 == 0 || position % 3 == 0
            );
        }

        assert_eq!(evens.count(), 400);
        assert_eq!(threes.count(), 267);
    }

    #[test]
    fn test_binary_ops_reject_size_mismatch() {
        let small = ReadBitmap::new(10).unwrap();
        let large = ReadBitmap::new(20).unwrap();

        let expected = BitmapError::SizeMismatch {
            left: 80,
            right: 160,
        };
        assert_eq!(small.and(&large).unwrap_err(), expected);
        assert_eq!(small.or(&large).unwrap_err(), expected);
    }

    #[test]
    fn test_binary_op_with_itself() {
        let bitmap = bitmap_where(4, |p| p % 5 == 0);
        let same = assert_ok!(bitmap.and(&bitmap));
        assert_eq!(same.export(), bitmap.export());
    }

    #[test]
    fn test_concurrent_opposite_binary_ops() {
        let a = Arc::new(bitmap_where(64, |p| p % 2 == 0));
        let b = Arc::new(bitmap_where(64, |p| p % 3 == 0));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let (a, b) = (a.clone(), b.clone());
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        if i % 2 == 0 {
                            a.and(&b).unwrap();
                        } else {
                            b.or(&a).unwrap();
                        }
                        a.set_bit(i).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_resize_grow_preserves_prefix() {
        let bitmap = bitmap_where(2, |p| p % 3 == 0);
        let before = bitmap.export();

        bitmap.resize(4).unwrap();

        assert_eq!(bitmap.size_bits(), 32);
        assert_eq!(bitmap.version(), 2);
        assert_eq!(&bitmap.export()[..2], &before[..]);
        assert_eq!(&bitmap.export()[2..], &[0, 0]);
        for position in (0..16).filter(|p| p % 3 == 0) {
            assert!(bitmap.is_bit_set(position).unwrap());
        }
    }

    #[test]
    fn test_resize_shrink_truncates() {
        let bitmap = bitmap_where(4, |_| true);
        bitmap.resize(1).unwrap();

        assert_eq!(bitmap.count(), 8);
        assert_eq!(
            bitmap.is_bit_set(8).unwrap_err(),
            BitmapError::out_of_range(8, 8)
        );
    }

    #[test]
    fn test_resize_same_size_is_noop() {
        let bitmap = ReadBitmap::new(4).unwrap();
        bitmap.resize(4).unwrap();
        assert_eq!(bitmap.version(), 1);
    }

    #[test_case(0 ; "zero")]
    #[test_case(MAX_SIZE_BYTES + 1 ; "above_ceiling")]
    fn test_resize_rejects_invalid(size: usize) {
        let bitmap = ReadBitmap::new(4).unwrap();
        assert_err!(bitmap.resize(size));
        assert_eq!(bitmap.size_bytes(), 4);
    }

    #[test]
    fn test_clone_is_independent() {
        let original = ReadBitmap::new(2).unwrap();
        let copy = original.clone();
        copy.set_bit(1).unwrap();

        assert!(!original.is_bit_set(1).unwrap());
        assert!(copy.is_bit_set(1).unwrap());
    }
}
