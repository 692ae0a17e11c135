//! Typed value slots backing the pairing channel's remote-readable and
//! remote-writable fields.
//!
//! Each [`Slot`] guards its value with its own mutex, so a remote write and
//! a worker read of the same field never tear.  Reads of *different* slots
//! are independent: reading `x`, `y` and `speed` one after the other may mix
//! old and new values, which is fine for inputs that are re-read on every
//! control iteration.

use parking_lot::Mutex;

/// One typed field with optional `[min, max]` clamping.
#[derive(Debug)]
pub struct Slot<T> {
    value: Mutex<T>,
    bounds: Option<(T, T)>,
}

impl<T> Slot<T>
where
    T: Clone + PartialOrd + Default,
{
    /// An unbounded slot holding `initial`.
    pub fn new(initial: T) -> Self {
        Self {
            value: Mutex::new(initial),
            bounds: None,
        }
    }

    /// A slot whose value is clamped to `[min, max]` on construction and on
    /// every [`set`][Self::set].  Reversed bounds are swapped.
    pub fn bounded(initial: T, min: T, max: T) -> Self {
        let bounds = if min <= max { (min, max) } else { (max, min) };
        let initial = clamp(initial, &bounds);
        Self {
            value: Mutex::new(initial),
            bounds: Some(bounds),
        }
    }

    pub fn get(&self) -> T {
        self.value.lock().clone()
    }

    pub fn set(&self, value: T) {
        let value = self.clamped(value);
        *self.value.lock() = value;
    }

    /// Store `value` and return the previous one in a single critical
    /// section.
    pub fn replace(&self, value: T) -> T {
        let value = self.clamped(value);
        std::mem::replace(&mut *self.value.lock(), value)
    }

    /// Reset to `T::default()` (clamped).
    pub fn clear(&self) {
        self.set(T::default());
    }

    pub fn bounds(&self) -> Option<&(T, T)> {
        self.bounds.as_ref()
    }

    fn clamped(&self, value: T) -> T {
        match &self.bounds {
            Some(bounds) => clamp(value, bounds),
            None => value,
        }
    }
}

fn clamp<T: Clone + PartialOrd>(value: T, (min, max): &(T, T)) -> T {
    if value < *min {
        min.clone()
    } else if value > *max {
        max.clone()
    } else {
        value
    }
}

/// Byte encoding of a slot value on the pairing link.
pub trait SlotCodec: Sized {
    /// Decode a remote write.  `None` when the payload carries no value.
    fn decode(payload: &[u8]) -> Option<Self>;

    fn encode(&self) -> Vec<u8>;
}

impl SlotCodec for String {
    fn decode(payload: &[u8]) -> Option<Self> {
        if payload.is_empty() {
            return None;
        }
        Some(String::from_utf8_lossy(payload).into_owned())
    }

    fn encode(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

impl SlotCodec for bool {
    fn decode(payload: &[u8]) -> Option<Self> {
        payload.first().map(|b| *b != 0)
    }

    fn encode(&self) -> Vec<u8> {
        vec![u8::from(*self)]
    }
}

impl SlotCodec for i8 {
    /// The first byte, reinterpreted as two's complement.
    fn decode(payload: &[u8]) -> Option<Self> {
        payload.first().map(|b| *b as i8)
    }

    fn encode(&self) -> Vec<u8> {
        vec![*self as u8]
    }
}

impl SlotCodec for f32 {
    /// Little-endian IEEE-754.
    fn decode(payload: &[u8]) -> Option<Self> {
        let bytes: [u8; 4] = payload.get(..4)?.try_into().ok()?;
        Some(f32::from_le_bytes(bytes))
    }

    fn encode(&self) -> Vec<u8> {
        self.to_le_bytes().to_vec()
    }
}
