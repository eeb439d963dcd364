//! Environment abstraction for time and randomness.
//!
//! All routing logic reads the clock and the RNG through this trait, so
//! tests can inject a fixed clock and a deterministic id source while
//! production uses system time and the OS RNG.

/// Source of wall-clock time and randomness.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current wall-clock time as Unix milliseconds.
    ///
    /// This is the timestamp stamped onto messages and presence events, and
    /// the sole ordering key within a room.
    fn wall_clock_millis(&self) -> u64;

    /// Fill `buffer` with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// A random 128-bit value, used for server-issued identifiers.
    fn random_u128(&self) -> u128 {
        let mut buf = [0u8; 16];
        self.random_bytes(&mut buf);
        u128::from_le_bytes(buf)
    }
}
