use std::sync::atomic::{AtomicU64, Ordering};

/// Peak level of each channel for one captured block.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LevelPair {
    pub left: f32,
    pub right: f32,
}

impl LevelPair {
    pub const SILENT: LevelPair = LevelPair {
        left: 0.0,
        right: 0.0,
    };

    pub fn new(left: f32, right: f32) -> LevelPair {
        LevelPair { left, right }
    }

    fn pack(self) -> u64 {
        ((self.left.to_bits() as u64) << 32) | self.right.to_bits() as u64
    }

    fn unpack(bits: u64) -> LevelPair {
        LevelPair {
            left: f32::from_bits((bits >> 32) as u32),
            right: f32::from_bits(bits as u32),
        }
    }
}

/// Latest level pair, written by the capture callback and read by the display loop.
///
/// Both channels live in one atomic word so a reader never sees the left level
/// of one block next to the right level of another.
#[derive(Debug)]
pub struct SharedLevels {
    bits: AtomicU64,
}

impl SharedLevels {
    pub fn new() -> SharedLevels {
        SharedLevels {
            bits: AtomicU64::new(LevelPair::SILENT.pack()),
        }
    }

    pub fn store(&self, levels: LevelPair) {
        self.bits.store(levels.pack(), Ordering::Release);
    }

    pub fn load(&self) -> LevelPair {
        LevelPair::unpack(self.bits.load(Ordering::Acquire))
    }
}

impl Default for SharedLevels {
    fn default() -> Self {
        SharedLevels::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn starts_silent() {
        assert_eq!(SharedLevels::new().load(), LevelPair::SILENT);
    }

    #[test]
    fn load_returns_last_store() {
        let shared = SharedLevels::new();
        shared.store(LevelPair::new(0.25, 0.75));
        shared.store(LevelPair::new(1.0, 0.5));
        assert_eq!(shared.load(), LevelPair::new(1.0, 0.5));
    }

    #[test]
    fn readers_never_see_mixed_pairs() {
        let shared = Arc::new(SharedLevels::new());
        let writer = {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || {
                for i in 0..10_000 {
                    let v = if i % 2 == 0 { 0.25 } else { 0.75 };
                    shared.store(LevelPair::new(v, v));
                }
            })
        };

        for _ in 0..10_000 {
            let levels = shared.load();
            assert_eq!(levels.left, levels.right);
        }
        writer.join().unwrap();
    }
}
