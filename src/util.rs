use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use md5::{Digest, Md5};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Picks a pseudo-random starting point for a new connection's sequence
/// space. Distinct per session so stale datagrams from a previous run are
/// unlikely to land inside the live window.
pub fn initial_seq() -> u32 {
    rand::thread_rng().gen_range(1000..1_001_000)
}

/// MD5 digest of a whole file as lowercase hex, for end-to-end comparison
/// against the sender's copy. Diagnostic fingerprinting only.
pub fn file_md5(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    let mut buf = [0u8; 4096];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Test hook that elects to drop inbound data frames with a fixed
/// probability, standing in for a lossy network on loopback links.
#[derive(Debug)]
pub struct LossSim {
    rate: f32,
    rng: StdRng,
}

impl LossSim {
    pub fn new(rate: f32) -> Self {
        LossSim {
            rate,
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic decision stream for reproducible tests.
    pub fn seeded(rate: f32, seed: u64) -> Self {
        LossSim {
            rate,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn should_drop(&mut self) -> bool {
        self.rate > 0.0 && self.rng.gen::<f32>() < self.rate
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn md5_of_known_bytes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello\n").unwrap();

        let digest = file_md5(file.path()).unwrap();
        assert_eq!(digest, "b1946ac92492d2347c6235b4d2611184");
    }

    #[test]
    fn initial_seq_stays_in_range() {
        for _ in 0..1000 {
            let isn = initial_seq();
            assert!((1000..1_001_000).contains(&isn));
        }
    }

    #[test]
    fn zero_rate_never_drops() {
        let mut sim = LossSim::seeded(0.0, 7);
        assert!((0..1000).all(|_| !sim.should_drop()));
    }

    #[test]
    fn full_rate_always_drops() {
        let mut sim = LossSim::seeded(1.0, 7);
        assert!((0..1000).all(|_| sim.should_drop()));
    }

    #[test]
    fn seeded_streams_are_reproducible() {
        let mut a = LossSim::seeded(0.3, 42);
        let mut b = LossSim::seeded(0.3, 42);
        let decisions_a: Vec<bool> = (0..100).map(|_| a.should_drop()).collect();
        let decisions_b: Vec<bool> = (0..100).map(|_| b.should_drop()).collect();
        assert_eq!(decisions_a, decisions_b);
    }
}
