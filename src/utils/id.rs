use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const ADJECTIVES: [&str; 50] = [
    "happy", "brave", "calm", "bright", "gentle", "swift", "wise", "kind", "bold", "clever",
    "quick", "quiet", "light", "soft", "warm", "cool", "fresh", "lucky", "strong", "sweet",
    "shiny", "fast", "smooth", "neat", "smart", "funny", "silly", "safe", "brisk", "clear",
    "fair", "cute", "faint", "firm", "fine", "gold", "green", "blue", "red", "pure",
    "proud", "loyal", "free", "eager", "tiny", "young", "rich", "jolly", "merry", "noble",
];

const NOUNS: [&str; 50] = [
    "cat", "dog", "fox", "wolf", "bear", "lion", "owl", "hawk", "tiger", "deer",
    "fish", "frog", "duck", "bat", "ant", "bee", "cow", "pig", "hen", "rat",
    "tree", "leaf", "rock", "hill", "star", "moon", "sun", "cloud", "rain", "wave",
    "river", "pond", "lake", "sand", "wind", "fire", "ice", "snow", "path", "field",
    "boat", "car", "bike", "rope", "door", "key", "lamp", "ring", "book", "coin",
];

const PUBLIC_TOKEN_LENGTH: usize = 6;

/// Generate an alphanumeric (base-36) ID, n characters long
pub fn gen_id<R: Rng + ?Sized>(rng: &mut R, length: usize) -> String {
    let chars: Vec<char> = "abcdefghijklmnopqrstuvwxyz0123456789".chars().collect();

    (0..length)
        .map(|_| chars[rng.gen_range(0..chars.len())])
        .collect()
}

/// Source of clip identifiers. Seed it to get a reproducible sequence.
pub struct IdGenerator {
    rng: Mutex<StdRng>,
}

impl IdGenerator {
    pub fn from_entropy() -> Self {
        IdGenerator {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        IdGenerator {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// `adjective-noun-number`, e.g. `happy-fox-17`
    pub fn phrase_id(&self) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let adjective = ADJECTIVES.choose(&mut *rng).copied().unwrap_or(ADJECTIVES[0]);
        let noun = NOUNS.choose(&mut *rng).copied().unwrap_or(NOUNS[0]);
        let number = rng.gen_range(0..100);
        format!("{}-{}-{}", adjective, noun, number)
    }

    /// `pub_<epoch ms>_<token>`
    pub fn public_id(&self, now_ms: i64) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        format!("pub_{}_{}", now_ms, gen_id(&mut *rng, PUBLIC_TOKEN_LENGTH))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::from_entropy()
    }
}
