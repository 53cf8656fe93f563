//! Code phrases and machine identity.
//!
//! A generated phrase is three words joined by `-`. Only the first word is
//! ever shown to the relay (as the room id), so the remaining words carry
//! the secret.

use rand::seq::SliceRandom;

/// Separator between phrase words
pub const SEPARATOR: char = '-';

/// Word pool for generated phrases. Short, unambiguous, easy to say over
/// the phone.
const WORDS: &[&str] = &[
    "acid", "alloy", "amber", "anchor", "apron", "arrow", "atlas", "badge",
    "bamboo", "barrel", "basil", "beacon", "bell", "birch", "bison", "blade",
    "bloom", "bolt", "border", "brass", "brick", "bridge", "brook", "bucket",
    "butter", "cabin", "cable", "candle", "canyon", "carpet", "cedar", "chalk",
    "cherry", "cliff", "clover", "cobalt", "comet", "copper", "coral", "crane",
    "crater", "cycle", "daisy", "delta", "diesel", "dome", "donkey", "drum",
    "eagle", "ember", "engine", "falcon", "fern", "flint", "fog", "forge",
    "fossil", "fox", "garnet", "giant", "ginger", "glacier", "globe", "grain",
    "granite", "grove", "harbor", "hazel", "heron", "hill", "honey", "husband",
    "index", "iris", "iron", "island", "ivory", "jade", "jigsaw", "juniper",
    "kettle", "kite", "lagoon", "lantern", "ledger", "lemon", "lily", "linen",
    "lobster", "locust", "lunar", "magnet", "maple", "marble", "meadow", "mesa",
    "mint", "mirror", "molar", "mosaic", "moss", "mustard", "nickel", "north",
    "oak", "ocean", "olive", "onyx", "orbit", "otter", "oxide", "panel",
    "parcel", "pearl", "pebble", "pepper", "pigeon", "pillar", "pine", "planet",
    "plaza", "plum", "pocket", "prism", "quartz", "raven", "reef", "ridge",
    "river", "rocket", "rubber", "saddle", "salmon", "sand", "sapphire", "shore",
    "silver", "slate", "sonar", "spark", "spruce", "static", "stone", "summit",
    "syrup", "tiger", "timber", "topaz", "trout", "tulip", "tundra", "turbine",
    "velvet", "violet", "walnut", "wharf", "willow", "zebra", "zinc", "zephyr",
];

/// Generate a fresh three-word code phrase
#[must_use]
pub fn generate_phrase() -> String {
    let mut rng = rand::thread_rng();
    let words: Vec<&str> = (0..3)
        .map(|_| *WORDS.choose(&mut rng).expect("word pool is not empty"))
        .collect();
    words.join(&SEPARATOR.to_string())
}

/// The public room id: everything before the first separator.
///
/// A phrase without a separator routes on the whole phrase, which then
/// carries no secret beyond the room id; generated phrases always have one.
#[must_use]
pub fn room_id(phrase: &str) -> &str {
    phrase.split(SEPARATOR).next().unwrap_or(phrase)
}

/// A stable 6-character machine identifier, shown to the receiving user so
/// they can tell who is offering files.
#[must_use]
pub fn machine_id() -> String {
    let host = std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "skiff".to_string());
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_default();
    let digest = blake3::hash(format!("{host}\n{user}").as_bytes());
    hex::encode(&digest.as_bytes()[..3])
}
