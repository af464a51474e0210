//! # Identifier Generation
//!
//! Identifiers have the form `<prefix><adjective>-<noun>-<number>`, e.g.
//! `c-quiet-harbor-4821`. They must stay within the DNS label limit of 63
//! characters. Uniqueness is best effort; collisions are rejected by the
//! resource store on create.

use crate::constants::{MAX_ID_GENERATION_ATTEMPTS, MAX_ID_LENGTH};
use rand::seq::IndexedRandom;
use rand::Rng;
use thiserror::Error;

const ADJECTIVES: &[&str] = &[
    "amber", "ancient", "autumn", "billowing", "bitter", "black", "blue", "bold", "brave",
    "brisk", "calm", "cold", "cool", "crimson", "damp", "dark", "dawn", "delicate", "divine",
    "dry", "empty", "falling", "fancy", "floral", "fragrant", "frosty", "gentle", "green",
    "hidden", "holy", "icy", "jolly", "late", "lingering", "little", "lively", "long", "lucky",
    "misty", "morning", "muddy", "mute", "nameless", "noisy", "odd", "old", "orange", "patient",
    "plain", "polished", "proud", "purple", "quiet", "rapid", "raspy", "red", "restless",
    "rough", "round", "royal", "shiny", "shy", "silent", "small", "snowy", "soft", "solitary",
    "sparkling", "spring", "square", "steep", "still", "summer", "super", "sweet", "throbbing",
    "tight", "tiny", "twilight", "wandering", "weathered", "white", "wild", "winter", "wispy",
    "withered", "yellow", "young",
];

const NOUNS: &[&str] = &[
    "art", "band", "bar", "base", "bird", "block", "boat", "bonus", "bread", "breeze", "brook",
    "bush", "butterfly", "cake", "cell", "cherry", "cloud", "credit", "darkness", "dawn", "dew",
    "disk", "dream", "dust", "feather", "field", "fire", "firefly", "flower", "fog", "forest",
    "frog", "frost", "glade", "glitter", "grass", "hall", "hat", "haze", "heart", "hill",
    "king", "lab", "lake", "leaf", "limit", "math", "meadow", "mode", "moon", "morning",
    "mountain", "mouse", "mud", "night", "paper", "pine", "poetry", "pond", "queen", "rain",
    "recipe", "resonance", "rice", "river", "salad", "scene", "sea", "shadow", "shape",
    "silence", "sky", "smoke", "snow", "snowflake", "sound", "star", "sun", "sunset", "surf",
    "term", "thunder", "tooth", "tree", "truth", "union", "unit", "violet", "voice", "water",
    "waterfall", "wave", "wildflower", "wind", "wood",
];

/// Upper bound (exclusive) of the numeric suffix
const NUMBER_RANGE: u32 = 10_000;

/// No generated identifier fit the length limit
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unable to generate an identifier with prefix '{prefix}' within {attempts} attempts")]
pub struct GenerationExhausted {
    pub prefix: String,
    pub attempts: usize,
}

/// Identifier that cannot be used as a resource name
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid identifier '{id}': must be a lowercase DNS label of at most {MAX_ID_LENGTH} characters")]
pub struct InvalidId {
    pub id: String,
}

/// Generate a new identifier with the given type prefix.
///
/// # Errors
///
/// Returns [`GenerationExhausted`] if no candidate fits into 63 characters.
pub fn generate_id(prefix: &str) -> Result<String, GenerationExhausted> {
    generate_id_with(prefix, &mut rand::rng(), MAX_ID_LENGTH)
}

/// Generate an identifier using the given random source and length limit.
///
/// # Errors
///
/// Returns [`GenerationExhausted`] after [`MAX_ID_GENERATION_ATTEMPTS`] candidates
/// exceeded `max_len`.
pub fn generate_id_with<R: Rng + ?Sized>(
    prefix: &str,
    rng: &mut R,
    max_len: usize,
) -> Result<String, GenerationExhausted> {
    for _ in 0..MAX_ID_GENERATION_ATTEMPTS {
        let id = format!("{prefix}{}", slug(rng));
        if id.len() <= max_len {
            return Ok(id);
        }
    }
    Err(GenerationExhausted {
        prefix: prefix.to_string(),
        attempts: MAX_ID_GENERATION_ATTEMPTS,
    })
}

fn slug<R: Rng + ?Sized>(rng: &mut R) -> String {
    let adjective = ADJECTIVES.choose(rng).copied().unwrap_or("plain");
    let noun = NOUNS.choose(rng).copied().unwrap_or("field");
    let number = rng.random_range(0..NUMBER_RANGE);
    format!("{adjective}-{noun}-{number}")
}

/// Apply identifier defaulting on creation.
///
/// An empty identifier is generated, one missing the type prefix gets it
/// prepended, anything else is kept as is.
///
/// # Errors
///
/// Returns [`GenerationExhausted`] if a new identifier had to be generated and
/// generation failed.
pub fn normalize_id(id: &str, prefix: &str) -> Result<String, GenerationExhausted> {
    if id.is_empty() {
        generate_id(prefix)
    } else if id.starts_with(prefix) {
        Ok(id.to_string())
    } else {
        Ok(format!("{prefix}{id}"))
    }
}

/// Check that an identifier is a valid DNS label.
///
/// # Errors
///
/// Returns [`InvalidId`] if the identifier is empty, longer than 63
/// characters, contains anything but lowercase letters, digits and `-`, or
/// starts or ends with `-`.
pub fn validate_id(id: &str) -> Result<(), InvalidId> {
    let valid = !id.is_empty()
        && id.len() <= MAX_ID_LENGTH
        && id
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        && !id.starts_with('-')
        && !id.ends_with('-');
    if valid {
        Ok(())
    } else {
        Err(InvalidId { id: id.to_string() })
    }
}
