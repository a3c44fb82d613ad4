use rand::{distributions::Alphanumeric, Rng};

/// Lowercase alphanumeric string of `len` characters from the thread RNG.
pub fn lowercase_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(|byte| char::from(byte).to_ascii_lowercase())
        .collect()
}

/// Mixed-case alphanumeric string of `len` characters.
pub fn token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
