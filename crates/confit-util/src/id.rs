use rand::Rng;

const TOKEN_LEN: usize = 12;
const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Generate a random lowercase alphanumeric token.
///
/// Used to derive temporary artifact names that never collide with a
/// previously loaded path, since module loaders typically cache by path.
#[must_use]
pub fn random_token() -> String {
    let mut rng = rand::thread_rng();
    (0..TOKEN_LEN)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}
