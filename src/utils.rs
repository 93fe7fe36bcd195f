use rand::Rng;

const ICE_SCHEMES: [&str; 4] = ["stun:", "stuns:", "turn:", "turns:"];

pub fn random_id() -> String {
    hex::encode(rand::rng().random::<[u8; 8]>())
}

// Adds `scheme` to an ICE server address that has none
pub fn add_ice_url_scheme(url: &str, scheme: &str) -> String {
    if url.is_empty() || ICE_SCHEMES.iter().any(|s| url.starts_with(s)) {
        url.to_owned()
    } else {
        format!("{scheme}{url}")
    }
}
