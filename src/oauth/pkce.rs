use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;
use sha2::{Digest, Sha256};

/// PKCE parameters for the Google authorization-code flow.
#[derive(Debug, Clone)]
pub struct PkceParams {
    pub code_verifier: String,
    pub code_challenge: String,
    pub state: String,
}

pub fn generate_pkce_params() -> PkceParams {
    let code_verifier = generate_code_verifier();
    let code_challenge = generate_code_challenge(&code_verifier);
    let state = generate_state();

    PkceParams { code_verifier, code_challenge, state }
}

fn generate_code_verifier() -> String {
    let mut rng = rand::thread_rng();
    let random_bytes: Vec<u8> = (0..32).map(|_| rng.gen()).collect();
    URL_SAFE_NO_PAD.encode(&random_bytes)
}

fn generate_code_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

fn generate_state() -> String {
    let mut rng = rand::thread_rng();
    let random_bytes: Vec<u8> = (0..16).map(|_| rng.gen()).collect();
    URL_SAFE_NO_PAD.encode(&random_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_are_non_empty_and_unique_per_call() {
        let a = generate_pkce_params();
        let b = generate_pkce_params();
        assert!(!a.code_verifier.is_empty());
        assert_ne!(a.code_verifier, a.code_challenge);
        assert_ne!(a.state, b.state);
    }

    #[test]
    fn challenge_is_deterministic_sha256_of_verifier() {
        let verifier = "test_verifier_12345678901234567890";
        assert_eq!(generate_code_challenge(verifier), generate_code_challenge(verifier));
        let challenge = generate_code_challenge(verifier);
        assert!(!challenge.contains('=') && !challenge.contains('+') && !challenge.contains('/'));
    }
}
