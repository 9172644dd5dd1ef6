//! Tool-call id minting and stateless extraction (spec §4.2.3/§4.2.4):
//! `<name>-<8hex>`, with `ExtractFunctionName` round-tripping the name by
//! splitting on the last `-` and validating an 8-hex suffix.

use rand::Rng;

/// Mints a tool-use id of the form `<name>-<8hex>`.
pub fn generate_tool_use_id(name: &str) -> String {
    let suffix: u32 = rand::thread_rng().gen();
    format!("{}-{:08x}", name, suffix)
}

/// `ExtractFunctionName(GenerateToolUseID(n)) == n` for every non-empty `n`:
/// splits on the last `-` and validates an 8-hex suffix; if the suffix isn't
/// exactly 8 hex chars, the id is returned unchanged (it wasn't minted by us).
pub fn extract_function_name(id: &str) -> String {
    match id.rfind('-') {
        Some(pos) => {
            let (name, suffix) = id.split_at(pos);
            let suffix = &suffix[1..];
            if suffix.len() == 8 && suffix.chars().all(|c| c.is_ascii_hexdigit()) {
                name.to_string()
            } else {
                id.to_string()
            }
        }
        None => id.to_string(),
    }
}

/// Smuggled thought-signature suffix, `<id>__thought__<sig>`, used by clients
/// that cannot carry a signature field natively.
const THOUGHT_SUFFIX_MARKER: &str = "__thought__";

pub fn smuggle_thought_signature(id: &str, signature: &str) -> String {
    format!("{}{}{}", id, THOUGHT_SUFFIX_MARKER, signature)
}

/// Extracts `(bare_id, signature)` from a possibly-smuggled id. Returns the
/// id unchanged with `None` signature when no marker is present.
pub fn extract_smuggled_thought_signature(id: &str) -> (String, Option<String>) {
    match id.find(THOUGHT_SUFFIX_MARKER) {
        Some(pos) => {
            let bare = id[..pos].to_string();
            let sig = id[pos + THOUGHT_SUFFIX_MARKER.len()..].to_string();
            (bare, Some(sig))
        }
        None => (id.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_for_simple_names() {
        for name in ["get_weather", "a", "tool-with-dashes"] {
            let id = generate_tool_use_id(name);
            assert_eq!(extract_function_name(&id), name);
        }
    }

    #[test]
    fn non_minted_id_without_hex_suffix_returned_unchanged() {
        assert_eq!(extract_function_name("plain-id"), "plain-id");
        assert_eq!(extract_function_name("no-dash-here-zzzzzzzz"), "no-dash-here-zzzzzzzz");
    }

    #[test]
    fn smuggling_round_trips() {
        let id = "call_123";
        let smuggled = smuggle_thought_signature(id, "sig-abc");
        let (bare, sig) = extract_smuggled_thought_signature(&smuggled);
        assert_eq!(bare, id);
        assert_eq!(sig.as_deref(), Some("sig-abc"));
    }

    #[test]
    fn no_marker_returns_none_signature() {
        let (bare, sig) = extract_smuggled_thought_signature("call_123");
        assert_eq!(bare, "call_123");
        assert!(sig.is_none());
    }
}
