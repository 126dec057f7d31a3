use contracts::{CommunityId, GameConfig};
use tracing::info;

use crate::error::EngineError;
use crate::store::WorldStore;

pub const CHANNEL_PREFIX: char = '/';

/// Canonical channel form: trimmed, lowercased, with a leading `/`.
pub fn normalize_channel_name(raw: &str) -> Result<String, EngineError> {
    let trimmed = raw.trim().to_lowercase();
    let name = if trimmed.starts_with(CHANNEL_PREFIX) {
        trimmed
    } else {
        format!("{CHANNEL_PREFIX}{trimmed}")
    };

    if name.chars().count() < 2 {
        return Err(EngineError::validation(
            "Channel name must have at least one character after '/'.",
        ));
    }
    Ok(name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub community_id: CommunityId,
    pub name: String,
}

pub fn join_community(
    store: &dyn WorldStore,
    config: &GameConfig,
    caller_id: &str,
    raw_name: &str,
) -> Result<JoinOutcome, EngineError> {
    let name = normalize_channel_name(raw_name)?;
    let reference_url = format!(
        "{}{}",
        config.community_url_base,
        name.trim_start_matches(CHANNEL_PREFIX)
    );

    let community_id = store.find_or_create_community(&name, &reference_url)?;
    store.upsert_membership(caller_id, community_id)?;
    info!(caller_id, community_id, name = %name, "community.joined");

    Ok(JoinOutcome { community_id, name })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::memory::MemoryWorldStore;

    #[test]
    fn bare_name_gains_prefix() {
        assert_eq!(normalize_channel_name("base").expect("valid"), "/base");
    }

    #[test]
    fn prefixed_name_is_unchanged() {
        assert_eq!(normalize_channel_name("/base").expect("valid"), "/base");
    }

    #[test]
    fn case_and_padding_are_canonicalised() {
        assert_eq!(normalize_channel_name("  Base ").expect("valid"), "/base");
    }

    #[test]
    fn single_character_after_normalisation_is_rejected() {
        for raw in ["", "/", "   ", " / "] {
            let err = normalize_channel_name(raw).unwrap_err();
            assert!(matches!(err, EngineError::Validation(_)), "{raw:?}");
        }
    }

    #[test]
    fn join_creates_community_once_and_moves_membership() {
        let store = MemoryWorldStore::with_seed(1);
        let config = GameConfig::default();

        let first = join_community(&store, &config, "7", "base").expect("join");
        let again = join_community(&store, &config, "8", "/base").expect("join");
        assert_eq!(first.community_id, again.community_id);

        let other = join_community(&store, &config, "7", "art").expect("join");
        assert_eq!(
            store.membership("7").expect("membership"),
            Some((other.community_id, "/art".to_string()))
        );
    }

    proptest! {
        #[test]
        fn normalisation_is_idempotent(raw in "[a-zA-Z0-9/ ]{0,12}") {
            if let Ok(once) = normalize_channel_name(&raw) {
                prop_assert_eq!(normalize_channel_name(&once).expect("still valid"), once.clone());
                prop_assert!(once.starts_with(CHANNEL_PREFIX));
            }
        }
    }
}
