//! Snapshot fingerprints
//!
//! A fingerprint is a SHA-256 over the app's listing identity, the current
//! version descriptor and one content hash per locale. Two snapshots with the
//! same fingerprint need no write.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use launchpad_stores::{RemoteLocalization, VersionSnapshot};

/// Fingerprint of a remote snapshot
pub fn snapshot_fingerprint(snapshot: &VersionSnapshot) -> String {
    let mut hasher = Sha256::new();

    hasher.update(b"app:");
    hash_field(&mut hasher, Some(snapshot.app.remote_id.as_str()));
    hash_field(&mut hasher, Some(snapshot.app.name.as_str()));
    hash_field(&mut hasher, Some(snapshot.app.bundle_id.as_str()));
    hash_field(&mut hasher, Some(snapshot.app.primary_locale.as_str()));

    match &snapshot.version {
        Some(version) => {
            hasher.update(b"version:");
            hash_field(&mut hasher, Some(version.remote_id.as_str()));
            hash_field(&mut hasher, Some(version.version_string.as_str()));
            hash_field(&mut hasher, Some(version.state.as_str()));
            hash_field(&mut hasher, Some(version.remote_state.as_str()));
            hash_field(&mut hasher, version.selected_build_id.as_deref());
        }
        None => hasher.update(b"version:none"),
    }

    // sorted by locale so remote ordering never matters
    let locales: BTreeMap<&str, String> = snapshot
        .localizations
        .iter()
        .map(|l| (l.locale.as_str(), localization_hash(l)))
        .collect();
    for (locale, hash) in locales {
        hasher.update(b"locale:");
        hash_field(&mut hasher, Some(locale));
        hasher.update(hash.as_bytes());
    }

    format!("{:x}", hasher.finalize())
}

/// Content hash of one locale's listing text
pub fn localization_hash(localization: &RemoteLocalization) -> String {
    let mut hasher = Sha256::new();
    for field in [
        &localization.title,
        &localization.subtitle,
        &localization.description,
        &localization.keywords,
        &localization.whats_new,
        &localization.promotional_text,
        &localization.marketing_url,
        &localization.support_url,
    ] {
        hash_field(&mut hasher, field.as_deref());
    }
    format!("{:x}", hasher.finalize())
}

// length-prefixed so adjacent fields can't run together
fn hash_field(hasher: &mut Sha256, value: Option<&str>) {
    match value {
        Some(v) => {
            hasher.update(b"+");
            hasher.update((v.len() as u64).to_le_bytes());
            hasher.update(v.as_bytes());
        }
        None => hasher.update(b"-"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{remote_app, remote_localization, remote_version};
    use launchpad_stores::VersionState;

    fn snapshot() -> VersionSnapshot {
        VersionSnapshot {
            app: remote_app("1001"),
            version: Some(remote_version("v-1", "1.0", "PREPARE_FOR_SUBMISSION", None)),
            localizations: vec![remote_localization("en-US"), remote_localization("de-DE")],
        }
    }

    #[test]
    fn test_fingerprint_is_stable() {
        assert_eq!(snapshot_fingerprint(&snapshot()), snapshot_fingerprint(&snapshot()));
        assert_eq!(snapshot_fingerprint(&snapshot()).len(), 64);
    }

    #[test]
    fn test_locale_order_does_not_matter() {
        let mut reordered = snapshot();
        reordered.localizations.reverse();
        assert_eq!(snapshot_fingerprint(&snapshot()), snapshot_fingerprint(&reordered));
    }

    #[test]
    fn test_content_change_changes_fingerprint() {
        let mut edited = snapshot();
        edited.localizations[0].keywords = Some("rocket,launch,orbit".to_string());
        assert_ne!(snapshot_fingerprint(&snapshot()), snapshot_fingerprint(&edited));
    }

    #[test]
    fn test_state_change_changes_fingerprint() {
        let mut advanced = snapshot();
        if let Some(version) = advanced.version.as_mut() {
            version.state = VersionState::WaitingForReview;
            version.remote_state = "WAITING_FOR_REVIEW".to_string();
        }
        assert_ne!(snapshot_fingerprint(&snapshot()), snapshot_fingerprint(&advanced));
    }

    #[test]
    fn test_empty_and_missing_fields_differ() {
        let mut empty = remote_localization("en-US");
        empty.subtitle = Some(String::new());
        let mut missing = remote_localization("en-US");
        missing.subtitle = None;
        assert_ne!(localization_hash(&empty), localization_hash(&missing));
    }
}
