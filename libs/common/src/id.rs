use ulid::Ulid;

/// Builds a `{prefix}_{ulid}` identifier, e.g. `ses_01J9ZG...`.
///
/// ULIDs encode their creation time in the leading bits, so prefixed ids
/// sort roughly chronologically in indexes.
///
/// # Examples
/// ```
/// let id = squadup_common::id::prefixed_ulid(squadup_common::id::prefix::USER);
/// assert!(id.starts_with("usr_"));
/// ```
pub fn prefixed_ulid(prefix: &str) -> String {
    format!("{prefix}_{}", Ulid::new())
}

/// Implemented by entities whose ids carry a fixed prefix.
pub trait PrefixedId {
    const PREFIX: &'static str;

    fn generate() -> String {
        prefixed_ulid(Self::PREFIX)
    }

    /// True when `id` carries this entity's prefix.
    fn owns(id: &str) -> bool {
        id.len() > Self::PREFIX.len() + 1
            && id.as_bytes()[Self::PREFIX.len()] == b'_'
            && id.starts_with(Self::PREFIX)
    }
}

/// Well-known id prefixes.
pub mod prefix {
    pub const USER: &str = "usr";
    pub const SESSION: &str = "ses";
    pub const MESSAGE: &str = "msg";
    pub const KUDOS_EVENT: &str = "kud";
}
