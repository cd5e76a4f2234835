//! Newtype IDs for platform entity references.
//!
//! The hosted platform identifies every entity with an opaque string (at most
//! 36 characters of `[a-zA-Z0-9._-]`, not starting with a special character).
//! The `define_id!` macro wraps those strings so a file id can never be passed
//! where a team id is expected.

/// Maximum length the platform accepts for a custom ID.
pub const MAX_ID_LENGTH: usize = 36;

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `as_str()`, `into_inner()`
/// - `From<String>`, `From<&str>` and `Display`
///
/// # Example
///
/// ```rust
/// # use picture_gallery_core::define_id;
/// define_id!(AlbumId);
/// define_id!(PhotoId);
///
/// let album = AlbumId::new("album-1");
/// let photo = PhotoId::new("album-1");
///
/// // These are different types, so this won't compile:
/// // let _: AlbumId = photo;
/// assert_eq!(album.as_str(), photo.as_str());
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the underlying string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the ID and return the underlying string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(UserId);
define_id!(TeamId);
define_id!(MembershipId);
define_id!(DocumentId);
define_id!(FileId);
define_id!(BucketId);
define_id!(DatabaseId);
define_id!(CollectionId);

/// Returns true if `id` is acceptable as a client-chosen platform ID.
#[must_use]
pub fn is_valid_custom_id(id: &str) -> bool {
    let Some(first) = id.chars().next() else {
        return false;
    };
    id.len() <= MAX_ID_LENGTH
        && first.is_ascii_alphanumeric()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_as_str() {
        let id = FileId::new("65f0c1a2");
        assert_eq!(id.to_string(), "65f0c1a2");
        assert_eq!(id.as_str(), "65f0c1a2");
    }

    #[test]
    fn test_serde_is_transparent() {
        let id = TeamId::new("admins");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"admins\"");
        let back: TeamId = serde_json::from_str("\"admins\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_custom_id_rules() {
        assert!(is_valid_custom_id("a1b2c3"));
        assert!(is_valid_custom_id("user.name_1-x"));
        assert!(!is_valid_custom_id(""));
        assert!(!is_valid_custom_id("_leading"));
        assert!(!is_valid_custom_id("has space"));
        assert!(!is_valid_custom_id(&"a".repeat(MAX_ID_LENGTH + 1)));
    }
}
