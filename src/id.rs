//! Code for handling IDs
use anyhow::Result;
use indexmap::IndexSet;

/// A trait alias for ID types
pub trait IDLike:
    Eq + std::hash::Hash + std::borrow::Borrow<str> + Clone + std::fmt::Display + From<String>
{
}
impl<T> IDLike for T where
    T: Eq + std::hash::Hash + std::borrow::Borrow<str> + Clone + std::fmt::Display + From<String>
{
}

/// Define a string-backed ID type.
///
/// IDs are reference counted with [`std::sync::Arc`] so that layouts can be generated on worker
/// threads and handed back to the caller.
macro_rules! define_id_type {
    ($name:ident) => {
        #[derive(
            Clone,
            std::hash::Hash,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            serde::Deserialize,
            Debug,
            serde::Serialize,
        )]
        /// An ID type (e.g. `SiteID`, `AssetID`, etc.)
        pub struct $name(pub std::sync::Arc<str>);

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(std::sync::Arc::from(s))
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(std::sync::Arc::from(s))
            }
        }

        impl $name {
            /// Create a new ID from a string slice
            pub fn new(id: &str) -> Self {
                $name(std::sync::Arc::from(id))
            }

            /// The ID as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id_type! {SiteID}
define_id_type! {LayoutID}
define_id_type! {AssetID}
define_id_type! {RoadID}
define_id_type! {ZoneID}
define_id_type! {JurisdictionID}

/// Build a sequential ID with a zero-padded counter, e.g. `solar-007`
pub fn sequential_id<ID: IDLike>(prefix: &str, number: usize) -> ID {
    ID::from(format!("{prefix}-{number:03}"))
}

/// Indicates that the struct has an ID field
pub trait HasID<ID: IDLike> {
    /// Get the struct's ID
    fn get_id(&self) -> &ID;
}

/// Implement the `HasID` trait for the given type, assuming it has a field called `id`
macro_rules! define_id_getter {
    ($t:ty, $id_ty:ty) => {
        impl crate::id::HasID<$id_ty> for $t {
            fn get_id(&self) -> &$id_ty {
                &self.id
            }
        }
    };
}
pub(crate) use define_id_getter;

/// Check that every item in an iterator has a unique ID, returning the IDs in order
pub fn check_unique_ids<'a, ID, T, I>(items: I) -> Result<IndexSet<ID>>
where
    ID: IDLike + 'a,
    T: HasID<ID> + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut ids = IndexSet::new();
    for item in items {
        let id = item.get_id();
        anyhow::ensure!(ids.insert(id.clone()), "Duplicate ID found: {id}");
    }

    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;

    struct Named {
        id: ZoneID,
    }
    define_id_getter! {Named, ZoneID}

    #[test]
    fn test_sequential_id() {
        let id: AssetID = sequential_id("solar", 7);
        assert_eq!(id.as_str(), "solar-007");
    }

    #[test]
    fn test_check_unique_ids() {
        let items = [Named { id: "z1".into() }, Named { id: "z2".into() }];
        assert_eq!(check_unique_ids::<ZoneID, _, _>(&items).unwrap().len(), 2);

        let items = [Named { id: "z1".into() }, Named { id: "z1".into() }];
        assert_error!(
            check_unique_ids::<ZoneID, _, _>(&items),
            "Duplicate ID found: z1"
        );
    }
}
