mod crd;
mod int_or_string;
mod metadata;
#[cfg(feature = "core")]
pub mod core;
#[cfg(feature = "app")]
pub mod app;
#[cfg(feature = "networking")]
pub mod networking;

pub use self::crd::*;
pub use self::int_or_string::IntOrString;
pub use self::metadata::*;
pub use self::spec_def::*;

mod spec_def {

    use std::fmt::Debug;

    use serde::de::DeserializeOwned;
    use serde::Deserialize;
    use serde::Serialize;

    use super::Crd;

    pub trait Status:
        Sized + Debug + Clone + Default + Serialize + DeserializeOwned + Send + Sync
    {
    }

    pub trait Header:
        Sized + Debug + Clone + Default + Serialize + DeserializeOwned + Send + Sync
    {
    }

    /// Kubernetes Spec
    pub trait Spec:
        Sized + Debug + Clone + Default + Serialize + DeserializeOwned + Send + Sync
    {
        type Status: Status;

        type Header: Header;

        /// type descriptor (group, version, kind)
        fn metadata() -> &'static Crd;

        fn label() -> &'static str {
            Self::metadata().names.kind
        }

        fn api_version() -> String {
            let metadata = Self::metadata();
            if metadata.group == "core" {
                return metadata.version.to_owned();
            }
            format!("{}/{}", metadata.group, metadata.version)
        }

        fn kind() -> String {
            Self::metadata().names.kind.to_owned()
        }

        /// Copy fields the cluster owns (assigned on create, immutable afterwards)
        /// from the persisted spec, so a desired spec can be compared and written
        /// without clobbering them.
        fn make_same(&mut self, _persisted: &Self) {}
    }

    #[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
    pub struct DefaultHeader {}

    impl Header for DefaultHeader {}
}
