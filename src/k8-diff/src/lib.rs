mod json;

use std::fmt;

pub use json::JsonDiff;
pub use json::PatchObject;

pub trait Changes {
    type Replace;
    type Patch;

    fn diff(&self, new: &Self) -> Result<Diff<Self::Replace, Self::Patch>, DiffError>;
}

/// object compared against a value of another type
#[derive(Debug)]
pub enum DiffError {
    TypeMismatch,
}

impl fmt::Display for DiffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot diff object against non object value")
    }
}

impl std::error::Error for DiffError {}

/// outcome of comparing two values
#[derive(Debug)]
pub enum Diff<R, P> {
    None,
    /// field present before, gone now
    Delete,
    /// objects differing in some of their fields
    Patch(P),
    /// anything else that changed, including lists
    Replace(R),
}

impl<R, P> Diff<R, P> {
    pub fn is_none(&self) -> bool {
        matches!(self, Diff::None)
    }

    pub fn as_patch_ref(&self) -> Option<&P> {
        match self {
            Diff::Patch(val) => Some(val),
            _ => None,
        }
    }
}
