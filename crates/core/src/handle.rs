//! Opaque handles threaded through adapter calls.
//!
//! The core never looks inside these. Account, contract and resource handles
//! are integer tokens the adapter maps to its own objects; interaction handles
//! box whatever the adapter's client decoded.

use std::any::Any;
use std::fmt;

/// Token for an account created by a builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountHandle(pub u64);

/// Token for a contract deployed by a builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContractHandle(pub u64);

/// Token for an adapter-specific resource (e.g. an application domain).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceHandle(pub u64);

/// A decoded interaction, ready to be triggered by the client that decoded it.
pub struct InteractionHandle(Box<dyn Any + Send + Sync>);

impl InteractionHandle {
    /// Wrap an adapter-specific interaction value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Box::new(value))
    }

    /// Borrow the inner value if it has type `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    /// Take the inner value if it has type `T`, otherwise hand the handle back.
    pub fn downcast<T: Any>(self) -> Result<T, Self> {
        match self.0.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(inner) => Err(Self(inner)),
        }
    }
}

impl fmt::Debug for InteractionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("InteractionHandle(..)")
    }
}
