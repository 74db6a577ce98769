//! Macros for newtype wrappers around a single `inner` field.

/// Implement conversions and [core::ops::Deref]/[core::ops::DerefMut] for a
/// struct with a single `inner: $type` field.
#[macro_export]
macro_rules! impl_basic {
    ($name: ident, $type: ty) => {
        impl core::convert::From<$type> for $name {
            fn from(value: $type) -> Self {
                $name { inner: value }
            }
        }

        impl core::ops::Deref for $name {
            type Target = $type;

            fn deref(&self) -> &Self::Target {
                &self.inner
            }
        }

        impl core::ops::DerefMut for $name {
            fn deref_mut(&mut self) -> &mut Self::Target {
                &mut self.inner
            }
        }

        impl $name {
            pub const fn from_const(value: $type) -> Self {
                $name { inner: value }
            }
            pub fn into_inner(self) -> $type {
                self.inner
            }
        }
    };
}
