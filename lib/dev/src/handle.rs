//! Lightweight handle types for shared ownership and weak back references.
//!
//! Provide two complementary handle types:
//! - [Handle<T>] owns a strong reference to an object using [alloc::sync::Arc]. Use it where
//!   shared, long-lived ownership is required (devices, registries, controller state).
//! - [HandleRef<T>] stores a weak reference ([alloc::sync::Weak]) and is suitable for
//!   back references that must not keep the target alive, such as a port pointing at the
//!   controller that owns it.
//!
//! Call [HandleRef::get_handle] to attempt an upgrade; it returns [None] once every strong
//! owner is gone. **Consumers must handle the [None] case explicitly.**
use alloc::{sync::Arc, sync::Weak};
use core::{fmt, ops::Deref};

/// Strong owning handle backed by [Arc<T>].
///
/// Cloning the handle increments the count.
/// Use [Handle<T>::create_ref] to produce a weak [HandleRef<T>].
pub struct Handle<T> {
    inner: Arc<T>,
}

impl<T> Deref for Handle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> From<T> for Handle<T> {
    fn from(value: T) -> Self {
        Self {
            inner: Arc::new(value),
        }
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

impl<T> Handle<T> {
    /// Create a non-owning [HandleRef<T>] that refers to the same underlying object.
    pub fn create_ref(&self) -> HandleRef<T> {
        HandleRef {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Whether both handles point at the same object.
    pub fn ptr_eq(&self, other: &Handle<T>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Weak (non-owning) handle backed by [Weak<T>].
pub struct HandleRef<T> {
    inner: Weak<T>,
}

impl<T> Clone for HandleRef<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for HandleRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleRef")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl<T> HandleRef<T> {
    /// Attempt to upgrade the weak reference into a strong [Handle<T>].
    pub fn get_handle(&self) -> Option<Handle<T>> {
        Weak::upgrade(&self.inner).map(|inner| Handle { inner })
    }

    pub fn points_to(&self, handle: &Handle<T>) -> bool {
        Weak::ptr_eq(&self.inner, &Arc::downgrade(&handle.inner))
    }
}
