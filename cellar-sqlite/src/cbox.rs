use std::{
    ops::{Deref, DerefMut},
    ptr,
};

pub(crate) trait NullCheck {
    fn is_null(&self) -> bool;
}

impl<T> NullCheck for *const T {
    fn is_null(&self) -> bool {
        (*self).is_null()
    }
}

impl<T> NullCheck for *mut T {
    fn is_null(&self) -> bool {
        (*self).is_null()
    }
}

/// Owns a handle allocated by SQLite and releases it with `dealloc` on drop,
/// unless it is null.
#[derive(Debug)]
pub(crate) struct CBox<T: NullCheck> {
    pub(crate) ptr: T,
    dealloc: fn(T),
}

impl<T: NullCheck> CBox<T> {
    pub fn new(ptr: T, dealloc: fn(T)) -> Self {
        Self { ptr, dealloc }
    }
}

impl<T> CBox<*mut T> {
    /// Give up ownership, the caller becomes responsible for the handle.
    pub fn release(&mut self) -> *mut T {
        std::mem::replace(&mut self.ptr, ptr::null_mut())
    }
}

impl<T: NullCheck> Drop for CBox<T> {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                (self.dealloc)(ptr::read(&self.ptr as *const T));
            }
        }
    }
}

impl<T: NullCheck> Deref for CBox<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.ptr
    }
}

impl<T: NullCheck> DerefMut for CBox<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.ptr
    }
}

// SQLite is built in serialized mode, handles can move between threads.
unsafe impl<T: NullCheck> Send for CBox<T> {}
unsafe impl<T: NullCheck> Sync for CBox<T> {}

/// Borrowed SQLite handle, owned elsewhere by a [`CBox`].
#[derive(Debug)]
pub(crate) struct Handle<T>(*mut T);

impl<T> Handle<T> {
    pub fn new(ptr: *mut T) -> Self {
        Self(ptr)
    }

    pub fn get(&self) -> *mut T {
        self.0
    }
}

unsafe impl<T> Send for Handle<T> {}
unsafe impl<T> Sync for Handle<T> {}
