mod cbox;
mod connection;
mod data_source;
mod extract;
mod statement;

pub(crate) use cbox::*;
pub use connection::*;
pub use data_source::*;
pub use statement::*;

use cellar_core::Error;
use libsqlite3_sys::{sqlite3, sqlite3_errmsg, sqlite3_errstr};
use std::ffi::{CStr, c_char, c_int};

pub(crate) fn error_message_from_ptr(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return "Unknown error (could not extract the error message)".into();
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_string_lossy()
        .into_owned()
}

/// Last error reported on `connection`.
pub(crate) fn sqlite_error(connection: *mut sqlite3) -> Error {
    Error::msg(error_message_from_ptr(unsafe { sqlite3_errmsg(connection) }))
}

/// Generic description of a result code, for when no connection is available.
pub(crate) fn sqlite_error_code(rc: c_int) -> Error {
    Error::msg(error_message_from_ptr(unsafe { sqlite3_errstr(rc) }))
}
