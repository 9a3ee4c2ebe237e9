use crate::{error_message_from_ptr, sqlite_error};
use cellar_core::{ColumnMeta, Columns, Error, Result, Value, truncate_long};
use libsqlite3_sys::*;
use std::{
    borrow::Cow,
    ffi::{CStr, c_char, c_int, c_void},
    ptr, slice,
};

pub(crate) fn extract_value(statement: *mut sqlite3_stmt, index: c_int) -> Result<Value> {
    unsafe {
        let column_type = sqlite3_column_type(statement, index);
        Ok(match column_type {
            SQLITE_NULL => Value::Null,
            SQLITE_INTEGER => Value::Int64(Some(sqlite3_column_int64(statement, index))),
            SQLITE_FLOAT => Value::Float64(Some(sqlite3_column_double(statement, index))),
            SQLITE_BLOB => {
                let ptr = sqlite3_column_blob(statement, index) as *const u8;
                let len = sqlite3_column_bytes(statement, index) as usize;
                let bytes = if ptr.is_null() {
                    &[][..]
                } else {
                    slice::from_raw_parts(ptr, len)
                };
                Value::Blob(Some(bytes.into()))
            }
            SQLITE_TEXT => {
                let ptr = sqlite3_column_text(statement, index);
                let len = sqlite3_column_bytes(statement, index) as usize;
                let bytes = if ptr.is_null() {
                    &[][..]
                } else {
                    slice::from_raw_parts(ptr, len)
                };
                Value::Varchar(Some(String::from_utf8_lossy(bytes).into_owned()))
            }
            _ => {
                return Err(Error::msg(format!(
                    "Unexpected column type {}",
                    column_type
                )));
            }
        })
    }
}

fn text<'a>(ptr: *const c_char) -> Option<Cow<'a, str>> {
    if ptr.is_null() {
        None
    } else {
        Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy())
    }
}

/// Metadata of the result set produced by `statement`. Table and nullability
/// are only known for columns that come straight from a table.
pub(crate) fn extract_columns(
    connection: *mut sqlite3,
    statement: *mut sqlite3_stmt,
) -> Result<Columns> {
    unsafe {
        let count = sqlite3_column_count(statement);
        let mut columns = Vec::with_capacity(count.max(0) as usize);
        for i in 0..count {
            let Some(label) = text(sqlite3_column_name(statement, i)) else {
                return Err(Error::msg(format!(
                    "Could not read the name of column {}",
                    i + 1
                )));
            };
            let mut column = ColumnMeta::new(label);
            if let Some(declared) = text(sqlite3_column_decltype(statement, i)) {
                column = column.declared_type(declared);
            }
            let table = sqlite3_column_table_name(statement, i);
            if let Some(name) = text(table) {
                column = column.table(name);
                let mut not_null: c_int = 0;
                let rc = sqlite3_table_column_metadata(
                    connection,
                    sqlite3_column_database_name(statement, i),
                    table,
                    sqlite3_column_origin_name(statement, i),
                    ptr::null_mut(),
                    ptr::null_mut(),
                    &mut not_null,
                    ptr::null_mut(),
                    ptr::null_mut(),
                );
                if rc == SQLITE_OK {
                    column = column.nullable(not_null == 0);
                }
            }
            columns.push(column);
        }
        Ok(columns.into())
    }
}

fn bind_text(statement: *mut sqlite3_stmt, index: c_int, value: &str) -> c_int {
    unsafe {
        sqlite3_bind_text64(
            statement,
            index,
            value.as_ptr() as *const c_char,
            value.len() as sqlite3_uint64,
            SQLITE_TRANSIENT(),
            SQLITE_UTF8 as u8,
        )
    }
}

pub(crate) fn bind_value(statement: *mut sqlite3_stmt, index: c_int, value: &Value) -> Result<()> {
    unsafe {
        let rc = match value {
            v if v.is_null() => sqlite3_bind_null(statement, index),
            Value::Boolean(Some(v)) => sqlite3_bind_int(statement, index, *v as c_int),
            Value::Int32(Some(v)) => sqlite3_bind_int(statement, index, *v),
            Value::Int64(Some(v)) => sqlite3_bind_int64(statement, index, *v),
            Value::Float64(Some(v)) => sqlite3_bind_double(statement, index, *v),
            Value::Decimal(Some(v)) => bind_text(statement, index, &v.to_string()),
            Value::Varchar(Some(v)) => bind_text(statement, index, v),
            Value::Blob(Some(v)) => sqlite3_bind_blob64(
                statement,
                index,
                v.as_ptr() as *const c_void,
                v.len() as sqlite3_uint64,
                SQLITE_TRANSIENT(),
            ),
            Value::Date(Some(v)) => bind_text(statement, index, &v.to_string()),
            Value::Time(Some(v)) => bind_text(statement, index, &v.to_string()),
            Value::Timestamp(Some(v)) => bind_text(statement, index, &v.to_string()),
            Value::Uuid(Some(v)) => bind_text(statement, index, &v.to_string()),
            _ => sqlite3_bind_null(statement, index),
        };
        if rc != SQLITE_OK {
            let query = error_message_from_ptr(sqlite3_sql(statement));
            let error = sqlite_error(sqlite3_db_handle(statement)).context(format!(
                "Cannot bind parameter {} to query `{}`",
                index,
                truncate_long!(query)
            ));
            log::error!("{:#}", error);
            return Err(error);
        }
        Ok(())
    }
}
