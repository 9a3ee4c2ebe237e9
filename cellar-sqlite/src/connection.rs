use crate::{
    CBox, SqliteStatement, error_message_from_ptr, sqlite_error, sqlite_error_code,
    statement::prepare_raw,
};
use cellar_core::{
    Concurrency, Connection, Context, Error, Failure, Isolation, Result, ResultType, ReturnKeys,
    Savepoint, StatementOptions, truncate_long,
};
use libsqlite3_sys::*;
use std::{
    ffi::{CString, c_char, c_int, c_void},
    ptr,
    sync::atomic::{AtomicPtr, Ordering},
};
use tokio::task::spawn_blocking;
use url::form_urlencoded;

// Not exported by the libsqlite3-sys bundled bindings, but compiled into the
// bundled SQLite library.
unsafe extern "C" {
    fn sqlite3_close_v2(db: *mut sqlite3) -> c_int;
}

/// Connection to a SQLite database.
///
/// SQLite has no auto-commit switch: turning auto-commit off opens a
/// transaction with `BEGIN` and every commit or rollback opens the next one.
pub struct SqliteConnection {
    pub(crate) connection: CBox<*mut sqlite3>,
    auto_commit: bool,
    isolation: Isolation,
    read_only: bool,
    savepoints: u64,
}

impl SqliteConnection {
    /// Open `sqlite://path?params`. The parameters are passed to SQLite as URI
    /// parameters (`mode=ro`, `mode=rwc`, `cache=shared`...), except
    /// `busy_timeout` (milliseconds) which is applied on the connection.
    pub async fn connect(url: impl AsRef<str>) -> Result<SqliteConnection> {
        let url = url.as_ref();
        let Some(location) = url.strip_prefix("sqlite://") else {
            let error = Error::msg(format!(
                "Expected the sqlite connection url `{}` to start with `sqlite://`",
                url
            ));
            log::error!("{:#}", error);
            return Err(error);
        };
        let context = format!("While opening `{}`", url);
        let (path, query) = location.split_once('?').unwrap_or((location, ""));
        let mut busy_timeout = None;
        let params = {
            let mut params = form_urlencoded::Serializer::new(String::new());
            for (key, value) in form_urlencoded::parse(query.as_bytes()) {
                if key == "busy_timeout" {
                    busy_timeout = Some(value.parse::<c_int>().with_context(|| {
                        format!("Invalid busy_timeout `{}` in `{}`", value, url)
                    })?);
                } else {
                    params.append_pair(&key, &value);
                }
            }
            params.finish()
        };
        let filename = if params.is_empty() {
            format!("file:{}", path)
        } else {
            format!("file:{}?{}", path, params)
        };
        let filename = CString::new(filename).with_context(|| context.clone())?;
        let connection = spawn_blocking(move || unsafe {
            let mut connection = CBox::new(ptr::null_mut(), |p| {
                sqlite3_close_v2(p);
            });
            let rc = sqlite3_open_v2(
                filename.as_ptr(),
                &mut *connection,
                SQLITE_OPEN_READWRITE | SQLITE_OPEN_CREATE | SQLITE_OPEN_URI,
                ptr::null(),
            );
            if rc != SQLITE_OK {
                return Err(if connection.is_null() {
                    sqlite_error_code(rc)
                } else {
                    sqlite_error(*connection)
                });
            }
            if let Some(timeout) = busy_timeout {
                sqlite3_busy_timeout(*connection, timeout);
            }
            Ok(connection)
        })
        .await?
        .map_err(|e| {
            let error = e.context(context);
            log::error!("{:#}", error);
            error
        })?;
        log::debug!("Opened `{}`", url);
        Ok(Self {
            connection,
            auto_commit: true,
            isolation: Isolation::Serializable,
            read_only: false,
            savepoints: 0,
        })
    }

    /// Run `sql` directly, discarding any row.
    pub(crate) fn exec(&mut self, sql: &str) -> Result<()> {
        let c_sql = CString::new(sql).context("Could not create a CString from the query")?;
        let mut message: *mut c_char = ptr::null_mut();
        let rc = unsafe {
            sqlite3_exec(*self.connection, c_sql.as_ptr(), None, ptr::null_mut(), &mut message)
        };
        if rc != SQLITE_OK {
            let error = if message.is_null() {
                sqlite_error(*self.connection)
            } else {
                let error = Error::msg(error_message_from_ptr(message));
                unsafe { sqlite3_free(message as *mut c_void) };
                error
            }
            .context(format!("While executing `{}`", truncate_long!(sql)));
            log::error!("{:#}", error);
            return Err(error);
        }
        Ok(())
    }

    /// True while SQLite has an open transaction.
    pub fn in_transaction(&self) -> bool {
        unsafe { sqlite3_get_autocommit(*self.connection) == 0 }
    }

    fn apply(&mut self, options: &StatementOptions) -> Result<()> {
        if let ReturnKeys::Named(names) = &options.return_keys {
            return Err(Failure::unsupported(format!(
                "SQLite cannot return the key columns {:?}, only last_insert_rowid()",
                names
            )));
        }
        if options.concurrency == Some(Concurrency::Updatable) {
            return Err(Failure::unsupported("SQLite has no updatable result sets"));
        }
        if matches!(
            options.result_type,
            Some(ResultType::ScrollInsensitive | ResultType::ScrollSensitive)
        ) {
            return Err(Failure::unsupported("SQLite has no scrollable result sets"));
        }
        if options.holdability.is_some() {
            log::debug!("SQLite ignores the cursor holdability");
        }
        if options.fetch_size.is_some() {
            log::debug!("SQLite ignores the fetch size, rows are stepped one at a time");
        }
        if let Some(timeout) = options.timeout {
            let millis = timeout.as_millis().min(c_int::MAX as u128) as c_int;
            unsafe {
                sqlite3_busy_timeout(*self.connection, millis);
            }
        }
        Ok(())
    }

    fn end_transaction(&mut self, sql: &str) -> Result<()> {
        if self.auto_commit {
            return Err(Failure::misuse(format!(
                "Cannot {} while auto-commit is enabled",
                sql.to_lowercase()
            )));
        }
        if self.in_transaction() {
            self.exec(sql)?;
        }
        self.exec("BEGIN")
    }
}

fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl Connection for SqliteConnection {
    type Statement = SqliteStatement;

    async fn prepare(&mut self, sql: &str, options: &StatementOptions) -> Result<SqliteStatement> {
        self.apply(options)?;
        let connection = AtomicPtr::new(*self.connection);
        let owned = sql.to_string();
        let (statement, tail) =
            spawn_blocking(move || prepare_raw(connection.load(Ordering::Relaxed), &owned))
                .await??;
        Ok(SqliteStatement::new(
            *self.connection,
            sql.to_string(),
            statement,
            tail,
            options,
        ))
    }

    async fn create_statement(&mut self, options: &StatementOptions) -> Result<SqliteStatement> {
        self.apply(options)?;
        Ok(SqliteStatement::new(
            *self.connection,
            String::new(),
            None,
            String::new(),
            options,
        ))
    }

    fn auto_commit(&self) -> Result<bool> {
        Ok(self.auto_commit)
    }

    async fn set_auto_commit(&mut self, auto_commit: bool) -> Result<()> {
        if auto_commit == self.auto_commit {
            return Ok(());
        }
        if auto_commit {
            if self.in_transaction() {
                self.exec("COMMIT")?;
            }
        } else if !self.in_transaction() {
            self.exec("BEGIN")?;
        }
        self.auto_commit = auto_commit;
        Ok(())
    }

    fn isolation(&self) -> Result<Isolation> {
        Ok(self.isolation)
    }

    async fn set_isolation(&mut self, isolation: Isolation) -> Result<()> {
        let pragma = match isolation {
            Isolation::ReadUncommitted => "PRAGMA read_uncommitted = 1",
            Isolation::Serializable => "PRAGMA read_uncommitted = 0",
            _ => {
                return Err(Failure::unsupported(format!(
                    "SQLite supports READ UNCOMMITTED and SERIALIZABLE only, not {}",
                    isolation
                )));
            }
        };
        self.exec(pragma)?;
        self.isolation = isolation;
        Ok(())
    }

    fn read_only(&self) -> Result<bool> {
        Ok(self.read_only)
    }

    async fn set_read_only(&mut self, read_only: bool) -> Result<()> {
        self.exec(if read_only {
            "PRAGMA query_only = 1"
        } else {
            "PRAGMA query_only = 0"
        })?;
        self.read_only = read_only;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.end_transaction("COMMIT")
    }

    async fn rollback(&mut self) -> Result<()> {
        self.end_transaction("ROLLBACK")
    }

    async fn savepoint(&mut self, name: Option<&str>) -> Result<Savepoint> {
        let name = match name {
            Some(name) => name.to_string(),
            None => {
                self.savepoints += 1;
                format!("cellar_sp_{}", self.savepoints)
            }
        };
        self.exec(&format!("SAVEPOINT {}", quote(&name)))?;
        Ok(Savepoint::new(name))
    }

    async fn rollback_to(&mut self, savepoint: &Savepoint) -> Result<()> {
        self.exec(&format!(
            "ROLLBACK TO SAVEPOINT {}",
            quote(savepoint.name())
        ))
    }

    async fn release_savepoint(&mut self, savepoint: Savepoint) -> Result<()> {
        self.exec(&format!("RELEASE SAVEPOINT {}", quote(savepoint.name())))
    }

    async fn close(mut self) -> Result<()> {
        let connection = self.connection.release();
        let rc = unsafe { sqlite3_close_v2(connection) };
        if rc != SQLITE_OK {
            let error = sqlite_error_code(rc).context("While closing the connection");
            log::error!("{:#}", error);
            return Err(error);
        }
        Ok(())
    }
}
