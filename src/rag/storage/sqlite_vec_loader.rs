//! Registration of the sqlite-vec extension.
//!
//! The only unsafe code in the crate lives here.

use std::ffi::{c_char, c_int};
use std::sync::Once;

use rusqlite::ffi::{sqlite3, sqlite3_api_routines, sqlite3_auto_extension};
use sqlite_vec::sqlite3_vec_init;

type SqliteExtensionFn =
    unsafe extern "C" fn(*mut sqlite3, *mut *mut c_char, *const sqlite3_api_routines) -> c_int;

static REGISTER: Once = Once::new();

/// Register sqlite-vec as an auto-loaded extension for every connection
/// opened afterwards. Repeated calls are no-ops.
#[allow(unsafe_code)]
pub fn init_sqlite_vec_extension() {
    REGISTER.call_once(|| {
        // SAFETY: sqlite3_vec_init has the sqlite extension entry point ABI;
        // sqlite3_auto_extension only stores the pointer for later connections.
        unsafe {
            sqlite3_auto_extension(Some(std::mem::transmute::<*const (), SqliteExtensionFn>(
                sqlite3_vec_init as *const (),
            )));
        }
    });
}
