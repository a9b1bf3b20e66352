use duckdb::vtab::Value;
use libduckdb_sys::duckdb_free;
use libduckdb_sys::duckdb_get_bool;
use libduckdb_sys::duckdb_get_list_child;
use libduckdb_sys::duckdb_get_list_size;
use libduckdb_sys::duckdb_get_map_key;
use libduckdb_sys::duckdb_get_map_size;
use libduckdb_sys::duckdb_get_map_value;
use libduckdb_sys::duckdb_get_uint32;
use libduckdb_sys::duckdb_get_varchar;
use libduckdb_sys::duckdb_value;
use std::ffi::CStr;
use std::os::raw::c_void;

/// Typed access to the parameter values DuckDB hands to a table function.
pub(crate) trait ValueBridge {
    /// Gets the raw pointer to the underlying DuckDB value
    ///
    /// # Safety
    /// This method is unsafe as it accesses raw pointers and makes assumptions
    /// about the internal memory layout of DuckDB values
    fn get_value_ptr(&self) -> duckdb_value;

    fn to_bool(&self) -> bool {
        unsafe { duckdb_get_bool(self.get_value_ptr()) }
    }

    fn to_uint32(&self) -> u32 {
        unsafe { duckdb_get_uint32(self.get_value_ptr()) }
    }

    fn to_usize(&self) -> usize {
        self.to_uint32() as usize
    }

    /// Converts the value to an owned UTF-8 string, freeing DuckDB's copy.
    fn to_varchar(&self) -> String {
        unsafe {
            let varchar = duckdb_get_varchar(self.get_value_ptr());
            let c_str = CStr::from_ptr(varchar);
            let string = c_str.to_string_lossy().into_owned();
            duckdb_free(varchar as *mut c_void);
            string
        }
    }

    /// Elements of a LIST value.
    fn to_list(&self) -> Vec<Value> {
        unsafe {
            let size = duckdb_get_list_size(self.get_value_ptr());
            (0..size)
                .map(|index| Value::from(duckdb_get_list_child(self.get_value_ptr(), index)))
                .collect()
        }
    }

    /// Key-value pairs of a MAP value.
    fn to_map_entries(&self) -> Vec<(Value, Value)> {
        unsafe {
            let size = duckdb_get_map_size(self.get_value_ptr());
            (0..size)
                .map(|index| {
                    (
                        Value::from(duckdb_get_map_key(self.get_value_ptr(), index)),
                        Value::from(duckdb_get_map_value(self.get_value_ptr(), index)),
                    )
                })
                .collect()
        }
    }
}

impl ValueBridge for Value {
    /// Relies on `Value` being a plain wrapper around a single `duckdb_value`.
    fn get_value_ptr(&self) -> duckdb_value {
        unsafe { *(self as *const Value as *const duckdb_value) }
    }
}
