//! The linker-plugin transfer-vector ABI surface this crate consumes.
//!
//! This models just enough of the `ld`/`gold`/`lld` plugin API (the
//! `ld_plugin_tv` tag/union scheme and the handful of callback types the
//! adapter actually calls) to drive the orchestration in
//! [`crate::xwrap`]. It is not a general-purpose binding: unused tags are
//! accepted and logged, not modeled.

#![allow(non_camel_case_types)]

use std::os::raw::{c_char, c_int, c_void};

pub type ld_plugin_status = c_int;
pub const LDPS_OK: ld_plugin_status = 0;
pub const LDPS_ERR: ld_plugin_status = 1;

pub type ld_plugin_output_file_type = c_int;
pub const LDPO_REL: ld_plugin_output_file_type = 0;
pub const LDPO_DYN: ld_plugin_output_file_type = 1;
pub const LDPO_EXEC: ld_plugin_output_file_type = 2;
pub const LDPO_PIE: ld_plugin_output_file_type = 3;

/// Transfer-vector tags, a subset of the real ABI's `ld_plugin_tag`
/// sufficient for this crate's needs. Kept as plain `i32` constants
/// rather than a Rust enum: the driver is free to hand us tags this
/// crate doesn't model, and those must be logged and skipped rather than
/// trip undefined behavior from an out-of-range enum discriminant.
pub mod tag {
    pub const NULL: i32 = 0;
    pub const API: i32 = 1;
    pub const OUTPUT_NAME: i32 = 8;
    pub const OPTION: i32 = 9;
    pub const LINKER_OUTPUT: i32 = 10;
    pub const REGISTER_CLAIM_FILE: i32 = 11;
    pub const REGISTER_ALL_SYMBOLS_READ: i32 = 12;
    pub const REGISTER_CLEANUP: i32 = 13;
    pub const ADD_SYMBOLS: i32 = 14;
    pub const GET_SYMBOLS: i32 = 15;
    pub const ADD_INPUT_FILE: i32 = 16;
    pub const MESSAGE: i32 = 17;
    pub const GET_INPUT_FILE: i32 = 18;
    pub const RELEASE_INPUT_FILE: i32 = 19;
    pub const ADD_INPUT_LIBRARY: i32 = 20;
    pub const SET_EXTRA_LIBRARY_PATH: i32 = 22;
    pub const GNU_LD_VERSION: i32 = 23;
    pub const REGISTER_NEW_INPUT_HOOK: i32 = 29;
    pub const GET_VIEW_OF_FILE: i32 = 31;
    pub const GET_INPUT_SECTION_COUNT: i32 = 32;
    pub const GET_INPUT_SECTION_TYPE: i32 = 33;
    pub const GET_INPUT_SECTION_NAME: i32 = 34;
    pub const GET_INPUT_SECTION_CONTENTS: i32 = 35;
    pub const UPDATE_SECTION_ORDER: i32 = 36;
    pub const ALLOW_SECTION_ORDERING: i32 = 37;
    pub const GET_SYMBOLS_V2: i32 = 38;
    pub const ALLOW_UNIQUE_SEGMENT_FOR_SECTIONS: i32 = 39;
    pub const UNIQUE_SEGMENT_FOR_SECTION: i32 = 40;
    pub const GET_SYMBOLS_V3: i32 = 41;
    pub const GET_INPUT_SECTION_ALIGNMENT: i32 = 42;
    pub const GET_INPUT_SECTION_SIZE: i32 = 43;
    pub const REGISTER_NEW_LLVM_SYMBOL_DEFINED_HOOK: i32 = 44;
    pub const GET_WRAP_SYMBOLS: i32 = 45;
    pub const ADD_SYMBOLS_V2: i32 = 46;
}

#[repr(C)]
pub struct ld_plugin_input_file {
    pub name: *const c_char,
    pub file: *mut c_void, // FILE*
    pub offset: i64,
    pub filesize: i64,
    pub handle: *mut c_void,
}

#[repr(C)]
pub struct ld_plugin_symbol {
    pub name: *mut c_char,
    pub version: *mut c_char,
    pub def: c_int,
    pub visibility: c_int,
    pub size: u64,
    pub comdat_key: *mut c_char,
    pub resolution: c_int,
}

pub type ld_plugin_claim_file_handler =
    unsafe extern "C" fn(file: *const ld_plugin_input_file, claimed: *mut c_int) -> ld_plugin_status;
pub type ld_plugin_all_symbols_read_handler = unsafe extern "C" fn() -> ld_plugin_status;
pub type ld_plugin_cleanup_handler = unsafe extern "C" fn() -> ld_plugin_status;
pub type ld_plugin_new_input_handler = unsafe extern "C" fn(file: *const ld_plugin_input_file);

pub type ld_plugin_register_claim_file =
    unsafe extern "C" fn(handler: ld_plugin_claim_file_handler) -> ld_plugin_status;
pub type ld_plugin_register_all_symbols_read =
    unsafe extern "C" fn(handler: ld_plugin_all_symbols_read_handler) -> ld_plugin_status;
pub type ld_plugin_register_cleanup =
    unsafe extern "C" fn(handler: ld_plugin_cleanup_handler) -> ld_plugin_status;
pub type ld_plugin_register_new_input =
    unsafe extern "C" fn(handler: ld_plugin_new_input_handler) -> ld_plugin_status;

pub type ld_plugin_add_input_file = unsafe extern "C" fn(path: *const c_char) -> ld_plugin_status;
pub type ld_plugin_add_input_library = unsafe extern "C" fn(name: *const c_char) -> ld_plugin_status;
pub type ld_plugin_message = unsafe extern "C" fn(level: c_int, fmt: *const c_char, ...) -> ld_plugin_status;

#[repr(C)]
pub struct ld_plugin_tv {
    pub tag: i32,
    pub value: ld_plugin_tv_value,
}

#[repr(C)]
pub union ld_plugin_tv_value {
    pub tv_val: i64,
    pub tv_string: *const c_char,
    pub tv_register_claim_file: ld_plugin_register_claim_file,
    pub tv_register_all_symbols_read: ld_plugin_register_all_symbols_read,
    pub tv_register_cleanup: ld_plugin_register_cleanup,
    pub tv_register_new_input: ld_plugin_register_new_input,
    pub tv_add_input_file: ld_plugin_add_input_file,
    pub tv_add_input_library: ld_plugin_add_input_library,
    pub tv_message: ld_plugin_message,
}
