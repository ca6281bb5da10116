//! Subset of `qemu-plugin.h` used by the plugin.
//!
//! All functions are resolved against the QEMU binary when the plugin is
//! loaded.

#![allow(non_camel_case_types)]

use std::ffi::{c_char, c_int, c_uint, c_void};

/// Plugin API version this plugin was written against.
pub const QEMU_PLUGIN_VERSION: c_int = 2;

pub type qemu_plugin_id_t = u64;

/// `enum qemu_plugin_cb_flags`
pub type qemu_plugin_cb_flags = c_int;
pub const QEMU_PLUGIN_CB_NO_REGS: qemu_plugin_cb_flags = 0;

#[repr(C)]
pub struct qemu_plugin_tb {
    _private: [u8; 0],
}

#[repr(C)]
pub struct qemu_plugin_insn {
    _private: [u8; 0],
}

/// `qemu_info_t`; only passed through.
#[repr(C)]
pub struct qemu_info_t {
    _private: [u8; 0],
}

pub type qemu_plugin_vcpu_tb_trans_cb_t =
    unsafe extern "C" fn(id: qemu_plugin_id_t, tb: *mut qemu_plugin_tb);
pub type qemu_plugin_vcpu_udata_cb_t = unsafe extern "C" fn(vcpu_index: c_uint, userdata: *mut c_void);
pub type qemu_plugin_udata_cb_t = unsafe extern "C" fn(id: qemu_plugin_id_t, userdata: *mut c_void);

unsafe extern "C" {
    pub fn qemu_plugin_register_vcpu_tb_trans_cb(
        id: qemu_plugin_id_t,
        cb: qemu_plugin_vcpu_tb_trans_cb_t,
    );

    pub fn qemu_plugin_register_vcpu_insn_exec_cb(
        insn: *mut qemu_plugin_insn,
        cb: qemu_plugin_vcpu_udata_cb_t,
        flags: qemu_plugin_cb_flags,
        userdata: *mut c_void,
    );

    pub fn qemu_plugin_register_atexit_cb(
        id: qemu_plugin_id_t,
        cb: qemu_plugin_udata_cb_t,
        userdata: *mut c_void,
    );

    pub fn qemu_plugin_tb_n_insns(tb: *const qemu_plugin_tb) -> usize;

    pub fn qemu_plugin_tb_get_insn(tb: *const qemu_plugin_tb, idx: usize) -> *mut qemu_plugin_insn;

    pub fn qemu_plugin_insn_vaddr(insn: *const qemu_plugin_insn) -> u64;

    /// Returns a string owned by the caller, released with [`g_free`].
    pub fn qemu_plugin_insn_disas(insn: *const qemu_plugin_insn) -> *mut c_char;

    pub fn g_free(mem: *mut c_void);
}
