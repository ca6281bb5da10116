//! QEMU TCG plugin host for the rvloop analyzer.
//!
//! ```text
//! qemu-riscv64 -plugin ./librvloop_qemu.so,match=exact,disas=on,report=text ./program
//! ```
//!
//! Plugin arguments are the `key=value` options understood by
//! [`AnalyzerConfig::apply_option`]. The report is written to stdout when the
//! guest exits; diagnostics go to stderr through `tracing` (`RUST_LOG`
//! overrides the default `rvloop=info`).

mod ffi;

use std::borrow::Cow;
use std::ffi::{CStr, c_char, c_int, c_uint, c_void};
use std::io;
use std::ptr;
use std::sync::{Arc, OnceLock};

use rvloop::{Analyzer, AnalyzerConfig, ExecProbe, TranslatedBlock};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

static ANALYZER: OnceLock<Analyzer> = OnceLock::new();

#[allow(non_upper_case_globals)]
#[unsafe(no_mangle)]
pub static qemu_plugin_version: c_int = ffi::QEMU_PLUGIN_VERSION;

/// A translation block as seen during the translation callback.
struct QemuBlock {
    tb: *mut ffi::qemu_plugin_tb,
}

impl QemuBlock {
    fn insn(&self, index: usize) -> *mut ffi::qemu_plugin_insn {
        // SAFETY: `tb` is valid for the duration of the translation callback
        // and `index` is below `qemu_plugin_tb_n_insns`.
        unsafe { ffi::qemu_plugin_tb_get_insn(self.tb, index) }
    }
}

impl TranslatedBlock for QemuBlock {
    fn len(&self) -> usize {
        // SAFETY: see `insn`.
        unsafe { ffi::qemu_plugin_tb_n_insns(self.tb) }
    }

    fn vaddr(&self, index: usize) -> u64 {
        // SAFETY: `insn` returns a handle owned by the block.
        unsafe { ffi::qemu_plugin_insn_vaddr(self.insn(index)) }
    }

    fn disas(&self, index: usize) -> Cow<'_, str> {
        // SAFETY: the returned string is NUL-terminated and ours to free.
        unsafe {
            let raw = ffi::qemu_plugin_insn_disas(self.insn(index));
            if raw.is_null() {
                return Cow::Borrowed("");
            }
            let text = CStr::from_ptr(raw).to_string_lossy().into_owned();
            ffi::g_free(raw.cast());
            Cow::Owned(text)
        }
    }

    fn register_exec(&mut self, index: usize, probe: Arc<ExecProbe>) {
        // The analyzer holds one probe per address for the rest of the run,
        // so the pointer outlives this handle and every retranslation shares it.
        let udata = Arc::as_ptr(&probe).cast_mut().cast::<c_void>();
        // SAFETY: `udata` is only read back by `vcpu_insn_exec` while the
        // static analyzer is alive.
        unsafe {
            ffi::qemu_plugin_register_vcpu_insn_exec_cb(
                self.insn(index),
                vcpu_insn_exec,
                ffi::QEMU_PLUGIN_CB_NO_REGS,
                udata,
            );
        }
    }
}

unsafe extern "C" fn vcpu_insn_exec(_vcpu_index: c_uint, udata: *mut c_void) {
    // SAFETY: registered with a pointer into the analyzer's probe table, which
    // is never shrunk.
    let probe = unsafe { &*udata.cast::<ExecProbe>() };
    if let Some(analyzer) = ANALYZER.get() {
        analyzer.fire(probe);
    }
}

unsafe extern "C" fn vcpu_tb_trans(_id: ffi::qemu_plugin_id_t, tb: *mut ffi::qemu_plugin_tb) {
    if let Some(analyzer) = ANALYZER.get() {
        analyzer.translate_block(&mut QemuBlock { tb });
    }
}

unsafe extern "C" fn plugin_exit(_id: ffi::qemu_plugin_id_t, _udata: *mut c_void) {
    let Some(analyzer) = ANALYZER.get() else {
        return;
    };
    let mut out = io::stdout().lock();
    if let Err(e) = analyzer.shutdown(&mut out) {
        error!(error = %e, "failed to write report");
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rvloop=info"));
    // Another plugin in the same process may already own the subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

/// Collect `argv` into owned strings.
///
/// # Safety
///
/// `argv` must point to `argc` valid NUL-terminated strings.
unsafe fn plugin_args(argc: c_int, argv: *const *const c_char) -> Vec<String> {
    if argv.is_null() {
        return Vec::new();
    }
    let argc = usize::try_from(argc).unwrap_or(0);
    (0..argc)
        .map(|i| {
            // SAFETY: guaranteed by the caller.
            unsafe { CStr::from_ptr(*argv.add(i)) }
                .to_string_lossy()
                .into_owned()
        })
        .collect()
}

/// Plugin entry point called by QEMU.
///
/// # Safety
///
/// Called by QEMU exactly once, with `argv` holding `argc` plugin arguments.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn qemu_plugin_install(
    id: ffi::qemu_plugin_id_t,
    _info: *const ffi::qemu_info_t,
    argc: c_int,
    argv: *const *const c_char,
) -> c_int {
    init_tracing();

    // SAFETY: forwarded from QEMU.
    let args = unsafe { plugin_args(argc, argv) };
    let config = match AnalyzerConfig::from_options(args.iter().map(String::as_str)) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid plugin argument");
            return -1;
        }
    };

    info!(
        match_mode = %config.mnemonic_match,
        shards = config.shards,
        report = %config.report_format,
        "rvloop plugin installed"
    );
    if ANALYZER.set(Analyzer::new(config)).is_err() {
        error!("plugin installed twice");
        return -1;
    }

    // SAFETY: registering plain function pointers with the id QEMU gave us.
    unsafe {
        ffi::qemu_plugin_register_vcpu_tb_trans_cb(id, vcpu_tb_trans);
        ffi::qemu_plugin_register_atexit_cb(id, plugin_exit, ptr::null_mut());
    }
    0
}
