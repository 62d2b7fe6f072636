//! Translates the driver's transfer vector into a job descriptor and a
//! linker-operations table, registers the claim_file/all_symbols_read/
//! new_input/cleanup hooks, and drives the xwrap orchestration from
//! inside those hooks.

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use crate::plugin::abi::{self, tag};
use crate::xwrap::Xwrap;

/// Scalar/string fields the transfer vector hands us directly.
pub struct Job {
    pub argv: Vec<String>,
    pub argv0: PathBuf,
    pub output_name: Option<String>,
    pub linker_output: i32,
    pub plugin_options: Vec<String>,
}

/// Function-pointer slots the transfer vector hands us, wrapped so the
/// rest of the crate never touches raw `extern "C"` pointers directly.
#[derive(Default)]
pub struct LinkerOps {
    add_input_file: Option<abi::ld_plugin_add_input_file>,
    add_input_library: Option<abi::ld_plugin_add_input_library>,
    message: Option<abi::ld_plugin_message>,
}

impl LinkerOps {
    pub fn add_input_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        let Some(f) = self.add_input_file else {
            return Err(crate::error::XwrapError::Usage(
                "driver did not provide add_input_file".to_string(),
            ));
        };
        let s = path.to_string_lossy();
        let c = CString::new(s.as_bytes()).map_err(|_| {
            crate::error::XwrapError::Usage("surrogate path contains a NUL byte".to_string())
        })?;
        // SAFETY: `f` was handed to us by the driver at onload time and
        // remains valid for the process lifetime; `c` outlives the call.
        let status = unsafe { f(c.as_ptr()) };
        if status == abi::LDPS_OK {
            Ok(())
        } else {
            Err(crate::error::XwrapError::Usage(format!(
                "add_input_file({s}) rejected by driver (status {status})"
            )))
        }
    }

    pub fn message(&self, text: &str) {
        let Some(f) = self.message else { return };
        let Ok(fmt) = CString::new("%s") else { return };
        let Ok(msg) = CString::new(text) else { return };
        // SAFETY: matches the C varargs contract of `ld_plugin_message`:
        // one `%s` conversion, one corresponding `*const c_char` argument.
        unsafe {
            f(0, fmt.as_ptr(), msg.as_ptr());
        }
    }
}

pub struct PluginInstance {
    pub job: Job,
    pub linker: LinkerOps,
    pub xwrap: Xwrap,
}

static INSTANCE: OnceLock<Mutex<PluginInstance>> = OnceLock::new();

fn instance() -> &'static Mutex<PluginInstance> {
    INSTANCE.get().expect("onload must run before any hook fires")
}

fn read_cmdline() -> Vec<String> {
    std::fs::read("/proc/self/cmdline")
        .unwrap_or_default()
        .split(|&b| b == 0)
        .filter(|s| !s.is_empty())
        .map(|s| String::from_utf8_lossy(s).into_owned())
        .collect()
}

unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
    }
}

/// The plugin's C-linkage entrypoint. Called once by the driver with a
/// null-tag-terminated transfer vector.
///
/// # Safety
/// `tv` must point at a valid, null-terminated array of `ld_plugin_tv` as
/// produced by the driver; this is the FFI boundary the whole crate
/// trusts.
#[no_mangle]
pub unsafe extern "C" fn onload(tv: *mut abi::ld_plugin_tv) -> abi::ld_plugin_status {
    crate::logging::init();

    if crate::env::delay_startup_requested() {
        let pid = std::process::id();
        tracing::info!(pid, "LD_DELAY_STARTUP set, sleeping 12s");
        std::thread::sleep(std::time::Duration::from_secs(12));
        crate::env::clear_delay_startup();
    }

    let argv = read_cmdline();
    let argv0 = argv
        .first()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("ld"));
    let ld_cmd = std::fs::canonicalize(&argv0).unwrap_or_else(|_| argv0.clone());

    let mut job = Job {
        argv: argv.clone(),
        argv0,
        output_name: None,
        linker_output: abi::LDPO_REL,
        plugin_options: Vec::new(),
    };
    let mut linker = LinkerOps::default();

    let mut cursor = tv;
    loop {
        let entry = &*cursor;
        match entry.tag {
            tag::NULL => break,
            tag::OUTPUT_NAME => {
                job.output_name = cstr_to_string(entry.value.tv_string);
            }
            tag::OPTION => {
                if let Some(opt) = cstr_to_string(entry.value.tv_string) {
                    job.plugin_options.push(opt);
                }
            }
            tag::LINKER_OUTPUT => {
                job.linker_output = entry.value.tv_val as i32;
            }
            tag::ADD_INPUT_FILE => linker.add_input_file = Some(entry.value.tv_add_input_file),
            tag::ADD_INPUT_LIBRARY => linker.add_input_library = Some(entry.value.tv_add_input_library),
            tag::MESSAGE => linker.message = Some(entry.value.tv_message),
            tag::REGISTER_CLAIM_FILE => {
                (entry.value.tv_register_claim_file)(claim_file_thunk);
            }
            tag::REGISTER_ALL_SYMBOLS_READ => {
                (entry.value.tv_register_all_symbols_read)(all_symbols_read_thunk);
            }
            tag::REGISTER_CLEANUP => {
                (entry.value.tv_register_cleanup)(cleanup_thunk);
            }
            tag::REGISTER_NEW_INPUT_HOOK => {
                (entry.value.tv_register_new_input)(new_input_thunk);
            }
            other => {
                tracing::trace!(tag = other, "ignoring unrecognized transfer-vector tag");
            }
        }
        cursor = cursor.add(1);
    }

    let xwrap = match Xwrap::bootstrap(job.argv.clone(), ld_cmd) {
        Ok(x) => x,
        Err(err) => {
            tracing::error!(%err, "xwrap bootstrap failed");
            return abi::LDPS_ERR;
        }
    };

    let instance = PluginInstance { job, linker, xwrap };
    if INSTANCE.set(Mutex::new(instance)).is_err() {
        tracing::error!("onload called twice in the same process");
        return abi::LDPS_ERR;
    }
    abi::LDPS_OK
}

unsafe extern "C" fn claim_file_thunk(
    file: *const abi::ld_plugin_input_file,
    claimed: *mut c_int,
) -> abi::ld_plugin_status {
    if file.is_null() || claimed.is_null() {
        return abi::LDPS_ERR;
    }
    let file = &*file;
    let Some(name) = cstr_to_string(file.name) else {
        return abi::LDPS_ERR;
    };
    let offset = file.offset.max(0) as u64;

    let mut guard = instance().lock().expect("plugin instance mutex poisoned");
    match guard.xwrap.claim_file(std::path::Path::new(&name), offset) {
        Ok(Some(_surrogate)) => {
            *claimed = 1;
            abi::LDPS_OK
        }
        Ok(None) => {
            *claimed = 0;
            abi::LDPS_OK
        }
        Err(err) => {
            tracing::error!(%err, input = %name, "claim_file failed");
            abi::LDPS_ERR
        }
    }
}

unsafe extern "C" fn all_symbols_read_thunk() -> abi::ld_plugin_status {
    let guard = instance().lock().expect("plugin instance mutex poisoned");
    let surrogates: Vec<PathBuf> = guard.xwrap.surrogates().map(|p| p.to_path_buf()).collect();
    for surrogate in surrogates {
        if let Err(err) = guard.linker.add_input_file(&surrogate) {
            tracing::error!(%err, ?surrogate, "all_symbols_read: failed to re-enter surrogate");
            return abi::LDPS_ERR;
        }
    }
    abi::LDPS_OK
}

unsafe extern "C" fn new_input_thunk(_file: *const abi::ld_plugin_input_file) {
    tracing::trace!("new_input: no-op");
}

unsafe extern "C" fn cleanup_thunk() -> abi::ld_plugin_status {
    if let Some(mutex) = INSTANCE.get() {
        if let Ok(guard) = mutex.lock() {
            guard.xwrap.cleanup();
        }
    }
    abi::LDPS_OK
}
