#![allow(clippy::missing_safety_doc)]
#![allow(clippy::not_unsafe_ptr_arg_deref)]

//! C ABI linked into instrumented programs.
//!
//! Every thread gets its own `Recorder` on first report. Reports never
//! unwind into the host; a failed dump prints the error and exits.

use std::cell::RefCell;
use std::ffi::{c_char, c_int, CStr};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use honest_report::slot::{slots_from_raw, ReportSlot};
use honest_report::{DumpOutcome, InsertOutcome, Recorder, ReporterConfig};
use once_cell::sync::OnceCell;

static CONFIG: OnceCell<ReporterConfig> = OnceCell::new();
static HOOKS: OnceCell<()> = OnceCell::new();
static NEXT_CONTEXT: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static CONTEXT: RefCell<Context> = RefCell::new(Context::new());
    static DUMP_ON_EXIT: DumpOnExit = const { DumpOnExit };
}

fn config() -> &'static ReporterConfig {
    CONFIG.get_or_init(ReporterConfig::from_env)
}

/// Install `cfg` instead of reading the environment.
///
/// Returns `false` if a configuration is already in effect.
pub fn configure(cfg: ReporterConfig) -> bool {
    CONFIG.set(cfg).is_ok()
}

struct Context {
    recorder: Recorder,
}

impl Context {
    fn new() -> Self {
        Context {
            recorder: Recorder::new(config()),
        }
    }

    fn dump(&mut self) -> Result<DumpOutcome> {
        if self.recorder.has_dumped() {
            return Ok(DumpOutcome::AlreadyDumped);
        }
        // Ordinals go to contexts in dump order, so the first one to finish
        // owns the configured path.
        let ordinal = NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed);
        let target = config().output.for_context(ordinal);
        self.recorder.dump_to(&target)
    }
}

/// Dumps the thread's report when the thread exits.
///
/// Touched right after `CONTEXT` is first used, so it is destroyed before it.
/// Skips the dump while the recorder is borrowed, e.g. when a signal handler
/// calls `exit` in the middle of a report.
struct DumpOnExit;

impl Drop for DumpOnExit {
    fn drop(&mut self) {
        dump_current_thread();
    }
}

fn dump_current_thread() {
    if config().silent {
        return;
    }
    let outcome = CONTEXT.try_with(|ctx| match ctx.try_borrow_mut() {
        Ok(mut ctx) => ctx.dump(),
        Err(_) => Ok(DumpOutcome::AlreadyDumped),
    });
    if let Ok(Err(err)) = outcome {
        fatal(&err);
    }
}

fn fatal(err: &anyhow::Error) -> ! {
    eprintln!("honest-report: {err:#}");
    unsafe { libc::exit(libc::EXIT_FAILURE) }
}

/// Run `f` on this thread's recorder.
///
/// `None` when the thread-local is gone (thread teardown) or already borrowed
/// further up the stack.
pub fn with_recorder<R>(f: impl FnOnce(&mut Recorder) -> R) -> Option<R> {
    CONTEXT
        .try_with(|ctx| {
            let _ = DUMP_ON_EXIT.try_with(|_| ());
            let mut ctx = ctx.try_borrow_mut().ok()?;
            Some(f(&mut ctx.recorder))
        })
        .ok()
        .flatten()
}

fn record(is_return: bool, meta: &str, slots: &[ReportSlot]) -> Option<InsertOutcome> {
    with_recorder(|r| r.report(is_return, meta, slots)).flatten()
}

/// Report one call site.
///
/// `meta` is the NUL-terminated `name>>=type>>=...` string and `slots` holds
/// `len` values: the parameters at entry, or the return value followed by
/// the pointer parameters at a return. Returns 0, or 1 if a panic was caught.
#[no_mangle]
pub extern "C" fn report_param(
    is_return: bool,
    meta: *const c_char,
    len: c_int,
    slots: *const ReportSlot,
) -> c_int {
    std::panic::catch_unwind(|| unsafe {
        if config().silent {
            return 0;
        }
        if meta.is_null() {
            tracing::warn!(target: "honest_report", "report without metadata");
            return 0;
        }
        let meta = CStr::from_ptr(meta).to_string_lossy();
        let slots = slots_from_raw(slots, len);
        record(is_return, &meta, slots);
        0
    })
    .unwrap_or(1)
}

/// Write this thread's report. Later calls on the same thread do nothing,
/// and so does a call made while the recorder is busy.
#[no_mangle]
pub extern "C" fn dump_count() {
    let _ = std::panic::catch_unwind(dump_current_thread);
}

extern "C" fn exit_on_signal(_sig: c_int) {
    unsafe { libc::exit(libc::EXIT_FAILURE) }
}

/// Dump at normal exit and on `SIGINT`/`SIGTERM`.
///
/// The signal handlers call `exit`, which runs the `atexit` dump.
#[no_mangle]
pub extern "C" fn honest_report_install_exit_hooks() {
    HOOKS.get_or_init(|| unsafe {
        if libc::atexit(dump_count) != 0 {
            tracing::warn!(target: "honest_report", "atexit registration failed");
        }
        let handler = exit_on_signal as extern "C" fn(c_int) as libc::sighandler_t;
        for sig in [libc::SIGINT, libc::SIGTERM] {
            if libc::signal(sig, handler) == libc::SIG_ERR {
                tracing::warn!(target: "honest_report", sig, "signal handler registration failed");
            }
        }
    });
}
