//! Diagnostics on stderr. Compilation never fails, so anomalies in
//! the markup (unmatched tags, unknown directives) are only reported
//! here, and only when enabled.

use std::sync::atomic::{AtomicBool, Ordering};

/// Whether `warn!` prints anything. Initialized from the
/// `GAIKAN_WARN` env var on first use, can be changed via
/// `set_enabled`.
pub static DO_WARN: AtomicBool = AtomicBool::new(false);

lazy_static::lazy_static! {
    static ref FROM_ENV: () = {
        if crate::options::env_flag("GAIKAN_WARN").ok().flatten().unwrap_or(false) {
            DO_WARN.store(true, Ordering::SeqCst);
        }
    };
}

pub fn set_enabled(on: bool) {
    lazy_static::initialize(&FROM_ENV);
    DO_WARN.store(on, Ordering::SeqCst)
}

pub fn enabled() -> bool {
    lazy_static::initialize(&FROM_ENV);
    DO_WARN.load(Ordering::SeqCst)
}

#[macro_export]
macro_rules! warn {
    ($formatstr:expr $(,$arg:expr)*) => { {
        if $crate::warn::enabled() {
            use std::io::Write;
            let mut outp = std::io::BufWriter::new(std::io::stderr().lock());
            let _ = write!(&mut outp, "W: ");
            let _ = write!(&mut outp, $formatstr $(,$arg)*);
            let _ = writeln!(&mut outp, " at {:?} line {}", file!(), line!());
            let _ = outp.flush();
        }
    } }
}
