//! C boundary
//!
//! A frontend crosses the boundary as an opaque `*mut DohFrontend` obtained
//! from [`frontend_new`] and released exactly once with [`frontend_delete`].
//! Every other call returns `false` for a null handle or invalid argument.
//! A panic inside a call is caught at the boundary and reported the same way
//! as a failure.

use crate::{init_tracing, DohFrontend};
use ferrous_doh_domain::Stats as DomainStats;
use std::ffi::{c_char, CStr};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use tracing::{error, warn};

/// Counter snapshot filled by [`frontend_stats`].
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub queries_received: u64,
    pub connections_accepted: u64,
    pub alive_connections: u64,
}

impl From<DomainStats> for Stats {
    fn from(stats: DomainStats) -> Self {
        Self {
            queries_received: stats.queries_received,
            connections_accepted: stats.connections_accepted,
            alive_connections: stats.alive_connections,
        }
    }
}

/// # Safety
/// `ptr` must be null or point to a NUL-terminated string.
unsafe fn to_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok()
}

/// Run `f`, turning a panic into `None` instead of unwinding across the boundary.
fn contained<R>(call: &str, f: impl FnOnce() -> R) -> Option<R> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(_) => {
            error!(call, "Panic caught at the C boundary");
            None
        }
    }
}

/// # Safety
/// `handle` must be null or a live pointer returned by [`frontend_new`].
unsafe fn with_frontend<R>(
    handle: *const DohFrontend,
    f: impl FnOnce(&DohFrontend) -> R,
) -> Option<R> {
    let frontend = handle.as_ref()?;
    contained("frontend", || f(frontend))
}

/// Create a stopped frontend; null when an address or service does not resolve.
///
/// # Safety
/// All arguments must be null or NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn frontend_new(
    listen_address: *const c_char,
    listen_service: *const c_char,
    backend_address: *const c_char,
    backend_service: *const c_char,
) -> *mut DohFrontend {
    contained("frontend_new", || {
        new_frontend(listen_address, listen_service, backend_address, backend_service)
    })
    .unwrap_or(ptr::null_mut())
}

unsafe fn new_frontend(
    listen_address: *const c_char,
    listen_service: *const c_char,
    backend_address: *const c_char,
    backend_service: *const c_char,
) -> *mut DohFrontend {
    init_tracing();

    let (Some(listen_address), Some(listen_service), Some(backend_address), Some(backend_service)) = (
        to_str(listen_address),
        to_str(listen_service),
        to_str(backend_address),
        to_str(backend_service),
    ) else {
        warn!("frontend_new called with a null or non UTF-8 argument");
        return ptr::null_mut();
    };

    match DohFrontend::new(listen_address, listen_service, backend_address, backend_service) {
        Ok(frontend) => Box::into_raw(Box::new(frontend)),
        Err(e) => {
            warn!(error = %e, "frontend_new failed");
            ptr::null_mut()
        }
    }
}

/// Stop the frontend if needed and free it. Null is ignored.
///
/// # Safety
/// `handle` must be null or come from [`frontend_new`], and is invalid afterwards.
#[no_mangle]
pub unsafe extern "C" fn frontend_delete(handle: *mut DohFrontend) {
    if !handle.is_null() {
        let frontend = Box::from_raw(handle);
        contained("frontend_delete", move || drop(frontend));
    }
}

/// # Safety
/// `handle` as for [`frontend_delete`]; `pem` must be null or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn frontend_set_certificate(
    handle: *mut DohFrontend,
    pem: *const c_char,
) -> bool {
    let Some(pem) = to_str(pem) else { return false };
    with_frontend(handle, |frontend| frontend.set_certificate(pem)).is_some()
}

/// # Safety
/// `handle` as for [`frontend_delete`]; `pem` must be null or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn frontend_set_private_key(
    handle: *mut DohFrontend,
    pem: *const c_char,
) -> bool {
    let Some(pem) = to_str(pem) else { return false };
    with_frontend(handle, |frontend| frontend.set_private_key(pem)).is_some()
}

/// # Safety
/// `handle` must be null or a live pointer from [`frontend_new`].
#[no_mangle]
pub unsafe extern "C" fn frontend_start(handle: *mut DohFrontend) -> bool {
    with_frontend(handle, |frontend| match frontend.start() {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "frontend_start failed");
            false
        }
    })
    .unwrap_or(false)
}

/// # Safety
/// `handle` must be null or a live pointer from [`frontend_new`].
#[no_mangle]
pub unsafe extern "C" fn frontend_stop(handle: *mut DohFrontend) -> bool {
    with_frontend(handle, |frontend| frontend.stop().is_ok()).unwrap_or(false)
}

/// # Safety
/// `handle` must be null or a live pointer from [`frontend_new`]; `out` must be
/// null or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn frontend_stats(handle: *mut DohFrontend, out: *mut Stats) -> bool {
    if out.is_null() {
        return false;
    }
    match with_frontend(handle, DohFrontend::stats) {
        Some(stats) => {
            out.write(stats.into());
            true
        }
        None => false,
    }
}

/// # Safety
/// `handle` must be null or a live pointer from [`frontend_new`].
#[no_mangle]
pub unsafe extern "C" fn frontend_stats_clear_queries(handle: *mut DohFrontend) -> bool {
    with_frontend(handle, DohFrontend::clear_queries).is_some()
}

/// # Safety
/// `handle` must be null or a live pointer from [`frontend_new`].
#[no_mangle]
pub unsafe extern "C" fn frontend_set_max_idle_timeout(handle: *mut DohFrontend, ms: u64) -> bool {
    with_frontend(handle, |frontend| frontend.set_max_idle_timeout(ms).is_ok()).unwrap_or(false)
}

/// # Safety
/// `handle` must be null or a live pointer from [`frontend_new`].
#[no_mangle]
pub unsafe extern "C" fn frontend_set_max_buffer_size(
    handle: *mut DohFrontend,
    bytes: u64,
) -> bool {
    with_frontend(handle, |frontend| frontend.set_max_buffer_size(bytes).is_ok())
        .unwrap_or(false)
}

/// # Safety
/// `handle` must be null or a live pointer from [`frontend_new`].
#[no_mangle]
pub unsafe extern "C" fn frontend_set_max_streams_bidi(
    handle: *mut DohFrontend,
    streams: u64,
) -> bool {
    with_frontend(handle, |frontend| frontend.set_max_streams_bidi(streams).is_ok())
        .unwrap_or(false)
}

/// # Safety
/// `handle` must be null or a live pointer from [`frontend_new`].
#[no_mangle]
pub unsafe extern "C" fn frontend_block_sending(handle: *mut DohFrontend, blocked: bool) -> bool {
    with_frontend(handle, |frontend| frontend.block_sending(blocked).is_ok()).unwrap_or(false)
}
