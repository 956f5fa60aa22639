//! In-memory buffer scanning through the Windows Antimalware Scan Interface.
//!
//! On other platforms the scanner is unavailable and every scan reports
//! `AMSI_RESULT_ERROR`.

use super::BufferScanner;
use serde::{Serialize, Serializer};
use std::fmt;
use tracing::{debug, warn};

const AMSI_RESULT_CLEAN: i32 = 0;
const AMSI_RESULT_NOT_DETECTED: i32 = 1;
const AMSI_RESULT_BLOCKED_BY_ADMIN_START: i32 = 16384;
const AMSI_RESULT_BLOCKED_BY_ADMIN_END: i32 = 20479;
const AMSI_RESULT_DETECTED: i32 = 32768;

/// Classification of a buffer scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmsiVerdict {
    Clean,
    NotDetected,
    /// Any value in the administrator-block range, raw code kept. Only the
    /// range bounds have names; codes in between are reported numerically.
    BlockedByAdmin(i32),
    Detected,
    /// Value outside the known enumeration.
    Unknown(i32),
    /// The scan could not be performed.
    Error,
}

impl AmsiVerdict {
    /// Map a raw scan result code.
    pub fn from_code(code: i32) -> Self {
        match code {
            AMSI_RESULT_CLEAN => AmsiVerdict::Clean,
            AMSI_RESULT_NOT_DETECTED => AmsiVerdict::NotDetected,
            AMSI_RESULT_BLOCKED_BY_ADMIN_START..=AMSI_RESULT_BLOCKED_BY_ADMIN_END => {
                AmsiVerdict::BlockedByAdmin(code)
            }
            AMSI_RESULT_DETECTED => AmsiVerdict::Detected,
            other => AmsiVerdict::Unknown(other),
        }
    }

    /// Name reported to the server.
    pub fn name(&self) -> String {
        match self {
            AmsiVerdict::Clean => "AMSI_RESULT_CLEAN".to_string(),
            AmsiVerdict::NotDetected => "AMSI_RESULT_NOT_DETECTED".to_string(),
            AmsiVerdict::BlockedByAdmin(AMSI_RESULT_BLOCKED_BY_ADMIN_START) => {
                "AMSI_RESULT_BLOCKED_BY_ADMIN_START".to_string()
            }
            AmsiVerdict::BlockedByAdmin(AMSI_RESULT_BLOCKED_BY_ADMIN_END) => {
                "AMSI_RESULT_BLOCKED_BY_ADMIN_END".to_string()
            }
            AmsiVerdict::BlockedByAdmin(code) => code.to_string(),
            AmsiVerdict::Detected => "AMSI_RESULT_DETECTED".to_string(),
            AmsiVerdict::Unknown(code) => code.to_string(),
            AmsiVerdict::Error => "AMSI_RESULT_ERROR".to_string(),
        }
    }
}

impl fmt::Display for AmsiVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl Serialize for AmsiVerdict {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name())
    }
}

/// AMSI-backed buffer scanner.
#[derive(Debug, Clone)]
pub struct AmsiScanner {
    app_name: String,
    content_name: String,
}

impl Default for AmsiScanner {
    fn default() -> Self {
        Self::new("malslice")
    }
}

impl AmsiScanner {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            content_name: "InMemoryScan".to_string(),
        }
    }
}

impl BufferScanner for AmsiScanner {
    fn scan_buffer(&self, buffer: &[u8]) -> AmsiVerdict {
        match platform::scan(&self.app_name, &self.content_name, buffer) {
            Some(code) => {
                let verdict = AmsiVerdict::from_code(code);
                debug!(code, verdict = %verdict, "Buffer scan complete");
                verdict
            }
            None => {
                warn!(len = buffer.len(), "Buffer scan unavailable or failed");
                AmsiVerdict::Error
            }
        }
    }
}

#[cfg(windows)]
mod platform {
    use std::ffi::c_void;
    use std::ptr;

    type HResult = i32;

    #[link(name = "amsi")]
    extern "system" {
        fn AmsiInitialize(app_name: *const u16, amsi_context: *mut *mut c_void) -> HResult;
        fn AmsiScanBuffer(
            amsi_context: *mut c_void,
            buffer: *const c_void,
            length: u32,
            content_name: *const u16,
            amsi_session: *mut c_void,
            result: *mut i32,
        ) -> HResult;
        fn AmsiUninitialize(amsi_context: *mut c_void);
    }

    fn wide(s: &str) -> Vec<u16> {
        s.encode_utf16().chain(std::iter::once(0)).collect()
    }

    pub(super) fn scan(app_name: &str, content_name: &str, buffer: &[u8]) -> Option<i32> {
        let length = u32::try_from(buffer.len()).ok()?;
        let app = wide(app_name);
        let content = wide(content_name);
        let mut context: *mut c_void = ptr::null_mut();
        let mut result: i32 = 0;

        // Safety: all pointers reference live, NUL-terminated or length-bounded
        // buffers for the duration of the calls; the context is released once.
        unsafe {
            if AmsiInitialize(app.as_ptr(), &mut context) < 0 || context.is_null() {
                return None;
            }
            let hr = AmsiScanBuffer(
                context,
                buffer.as_ptr() as *const c_void,
                length,
                content.as_ptr(),
                ptr::null_mut(),
                &mut result,
            );
            AmsiUninitialize(context);
            if hr < 0 {
                return None;
            }
        }
        Some(result)
    }
}

#[cfg(not(windows))]
mod platform {
    pub(super) fn scan(_app_name: &str, _content_name: &str, _buffer: &[u8]) -> Option<i32> {
        None
    }
}
