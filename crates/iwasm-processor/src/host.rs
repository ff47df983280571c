//! Imports provided by the iwasm host.

#[cfg(target_arch = "wasm32")]
#[link(wasm_import_module = "iwasm_host")]
extern "C" {
    /// GET a URL; returns the body length, or `-(message_len + 1)` on error
    fn http_get(url_ptr: *const u8, url_len: usize) -> i32;

    /// Copy the parked response to `dst`; returns bytes copied or -1
    fn take_response(dst: *mut u8) -> i32;
}

/// Fetch `url` through the host's network capability.
#[cfg(target_arch = "wasm32")]
pub fn fetch(url: &str) -> Result<Vec<u8>, String> {
    let status = unsafe { http_get(url.as_ptr(), url.len()) };
    let (len, is_error) = if status >= 0 {
        (status as usize, false)
    } else {
        ((-(status + 1)) as usize, true)
    };

    let mut bytes = vec![0u8; len];
    let copied = unsafe { take_response(bytes.as_mut_ptr()) };
    if copied < 0 {
        return Err("host returned no response".to_string());
    }
    bytes.truncate(copied as usize);

    if is_error {
        Err(String::from_utf8_lossy(&bytes).into_owned())
    } else {
        Ok(bytes)
    }
}

/// Native builds have no host to ask.
#[cfg(not(target_arch = "wasm32"))]
pub fn fetch(url: &str) -> Result<Vec<u8>, String> {
    Err(format!("GET {url}: iwasm_host imports require wasm32"))
}
