//! Safe, move-only handles over the codec engine's raw descriptors.
//!
//! This is the marshaling layer: it converts paths to C strings,
//! null-checks the engine's returns, and wraps the surviving pointers
//! in RAII handles. A handle owns its descriptor exclusively; release
//! happens exactly once, either through the consuming [`release`]
//! methods or on drop. The engine's release calls null the pointer
//! slot, so the drop path after an explicit release is a no-op.
//!
//! [`release`]: MatrixHandle::release

use crate::codec::{self, CvMatrix, ImageHeader};
use crate::error::{self, LoadError, SaveError};
use std::ffi::{c_void, CString};
use std::os::raw::c_int;
use std::path::Path;

/// Decode behavior flag, passed through to the engine unchanged.
///
/// Values follow the historical load-mode constants: negative keeps
/// the decoded channel layout, zero forces grayscale, positive forces
/// color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum LoadMode {
    Unchanged = -1,
    Grayscale = 0,
    Color = 1,
}

impl LoadMode {
    /// The raw flag value handed to the decoder.
    pub fn as_c_int(self) -> c_int {
        self as c_int
    }
}

/// Read access shared by both handle forms: geometry plus an untyped
/// pointer export for calls that accept either descriptor layout.
pub trait ImageRef {
    /// Image width in pixels.
    fn width(&self) -> u32;

    /// Image height in pixels.
    fn height(&self) -> u32;

    /// Number of 8-bit channels per pixel.
    fn channels(&self) -> u32;

    /// Untyped pointer to the underlying descriptor, valid only while
    /// this handle is live.
    fn as_raw_ptr(&self) -> *const c_void;
}

/// Owning handle for a matrix-form image descriptor.
///
/// Move-only: dropping or calling [`release`](Self::release) frees the
/// native resources exactly once.
pub struct MatrixHandle {
    ptr: *mut CvMatrix,
}

impl MatrixHandle {
    /// Explicitly releases the descriptor, consuming the handle.
    pub fn release(mut self) {
        // SAFETY: ptr came from decode_matrix and is still owned here;
        // release_matrix nulls it, making the drop path a no-op.
        unsafe { codec::release_matrix(&mut self.ptr) };
    }
}

impl ImageRef for MatrixHandle {
    fn width(&self) -> u32 {
        // SAFETY: ptr is non-null and live for the lifetime of self.
        unsafe { (*self.ptr).cols as u32 }
    }

    fn height(&self) -> u32 {
        // SAFETY: ptr is non-null and live for the lifetime of self.
        unsafe { (*self.ptr).rows as u32 }
    }

    fn channels(&self) -> u32 {
        // SAFETY: ptr is non-null and live for the lifetime of self.
        unsafe { (*self.ptr).channels as u32 }
    }

    fn as_raw_ptr(&self) -> *const c_void {
        self.ptr as *const c_void
    }
}

impl Drop for MatrixHandle {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            // SAFETY: ptr was allocated by decode_matrix and not yet released.
            unsafe { codec::release_matrix(&mut self.ptr) };
        }
    }
}

/// Owning handle for a legacy fixed-header image descriptor.
///
/// Same ownership discipline as [`MatrixHandle`], but released through
/// the legacy lifecycle call.
pub struct LegacyHandle {
    ptr: *mut ImageHeader,
}

impl LegacyHandle {
    /// Explicitly releases the descriptor, consuming the handle.
    pub fn release(mut self) {
        // SAFETY: ptr came from decode_header and is still owned here;
        // release_header nulls it, making the drop path a no-op.
        unsafe { codec::release_header(&mut self.ptr) };
    }
}

impl ImageRef for LegacyHandle {
    fn width(&self) -> u32 {
        // SAFETY: ptr is non-null and live for the lifetime of self.
        unsafe { (*self.ptr).width as u32 }
    }

    fn height(&self) -> u32 {
        // SAFETY: ptr is non-null and live for the lifetime of self.
        unsafe { (*self.ptr).height as u32 }
    }

    fn channels(&self) -> u32 {
        // SAFETY: ptr is non-null and live for the lifetime of self.
        unsafe { (*self.ptr).channels as u32 }
    }

    fn as_raw_ptr(&self) -> *const c_void {
        self.ptr as *const c_void
    }
}

impl Drop for LegacyHandle {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            // SAFETY: ptr was allocated by decode_header and not yet released.
            unsafe { codec::release_header(&mut self.ptr) };
        }
    }
}

// Handles hold raw pointers into engine-owned storage and are
// deliberately not Send/Sync; calls are single-threaded and blocking.

fn path_to_cstring(path: &Path) -> Option<CString> {
    path.to_str().and_then(|s| CString::new(s).ok())
}

/// Loads an image into a matrix-form handle.
///
/// The mode flag is passed through to the decoder unchanged. On
/// success the handle's width/height reflect the decoded pixel
/// dimensions exactly.
pub fn load_image_matrix(
    path: impl AsRef<Path>,
    mode: LoadMode,
) -> Result<MatrixHandle, LoadError> {
    let path = path.as_ref();
    let c_path = path_to_cstring(path).ok_or_else(|| {
        LoadError::UnsupportedFormat(format!("unrepresentable path: {}", path.display()))
    })?;
    // SAFETY: c_path is a valid NUL-terminated string for the call.
    let ptr = unsafe { codec::decode_matrix(c_path.as_ptr(), mode.as_c_int()) };
    if ptr.is_null() {
        return Err(error::load_error_from_last("image decode failed"));
    }
    Ok(MatrixHandle { ptr })
}

/// Loads an image into a legacy fixed-header handle.
///
/// Same contract as [`load_image_matrix`]; use
/// [`ImageRef::as_raw_ptr`] for interop calls that expect the matrix
/// form's untyped pointer.
pub fn load_image_legacy(path: impl AsRef<Path>, mode: LoadMode) -> Result<LegacyHandle, LoadError> {
    let path = path.as_ref();
    let c_path = path_to_cstring(path).ok_or_else(|| {
        LoadError::UnsupportedFormat(format!("unrepresentable path: {}", path.display()))
    })?;
    // SAFETY: c_path is a valid NUL-terminated string for the call.
    let ptr = unsafe { codec::decode_header(c_path.as_ptr(), mode.as_c_int()) };
    if ptr.is_null() {
        return Err(error::load_error_from_last("image decode failed"));
    }
    Ok(LegacyHandle { ptr })
}

/// Saves a live handle to `path`; the encoded format is selected by the
/// path's extension. The handle is borrowed, not consumed — ownership
/// and release stay with the caller.
pub fn save_image(path: impl AsRef<Path>, image: &impl ImageRef) -> Result<(), SaveError> {
    // SAFETY: the borrowed handle keeps its descriptor live for the call.
    unsafe { save_image_raw(path.as_ref(), image.as_raw_ptr()) }
}

/// Raw-pointer variant of [`save_image`] for interop with callers that
/// hold an untyped descriptor pointer.
///
/// # Safety
///
/// `image` must point to a live descriptor produced by the engine (in
/// either form) that has not been released.
pub unsafe fn save_image_raw(path: &Path, image: *const c_void) -> Result<(), SaveError> {
    let c_path = path_to_cstring(path).ok_or_else(|| {
        SaveError::EncodeFailed(format!("unrepresentable path: {}", path.display()))
    })?;
    // SAFETY: c_path is valid for the call; image validity is the
    // caller's contract.
    let rc = unsafe { codec::encode_to_path(c_path.as_ptr(), image) };
    if rc != codec::ERR_NONE {
        return Err(error::save_error_from_last("image encode failed"));
    }
    Ok(())
}
