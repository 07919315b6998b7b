//! Codec engine with a C-shaped, raw-pointer handle surface.
//!
//! This module plays the role of the native codec library: it owns all
//! pixel storage and hands out heap-allocated, fixed-layout descriptors
//! that callers address only through raw pointers. Two historical
//! descriptor forms exist:
//!
//! - [`CvMatrix`]: the matrix form, reference-counted, identified by a
//!   magic value in its leading `tag` field.
//! - [`ImageHeader`]: the legacy fixed-header form, identified by its
//!   leading `header_size` field matching `size_of::<ImageHeader>()`.
//!
//! Both start with an `i32`, so [`encode_to_path`] can accept an
//! untyped pointer and dispatch on the leading word. Failures are
//! reported through a thread-local last-error channel (code + message),
//! drained by the wrapper layer via [`take_last_error`].
//!
//! The safe marshaling layer on top of this surface lives in
//! [`crate::handle`].

use std::cell::RefCell;
use std::ffi::c_void;
use std::os::raw::{c_char, c_int};
use std::path::{Path, PathBuf};
use std::ptr;

use image::{ColorType, DynamicImage, GenericImageView, ImageError};

/// Magic value in the leading `tag` field of a [`CvMatrix`].
pub const MATRIX_TAG: i32 = 0x4242_0000;

/// Leading word of an [`ImageHeader`]; distinct from [`MATRIX_TAG`].
pub const IMAGE_HEADER_SIZE: i32 = std::mem::size_of::<ImageHeader>() as i32;

/// No pending error.
pub const ERR_NONE: c_int = 0;
/// The input path does not reference a readable file.
pub const ERR_NOT_FOUND: c_int = 1;
/// The decoder could not produce pixels from the input.
pub const ERR_DECODE: c_int = 2;
/// The encoder could not serialize the pixels (format, color type).
pub const ERR_ENCODE: c_int = 3;
/// The encoded output could not be written to the file system.
pub const ERR_WRITE: c_int = 4;
/// The descriptor pointer did not carry a recognized leading tag.
pub const ERR_BAD_HANDLE: c_int = 5;

/// Matrix-form image descriptor.
///
/// Created at refcount 1 by [`decode_matrix`]; [`release_matrix`]
/// decrements and frees the descriptor and its pixel buffer when the
/// count reaches zero.
#[repr(C)]
#[derive(Debug)]
pub struct CvMatrix {
    /// Always [`MATRIX_TAG`].
    pub tag: i32,
    pub rows: i32,
    pub cols: i32,
    pub channels: i32,
    /// Bits per channel (always 8 for this engine).
    pub depth: i32,
    /// Bytes per pixel row.
    pub step: i32,
    pub refcount: i32,
    pub data: *mut u8,
    pub data_len: usize,
}

/// Legacy fixed-header image descriptor.
///
/// Identified by `header_size == size_of::<ImageHeader>()`; freed via
/// [`release_header`], a distinct lifecycle call from the matrix form.
#[repr(C)]
#[derive(Debug)]
pub struct ImageHeader {
    /// Always [`IMAGE_HEADER_SIZE`].
    pub header_size: i32,
    pub width: i32,
    pub height: i32,
    pub channels: i32,
    /// Bits per channel (always 8 for this engine).
    pub depth: i32,
    /// Row origin: 0 = top-left.
    pub origin: i32,
    /// Bytes per pixel row.
    pub width_step: i32,
    pub data: *mut u8,
    pub data_len: usize,
}

thread_local! {
    static LAST_ERROR: RefCell<Option<(c_int, String)>> = const { RefCell::new(None) };
}

fn set_last_error(code: c_int, msg: impl Into<String>) {
    LAST_ERROR.with(|e| *e.borrow_mut() = Some((code, msg.into())));
}

/// Takes and clears the engine's pending error, if any.
pub fn take_last_error() -> Option<(c_int, String)> {
    LAST_ERROR.with(|e| e.borrow_mut().take())
}

/// Converts a NUL-terminated path into a `PathBuf`, recording an error
/// on null or non-UTF-8 input.
///
/// # Safety
///
/// `path` must be null or point to a valid NUL-terminated string.
unsafe fn path_from_c(path: *const c_char) -> Option<PathBuf> {
    if path.is_null() {
        set_last_error(ERR_DECODE, "null path");
        return None;
    }
    // SAFETY: path is non-null and NUL-terminated per the caller's contract.
    let cstr = unsafe { std::ffi::CStr::from_ptr(path) };
    match cstr.to_str() {
        Ok(s) => Some(PathBuf::from(s)),
        Err(_) => {
            set_last_error(ERR_DECODE, "path is not valid UTF-8");
            None
        }
    }
}

/// Decodes a file into raw 8-bit pixels according to the load mode.
///
/// The mode follows the historical sign convention: `> 0` forces
/// three-channel color, `== 0` forces single-channel grayscale, `< 0`
/// keeps the decoded channel layout unchanged.
fn decode_pixels(path: &Path, mode: c_int) -> Option<(Vec<u8>, u32, u32, i32)> {
    let img = match image::open(path) {
        Ok(img) => img,
        Err(ImageError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            set_last_error(ERR_NOT_FOUND, format!("{}: {}", path.display(), e));
            return None;
        }
        Err(e) => {
            set_last_error(ERR_DECODE, format!("{}: {}", path.display(), e));
            return None;
        }
    };

    let (width, height) = (img.width(), img.height());
    let (pixels, channels) = flatten_pixels(img, mode);
    Some((pixels, width, height, channels))
}

fn flatten_pixels(img: DynamicImage, mode: c_int) -> (Vec<u8>, i32) {
    if mode > 0 {
        (img.to_rgb8().into_raw(), 3)
    } else if mode == 0 {
        (img.to_luma8().into_raw(), 1)
    } else {
        match img.color().channel_count() {
            1 => (img.to_luma8().into_raw(), 1),
            2 => (img.to_luma_alpha8().into_raw(), 2),
            4 => (img.to_rgba8().into_raw(), 4),
            _ => (img.to_rgb8().into_raw(), 3),
        }
    }
}

/// Moves a pixel vector onto the heap and leaks it to a raw pointer.
fn leak_pixels(pixels: Vec<u8>) -> (*mut u8, usize) {
    let len = pixels.len();
    let data = Box::into_raw(pixels.into_boxed_slice()) as *mut u8;
    (data, len)
}

/// Reclaims a pixel buffer produced by [`leak_pixels`].
///
/// # Safety
///
/// `data`/`len` must come from a single prior [`leak_pixels`] call and
/// must not be freed again afterwards.
unsafe fn free_pixels(data: *mut u8, len: usize) {
    if data.is_null() {
        return;
    }
    // SAFETY: data/len describe the boxed slice leaked in leak_pixels.
    unsafe {
        drop(Box::from_raw(std::slice::from_raw_parts_mut(data, len) as *mut [u8]));
    }
}

/// Decodes `path` into a heap-allocated matrix-form descriptor.
///
/// Returns null on failure; the error is available via
/// [`take_last_error`]. On success the caller owns the descriptor and
/// must release it exactly once through [`release_matrix`].
///
/// # Safety
///
/// `path` must be null or point to a valid NUL-terminated string.
pub unsafe fn decode_matrix(path: *const c_char, mode: c_int) -> *mut CvMatrix {
    // SAFETY: forwarded caller contract.
    let path = match unsafe { path_from_c(path) } {
        Some(p) => p,
        None => return ptr::null_mut(),
    };
    let (pixels, width, height, channels) = match decode_pixels(&path, mode) {
        Some(v) => v,
        None => return ptr::null_mut(),
    };

    let (data, data_len) = leak_pixels(pixels);
    Box::into_raw(Box::new(CvMatrix {
        tag: MATRIX_TAG,
        rows: height as i32,
        cols: width as i32,
        channels,
        depth: 8,
        step: width as i32 * channels,
        refcount: 1,
        data,
        data_len,
    }))
}

/// Decodes `path` into a heap-allocated legacy-header descriptor.
///
/// Same contract as [`decode_matrix`], but the result must be released
/// through [`release_header`].
///
/// # Safety
///
/// `path` must be null or point to a valid NUL-terminated string.
pub unsafe fn decode_header(path: *const c_char, mode: c_int) -> *mut ImageHeader {
    // SAFETY: forwarded caller contract.
    let path = match unsafe { path_from_c(path) } {
        Some(p) => p,
        None => return ptr::null_mut(),
    };
    let (pixels, width, height, channels) = match decode_pixels(&path, mode) {
        Some(v) => v,
        None => return ptr::null_mut(),
    };

    let (data, data_len) = leak_pixels(pixels);
    Box::into_raw(Box::new(ImageHeader {
        header_size: IMAGE_HEADER_SIZE,
        width: width as i32,
        height: height as i32,
        channels,
        depth: 8,
        origin: 0,
        width_step: width as i32 * channels,
        data,
        data_len,
    }))
}

/// Encodes the descriptor behind `image` to `path`, format selected by
/// the path's extension. Accepts either descriptor form, dispatching on
/// the leading `i32`. Returns 0 on success, -1 on failure (error via
/// [`take_last_error`]). Does not release the descriptor.
///
/// # Safety
///
/// `image` must be null or point to a live descriptor produced by
/// [`decode_matrix`] or [`decode_header`]; `path` must be null or a
/// valid NUL-terminated string.
pub unsafe fn encode_to_path(path: *const c_char, image: *const c_void) -> c_int {
    if image.is_null() {
        set_last_error(ERR_BAD_HANDLE, "null image descriptor");
        return -1;
    }
    // SAFETY: both descriptor forms start with an i32 tag word.
    let tag = unsafe { *(image as *const i32) };
    let (width, height, channels, data, data_len) = if tag == MATRIX_TAG {
        // SAFETY: tag identifies a live CvMatrix per the caller's contract.
        let m = unsafe { &*(image as *const CvMatrix) };
        (m.cols, m.rows, m.channels, m.data, m.data_len)
    } else if tag == IMAGE_HEADER_SIZE {
        // SAFETY: tag identifies a live ImageHeader per the caller's contract.
        let h = unsafe { &*(image as *const ImageHeader) };
        (h.width, h.height, h.channels, h.data, h.data_len)
    } else {
        set_last_error(
            ERR_BAD_HANDLE,
            format!("unrecognized image descriptor tag {tag:#x}"),
        );
        return -1;
    };

    // SAFETY: forwarded caller contract.
    let path = match unsafe { path_from_c(path) } {
        Some(p) => p,
        None => return -1,
    };
    let format = match image::ImageFormat::from_path(&path) {
        Ok(f) => f,
        Err(e) => {
            set_last_error(ERR_ENCODE, format!("{}: {}", path.display(), e));
            return -1;
        }
    };
    let color = match channels {
        1 => ColorType::L8,
        2 => ColorType::La8,
        3 => ColorType::Rgb8,
        4 => ColorType::Rgba8,
        n => {
            set_last_error(ERR_ENCODE, format!("unsupported channel count {n}"));
            return -1;
        }
    };

    // SAFETY: data/data_len describe the descriptor's live pixel buffer.
    let pixels = unsafe { std::slice::from_raw_parts(data, data_len) };
    match image::save_buffer_with_format(&path, pixels, width as u32, height as u32, color, format)
    {
        Ok(()) => ERR_NONE,
        Err(ImageError::IoError(e)) => {
            set_last_error(ERR_WRITE, format!("{}: {}", path.display(), e));
            -1
        }
        Err(e) => {
            set_last_error(ERR_ENCODE, format!("{}: {}", path.display(), e));
            -1
        }
    }
}

/// Releases a matrix descriptor and nulls the caller's pointer.
///
/// Decrements the refcount; the descriptor and its pixel buffer are
/// freed when it reaches zero. A null slot or null descriptor is a
/// no-op, so a second release through the same (now nulled) slot is
/// harmless.
///
/// # Safety
///
/// `mat` must be null or point to a pointer slot holding either null or
/// a descriptor from [`decode_matrix`] not yet fully released.
pub unsafe fn release_matrix(mat: *mut *mut CvMatrix) {
    // SAFETY: slot and descriptor validity per the caller's contract.
    unsafe {
        if mat.is_null() || (*mat).is_null() {
            return;
        }
        let m = *mat;
        (*m).refcount -= 1;
        if (*m).refcount <= 0 {
            let boxed = Box::from_raw(m);
            free_pixels(boxed.data, boxed.data_len);
        }
        *mat = ptr::null_mut();
    }
}

/// Releases a legacy-header descriptor and nulls the caller's pointer.
/// A null slot or null descriptor is a no-op.
///
/// # Safety
///
/// `hdr` must be null or point to a pointer slot holding either null or
/// a descriptor from [`decode_header`] not yet released.
pub unsafe fn release_header(hdr: *mut *mut ImageHeader) {
    // SAFETY: slot and descriptor validity per the caller's contract.
    unsafe {
        if hdr.is_null() || (*hdr).is_null() {
            return;
        }
        let boxed = Box::from_raw(*hdr);
        free_pixels(boxed.data, boxed.data_len);
        *hdr = ptr::null_mut();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_tags_are_distinct() {
        assert_ne!(MATRIX_TAG, IMAGE_HEADER_SIZE);
    }

    #[test]
    fn test_release_null_is_noop() {
        let mut mat: *mut CvMatrix = ptr::null_mut();
        // SAFETY: null slots are explicitly allowed.
        unsafe {
            release_matrix(&mut mat);
            release_matrix(ptr::null_mut());
        }
        let mut hdr: *mut ImageHeader = ptr::null_mut();
        // SAFETY: null slots are explicitly allowed.
        unsafe {
            release_header(&mut hdr);
            release_header(ptr::null_mut());
        }
    }

    #[test]
    fn test_encode_rejects_unknown_tag() {
        let bogus: i64 = 0x7777;
        let path = std::ffi::CString::new("out.png").unwrap();
        // SAFETY: the leading i32 of `bogus` is readable and carries no valid tag.
        let rc = unsafe { encode_to_path(path.as_ptr(), &bogus as *const i64 as *const c_void) };
        assert_eq!(rc, -1);
        let (code, msg) = take_last_error().expect("engine should record an error");
        assert_eq!(code, ERR_BAD_HANDLE);
        assert!(msg.contains("tag"));
    }

    #[test]
    fn test_encode_rejects_null_descriptor() {
        let path = std::ffi::CString::new("out.png").unwrap();
        // SAFETY: null descriptors are explicitly rejected.
        let rc = unsafe { encode_to_path(path.as_ptr(), ptr::null()) };
        assert_eq!(rc, -1);
        let (code, _) = take_last_error().unwrap();
        assert_eq!(code, ERR_BAD_HANDLE);
    }

    #[test]
    fn test_decode_null_path_sets_error() {
        // SAFETY: null paths are explicitly rejected.
        let mat = unsafe { decode_matrix(ptr::null(), 1) };
        assert!(mat.is_null());
        let (code, msg) = take_last_error().unwrap();
        assert_eq!(code, ERR_DECODE);
        assert!(msg.contains("null"));
    }

    #[test]
    fn test_last_error_is_drained_on_take() {
        set_last_error(ERR_DECODE, "transient");
        assert!(take_last_error().is_some());
        assert!(take_last_error().is_none());
    }
}
