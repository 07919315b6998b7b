//! cvio — image handle marshaling
//!
//! This library translates between Rust callers and a codec engine
//! that exposes image storage through raw, C-shaped descriptor
//! pointers. Two historical descriptor forms are supported (a
//! reference-counted matrix form and a legacy fixed-header form); both
//! are wrapped in move-only RAII handles so that a descriptor is
//! released exactly once and never read after release.
//!
//! # Example
//!
//! ```no_run
//! use cvio::{load_image_matrix, save_image, ImageRef, LoadMode};
//!
//! let img = load_image_matrix("test.jpg", LoadMode::Color)?;
//! println!("{}x{}", img.width(), img.height());
//! save_image("copy.png", &img)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod codec;
pub mod error;
pub mod handle;

pub use error::{LoadError, SaveError};
pub use handle::{
    load_image_legacy, load_image_matrix, save_image, save_image_raw, ImageRef, LegacyHandle,
    LoadMode, MatrixHandle,
};
