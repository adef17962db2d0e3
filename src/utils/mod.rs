//! Cross-platform utilities and helpers
//!
//! - [`fs`] - File system operations with atomic writes and symlink helpers
//! - [`platform`] - Home lookup and local-dependency path expansion
//! - [`progress`] - Per-worker progress rendering for batch installs

pub mod fs;
pub mod platform;
pub mod progress;

pub use fs::{
    atomic_write, copy_dir, dir_size, ensure_dir, remove_dir_if_exists, remove_file_if_exists,
    replace_symlink,
};
pub use platform::{get_home_dir, resolve_target};
pub use progress::{InstallProgress, RenderSlot};
