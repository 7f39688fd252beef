//! Shared filesystem and path helpers for the h5pack crates.
//!
//! The packager, build cache, and extraction cache all walk directory trees,
//! copy them around, and need to decide whether a caller-supplied relative
//! path stays inside a root directory. Those primitives live here so the
//! higher-level crates agree on ordering and containment rules.

pub mod path;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tree;

pub use path::{contained_relative, is_plain_segment};
pub use tree::{
    copy_tree, max_mtime, remove_dir_if_exists, strip_subtrees, utf8_path, walk_files,
    write_atomic,
};
