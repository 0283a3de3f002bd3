//! Directory resolution abstraction for per-user paths.
//!
//! Production code asks [`SystemBaseDirs`]; tests substitute their own
//! [`BaseDirs`] so nothing touches the real home directory.

use std::path::PathBuf;

/// Name of the QuietPatch state directory inside the user's home.
pub const QUIETPATCH_DIRNAME: &str = ".quietpatch";

/// Source of platform-specific base directories.
pub trait BaseDirs {
    /// The current user's home directory.
    fn home_dir(&self) -> Option<PathBuf>;

    /// The QuietPatch home, `<home>/.quietpatch`.
    fn quietpatch_home(&self) -> Option<PathBuf> {
        self.home_dir().map(|home| home.join(QUIETPATCH_DIRNAME))
    }
}

/// Base directories discovered from the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBaseDirs;

impl BaseDirs for SystemBaseDirs {
    fn home_dir(&self) -> Option<PathBuf> {
        directories_next::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedHome(Option<PathBuf>);

    impl BaseDirs for FixedHome {
        fn home_dir(&self) -> Option<PathBuf> {
            self.0.clone()
        }
    }

    #[test]
    fn quietpatch_home_is_inside_home() {
        let dirs = FixedHome(Some(PathBuf::from("/home/user")));
        assert_eq!(
            dirs.quietpatch_home(),
            Some(PathBuf::from("/home/user/.quietpatch"))
        );
    }

    #[test]
    fn quietpatch_home_is_none_without_home() {
        assert_eq!(FixedHome(None).quietpatch_home(), None);
    }

    #[test]
    fn system_dirs_resolve_on_supported_platforms() {
        let dirs = SystemBaseDirs;
        if cfg!(any(target_os = "linux", target_os = "macos", windows)) {
            assert!(dirs.home_dir().is_some());
        }
    }
}
