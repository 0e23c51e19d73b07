// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-aware data directory resolution.

use std::path::{Path, PathBuf};

const APP_DIR: &str = "scanwerk";

/// Return the application data directory, creating it if needed.
pub fn data_dir() -> PathBuf {
    let dir = base_dir(
        std::env::var_os("XDG_DATA_HOME").as_deref().map(Path::new),
        std::env::var_os("HOME").as_deref().map(Path::new),
    )
    .join(APP_DIR);
    std::fs::create_dir_all(&dir).ok();
    dir
}

fn base_dir(xdg_data_home: Option<&Path>, home: Option<&Path>) -> PathBuf {
    if let Some(xdg) = xdg_data_home.filter(|p| !p.as_os_str().is_empty()) {
        return xdg.to_path_buf();
    }
    if let Some(home) = home {
        return home.join(".local").join("share");
    }
    // Last resort
    PathBuf::from("/tmp")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xdg_wins_over_home() {
        let base = base_dir(Some(Path::new("/xdg")), Some(Path::new("/home/me")));
        assert_eq!(base, PathBuf::from("/xdg"));
    }

    #[test]
    fn empty_xdg_is_ignored() {
        let base = base_dir(Some(Path::new("")), Some(Path::new("/home/me")));
        assert_eq!(base, PathBuf::from("/home/me/.local/share"));
    }

    #[test]
    fn tmp_when_nothing_is_set() {
        assert_eq!(base_dir(None, None), PathBuf::from("/tmp"));
    }
}
