//! Locating the loadable binary behind a `.clap` path
//!
//! On macOS a `.clap` is a bundle directory, like an `.app`:
//! `MyPlugin.clap/Contents/MacOS/MyPlugin`. On Linux and Windows it is the
//! shared object itself.

use crate::error::{ProbeError, Result};
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Environment variable CLAP hosts consult for extra plugin directories
pub const CLAP_PATH_ENV: &str = "CLAP_PATH";

/// Resolve the shared object to load for a plugin path
pub fn resolve_binary(plugin_path: &Path) -> Result<PathBuf> {
    if !plugin_path.exists() {
        return Err(ProbeError::NotFound(plugin_path.to_path_buf()));
    }

    // Plain shared objects (Linux, Windows, or a binary passed directly)
    if plugin_path.is_file() {
        return Ok(plugin_path.to_path_buf());
    }

    let macos_dir = plugin_path.join("Contents").join("MacOS");

    // First try: the binary named after the bundle
    if let Some(stem) = plugin_path.file_stem() {
        let binary = macos_dir.join(stem);
        if binary.is_file() {
            return Ok(binary);
        }
    }

    // Second try: any extension-less file, for bundles that were renamed
    if let Ok(entries) = std::fs::read_dir(&macos_dir) {
        let mut candidates: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_none() && path.is_file())
            .collect();
        candidates.sort();
        if let Some(binary) = candidates.into_iter().next() {
            log::info!("Found binary via scan: {:?}", binary);
            return Ok(binary);
        }
    }

    Err(ProbeError::BinaryNotFound(plugin_path.to_path_buf()))
}

/// One file or directory inside a bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleEntry {
    /// 0 for the bundle root
    pub depth: usize,
    pub name: String,
    pub is_dir: bool,
}

/// Walk a bundle (or single file) in name order
pub fn bundle_tree(plugin_path: &Path) -> Vec<BundleEntry> {
    WalkDir::new(plugin_path)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("Skipping unreadable bundle entry: {}", e);
                None
            }
        })
        .map(|entry| BundleEntry {
            depth: entry.depth(),
            name: entry.file_name().to_string_lossy().into_owned(),
            is_dir: entry.file_type().is_dir(),
        })
        .collect()
}

/// Render a bundle listing, two spaces of indent per level
pub fn render_tree(entries: &[BundleEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&"  ".repeat(entry.depth));
        out.push_str(&entry.name);
        if entry.is_dir {
            out.push('/');
        }
        out.push('\n');
    }
    out
}

/// Standard CLAP directories, `CLAP_PATH` entries first
pub fn search_paths() -> Vec<PathBuf> {
    search_paths_with(std::env::var_os(CLAP_PATH_ENV))
}

fn search_paths_with(clap_path: Option<OsString>) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = clap_path
        .map(|value| std::env::split_paths(&value).filter(|p| !p.as_os_str().is_empty()).collect())
        .unwrap_or_default();
    paths.extend(platform_paths());
    paths
}

#[cfg(target_os = "macos")]
fn platform_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join("Library/Audio/Plug-Ins/CLAP"));
    }
    paths.push(PathBuf::from("/Library/Audio/Plug-Ins/CLAP"));
    paths
}

#[cfg(target_os = "windows")]
fn platform_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(local) = dirs::data_local_dir() {
        paths.push(local.join("Programs").join("Common").join("CLAP"));
    }
    if let Some(common) = std::env::var_os("COMMONPROGRAMFILES") {
        paths.push(PathBuf::from(common).join("CLAP"));
    }
    paths
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn platform_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".clap"));
    }
    paths.push(PathBuf::from("/usr/lib/clap"));
    paths
}

/// Look up an installed plugin by name across the CLAP directories
pub fn find_installed(name: &str) -> Result<PathBuf> {
    find_in(name, &search_paths())
}

fn find_in(name: &str, dirs: &[PathBuf]) -> Result<PathBuf> {
    let file_name = if name.ends_with(".clap") {
        name.to_string()
    } else {
        format!("{}.clap", name)
    };

    for dir in dirs {
        let candidate = dir.join(&file_name);
        log::debug!("Checking {:?}", candidate);
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    Err(ProbeError::NotInstalled {
        name: name.to_string(),
        searched: dirs
            .iter()
            .map(|d| d.display().to_string())
            .collect::<Vec<_>>()
            .join(", "),
    })
}
