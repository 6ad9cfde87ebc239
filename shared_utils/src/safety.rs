//! Safety Module
//!
//! Guards destructive operations (deleting originals) against system directories.

use std::path::Path;

const DANGEROUS_DIRS: &[&str] = &[
    "/",
    "/System",
    "/usr",
    "/bin",
    "/sbin",
    "/etc",
    "/var",
    "/private",
    "/Library",
    "/Applications",
    "/Users",
    "/home",
    "/root",
    "/boot",
    "/dev",
    "/proc",
    "/sys",
    "/tmp",
    "/opt",
];

pub fn check_dangerous_directory(path: &Path) -> Result<(), String> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

    for candidate in [path, canonical.as_path()] {
        let path_str = candidate.to_string_lossy();
        if let Some(dangerous) = DANGEROUS_DIRS.iter().find(|d| path_str == **d) {
            return Err(format!(
                "🚨 DANGEROUS OPERATION BLOCKED!\n\
                 ❌ Target directory '{}' is a protected system directory.\n\
                 💡 Please specify a safe subdirectory instead.",
                dangerous
            ));
        }
    }

    let components = canonical.components().count();
    let path_str = canonical.to_string_lossy();
    if components <= 3 && (path_str.starts_with("/Users/") || path_str.starts_with("/home/")) {
        return Err(format!(
            "🚨 DANGEROUS OPERATION BLOCKED!\n\
             ❌ Target '{}' is too close to your home directory root.\n\
             💡 Please specify a subdirectory like ~/Pictures/iphone instead.",
            path.display()
        ));
    }

    Ok(())
}

pub fn check_safe_for_destructive(path: &Path, operation: &str) -> Result<(), String> {
    check_dangerous_directory(path)?;

    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let path_str = canonical.to_string_lossy();

    if path_str.contains("/Desktop") || path_str.contains("/Downloads") {
        tracing::warn!(
            "You are about to {} files in '{}', a common location for important files. \
             Make sure you have backups before proceeding.",
            operation,
            path.display()
        );
    }

    Ok(())
}
