use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use which::which;

/// Configuration for launching and tuning the browser.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CdpConfig {
    /// Explicit browser binary; detected from the environment when unset.
    pub executable: Option<PathBuf>,
    /// Profile directory. Persisting it keeps chat logins across runs.
    pub user_data_dir: PathBuf,
    pub headless: bool,
    pub args: Vec<String>,
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for CdpConfig {
    fn default() -> Self {
        Self {
            executable: None,
            user_data_dir: default_profile_dir(),
            headless: resolve_headless_default(),
            args: vec![
                "--no-sandbox".to_string(),
                "--disable-dev-shm-usage".to_string(),
            ],
            window_width: 1280,
            window_height: 900,
        }
    }
}

impl CdpConfig {
    /// Binary to launch: the configured one if it exists, otherwise whatever
    /// detection finds.
    pub fn resolve_executable(&self) -> Option<PathBuf> {
        match &self.executable {
            Some(path) if path.exists() => Some(path.clone()),
            _ => detect_chrome_executable(),
        }
    }
}

fn resolve_headless_default() -> bool {
    match env::var("CHATRELAY_HEADLESS") {
        Ok(value) => {
            let lower = value.to_ascii_lowercase();
            !matches!(lower.as_str(), "0" | "false" | "no" | "off")
        }
        Err(_) => true,
    }
}

fn default_profile_dir() -> PathBuf {
    if let Ok(path) = env::var("CHATRELAY_CHROME_PROFILE") {
        return PathBuf::from(path);
    }
    PathBuf::from("./.chatrelay-profile")
}

pub(crate) fn detect_chrome_executable() -> Option<PathBuf> {
    if let Ok(raw) = env::var("CHATRELAY_CHROME") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            let candidate = PathBuf::from(trimmed);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    for name in chrome_executable_names() {
        if let Ok(path) = which(name) {
            return Some(path);
        }
    }

    os_specific_chrome_paths()
        .into_iter()
        .find(|candidate| candidate.exists())
}

fn chrome_executable_names() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["chrome.exe", "chromium.exe", "msedge.exe"]
    }

    #[cfg(not(target_os = "windows"))]
    {
        &[
            "google-chrome-stable",
            "google-chrome",
            "chromium",
            "chromium-browser",
        ]
    }
}

fn os_specific_chrome_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let mut paths = Vec::new();
        for key in ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"] {
            if let Ok(value) = env::var(key) {
                let root = PathBuf::from(value.trim());
                paths.push(root.join("Google/Chrome/Application/chrome.exe"));
                paths.push(root.join("Chromium/Application/chrome.exe"));
            }
        }
        paths
    }

    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
        ]
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        vec![
            PathBuf::from("/usr/bin/google-chrome-stable"),
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/usr/bin/chromium"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn detects_from_env_var() {
        let dir = tempdir().unwrap();
        let exe_path = dir.path().join("my-chrome");
        fs::write(&exe_path, b"").unwrap();
        let original = env::var("CHATRELAY_CHROME").ok();
        env::set_var("CHATRELAY_CHROME", exe_path.to_string_lossy().to_string());
        let detected = detect_chrome_executable();
        if let Some(value) = original {
            env::set_var("CHATRELAY_CHROME", value);
        } else {
            env::remove_var("CHATRELAY_CHROME");
        }
        assert_eq!(detected, Some(exe_path));
    }

    #[test]
    fn configured_executable_wins_when_present() {
        let dir = tempdir().unwrap();
        let exe_path = dir.path().join("pinned-chrome");
        fs::write(&exe_path, b"").unwrap();
        let cfg = CdpConfig {
            executable: Some(exe_path.clone()),
            ..CdpConfig::default()
        };
        assert_eq!(cfg.resolve_executable(), Some(exe_path));
    }
}
