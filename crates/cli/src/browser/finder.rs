//! Chromium-family executable discovery.

use std::path::{Path, PathBuf};

const UNIX_COMMANDS: &[&str] = &[
	"google-chrome-stable",
	"google-chrome",
	"chromium-browser",
	"chromium",
	"brave-browser",
	"brave",
];

const UNIX_PATHS: &[&str] = &[
	"/usr/bin/google-chrome-stable",
	"/usr/bin/google-chrome",
	"/usr/bin/chromium-browser",
	"/usr/bin/chromium",
	"/snap/bin/chromium",
	"/usr/bin/brave-browser",
];

const MACOS_PATHS: &[&str] = &[
	"/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
	"/Applications/Chromium.app/Contents/MacOS/Chromium",
	"/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
];

/// Candidate executables in preference order for the current platform.
pub fn browser_candidates() -> Vec<String> {
	if cfg!(target_os = "macos") {
		MACOS_PATHS.iter().map(|p| p.to_string()).collect()
	} else if cfg!(target_os = "windows") {
		windows_candidates()
	} else {
		UNIX_COMMANDS.iter().chain(UNIX_PATHS).map(|p| p.to_string()).collect()
	}
}

/// First candidate that exists on disk or resolves on `PATH`.
pub fn find_browser() -> Option<PathBuf> {
	browser_candidates().into_iter().find_map(|candidate| {
		let path = Path::new(&candidate);
		if path.is_absolute() {
			path.exists().then(|| path.to_path_buf())
		} else {
			which::which(&candidate).ok()
		}
	})
}

fn windows_candidates() -> Vec<String> {
	let mut roots: Vec<PathBuf> = ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"]
		.into_iter()
		.filter_map(|key| std::env::var_os(key).map(PathBuf::from))
		.collect();
	if roots.is_empty() {
		roots.push(PathBuf::from(r"C:\Program Files"));
		roots.push(PathBuf::from(r"C:\Program Files (x86)"));
	}

	let suffixes: &[&[&str]] = &[
		&["Google", "Chrome", "Application", "chrome.exe"],
		&["Microsoft", "Edge", "Application", "msedge.exe"],
		&["Chromium", "Application", "chrome.exe"],
	];

	let mut candidates: Vec<String> = roots
		.iter()
		.flat_map(|root| suffixes.iter().map(move |suffix| suffix.iter().fold(root.clone(), |path, part| path.join(part))))
		.map(|path| path.to_string_lossy().into_owned())
		.collect();
	candidates.extend(["chrome.exe", "msedge.exe", "chromium.exe"].map(str::to_string));
	candidates
}
