//! Operating system, distribution, and base package-manager detection.

use std::path::Path;

/// Detected system information: OS family, distribution token, and the
/// native ("base") package manager.
#[derive(Debug, Clone)]
pub struct SystemInfo {
    pub os: String,
    pub distro: String,
    pub base_pm: String,
}

impl SystemInfo {
    /// Detect the current system.
    ///
    /// macOS is recognised by the presence of `/Applications` together with
    /// `sw_vers` on PATH. On Linux the distribution is read from
    /// `/etc/os-release` (`ID`, `ID_LIKE`, `NAME`); when that yields no
    /// known manager, PATH is probed for one directly.
    #[must_use]
    pub fn detect() -> Self {
        if Path::new("/Applications").exists() && which::which("sw_vers").is_ok() {
            return Self {
                os: "macos".to_string(),
                distro: "macos".to_string(),
                base_pm: "brew".to_string(),
            };
        }

        let content = std::fs::read_to_string("/etc/os-release").unwrap_or_default();
        let haystack = os_release_haystack(&content);
        let (mut distro, mut base_pm) = resolve_distro(&haystack);

        if base_pm == "unknown" {
            if let Some(found) = probe_path_for_manager() {
                if found == "brew" {
                    distro = "brew".to_string();
                }
                base_pm = found;
            }
        }

        Self {
            os: "linux".to_string(),
            distro,
            base_pm,
        }
    }

    /// Build explicit system info (for tests).
    #[must_use]
    pub fn new(os: &str, distro: &str, base_pm: &str) -> Self {
        Self {
            os: os.to_string(),
            distro: distro.to_string(),
            base_pm: base_pm.to_string(),
        }
    }
}

/// Whether the process runs with effective root privileges.
#[must_use]
pub fn is_root() -> bool {
    matches!(sudo::check(), sudo::RunningAs::Root)
}

/// Lower-cased concatenation of the `ID`, `ID_LIKE`, and `NAME` values
/// from an `/etc/os-release` document.
fn os_release_haystack(content: &str) -> String {
    let value = |key: &str| -> String {
        content
            .lines()
            .find_map(|line| line.strip_prefix(&format!("{key}=")))
            .map(|v| v.trim_matches('"').to_string())
            .unwrap_or_default()
    };
    format!("{} {} {}", value("ID"), value("ID_LIKE"), value("NAME")).to_lowercase()
}

/// Map a distribution haystack to `(distro, base_pm)`.
fn resolve_distro(haystack: &str) -> (String, String) {
    const TABLE: &[(&str, &str)] = &[
        ("debian", "apt-get"),
        ("ubuntu", "apt-get"),
        ("mint", "apt-get"),
        ("pop", "apt-get"),
        ("raspbian", "apt-get"),
        ("kali", "apt-get"),
        ("arch", "pacman"),
        ("manjaro", "pacman"),
        ("endeavouros", "pacman"),
        ("fedora", "dnf"),
        ("rhel", "dnf"),
        ("centos", "dnf"),
        ("rocky", "dnf"),
        ("alma", "dnf"),
        ("opensuse", "zypper"),
        ("suse", "zypper"),
        ("alpine", "apk"),
    ];

    for (token, pm) in TABLE {
        if haystack.contains(token) {
            return ((*token).to_string(), (*pm).to_string());
        }
    }
    ("unknown".to_string(), "unknown".to_string())
}

/// Probe PATH for a known package manager, most specific first.
fn probe_path_for_manager() -> Option<String> {
    ["apt-get", "pacman", "dnf", "zypper", "apk", "brew"]
        .iter()
        .find(|pm| which::which(pm).is_ok())
        .map(|pm| (*pm).to_string())
}
