//! Static catalogue of known package managers.
//!
//! Maps manager names to command templates (check, single install, batch
//! install, metadata update) and metadata (sudo requirement, lock group,
//! aliases). Everything here can be shadowed by a user-defined custom
//! manager declared in the configuration; resolution precedence lives in
//! the engine.

/// Per-manager template triple for language-level managers.
#[derive(Debug, Clone, Copy)]
pub struct PmTemplates {
    pub check: &'static str,
    pub install: &'static str,
    pub update: &'static str,
}

/// Whether installs through `pm` must run as root.
#[must_use]
pub fn needs_sudo(pm: &str) -> bool {
    matches!(
        pm,
        "apt-get" | "apt" | "pacman" | "dnf" | "yum" | "zypper" | "apk" | "snap"
    )
}

/// Canonical lock group for managers sharing an underlying database.
///
/// Managers without a group run unguarded.
#[must_use]
pub fn lock_group(pm: &str) -> Option<&'static str> {
    match pm {
        "apt" | "apt-get" | "dpkg" | "nala" => Some("dpkg"),
        "yum" | "dnf" | "rpm" => Some("rpm"),
        "pacman" | "yay" | "paru" => Some("pacman"),
        "apk" => Some("apk"),
        "snap" => Some("snap"),
        "zypper" => Some("zypper"),
        _ => None,
    }
}

/// Metadata-refresh command, for managers that need one.
#[must_use]
pub fn system_update_cmd(pm: &str) -> Option<&'static str> {
    match pm {
        "apt-get" => Some("apt-get update"),
        "apt" => Some("apt update"),
        "pacman" => Some("pacman -Sy"),
        "apk" => Some("apk update"),
        "brew" => Some("brew update"),
        "dnf" => Some("dnf check-update"),
        "yum" => Some("yum check-update"),
        "zypper" => Some("zypper refresh"),
        _ => None,
    }
}

/// Multi-name install template. A manager listed here supports batching.
#[must_use]
pub fn batch_install_template(pm: &str) -> Option<&'static str> {
    match pm {
        "apt-get" => Some("apt-get install -y {{ names }}"),
        "pacman" => Some("pacman -S --noconfirm {{ names }}"),
        "apk" => Some("apk add {{ names }}"),
        "dnf" => Some("dnf install -y {{ names }}"),
        "yum" => Some("yum install -y {{ names }}"),
        "zypper" => Some("zypper install -y {{ names }}"),
        "brew" => Some("brew install {{ names }}"),
        "pip" => Some("pip install {{ names }}"),
        "npm" => Some("npm install -g {{ names }}"),
        "cargo" => Some("cargo install {{ names }}"),
        _ => None,
    }
}

/// Single-name install template for base system managers.
#[must_use]
pub fn single_install_template(pm: &str) -> Option<&'static str> {
    match pm {
        "apt-get" => Some("apt-get install -y {{ name }}"),
        "pacman" => Some("pacman -S --noconfirm {{ name }}"),
        "apk" => Some("apk add {{ name }}"),
        "dnf" => Some("dnf install -y {{ name }}"),
        "yum" => Some("yum install -y {{ name }}"),
        "zypper" => Some("zypper install -y {{ name }}"),
        "brew" => Some("brew install {{ name }}"),
        _ => None,
    }
}

/// Native installed-check template for base system managers.
#[must_use]
pub fn base_check_template(pm: &str) -> Option<&'static str> {
    match pm {
        "apt-get" | "apt" => Some("dpkg -s {{ name }}"),
        "pacman" => Some("pacman -Qi {{ name }}"),
        "dnf" | "yum" => Some("rpm -q {{ name }}"),
        "brew" => Some("brew list {{ name }}"),
        _ => None,
    }
}

/// Check/install/update triple for language-level and app managers.
#[must_use]
pub fn language_templates(pm: &str) -> Option<PmTemplates> {
    let t = match pm {
        "brew" => PmTemplates {
            check: "brew list {{ name }}",
            install: "brew install {{ name }}",
            update: "brew upgrade {{ name }}",
        },
        "npm" => PmTemplates {
            check: "npm ls -g {{ name }}",
            install: "npm install -g {{ name }}",
            update: "npm update -g {{ name }}",
        },
        "cargo" => PmTemplates {
            check: "cargo install --list | grep '^{{ name }}'",
            install: "cargo install {{ name }}",
            update: "cargo install {{ name }} --force",
        },
        "conda" => PmTemplates {
            check: "conda list {{ name }}",
            install: "conda install -y {{ name }}",
            update: "conda update -y {{ name }}",
        },
        "pip" => PmTemplates {
            check: "pip show {{ name }}",
            install: "pip install {{ name }}",
            update: "pip install --upgrade {{ name }}",
        },
        "gem" => PmTemplates {
            check: "gem list -i {{ name }}",
            install: "gem install {{ name }}",
            update: "gem update {{ name }}",
        },
        "go" => PmTemplates {
            check: "ls $(go env GOPATH)/bin/{{ name }}",
            install: "go install {{ name }}@latest",
            update: "go install {{ name }}@latest",
        },
        "snap" => PmTemplates {
            check: "snap list {{ name }}",
            install: "snap install {{ name }}",
            update: "snap refresh {{ name }}",
        },
        "flatpak" => PmTemplates {
            check: "flatpak list --app | grep {{ name }}",
            install: "flatpak install -y {{ name }}",
            update: "flatpak update -y {{ name }}",
        },
        _ => return None,
    };
    Some(t)
}

/// Interchangeable manager names for package-name lookup.
#[must_use]
pub fn aliases(pm: &str) -> &'static [&'static str] {
    match pm {
        "apt-get" => &["apt"],
        "yum" => &["dnf"],
        "dnf" => &["yum"],
        "pacman" => &["yay", "paru"],
        _ => &[],
    }
}

/// Ordered lookup keys for resolving a package's platform-specific name:
/// distro first, then the base manager, then its aliases.
#[must_use]
pub fn lookup_keys(distro: &str, base_pm: &str) -> Vec<String> {
    let mut keys = vec![distro.to_string(), base_pm.to_string()];
    keys.extend(aliases(base_pm).iter().map(ToString::to_string));
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Metadata tables
    // -----------------------------------------------------------------------

    #[test]
    fn system_managers_need_sudo() {
        for pm in ["apt-get", "apt", "pacman", "dnf", "yum", "zypper", "apk", "snap"] {
            assert!(needs_sudo(pm), "{pm} should need sudo");
        }
    }

    #[test]
    fn language_managers_do_not_need_sudo() {
        for pm in ["brew", "cargo", "pip", "npm", "gem", "go", "flatpak"] {
            assert!(!needs_sudo(pm), "{pm} should not need sudo");
        }
    }

    #[test]
    fn debian_tools_share_the_dpkg_lock() {
        for pm in ["apt", "apt-get", "dpkg", "nala"] {
            assert_eq!(lock_group(pm), Some("dpkg"));
        }
    }

    #[test]
    fn rpm_and_pacman_families_share_locks() {
        assert_eq!(lock_group("yum"), lock_group("dnf"));
        assert_eq!(lock_group("pacman"), lock_group("paru"));
        assert_eq!(lock_group("pacman"), lock_group("yay"));
    }

    #[test]
    fn unlocked_managers_have_no_group() {
        assert_eq!(lock_group("cargo"), None);
        assert_eq!(lock_group("pip"), None);
    }

    #[test]
    fn update_commands_exist_for_system_managers_only() {
        assert_eq!(system_update_cmd("apt-get"), Some("apt-get update"));
        assert_eq!(system_update_cmd("pacman"), Some("pacman -Sy"));
        assert_eq!(system_update_cmd("cargo"), None);
        assert_eq!(system_update_cmd("gem"), None);
    }

    // -----------------------------------------------------------------------
    // Templates
    // -----------------------------------------------------------------------

    #[test]
    fn batch_templates_take_a_names_list() {
        for pm in ["apt-get", "pacman", "dnf", "brew", "pip", "npm", "cargo"] {
            let tpl = batch_install_template(pm).expect(pm);
            assert!(tpl.contains("{{ names }}"), "{pm}: {tpl}");
        }
    }

    #[test]
    fn language_triples_cover_expected_managers() {
        for pm in ["brew", "npm", "cargo", "conda", "pip", "gem", "go", "snap", "flatpak"] {
            assert!(language_templates(pm).is_some(), "{pm} missing");
        }
        assert!(language_templates("apt-get").is_none());
    }

    #[test]
    fn check_templates_take_a_single_name() {
        assert_eq!(base_check_template("apt-get"), Some("dpkg -s {{ name }}"));
        assert_eq!(base_check_template("apt"), base_check_template("apt-get"));
        assert!(base_check_template("cargo").is_none());
    }

    // -----------------------------------------------------------------------
    // Aliases and lookup keys
    // -----------------------------------------------------------------------

    #[test]
    fn aliases_are_symmetric_for_rhel() {
        assert_eq!(aliases("yum"), &["dnf"]);
        assert_eq!(aliases("dnf"), &["yum"]);
    }

    #[test]
    fn lookup_keys_order_distro_then_pm_then_aliases() {
        assert_eq!(
            lookup_keys("arch", "pacman"),
            vec!["arch", "pacman", "yay", "paru"]
        );
        assert_eq!(lookup_keys("debian", "apt-get"), vec!["debian", "apt-get", "apt"]);
    }
}
