use anyhow::{Context, Result};
use directories::ProjectDirs;
use lagg_core::AggregatorConfig;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "lagg.conf";

/// Written by `lagg init-config`. Parses as-is; edit the link lines first.
pub const CONFIG_TEMPLATE: &str = "\
# lagg configuration (key=value, one per line)

# Remote IP whose traffic is carried over the links (required)
destination_ip=10.0.0.2

# Peer hardware address for each link, space separated
link_peers=02:00:00:00:00:0b 02:00:00:00:00:0d

# Local interface for each link, same order as link_peers
link_if_names=eth1 eth2

# How long a missing frame may hold back later ones
#reorder_timeout=50ms

# TUN device carrying the proxied traffic
#tun_name=lagg0
#tun_mtu=1400

# Interval between health log lines
#health_interval=10s
";

pub fn default_config_path() -> Result<PathBuf> {
    let proj = ProjectDirs::from("io", "lagg", "lagg")
        .context("could not determine platform config directory")?;
    Ok(proj.config_dir().join(CONFIG_FILE_NAME))
}

pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory: {}", parent.display()))?;
    }
    Ok(())
}

pub fn load(path: &Path) -> Result<AggregatorConfig> {
    AggregatorConfig::from_file(path)
        .with_context(|| format!("failed to load config: {}", path.display()))
}

pub fn init(path: &Path, overwrite: bool) -> Result<()> {
    if path.exists() && !overwrite {
        anyhow::bail!(
            "config already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    ensure_parent_dir(path)?;
    fs::write(path, CONFIG_TEMPLATE)
        .with_context(|| format!("failed to write config: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("lagg-test-{}-{name}", std::process::id()))
            .join(CONFIG_FILE_NAME)
    }

    #[test]
    fn test_template_parses() {
        let cfg = AggregatorConfig::parse(CONFIG_TEMPLATE).expect("template parses");
        assert_eq!(cfg.links.len(), 2);
    }

    #[test]
    fn test_init_then_load() {
        let path = scratch_path("init");
        let _ = fs::remove_file(&path);

        init(&path, false).expect("init");
        let cfg = load(&path).expect("load");
        assert_eq!(cfg.destination_ip.to_string(), "10.0.0.2");

        // Refuses to overwrite without force
        assert!(init(&path, false).is_err());
        init(&path, true).expect("forced init");

        let _ = fs::remove_dir_all(path.parent().expect("parent"));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let path = scratch_path("missing");
        assert!(load(&path).is_err());
    }

    #[test]
    fn test_default_path_file_name() {
        if let Ok(path) = default_config_path() {
            assert_eq!(path.file_name().and_then(|n| n.to_str()), Some(CONFIG_FILE_NAME));
        }
    }
}
