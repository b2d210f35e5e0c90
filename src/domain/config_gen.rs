//! Per-daemon configuration rendering
//!
//! Files are written to the shadow of the daemons' config directory, so
//! they appear at the usual location only inside the isolation scope.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::SHARED_TEMPLATE_KEY;
use crate::error::{FuzzError, Result};
use crate::isolation::WorkingRoot;

pub const DAEMON_PLACEHOLDER: &str = "%(daemon)";
pub const LOGFILE_PLACEHOLDER: &str = "%(logfile)";

pub struct ConfigGenerator<'a> {
    templates: &'a HashMap<String, String>,
    root: &'a WorkingRoot,
    config_dir: PathBuf,
}

impl<'a> ConfigGenerator<'a> {
    /// Generator writing into the shadow of `sysconfdir`
    #[must_use]
    pub fn new(
        templates: &'a HashMap<String, String>,
        root: &'a WorkingRoot,
        sysconfdir: &Path,
    ) -> Self {
        Self {
            templates,
            root,
            config_dir: root.shadow(sysconfdir),
        }
    }

    /// Shared template followed by the daemon's own, placeholders replaced
    #[must_use]
    pub fn render(&self, daemon: &str) -> String {
        let shared = self
            .templates
            .get(SHARED_TEMPLATE_KEY)
            .map_or("", String::as_str);
        let own = self.templates.get(daemon).map_or("", String::as_str);

        format!("{shared}{own}")
            .replace(DAEMON_PLACEHOLDER, daemon)
            .replace(
                LOGFILE_PLACEHOLDER,
                &self.root.daemon_log(daemon).to_string_lossy(),
            )
    }

    #[must_use]
    pub fn config_path(&self, name: &str) -> PathBuf {
        self.config_dir.join(format!("{name}.conf"))
    }

    /// Write `<daemon>.conf`
    ///
    /// # Errors
    ///
    /// Returns `ConfigWrite` naming the daemon and path on IO failure.
    pub async fn generate(&self, daemon: &str) -> Result<PathBuf> {
        let path = self.config_path(daemon);
        write_config(daemon, &path, &self.render(daemon)).await?;
        debug!(daemon, path = %path.display(), "Configuration written");
        Ok(path)
    }

    /// Write the empty CLI frontend configuration and one file per daemon
    ///
    /// # Errors
    ///
    /// Returns `ConfigWrite` for the first file that cannot be written.
    pub async fn generate_all(&self, cli: &str, daemons: &[String]) -> Result<()> {
        write_config(cli, &self.config_path(cli), "").await?;
        for daemon in daemons {
            self.generate(daemon).await?;
        }
        info!(
            count = daemons.len(),
            dir = %self.config_dir.display(),
            "Daemon configurations generated"
        );
        Ok(())
    }
}

async fn write_config(daemon: &str, path: &Path, contents: &str) -> Result<()> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|source| FuzzError::ConfigWrite {
            daemon: daemon.to_string(),
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn templates(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn root() -> (tempfile::TempDir, WorkingRoot) {
        let dir = tempfile::Builder::new()
            .prefix("vtysh-fuzz-")
            .tempdir()
            .unwrap();
        let root = WorkingRoot::existing(dir.path()).unwrap();
        (dir, root)
    }

    #[test]
    fn test_render_concatenates_shared_and_own() {
        let (_dir, root) = root();
        let t = templates(&[("all", "hostname %(daemon)\n"), ("bgpd", "router bgp 1\n")]);
        let generator = ConfigGenerator::new(&t, &root, Path::new("/etc/frr"));

        assert_eq!(generator.render("bgpd"), "hostname bgpd\nrouter bgp 1\n");
        assert_eq!(generator.render("zebra"), "hostname zebra\n");
    }

    #[test]
    fn test_render_replaces_every_placeholder() {
        let (_dir, root) = root();
        let t = templates(&[("all", "log file %(logfile)\n! %(daemon) %(daemon)\n")]);
        let generator = ConfigGenerator::new(&t, &root, Path::new("/etc/frr"));

        let rendered = generator.render("ospfd");
        let logfile = root.daemon_log("ospfd");
        assert_eq!(
            rendered,
            format!("log file {}\n! ospfd ospfd\n", logfile.display())
        );
    }

    #[test]
    fn test_render_without_templates_is_empty() {
        let (_dir, root) = root();
        let t = HashMap::new();
        let generator = ConfigGenerator::new(&t, &root, Path::new("/etc/frr"));
        assert_eq!(generator.render("bgpd"), "");
    }

    #[tokio::test]
    async fn test_generate_all_writes_files() {
        let (_dir, root) = root();
        let sysconfdir = Path::new("/etc/frr");
        std::fs::create_dir_all(root.shadow(sysconfdir)).unwrap();
        let t = templates(&[("bgpd", "router bgp 1\n")]);
        let generator = ConfigGenerator::new(&t, &root, sysconfdir);

        generator
            .generate_all("vtysh", &["zebra".to_string(), "bgpd".to_string()])
            .await
            .unwrap();

        let dir = root.shadow(sysconfdir);
        assert_eq!(std::fs::read_to_string(dir.join("vtysh.conf")).unwrap(), "");
        assert_eq!(std::fs::read_to_string(dir.join("zebra.conf")).unwrap(), "");
        assert_eq!(
            std::fs::read_to_string(dir.join("bgpd.conf")).unwrap(),
            "router bgp 1\n"
        );
    }

    #[tokio::test]
    async fn test_generate_reports_daemon_and_path() {
        let (_dir, root) = root();
        let t = HashMap::new();
        // Shadow directory never created
        let generator = ConfigGenerator::new(&t, &root, Path::new("/etc/frr"));

        let result = generator.generate("bgpd").await;
        assert!(matches!(
            result,
            Err(FuzzError::ConfigWrite { daemon, path, .. })
            if daemon == "bgpd" && path.ends_with("etc/frr/bgpd.conf")
        ));
    }
}
