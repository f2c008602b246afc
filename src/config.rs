//! Adapter configuration
//!
//! Loaded from YAML. Every field has a default matching a stock Windows
//! Server install, so an empty or missing file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::modules::error::ModuleError;

pub const CONFIG_DIR_NAME: &str = "rustle-winadmin";
pub const CONFIG_FILE_NAME: &str = "config.yaml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    pub powershell: PowerShellConfig,
    pub goodsync: GoodSyncConfig,
    pub iis: IisConfig,
    pub svn: SvnConfig,
    pub firewall: FirewallConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerShellConfig {
    pub program: String,
}

impl Default for PowerShellConfig {
    fn default() -> Self {
        Self {
            program: "powershell".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoodSyncConfig {
    pub executable: PathBuf,
    /// Localization file forced while GoodSync runs so output is English
    pub localization_file: String,
    pub registry_subkey: String,
}

impl Default for GoodSyncConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from(r"D:\Sync\GoodSync\GoodSync.exe"),
            localization_file: "en-english.rfi".to_string(),
            registry_subkey: r"Software\Siber Systems\GoodSync".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IisConfig {
    /// Defaults to `%WINDIR%\system32\inetsrv\appcmd.exe`
    pub appcmd: Option<PathBuf>,
}

impl IisConfig {
    pub fn appcmd_path(&self) -> PathBuf {
        if let Some(path) = &self.appcmd {
            return path.clone();
        }
        let windir = std::env::var_os("WINDIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(r"C:\Windows"));
        windir.join("system32").join("inetsrv").join("appcmd.exe")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SvnConfig {
    pub program: String,
    pub code_page: u16,
}

impl Default for SvnConfig {
    fn default() -> Self {
        Self {
            program: "svn".to_string(),
            code_page: 936,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirewallConfig {
    pub netsh: String,
    pub code_page: u16,
}

impl Default for FirewallConfig {
    fn default() -> Self {
        Self {
            netsh: "netsh".to_string(),
            code_page: 936,
        }
    }
}

impl AdapterConfig {
    pub fn from_yaml(content: &str) -> Result<Self, ModuleError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ModuleError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ModuleError::Configuration(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&content)
    }

    /// Explicit path if given, else the per-user config file when it exists,
    /// else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ModuleError> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => {
                debug!("Loading configuration from {}", path.display());
                Self::from_file(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AdapterConfig::default();
        assert_eq!(config.svn.code_page, 936);
        assert_eq!(config.goodsync.localization_file, "en-english.rfi");
        assert_eq!(config.powershell.program, "powershell");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = AdapterConfig::from_yaml(
            "svn:\n  program: C:\\tools\\svn.exe\nfirewall:\n  code_page: 437\n",
        )
        .unwrap();

        assert_eq!(config.svn.program, "C:\\tools\\svn.exe");
        assert_eq!(config.svn.code_page, 936);
        assert_eq!(config.firewall.code_page, 437);
        assert_eq!(config.firewall.netsh, "netsh");
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(AdapterConfig::from_yaml("  \n").unwrap(), AdapterConfig::default());
    }

    #[test]
    fn test_invalid_yaml() {
        let err = AdapterConfig::from_yaml("svn: [unclosed").unwrap_err();
        assert!(matches!(err, ModuleError::Configuration(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "iis:\n  appcmd: C:\\custom\\appcmd.exe").unwrap();

        let config = AdapterConfig::load(Some(file.path())).unwrap();
        assert_eq!(
            config.iis.appcmd_path(),
            PathBuf::from("C:\\custom\\appcmd.exe")
        );
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = AdapterConfig::load(Some(Path::new("/nonexistent/rustle.yaml"))).unwrap_err();
        assert!(matches!(err, ModuleError::Configuration(_)));
    }
}
