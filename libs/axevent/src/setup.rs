use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("manifest io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("manifest parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Identity of the owning application, as declared in the package
/// manifest (`acapPackageConf.setup`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSetup {
    /// Machine name. Also the parameter group of the application.
    pub app_name: String,
    /// Display name, used to build nice names.
    pub friendly_name: String,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    acap_package_conf: PackageConf,
}

#[derive(Deserialize)]
struct PackageConf {
    setup: AppSetup,
}

impl AppSetup {
    pub fn new(app_name: impl Into<String>, friendly_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            friendly_name: friendly_name.into(),
            vendor: None,
            version: None,
        }
    }

    /// Parse the setup section out of a `manifest.json` document.
    pub fn from_manifest(json: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = serde_json::from_str(json)?;
        Ok(manifest.acap_package_conf.setup)
    }

    pub fn load_manifest(path: &str) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_manifest(&content)
    }
}
