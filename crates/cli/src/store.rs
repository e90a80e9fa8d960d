use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use twotruths_core::{ApplicationError, GameLedger};

/// JSON file holding the whole [`GameLedger`].
#[derive(Clone, Debug)]
pub struct LedgerStore {
    path: PathBuf,
}

impl LedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty ledger.
    pub fn load(&self) -> Result<GameLedger, ApplicationError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(GameLedger::new()),
            Err(error) => {
                return Err(ApplicationError::Persistence(format!(
                    "failed to read ledger `{}`: {error}",
                    self.path.display()
                )))
            }
        };

        serde_json::from_str(&raw).map_err(|error| {
            ApplicationError::Persistence(format!(
                "ledger `{}` is not valid JSON: {error}",
                self.path.display()
            ))
        })
    }

    /// Writes a sibling `.json.tmp` file, then renames it over the ledger.
    pub fn save(&self, ledger: &GameLedger) -> Result<(), ApplicationError> {
        let persistence = |action: &str, error: std::io::Error| {
            ApplicationError::Persistence(format!(
                "failed to {action} ledger `{}`: {error}",
                self.path.display()
            ))
        };

        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|error| persistence("create directory for", error))?;
        }

        let body = serde_json::to_string_pretty(ledger).map_err(|error| {
            ApplicationError::Persistence(format!("failed to serialize ledger: {error}"))
        })?;

        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, body).map_err(|error| persistence("write", error))?;
        fs::rename(&staging, &self.path).map_err(|error| persistence("replace", error))
    }
}
