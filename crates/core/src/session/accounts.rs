//! Persisted account credential store.

use std::{
    collections::BTreeMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{info, warn};

/// An account known to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Account login name.
    pub name: String,
    /// Stored log-on token, if any.
    pub credential: Option<String>,
}

/// Listing entry exposed to callers; credentials never leave the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSummary {
    /// Account login name.
    pub name: String,
    /// Whether a token log-on is possible.
    pub has_credential: bool,
    /// Whether this is the active account.
    pub active: bool,
}

/// On-disk document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountsDocument {
    /// Name of the active account.
    #[serde(default)]
    pub active: Option<String>,
    /// Credential per account name.
    #[serde(default)]
    pub accounts: BTreeMap<String, Option<String>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredShape {
    Legacy {
        #[serde(rename = "accountName")]
        account_name: String,
        #[serde(default)]
        token: Option<String>,
    },
    Current(AccountsDocument),
}

/// JSON-file backed account store. Every mutation is written through.
#[derive(Clone)]
pub struct AccountStore {
    path: PathBuf,
    document: Arc<Mutex<AccountsDocument>>,
}

impl AccountStore {
    /// Open the store at `path`, migrating the legacy single-account shape.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let (document, migrated) = read_document(&path)?;
        let store = Self {
            path,
            document: Arc::new(Mutex::new(document)),
        };
        if migrated {
            info!(path = %store.path.display(), "migrated legacy account store");
            store.persist(&store.document.lock())?;
        }
        Ok(store)
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of the current document.
    pub fn document(&self) -> AccountsDocument {
        self.document.lock().clone()
    }

    /// Known accounts, sorted by name.
    pub fn list(&self) -> Vec<AccountSummary> {
        let document = self.document.lock();
        document
            .accounts
            .iter()
            .map(|(name, credential)| AccountSummary {
                name: name.clone(),
                has_credential: credential.is_some(),
                active: document.active.as_deref() == Some(name),
            })
            .collect()
    }

    /// Look up a single account.
    pub fn get(&self, name: &str) -> Option<Account> {
        self.document
            .lock()
            .accounts
            .get(name)
            .map(|credential| Account {
                name: name.to_string(),
                credential: credential.clone(),
            })
    }

    /// Name of the active account.
    pub fn active(&self) -> Option<String> {
        self.document.lock().active.clone()
    }

    /// Record an account (keeping any stored credential) and mark it active.
    pub fn activate(&self, name: &str) -> Result<()> {
        self.update(|document| {
            document.accounts.entry(name.to_string()).or_insert(None);
            document.active = Some(name.to_string());
        })
    }

    /// Store a freshly issued credential and mark the account active.
    pub fn set_credential(&self, name: &str, credential: &str) -> Result<()> {
        self.update(|document| {
            document
                .accounts
                .insert(name.to_string(), Some(credential.to_string()));
            document.active = Some(name.to_string());
        })
    }

    /// Forget the stored credential for `name` only.
    pub fn clear_credential(&self, name: &str) -> Result<()> {
        self.update(|document| {
            if let Some(credential) = document.accounts.get_mut(name) {
                *credential = None;
            }
        })
    }

    /// Delete an account. Returns whether it existed.
    ///
    /// When the removed account was active, activation falls to the first
    /// remaining account, if any.
    pub fn remove(&self, name: &str) -> Result<bool> {
        let mut removed = false;
        self.update(|document| {
            removed = document.accounts.remove(name).is_some();
            if document.active.as_deref() == Some(name) {
                document.active = document.accounts.keys().next().cloned();
            }
        })?;
        Ok(removed)
    }

    fn update(&self, change: impl FnOnce(&mut AccountsDocument)) -> Result<()> {
        let mut document = self.document.lock();
        let mut updated = document.clone();
        change(&mut updated);
        self.persist(&updated)?;
        *document = updated;
        Ok(())
    }

    fn persist(&self, document: &AccountsDocument) -> Result<()> {
        let parent = self
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;

        let serialised = serde_json::to_vec_pretty(document)?;
        let mut file = NamedTempFile::new_in(parent)
            .with_context(|| format!("failed to stage {}", self.path.display()))?;
        file.write_all(&serialised)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        file.persist(&self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

fn read_document(path: &Path) -> Result<(AccountsDocument, bool)> {
    if !path.exists() {
        return Ok((AccountsDocument::default(), false));
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    if content.trim().is_empty() {
        warn!(path = %path.display(), "account store is empty, starting fresh");
        return Ok((AccountsDocument::default(), false));
    }
    let shape: StoredShape = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(match shape {
        StoredShape::Legacy {
            account_name,
            token,
        } => {
            let mut accounts = BTreeMap::new();
            accounts.insert(account_name.clone(), token);
            (
                AccountsDocument {
                    active: Some(account_name),
                    accounts,
                },
                true,
            )
        }
        StoredShape::Current(document) => (document, false),
    })
}
