//! Client configuration
//!
//! The process environment is read once, by [`Config::from_env`]. Everything
//! else receives a `Config` (or the paths resolved from it) explicitly.

use crate::amount::Unit;
use crate::error::{Result, WalletError};
use std::env;
use std::path::{Path, PathBuf};

/// Overrides the wallet file location
pub const WALLET_FILE_VAR: &str = "WALLET_FILE";
/// Display unit: `sat`, `bit` or `btc`
pub const UNIT_VAR: &str = "BIT_UNIT";
/// Directory for registry mode
pub const REGISTRY_DIR_VAR: &str = "WALLET_REGISTRY_DIR";

/// Fee rate used when a send does not specify one (smallest unit per kB)
pub const DEFAULT_FEE_PER_KB: u64 = 10_000;
pub const DEFAULT_NOTE: &str = "General Source Payment";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Wallet file chosen through the environment, if any
    pub wallet_file: Option<PathBuf>,
    /// Wallet file used when neither a flag nor the environment picks one
    pub default_wallet_file: PathBuf,
    /// One `<name>.dat` per wallet in registry mode
    pub registry_dir: PathBuf,
    pub unit: Unit,
    pub fee_per_kb: u64,
    pub default_note: String,
}

impl Config {
    /// Defaults rooted at `home`
    pub fn with_home(home: &Path) -> Self {
        let data_dir = home.join(".walletsrc");
        Self {
            wallet_file: None,
            default_wallet_file: data_dir.join(".wallet.dat"),
            registry_dir: data_dir.join("wallets"),
            unit: Unit::default(),
            fee_per_kb: DEFAULT_FEE_PER_KB,
            default_note: DEFAULT_NOTE.to_string(),
        }
    }

    /// Build from the process environment and the user's home directory
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(dirs::home_dir().as_deref(), |key| env::var(key).ok())
    }

    /// Build from an explicit home and any variable source. Without a home
    /// directory there is no default wallet location.
    pub fn from_lookup<F>(home: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let home = home.ok_or_else(|| {
            WalletError::InvalidInput("cannot determine the home directory".to_string())
        })?;
        let mut config = Self::with_home(home);

        config.wallet_file = non_empty(WALLET_FILE_VAR).map(PathBuf::from);
        if let Some(dir) = non_empty(REGISTRY_DIR_VAR) {
            config.registry_dir = PathBuf::from(dir);
        }
        if let Some(unit) = non_empty(UNIT_VAR) {
            config.unit = Unit::parse(&unit);
        }
        Ok(config)
    }

    /// Explicit path, then the configured file, then the default
    pub fn wallet_path(&self, explicit: Option<&Path>) -> PathBuf {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| self.wallet_file.clone())
            .unwrap_or_else(|| self.default_wallet_file.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const HOME: &str = "/home/drew";

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_under_home() {
        let config = Config::from_lookup(Some(Path::new(HOME)), lookup(&[])).unwrap();
        assert_eq!(
            config.default_wallet_file,
            PathBuf::from("/home/drew/.walletsrc/.wallet.dat")
        );
        assert_eq!(
            config.registry_dir,
            PathBuf::from("/home/drew/.walletsrc/wallets")
        );
        assert_eq!(config.unit, Unit::Bit);
        assert_eq!(config.fee_per_kb, DEFAULT_FEE_PER_KB);
    }

    #[test]
    fn test_wallet_path_precedence() {
        let config = Config::from_lookup(
            Some(Path::new(HOME)),
            lookup(&[(WALLET_FILE_VAR, "/tmp/env.dat")]),
        )
        .unwrap();

        assert_eq!(
            config.wallet_path(Some(Path::new("/tmp/flag.dat"))),
            PathBuf::from("/tmp/flag.dat")
        );
        assert_eq!(config.wallet_path(None), PathBuf::from("/tmp/env.dat"));

        let config = Config::from_lookup(Some(Path::new(HOME)), lookup(&[])).unwrap();
        assert_eq!(
            config.wallet_path(None),
            PathBuf::from("/home/drew/.walletsrc/.wallet.dat")
        );
    }

    #[test]
    fn test_unit_and_registry_overrides() {
        let config = Config::from_lookup(
            Some(Path::new(HOME)),
            lookup(&[(UNIT_VAR, "btc"), (REGISTRY_DIR_VAR, "/srv/wallets")]),
        )
        .unwrap();
        assert_eq!(config.unit, Unit::Btc);
        assert_eq!(config.registry_dir, PathBuf::from("/srv/wallets"));

        let config =
            Config::from_lookup(Some(Path::new(HOME)), lookup(&[(UNIT_VAR, "doge")])).unwrap();
        assert_eq!(config.unit, Unit::Bit);
    }

    #[test]
    fn test_empty_variables_are_ignored() {
        let config =
            Config::from_lookup(Some(Path::new(HOME)), lookup(&[(WALLET_FILE_VAR, "")])).unwrap();
        assert_eq!(config.wallet_file, None);
    }

    #[test]
    fn test_missing_home_is_an_error() {
        let result = Config::from_lookup(None, lookup(&[(WALLET_FILE_VAR, "/tmp/env.dat")]));
        assert!(matches!(result, Err(WalletError::InvalidInput(_))));
    }
}
