//! Résolution du répertoire des grilles de géoïde

use std::path::{Path, PathBuf};

/// Répertoire des grilles, désigné directement
pub const GEOID_PATH_ENV: &str = "GEOGRAPHICLIB_GEOID_PATH";

/// Racine des données GeographicLib (les grilles sont dans `geoids/`)
pub const DATA_ROOT_ENV: &str = "GEOGRAPHICLIB_DATA";

#[cfg(windows)]
const PLATFORM_DEFAULT: &str = "C:/ProgramData/GeographicLib/geoids";
#[cfg(not(windows))]
const PLATFORM_DEFAULT: &str = "/usr/local/share/GeographicLib/geoids";

/// Répertoire par défaut, depuis les variables d'environnement ou la plateforme
pub fn default_data_dir() -> PathBuf {
    default_data_dir_with(|key| std::env::var(key).ok())
}

/// Comme `default_data_dir`, avec une source de variables injectable
pub fn default_data_dir_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(dir) = env(GEOID_PATH_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }

    if let Some(root) = env(DATA_ROOT_ENV).filter(|v| !v.is_empty()) {
        return Path::new(&root).join("geoids");
    }

    PathBuf::from(PLATFORM_DEFAULT)
}

/// Chemin explicite s'il est non vide, sinon le répertoire par défaut
pub fn resolve_data_dir(explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => default_data_dir(),
    }
}
