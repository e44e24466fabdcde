//! Types d'erreurs pour le crate geoid

use std::path::PathBuf;
use thiserror::Error;

/// Erreurs pouvant survenir lors du chargement ou de l'interrogation d'un géoïde
#[derive(Debug, Error)]
pub enum GeoidError {
    /// Erreur d'I/O lors de la lecture de la grille
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Fichier de grille corrompu ou format invalide
    #[error("Invalid geoid grid {path}: {reason}")]
    InvalidGrid { path: PathBuf, reason: String },

    /// Requête hors de la grille ou coordonnées invalides
    #[error("Geoid lookup failed at ({lat}, {lon}): {reason}")]
    Lookup { lat: f64, lon: f64, reason: String },
}

impl GeoidError {
    /// Crée une erreur de grille invalide
    pub fn invalid_grid(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidGrid {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Crée une erreur de lookup
    pub fn lookup(lat: f64, lon: f64, reason: impl Into<String>) -> Self {
        Self::Lookup {
            lat,
            lon,
            reason: reason.into(),
        }
    }
}
