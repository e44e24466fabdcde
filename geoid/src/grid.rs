//! Contrat des grilles d'ondulation
//!
//! Le modèle de hauteur ne connaît la grille qu'à travers ces traits :
//! le format de fichier et l'interpolation restent chez le loader.

use std::fmt;
use std::path::Path;

use crate::GeoidError;

/// Options de chargement d'une grille
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Interpolation cubique (sinon bilinéaire)
    pub cubic: bool,
    /// Prolonger la grille aux bords plutôt que d'échouer
    pub extend_boundaries: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            cubic: true,
            extend_boundaries: true,
        }
    }
}

/// Méthode d'interpolation effective
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Bilinear,
    Cubic,
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bilinear => f.write_str("bilinear"),
            Self::Cubic => f.write_str("cubic"),
        }
    }
}

/// Métadonnées descriptives d'une grille
#[derive(Debug, Clone, PartialEq)]
pub struct GridMetadata {
    pub description: String,
    pub date_time: String,
    pub interpolation: Interpolation,
    /// Erreur max annoncée (m), -1 si inconnue
    pub max_error: f64,
    /// Erreur RMS annoncée (m), -1 si inconnue
    pub rms_error: f64,
}

/// Grille d'ondulation chargée
pub trait UndulationGrid: Send {
    /// Ondulation N (m) au point (lat, lon) en degrés
    fn height(&self, lat: f64, lon: f64) -> Result<f64, GeoidError>;

    fn metadata(&self) -> &GridMetadata;
}

/// Chargeur de grilles par nom
pub trait GridLoader: Send + Sync {
    fn load(
        &self,
        name: &str,
        dir: &Path,
        options: LoadOptions,
    ) -> Result<Box<dyn UndulationGrid>, GeoidError>;
}
