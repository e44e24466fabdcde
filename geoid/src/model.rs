//! Modèles de géoïde supportés

use std::fmt;
use std::str::FromStr;

/// Modèle de géoïde (grilles GeographicLib)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum GeoidModel {
    /// Pas de correction de hauteur
    #[default]
    None,
    /// EGM84, grille 15'
    Egm84,
    /// EGM96, grille 5'
    Egm96,
    /// EGM2008, grille 5'
    Egm2008,
}

impl GeoidModel {
    /// Résout un nom de modèle, sans tenir compte de la casse.
    ///
    /// Un nom inconnu donne `GeoidModel::None` plutôt qu'une erreur.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "egm84" => Self::Egm84,
            "egm96" => Self::Egm96,
            "egm2008" => Self::Egm2008,
            _ => Self::None,
        }
    }

    /// Nom court du modèle
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Egm84 => "egm84",
            Self::Egm96 => "egm96",
            Self::Egm2008 => "egm2008",
        }
    }

    /// Nom du fichier de grille (sans extension)
    pub fn grid_name(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Egm84 => Some("egm84-15"),
            Self::Egm96 => Some("egm96-5"),
            Self::Egm2008 => Some("egm2008-5"),
        }
    }
}

impl FromStr for GeoidModel {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_name(s))
    }
}

impl fmt::Display for GeoidModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
