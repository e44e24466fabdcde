//! Contrat des transformations de systèmes de coordonnées
//!
//! Le repère ne fait qu'appeler « transformer ces points vers WGS84 » :
//! les projections et les datums restent chez le fournisseur (PROJ avec le
//! feature `reproject`).

use std::fmt;

use anyhow::{bail, Result};
use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Système de coordonnées source, tel qu'il a été fourni
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrsDescriptor {
    /// Code EPSG
    Epsg(u32),
    /// Définition WKT
    Wkt(String),
}

impl CrsDescriptor {
    /// Choisit la description disponible : EPSG d'abord, puis WKT
    pub fn from_parts(epsg: Option<u32>, wkt: Option<&str>) -> Option<Self> {
        match (epsg, wkt) {
            (Some(code), _) if code > 0 => Some(Self::Epsg(code)),
            (_, Some(text)) if !text.trim().is_empty() => Some(Self::Wkt(text.to_string())),
            _ => None,
        }
    }

    /// Définition compréhensible par PROJ (`EPSG:2154` ou le WKT)
    pub fn definition(&self) -> String {
        match self {
            Self::Epsg(code) => format!("EPSG:{}", code),
            Self::Wkt(text) => text.clone(),
        }
    }
}

impl fmt::Display for CrsDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Epsg(code) => write!(f, "EPSG:{}", code),
            Self::Wkt(_) => f.write_str("WKT"),
        }
    }
}

/// Transformation source → WGS84 géographique (lon, lat, hauteur).
///
/// Un objet de transformation n'est utilisé que par un seul thread à la fois.
pub trait CrsTransform: Send {
    /// Transforme les points en place
    fn transform(&self, points: &mut [DVec3]) -> Result<()>;

    /// Transforme un seul point
    fn transform_point(&self, point: DVec3) -> Result<DVec3> {
        let mut points = [point];
        self.transform(&mut points)?;
        Ok(points[0])
    }
}

/// Fabrique de transformations vers WGS84
pub trait TransformFactory: Send + Sync {
    fn create(&self, source: &CrsDescriptor) -> Result<Box<dyn CrsTransform>>;
}

/// Fabrique utilisée sans fournisseur de projections : échoue toujours
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTransformFactory;

impl TransformFactory for NoTransformFactory {
    fn create(&self, source: &CrsDescriptor) -> Result<Box<dyn CrsTransform>> {
        bail!(
            "Transformation from {} requires the 'reproject' feature. \
             Build with: cargo build --features reproject",
            source
        )
    }
}

/// Fabrique par défaut selon les features de compilation
pub fn default_factory() -> Box<dyn TransformFactory> {
    #[cfg(feature = "reproject")]
    {
        Box::new(crate::reproject::ProjFactory)
    }
    #[cfg(not(feature = "reproject"))]
    {
        Box::new(NoTransformFactory)
    }
}
