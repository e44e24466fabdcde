//! Configuration du repère

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use geoid::GeoidModel;

use crate::crs::CrsDescriptor;

/// Configuration principale
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Modèle de géoïde (none, egm84, egm96, egm2008)
    pub geoid: Option<String>,

    /// Répertoire des grilles de géoïde (défaut : env GeographicLib)
    pub geoid_path: Option<PathBuf>,

    /// Code EPSG du CRS source
    pub source_epsg: Option<u32>,

    /// WKT du CRS source (utilisé si pas d'EPSG)
    pub source_wkt: Option<String>,

    /// Origine (x, y, z) dans le CRS source
    pub origin: Option<[f64; 3]>,

    /// L'origine est déjà géographique (lon, lat, hauteur ellipsoïdale)
    pub geographic_origin: bool,
}

impl FrameConfig {
    /// Charge une configuration depuis un fichier JSON
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse config JSON")
    }

    /// Charge la configuration depuis les variables d'environnement
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Surcharge les champs présents dans l'environnement
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Comme `apply_env`, avec une source de variables injectable
    pub fn apply_env_with(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(model) = env("GEOFRAME_GEOID_MODEL") {
            self.geoid = Some(model);
        }
        if let Some(path) = env("GEOFRAME_GEOID_PATH") {
            self.geoid_path = Some(PathBuf::from(path));
        }
        if let Some(epsg) = env("GEOFRAME_SOURCE_EPSG") {
            let code = epsg
                .trim()
                .parse()
                .context(format!("Invalid GEOFRAME_SOURCE_EPSG: {}", epsg))?;
            self.source_epsg = Some(code);
        }
        if let Some(wkt) = env("GEOFRAME_SOURCE_WKT") {
            self.source_wkt = Some(wkt);
        }
        if let Some(origin) = env("GEOFRAME_ORIGIN") {
            self.origin = Some(parse_triplet(&origin)?);
        }
        if let Some(flag) = env("GEOFRAME_GEOGRAPHIC_ORIGIN") {
            self.geographic_origin = matches!(
                flag.to_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        Ok(())
    }

    /// Modèle de géoïde demandé (inconnu → none)
    pub fn geoid_model(&self) -> GeoidModel {
        self.geoid
            .as_deref()
            .map_or(GeoidModel::None, GeoidModel::from_name)
    }

    /// CRS source, EPSG prioritaire sur le WKT
    pub fn source_crs(&self) -> Option<CrsDescriptor> {
        CrsDescriptor::from_parts(self.source_epsg, self.source_wkt.as_deref())
    }
}

/// Parse « x,y,z » (virgules ou espaces)
pub fn parse_triplet(s: &str) -> Result<[f64; 3]> {
    let values: Vec<f64> = s
        .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .map(|t| {
            fast_float::parse::<f64, _>(t)
                .ok()
                .with_context(|| format!("Invalid number: {}", t))
        })
        .collect::<Result<_>>()?;

    match *values.as_slice() {
        [x, y, z] => Ok([x, y, z]),
        [x, y] => Ok([x, y, 0.0]),
        _ => anyhow::bail!("Expected 2 or 3 coordinates, got {}: {}", values.len(), s),
    }
}
