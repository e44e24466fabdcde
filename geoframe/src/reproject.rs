//! Transformation vers WGS84 avec PROJ
//!
//! Ce module est disponible uniquement avec le feature `reproject`.

use anyhow::{Context, Result};
use glam::DVec3;
use proj::Proj;

use crate::crs::{CrsDescriptor, CrsTransform, TransformFactory};

/// CRS cible : WGS84 géographique
const TARGET: &str = "EPSG:4326";

/// Transformation PROJ d'un CRS source vers WGS84 (ordre lon, lat)
pub struct ProjTransform {
    proj: Proj,
    source: CrsDescriptor,
}

impl ProjTransform {
    /// Crée la transformation depuis un EPSG ou un WKT.
    ///
    /// PROJ normalise l'ordre des axes pour la visualisation : la sortie est
    /// toujours (longitude, latitude).
    pub fn new(source: &CrsDescriptor) -> Result<Self> {
        let proj = Proj::new_known_crs(&source.definition(), TARGET, None).context(format!(
            "Failed to create projection from {} to {}",
            source, TARGET
        ))?;

        Ok(Self {
            proj,
            source: source.clone(),
        })
    }

    /// Retourne le CRS source
    pub fn source(&self) -> &CrsDescriptor {
        &self.source
    }
}

impl CrsTransform for ProjTransform {
    /// Les hauteurs sont conservées : seule la position horizontale change
    fn transform(&self, points: &mut [DVec3]) -> Result<()> {
        let mut coords: Vec<(f64, f64)> = points.iter().map(|p| (p.x, p.y)).collect();

        // Transformation batch - beaucoup plus rapide que point par point
        self.proj
            .convert_array(&mut coords)
            .context("Batch coordinate transformation failed")?;

        for (p, (x, y)) in points.iter_mut().zip(coords) {
            p.x = x;
            p.y = y;
        }
        Ok(())
    }
}

/// Fabrique de transformations PROJ
#[derive(Debug, Default, Clone, Copy)]
pub struct ProjFactory;

impl TransformFactory for ProjFactory {
    fn create(&self, source: &CrsDescriptor) -> Result<Box<dyn CrsTransform>> {
        Ok(Box::new(ProjTransform::new(source)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lambert93_to_wgs84() {
        // Paris (environ) : Lambert-93 X=652381, Y=6862047
        let t = ProjTransform::new(&CrsDescriptor::Epsg(2154)).unwrap();
        let p = t
            .transform_point(DVec3::new(652381.0, 6862047.0, 35.0))
            .unwrap();

        assert!(p.x > 2.0 && p.x < 3.0, "Longitude should be around 2.35, got {}", p.x);
        assert!(p.y > 48.0 && p.y < 49.0, "Latitude should be around 48.85, got {}", p.y);
        assert_eq!(p.z, 35.0);
    }

    #[test]
    fn test_identity_transform() {
        let t = ProjTransform::new(&CrsDescriptor::Epsg(4326)).unwrap();
        let p = t.transform_point(DVec3::new(2.35, 48.85, 0.0)).unwrap();
        assert!((p.x - 2.35).abs() < 0.0001);
        assert!((p.y - 48.85).abs() < 0.0001);
    }

    #[test]
    fn test_invalid_epsg() {
        assert!(ProjFactory.create(&CrsDescriptor::Epsg(99999)).is_err());
    }
}
