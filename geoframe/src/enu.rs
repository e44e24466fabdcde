//! Repère local East-North-Up (ENU) et conversions vers ECEF
//!
//! Toutes les fonctions sont pures : aucun état partagé.

use glam::{DMat4, DVec3, DVec4};

use crate::ellipsoid::WGS84;

/// Position géographique WGS84
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Geographic {
    /// Longitude en degrés
    pub lon: f64,
    /// Latitude en degrés
    pub lat: f64,
    /// Hauteur en mètres
    pub height: f64,
}

impl Geographic {
    pub fn new(lon: f64, lat: f64, height: f64) -> Self {
        Self { lon, lat, height }
    }

    /// Depuis un triplet (lon, lat, hauteur)
    pub fn from_vec(v: DVec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }

    pub fn to_vec(self) -> DVec3 {
        DVec3::new(self.lon, self.lat, self.height)
    }

    /// Position ECEF correspondante
    pub fn to_ecef(self) -> DVec3 {
        cartographic_to_ecef(self.lon, self.lat, self.height)
    }
}

/// Sinus/cosinus de la latitude et de la longitude
struct Trig {
    sin_lat: f64,
    cos_lat: f64,
    sin_lon: f64,
    cos_lon: f64,
}

impl Trig {
    fn new(lon_deg: f64, lat_deg: f64) -> Self {
        let (sin_lat, cos_lat) = lat_deg.to_radians().sin_cos();
        let (sin_lon, cos_lon) = lon_deg.to_radians().sin_cos();
        Self {
            sin_lat,
            cos_lat,
            sin_lon,
            cos_lon,
        }
    }

    fn ecef(&self, height: f64) -> DVec3 {
        let n = WGS84::prime_vertical_radius(self.sin_lat);
        DVec3::new(
            (n + height) * self.cos_lat * self.cos_lon,
            (n + height) * self.cos_lat * self.sin_lon,
            (n * (1.0 - WGS84::E2) + height) * self.sin_lat,
        )
    }
}

/// Convertit une position géographique (degrés, mètres) en ECEF
pub fn cartographic_to_ecef(lon: f64, lat: f64, height: f64) -> DVec3 {
    Trig::new(lon, lat).ecef(height)
}

/// Matrice ENU → ECEF au point donné.
///
/// Colonnes : East, North, Up (exprimés en ECEF), puis la position ECEF du
/// point comme translation.
pub fn enu_to_ecef_matrix(lon: f64, lat: f64, height: f64) -> DMat4 {
    let t = Trig::new(lon, lat);

    let east = DVec3::new(-t.sin_lon, t.cos_lon, 0.0);
    let north = DVec3::new(-t.sin_lat * t.cos_lon, -t.sin_lat * t.sin_lon, t.cos_lat);
    let up = DVec3::new(t.cos_lat * t.cos_lon, t.cos_lat * t.sin_lon, t.sin_lat);

    DMat4::from_cols(
        east.extend(0.0),
        north.extend(0.0),
        up.extend(0.0),
        DVec4::from((t.ecef(height), 1.0)),
    )
}

/// Matrice ECEF → ENU, inverse de `enu_to_ecef_matrix`
pub fn ecef_to_enu_matrix(lon: f64, lat: f64, height: f64) -> DMat4 {
    enu_to_ecef_matrix(lon, lat, height).inverse()
}
