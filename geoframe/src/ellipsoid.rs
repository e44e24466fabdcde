//! Définition de l'ellipsoïde de référence

/// Ellipsoïde WGS84
pub struct WGS84;

impl WGS84 {
    /// Demi-grand axe (rayon équatorial) en mètres
    pub const A: f64 = 6378137.0;

    /// Aplatissement
    pub const F: f64 = 1.0 / 298.257223563;

    /// Demi-petit axe (rayon polaire) en mètres
    pub const B: f64 = Self::A * (1.0 - Self::F);

    /// Première excentricité au carré
    pub const E2: f64 = Self::F * (2.0 - Self::F);

    /// Grande normale (rayon de courbure du premier vertical) à la latitude `sin_lat`
    pub fn prime_vertical_radius(sin_lat: f64) -> f64 {
        Self::A / (1.0 - Self::E2 * sin_lat * sin_lat).sqrt()
    }
}
