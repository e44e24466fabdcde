//! # geoframe
//!
//! Repère local East-North-Up ancré sur une origine WGS84, pour placer des
//! données géographiques dans un espace de coordonnées numériquement stable.
//!
//! ## Features
//!
//! - Matrices ENU ↔ ECEF (ellipsoïde WGS84)
//! - Origine dérivée d'un CRS source (EPSG ou WKT via PROJ, feature `reproject`)
//! - Correction de hauteur orthométrique → ellipsoïdale par le géoïde
//! - Une transformation CRS par thread de travail, jamais partagée
//! - Interface C pour une application hôte
//!
//! ## Usage CLI
//!
//! ```bash
//! # Origine Lambert-93 corrigée par EGM96
//! geoframe origin --epsg 2154 --origin 652381,6862047,35 --geoid egm96
//!
//! # Conversion d'un fichier de points vers le repère local
//! geoframe to-local --epsg 2154 --origin 652381,6862047,35 --input points.txt
//! ```

pub mod config;
pub mod context;
pub mod crs;
pub mod ellipsoid;
pub mod enu;
pub mod ffi;
pub mod frame;
#[cfg(feature = "reproject")]
pub mod reproject;
pub mod workers;

pub use config::FrameConfig;
pub use context::Context;
pub use crs::{CrsDescriptor, CrsTransform, TransformFactory};
pub use enu::{cartographic_to_ecef, ecef_to_enu_matrix, enu_to_ecef_matrix, Geographic};
pub use frame::{FrameState, OriginMode, OriginRequest, ReferenceFrame, ThreadTransformGuard};
pub use workers::WorkerTransforms;

/// Vérifie si la reprojection PROJ est disponible
pub fn is_reproject_available() -> bool {
    cfg!(feature = "reproject")
}
