//! # geoid
//!
//! Ondulation du géoïde et conversion entre hauteurs orthométriques
//! (au-dessus du géoïde) et ellipsoïdales (au-dessus de WGS84).
//!
//! ## Features
//!
//! - Modèles EGM84, EGM96 et EGM2008 (grilles PGM de GeographicLib)
//! - Interpolation bilinéaire ou cubique, prolongement aux bords
//! - Modèle partagé entre threads (requêtes sérialisées par un mutex)
//! - Repli explicite : sans modèle, les hauteurs sont rendues inchangées
//!
//! ## Usage
//!
//! ```rust,ignore
//! use geoid::{GeoidModel, HeightModel};
//!
//! let heights = HeightModel::new();
//! heights.initialize(GeoidModel::from_name("EGM96"), None)?;
//!
//! let h = heights.orthometric_to_ellipsoidal(45.19, 5.72, 212.0);
//! println!("h = {} m (N = {:?})", h.value(), h.undulation());
//! ```

pub mod error;
pub mod grid;
pub mod height;
pub mod model;
pub mod path;
pub mod pgm;

pub use error::GeoidError;
pub use grid::{GridLoader, GridMetadata, Interpolation, LoadOptions, UndulationGrid};
pub use height::{HeightConversion, HeightModel, Uncorrected};
pub use model::GeoidModel;
pub use pgm::{PgmGrid, PgmLoader};
