//! Modèle de hauteur : ondulation du géoïde et conversions de hauteurs
//!
//! `h = H + N` (ellipsoïdale = orthométrique + ondulation).
//! L'état et toutes les requêtes passent par un seul mutex : la grille
//! n'est jamais interrogée par deux threads à la fois.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{error, info, warn};

use crate::grid::{GridLoader, LoadOptions, UndulationGrid};
use crate::pgm::PgmLoader;
use crate::{path, GeoidError, GeoidModel};

/// Pourquoi une hauteur n'a pas été corrigée
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Uncorrected {
    /// Aucun modèle de géoïde chargé
    ModelAbsent,
    /// La grille n'a pas su répondre au point demandé
    LookupFailed,
    /// Hauteur fournie directement, sans passer par le géoïde
    DirectOrigin,
}

/// Résultat d'une conversion de hauteur
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeightConversion {
    /// Hauteur corrigée de l'ondulation `undulation`
    Corrected { height: f64, undulation: f64 },
    /// Hauteur d'entrée rendue telle quelle
    Uncorrected { height: f64, reason: Uncorrected },
}

impl HeightConversion {
    /// Hauteur résultante (l'entrée si aucune correction)
    pub fn value(&self) -> f64 {
        match *self {
            Self::Corrected { height, .. } | Self::Uncorrected { height, .. } => height,
        }
    }

    /// Ondulation appliquée, si correction
    pub fn undulation(&self) -> Option<f64> {
        match *self {
            Self::Corrected { undulation, .. } => Some(undulation),
            Self::Uncorrected { .. } => None,
        }
    }

    pub fn is_corrected(&self) -> bool {
        matches!(self, Self::Corrected { .. })
    }
}

#[derive(Default)]
struct State {
    model: GeoidModel,
    grid: Option<Box<dyn UndulationGrid>>,
}

/// Modèle de hauteur partagé entre threads
pub struct HeightModel {
    loader: Box<dyn GridLoader>,
    state: Mutex<State>,
}

impl Default for HeightModel {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HeightModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeightModel")
            .field("model", &self.model())
            .finish()
    }
}

impl HeightModel {
    /// Modèle vide utilisant les grilles PGM de GeographicLib
    pub fn new() -> Self {
        Self::with_loader(PgmLoader)
    }

    /// Modèle vide avec un loader de grilles spécifique
    pub fn with_loader(loader: impl GridLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            state: Mutex::new(State::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Charge un modèle de géoïde, en remplaçant l'éventuel modèle courant.
    ///
    /// `GeoidModel::None` vide l'état et réussit. En cas d'échec le modèle
    /// repasse à l'état non initialisé.
    pub fn initialize(&self, model: GeoidModel, dir: Option<&Path>) -> Result<(), GeoidError> {
        let mut state = self.lock();

        let Some(grid_name) = model.grid_name() else {
            *state = State::default();
            info!("Geoid model set to none, heights pass through unchanged");
            return Ok(());
        };

        let dir = path::resolve_data_dir(dir);
        info!(model = grid_name, path = %dir.display(), "Initializing geoid model");

        match self.loader.load(grid_name, &dir, LoadOptions::default()) {
            Ok(grid) => {
                let meta = grid.metadata();
                info!(
                    model = grid_name,
                    description = %meta.description,
                    date_time = %meta.date_time,
                    interpolation = %meta.interpolation,
                    max_error_m = meta.max_error,
                    rms_error_m = meta.rms_error,
                    "Geoid model initialized"
                );
                state.grid = Some(grid);
                state.model = model;
                Ok(())
            }
            Err(e) => {
                error!(model = grid_name, error = %e, "Failed to initialize geoid model");
                *state = State::default();
                Err(e)
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().grid.is_some()
    }

    /// Modèle actuellement chargé
    pub fn model(&self) -> GeoidModel {
        self.lock().model
    }

    /// Ondulation N au point, `None` si pas de modèle ou si la grille échoue
    pub fn geoid_height(&self, lat: f64, lon: f64) -> Option<f64> {
        self.lookup(lat, lon).ok()
    }

    fn lookup(&self, lat: f64, lon: f64) -> Result<f64, Uncorrected> {
        let state = self.lock();
        let grid = state.grid.as_ref().ok_or(Uncorrected::ModelAbsent)?;

        grid.height(lat, lon).map_err(|e| {
            warn!(lat, lon, error = %e, "Geoid lookup failed");
            Uncorrected::LookupFailed
        })
    }

    /// Orthométrique → ellipsoïdale : `h = H + N`
    pub fn orthometric_to_ellipsoidal(&self, lat: f64, lon: f64, height: f64) -> HeightConversion {
        self.convert(lat, lon, height, 1.0)
    }

    /// Ellipsoïdale → orthométrique : `H = h - N`
    pub fn ellipsoidal_to_orthometric(&self, lat: f64, lon: f64, height: f64) -> HeightConversion {
        self.convert(lat, lon, height, -1.0)
    }

    fn convert(&self, lat: f64, lon: f64, height: f64, sign: f64) -> HeightConversion {
        match self.lookup(lat, lon) {
            Ok(undulation) => HeightConversion::Corrected {
                height: height + sign * undulation,
                undulation,
            },
            Err(reason) => HeightConversion::Uncorrected { height, reason },
        }
    }
}
