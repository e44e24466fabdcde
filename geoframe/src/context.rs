//! Contexte applicatif : modèle de hauteur + repère de référence

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use geoid::{GeoidModel, HeightModel};
use glam::DVec3;
use tracing::info;

use crate::config::FrameConfig;
use crate::crs::{CrsDescriptor, TransformFactory};
use crate::frame::{FrameState, OriginRequest, ReferenceFrame};

/// Regroupe les deux composants pour la durée de vie de l'application
#[derive(Debug, Default)]
pub struct Context {
    pub heights: HeightModel,
    pub frame: ReferenceFrame,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contexte avec des composants déjà construits
    pub fn with_parts(heights: HeightModel, factory: Box<dyn TransformFactory>) -> Self {
        Self {
            heights,
            frame: ReferenceFrame::with_factory(factory),
        }
    }

    /// Charge le modèle de géoïde
    pub fn init_geoid(&self, model: GeoidModel, dir: Option<&Path>) -> Result<()> {
        self.heights
            .initialize(model, dir)
            .with_context(|| format!("Failed to initialize geoid model {}", model))
    }

    /// Initialise l'origine, en consultant le modèle de hauteur
    pub fn initialize_origin(&self, request: OriginRequest) -> Arc<FrameState> {
        self.frame.initialize_origin(request, &self.heights)
    }

    /// Initialise l'origine exprimée dans `source` (transformation créée ici)
    pub fn initialize_origin_in(
        &self,
        source: CrsDescriptor,
        raw_origin: DVec3,
    ) -> Result<Arc<FrameState>> {
        let transform = self.frame.create_transform(&source)?;
        Ok(self.initialize_origin(OriginRequest {
            transform: Some(transform),
            raw_origin,
            source_crs: Some(source),
        }))
    }

    /// Applique une configuration : géoïde puis origine
    pub fn apply_config(&self, config: &FrameConfig) -> Result<Option<Arc<FrameState>>> {
        self.init_geoid(config.geoid_model(), config.geoid_path.as_deref())?;

        let Some(origin) = config.origin else {
            info!("No origin configured, frame left uninitialized");
            return Ok(None);
        };

        let state = match (config.source_crs(), config.geographic_origin) {
            (_, true) => self.frame.set_geographic_origin(origin[0], origin[1], origin[2]),
            (Some(source), false) => self.initialize_origin_in(source, DVec3::from_array(origin))?,
            (None, false) => self.initialize_origin(OriginRequest {
                raw_origin: DVec3::from_array(origin),
                ..Default::default()
            }),
        };
        Ok(Some(state))
    }
}
