//! Repère de référence : origine ENU et matrices ECEF ↔ ENU
//!
//! L'état publié est un instantané immuable (`FrameState`) remplacé d'un
//! bloc : un lecteur voit toujours une origine et une matrice cohérentes.
//! Il ne faut pas interroger le repère pendant son initialisation.

use std::sync::{Arc, PoisonError, RwLock};

use geoid::{HeightConversion, HeightModel, Uncorrected};
use glam::{DMat4, DVec3};
use tracing::{debug, info, warn};

use crate::crs::{default_factory, CrsDescriptor, CrsTransform, TransformFactory};
use crate::enu::{ecef_to_enu_matrix, Geographic};
use crate::workers::WorkerTransforms;

/// Mode d'initialisation de l'origine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OriginMode {
    #[default]
    Uninitialized,
    /// Origine obtenue via une transformation CRS (ou déjà géographique)
    DerivedFromTransform,
    /// Origine géographique fixée directement
    DirectGeographic,
}

/// Instantané de l'état du repère
#[derive(Debug, Clone, PartialEq)]
pub struct FrameState {
    /// Origine telle que fournie (CRS source ou géographique)
    pub raw_origin: DVec3,
    /// Origine géographique, hauteur ellipsoïdale
    pub geographic_origin: Geographic,
    /// Correction de hauteur appliquée à l'origine
    pub height_correction: HeightConversion,
    /// Inverse de la matrice ENU → ECEF à l'origine
    pub ecef_to_enu: DMat4,
    pub mode: OriginMode,
    pub source_crs: Option<CrsDescriptor>,
}

impl FrameState {
    fn new(
        raw_origin: DVec3,
        geographic_origin: Geographic,
        height_correction: HeightConversion,
        mode: OriginMode,
        source_crs: Option<CrsDescriptor>,
    ) -> Self {
        let g = geographic_origin;
        Self {
            raw_origin,
            geographic_origin,
            height_correction,
            ecef_to_enu: ecef_to_enu_matrix(g.lon, g.lat, g.height),
            mode,
            source_crs,
        }
    }

    /// Matrice ENU → ECEF
    pub fn enu_to_ecef(&self) -> DMat4 {
        self.ecef_to_enu.inverse()
    }

    /// ECEF → repère local
    pub fn ecef_to_local(&self, ecef: DVec3) -> DVec3 {
        self.ecef_to_enu.transform_point3(ecef)
    }

    /// Repère local → ECEF
    pub fn local_to_ecef(&self, enu: DVec3) -> DVec3 {
        self.enu_to_ecef().transform_point3(enu)
    }

    /// Position géographique (degrés, hauteur ellipsoïdale) → repère local
    pub fn geographic_to_local(&self, lon: f64, lat: f64, height: f64) -> DVec3 {
        self.ecef_to_local(Geographic::new(lon, lat, height).to_ecef())
    }
}

/// Paramètres de `ReferenceFrame::initialize_origin`
#[derive(Default)]
pub struct OriginRequest {
    /// Transformation source → WGS84 ; absente, l'origine est déjà géographique
    pub transform: Option<Box<dyn CrsTransform>>,
    /// Origine (x, y, z) dans le CRS source
    pub raw_origin: DVec3,
    /// Description du CRS source, pour recréer la transformation par thread
    pub source_crs: Option<CrsDescriptor>,
}

/// Repère de référence ENU partagé entre threads
pub struct ReferenceFrame {
    state: RwLock<Option<Arc<FrameState>>>,
    workers: WorkerTransforms,
    factory: Box<dyn TransformFactory>,
}

impl Default for ReferenceFrame {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ReferenceFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceFrame")
            .field("state", &self.state())
            .field("workers", &self.workers)
            .finish()
    }
}

impl ReferenceFrame {
    /// Repère non initialisé, transformations créées par la fabrique par défaut
    pub fn new() -> Self {
        Self::with_factory(default_factory())
    }

    pub fn with_factory(factory: Box<dyn TransformFactory>) -> Self {
        Self {
            state: RwLock::new(None),
            workers: WorkerTransforms::new(),
            factory,
        }
    }

    /// Instantané courant, `None` avant initialisation
    pub fn state(&self) -> Option<Arc<FrameState>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn mode(&self) -> OriginMode {
        self.state().map_or(OriginMode::Uninitialized, |s| s.mode)
    }

    /// Hauteur ellipsoïdale de l'origine (0 avant initialisation)
    pub fn origin_height(&self) -> f64 {
        self.state().map_or(0.0, |s| s.geographic_origin.height)
    }

    pub fn workers(&self) -> &WorkerTransforms {
        &self.workers
    }

    /// Crée une transformation vers WGS84 avec la fabrique du repère
    pub fn create_transform(
        &self,
        source: &CrsDescriptor,
    ) -> anyhow::Result<Box<dyn CrsTransform>> {
        self.factory.create(source)
    }

    fn publish(&self, state: FrameState) -> Arc<FrameState> {
        let state = Arc::new(state);
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = Some(state.clone());
        state
    }

    /// Initialise l'origine depuis un point du CRS source.
    ///
    /// La transformation fournie devient celle du thread appelant ; sans
    /// transformation, celle du thread appelant est libérée. Si le
    /// modèle de hauteur est chargé, la hauteur transformée est traitée comme
    /// orthométrique et convertie en ellipsoïdale.
    pub fn initialize_origin(
        &self,
        request: OriginRequest,
        heights: &HeightModel,
    ) -> Arc<FrameState> {
        let OriginRequest {
            transform,
            raw_origin,
            source_crs,
        } = request;

        info!(
            x = raw_origin.x,
            y = raw_origin.y,
            z = raw_origin.z,
            "ENU origin (source CRS)"
        );

        // Sans transformation, l'origine fournie est déjà géographique
        let cartographic = match transform {
            Some(transform) => {
                self.workers.insert_current(transform);
                match self.workers.with_current(|t| t.transform_point(raw_origin)) {
                    Some(Ok(point)) => point,
                    Some(Err(e)) => {
                        warn!(error = %e, "Origin transformation failed, using raw origin");
                        raw_origin
                    }
                    None => raw_origin,
                }
            }
            None => {
                self.workers.release_current();
                raw_origin
            }
        };

        info!(
            lon = cartographic.x,
            lat = cartographic.y,
            h = cartographic.z,
            "Cartographic origin"
        );

        let (lon, lat, height) = (cartographic.x, cartographic.y, cartographic.z);
        let correction = heights.orthometric_to_ellipsoidal(lat, lon, height);
        match correction {
            HeightConversion::Corrected {
                height: ellipsoidal,
                undulation,
            } => info!(
                orthometric = height,
                geoid = undulation,
                ellipsoidal,
                "Geoid correction applied"
            ),
            HeightConversion::Uncorrected {
                reason: Uncorrected::LookupFailed,
                ..
            } => warn!(lat, lon, "Geoid correction unavailable at origin"),
            HeightConversion::Uncorrected { .. } => {}
        }

        let origin = Geographic::new(lon, lat, correction.value());
        self.publish(FrameState::new(
            raw_origin,
            origin,
            correction,
            OriginMode::DerivedFromTransform,
            source_crs,
        ))
    }

    /// Fixe directement l'origine géographique.
    ///
    /// Contrairement à `initialize_origin`, aucune correction de géoïde n'est
    /// appliquée : la hauteur doit déjà être ellipsoïdale. L'asymétrie entre
    /// les deux chemins est conservée telle quelle.
    pub fn set_geographic_origin(&self, lon: f64, lat: f64, height: f64) -> Arc<FrameState> {
        let (raw_origin, source_crs) = match self.state() {
            Some(previous) => (previous.raw_origin, previous.source_crs.clone()),
            None => (DVec3::new(lon, lat, height), None),
        };

        info!(lon, lat, h = height, "Geographic origin set");

        self.publish(FrameState::new(
            raw_origin,
            Geographic::new(lon, lat, height),
            HeightConversion::Uncorrected {
                height,
                reason: Uncorrected::DirectOrigin,
            },
            OriginMode::DirectGeographic,
            source_crs,
        ))
    }

    /// Crée la transformation du thread courant si elle manque.
    ///
    /// Sans effet si le thread en a déjà une, si le repère n'est pas
    /// initialisé, ou en mode géographique direct. Sans description du CRS
    /// source, le thread reste sans transformation.
    pub fn ensure_thread_transform(&self) {
        if self.workers.has_current() {
            return;
        }
        let Some(state) = self.state() else {
            return;
        };
        if state.mode == OriginMode::DirectGeographic {
            return;
        }
        let Some(source) = state.source_crs.as_ref() else {
            return;
        };

        match self.factory.create(source) {
            Ok(transform) => {
                self.workers.insert_current(transform);
                debug!(source = %source, "Worker thread: created per-thread transform");
            }
            Err(e) => {
                warn!(source = %source, error = %e, "Worker thread: failed to create transform");
            }
        }
    }

    /// Libère la transformation du thread courant (à appeler en fin de worker)
    pub fn release_thread_transform(&self) {
        if self.workers.release_current() {
            debug!("Worker thread: released per-thread transform");
        }
    }

    /// Garde libérant la transformation du thread courant à sa destruction.
    ///
    /// Pour les threads hors pool rayon (threads `scope`, threads manuels) :
    /// à créer en début de thread, avant tout appel à `source_to_local`.
    pub fn thread_guard(&self) -> ThreadTransformGuard<'_> {
        ThreadTransformGuard { frame: self }
    }

    /// Point du CRS source → géographique (lon, lat, hauteur).
    ///
    /// En mode géographique direct le point est rendu tel quel. `None` si
    /// aucune conversion n'a pu être faite.
    ///
    /// Le premier appel sur un thread lui crée une transformation, conservée
    /// jusqu'à `release_thread_transform` : un thread qui se termine sans
    /// l'appeler (ou sans `thread_guard`) laisse son entrée dans le pool.
    pub fn source_to_geographic(&self, point: DVec3) -> Option<DVec3> {
        if self.mode() == OriginMode::DirectGeographic {
            return Some(point);
        }

        self.ensure_thread_transform();
        match self.workers.with_current(|t| t.transform_point(point))? {
            Ok(geographic) => Some(geographic),
            Err(e) => {
                debug!(x = point.x, y = point.y, error = %e, "Point transformation failed");
                None
            }
        }
    }

    /// Point du CRS source → repère local ENU.
    ///
    /// Même contrat de libération que `source_to_geographic`.
    pub fn source_to_local(&self, point: DVec3) -> Option<DVec3> {
        let state = self.state()?;
        let g = self.source_to_geographic(point)?;
        Some(state.geographic_to_local(g.x, g.y, g.z))
    }
}

/// Libère la transformation du thread courant au drop
#[must_use = "the transform is released when the guard is dropped"]
pub struct ThreadTransformGuard<'a> {
    frame: &'a ReferenceFrame,
}

impl Drop for ThreadTransformGuard<'_> {
    fn drop(&mut self) {
        self.frame.release_thread_transform();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enu::enu_to_ecef_matrix;
    use anyhow::{bail, Result};
    use geoid::{
        GeoidError, GeoidModel, GridLoader, GridMetadata, Interpolation, LoadOptions,
        UndulationGrid,
    };
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Décalage fixe, pour reconnaître qu'une transformation a été appliquée
    struct Offset(DVec3);

    impl CrsTransform for Offset {
        fn transform(&self, points: &mut [DVec3]) -> Result<()> {
            for p in points {
                *p += self.0;
            }
            Ok(())
        }
    }

    struct Failing;

    impl CrsTransform for Failing {
        fn transform(&self, _points: &mut [DVec3]) -> Result<()> {
            bail!("transform failed")
        }
    }

    struct CountingFactory(Arc<AtomicUsize>);

    impl TransformFactory for CountingFactory {
        fn create(&self, source: &CrsDescriptor) -> Result<Box<dyn CrsTransform>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            match source {
                CrsDescriptor::Epsg(_) => Ok(Box::new(Offset(DVec3::new(1.0, 1.0, 0.0)))),
                CrsDescriptor::Wkt(_) => bail!("WKT not supported here"),
            }
        }
    }

    struct ConstantGrid(GridMetadata);

    impl UndulationGrid for ConstantGrid {
        fn height(&self, _lat: f64, _lon: f64) -> Result<f64, GeoidError> {
            Ok(47.5)
        }

        fn metadata(&self) -> &GridMetadata {
            &self.0
        }
    }

    struct ConstantLoader;

    impl GridLoader for ConstantLoader {
        fn load(
            &self,
            name: &str,
            _dir: &Path,
            _options: LoadOptions,
        ) -> Result<Box<dyn UndulationGrid>, GeoidError> {
            Ok(Box::new(ConstantGrid(GridMetadata {
                description: name.to_string(),
                date_time: String::new(),
                interpolation: Interpolation::Cubic,
                max_error: 0.0,
                rms_error: 0.0,
            })))
        }
    }

    fn frame() -> (ReferenceFrame, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let frame = ReferenceFrame::with_factory(Box::new(CountingFactory(calls.clone())));
        (frame, calls)
    }

    fn corrected_heights() -> HeightModel {
        let heights = HeightModel::with_loader(ConstantLoader);
        heights
            .initialize(GeoidModel::Egm96, Some(Path::new("/grids")))
            .unwrap();
        heights
    }

    #[test]
    fn test_uninitialized() {
        let (frame, calls) = frame();
        assert_eq!(frame.mode(), OriginMode::Uninitialized);
        assert_eq!(frame.origin_height(), 0.0);
        assert!(frame.state().is_none());

        frame.ensure_thread_transform();
        assert!(!frame.workers().has_current());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(frame.source_to_local(DVec3::ZERO), None);
    }

    #[test]
    fn test_raw_origin_without_transform() {
        let (frame, _) = frame();
        let raw = DVec3::new(5.72, 45.19, 212.0);
        let state = frame.initialize_origin(
            OriginRequest {
                raw_origin: raw,
                ..Default::default()
            },
            &HeightModel::new(),
        );

        assert_eq!(state.mode, OriginMode::DerivedFromTransform);
        assert_eq!(state.geographic_origin.to_vec(), raw);
        assert!(!state.height_correction.is_corrected());
        assert_eq!(state.ecef_to_enu, enu_to_ecef_matrix(5.72, 45.19, 212.0).inverse());
        assert_eq!(frame.origin_height(), 212.0);
    }

    #[test]
    fn test_origin_through_transform_and_geoid() {
        let (frame, _) = frame();
        let state = frame.initialize_origin(
            OriginRequest {
                transform: Some(Box::new(Offset(DVec3::new(-100.0, -50.0, 0.0)))),
                raw_origin: DVec3::new(105.0, 95.0, 300.0),
                source_crs: Some(CrsDescriptor::Epsg(2154)),
            },
            &corrected_heights(),
        );

        let g = state.geographic_origin;
        assert_eq!((g.lon, g.lat), (5.0, 45.0));
        assert_eq!(g.height, 347.5);
        assert_eq!(state.height_correction.undulation(), Some(47.5));
        assert_eq!(state.raw_origin, DVec3::new(105.0, 95.0, 300.0));
        assert_eq!(state.ecef_to_enu, enu_to_ecef_matrix(5.0, 45.0, 347.5).inverse());

        // La transformation fournie appartient au thread appelant
        assert!(frame.workers().has_current());
    }

    #[test]
    fn test_failed_origin_transform_uses_raw() {
        let (frame, _) = frame();
        let state = frame.initialize_origin(
            OriginRequest {
                transform: Some(Box::new(Failing)),
                raw_origin: DVec3::new(2.0, 48.0, 10.0),
                source_crs: None,
            },
            &HeightModel::new(),
        );
        assert_eq!(state.geographic_origin, Geographic::new(2.0, 48.0, 10.0));
    }

    #[test]
    fn test_direct_origin_skips_geoid() {
        let (frame, calls) = frame();
        frame.initialize_origin(
            OriginRequest {
                raw_origin: DVec3::new(1.0, 2.0, 3.0),
                source_crs: Some(CrsDescriptor::Epsg(2154)),
                ..Default::default()
            },
            &corrected_heights(),
        );

        let state = frame.set_geographic_origin(5.0, 45.0, 300.0);
        assert_eq!(state.mode, OriginMode::DirectGeographic);
        assert_eq!(state.geographic_origin.height, 300.0);
        assert_eq!(
            state.height_correction,
            HeightConversion::Uncorrected {
                height: 300.0,
                reason: Uncorrected::DirectOrigin
            }
        );
        assert_eq!(state.raw_origin, DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(state.ecef_to_enu, enu_to_ecef_matrix(5.0, 45.0, 300.0).inverse());

        // Pas de transformation en mode géographique direct
        std::thread::scope(|s| {
            s.spawn(|| {
                frame.ensure_thread_transform();
                assert!(!frame.workers().has_current());
                let p = DVec3::new(5.0, 45.0, 300.0);
                assert_eq!(frame.source_to_geographic(p), Some(p));
            });
        });
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_reinitialize_without_transform_drops_previous() {
        let (frame, _) = frame();
        frame.initialize_origin(
            OriginRequest {
                transform: Some(Box::new(Offset(DVec3::new(1000.0, 0.0, 0.0)))),
                raw_origin: DVec3::new(0.0, 45.0, 10.0),
                source_crs: None,
            },
            &HeightModel::new(),
        );
        assert!(frame.workers().has_current());

        let state = frame.initialize_origin(
            OriginRequest {
                raw_origin: DVec3::new(5.0, 45.0, 10.0),
                ..Default::default()
            },
            &HeightModel::new(),
        );

        assert_eq!(state.geographic_origin, Geographic::new(5.0, 45.0, 10.0));
        assert_eq!(state.mode, OriginMode::DerivedFromTransform);
        assert_eq!(state.ecef_to_enu, enu_to_ecef_matrix(5.0, 45.0, 10.0).inverse());
        assert!(!frame.workers().has_current());
    }

    #[test]
    fn test_direct_origin_then_initialize_again() {
        let (frame, _) = frame();
        let heights = corrected_heights();
        frame.set_geographic_origin(-1.5, 47.2, 20.0);

        let state = frame.initialize_origin(
            OriginRequest {
                transform: Some(Box::new(Offset(DVec3::new(-100.0, -50.0, 0.0)))),
                raw_origin: DVec3::new(105.0, 95.0, 300.0),
                source_crs: Some(CrsDescriptor::Epsg(2154)),
            },
            &heights,
        );

        assert_eq!(state.mode, OriginMode::DerivedFromTransform);
        assert_eq!(frame.mode(), OriginMode::DerivedFromTransform);
        assert_eq!(state.geographic_origin, Geographic::new(5.0, 45.0, 347.5));
        assert_eq!(state.raw_origin, DVec3::new(105.0, 95.0, 300.0));
        assert_eq!(state.source_crs, Some(CrsDescriptor::Epsg(2154)));
        assert_eq!(state.ecef_to_enu, enu_to_ecef_matrix(5.0, 45.0, 347.5).inverse());
        assert_eq!(frame.origin_height(), 347.5);

        // Retour au mode direct : le géoïde chargé n'est pas appliqué
        let state = frame.set_geographic_origin(5.0, 45.0, 300.0);
        assert_eq!(state.geographic_origin.height, 300.0);
        assert!(!state.height_correction.is_corrected());
        assert_eq!(state.raw_origin, DVec3::new(105.0, 95.0, 300.0));
        assert_eq!(state.ecef_to_enu, enu_to_ecef_matrix(5.0, 45.0, 300.0).inverse());
    }

    #[test]
    fn test_thread_guard_releases_transform() {
        let (frame, calls) = frame();
        frame.initialize_origin(
            OriginRequest {
                raw_origin: DVec3::new(5.0, 45.0, 0.0),
                source_crs: Some(CrsDescriptor::Epsg(2154)),
                ..Default::default()
            },
            &HeightModel::new(),
        );

        std::thread::scope(|s| {
            for _ in 0..2 {
                s.spawn(|| {
                    let _guard = frame.thread_guard();
                    assert!(frame.source_to_local(DVec3::new(4.0, 44.0, 0.0)).is_some());
                    assert!(frame.workers().has_current());
                });
            }
        });

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(frame.workers().is_empty());
    }

    #[test]
    fn test_worker_transform_created_once() {
        let (frame, calls) = frame();
        frame.initialize_origin(
            OriginRequest {
                raw_origin: DVec3::new(5.0, 45.0, 0.0),
                source_crs: Some(CrsDescriptor::Epsg(2154)),
                ..Default::default()
            },
            &HeightModel::new(),
        );

        std::thread::scope(|s| {
            for _ in 0..3 {
                s.spawn(|| {
                    frame.ensure_thread_transform();
                    frame.ensure_thread_transform();
                    let g = frame.source_to_geographic(DVec3::new(4.0, 44.0, 0.0));
                    assert_eq!(g, Some(DVec3::new(5.0, 45.0, 0.0)));
                    let local = frame.source_to_local(DVec3::new(4.0, 44.0, 0.0)).unwrap();
                    assert!(local.abs_diff_eq(DVec3::ZERO, 1e-6), "local={}", local);
                    frame.release_thread_transform();
                });
            }
        });

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(frame.workers().is_empty());
    }

    #[test]
    fn test_missing_descriptor_is_silent() {
        let (frame, calls) = frame();
        frame.initialize_origin(
            OriginRequest {
                raw_origin: DVec3::new(5.0, 45.0, 0.0),
                ..Default::default()
            },
            &HeightModel::new(),
        );

        std::thread::scope(|s| {
            s.spawn(|| {
                frame.ensure_thread_transform();
                assert!(!frame.workers().has_current());
                assert_eq!(frame.source_to_geographic(DVec3::ONE), None);
            });
        });
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_factory_failure_leaves_thread_without_transform() {
        let (frame, calls) = frame();
        frame.initialize_origin(
            OriginRequest {
                raw_origin: DVec3::new(5.0, 45.0, 0.0),
                source_crs: Some(CrsDescriptor::Wkt("LOCAL_CS[]".into())),
                ..Default::default()
            },
            &HeightModel::new(),
        );

        std::thread::scope(|s| {
            s.spawn(|| {
                assert_eq!(frame.source_to_local(DVec3::ONE), None);
            });
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_local_roundtrip() {
        let (frame, _) = frame();
        frame.set_geographic_origin(-122.42, 37.77, 15.0);
        let state = frame.state().unwrap();

        assert!(state.geographic_to_local(-122.42, 37.77, 15.0).abs_diff_eq(DVec3::ZERO, 1e-6));

        let enu = DVec3::new(120.0, -340.0, 25.0);
        let back = state.ecef_to_local(state.local_to_ecef(enu));
        assert!(back.abs_diff_eq(enu, 1e-6), "back={}", back);
    }
}
