//! Interface C pour l'application hôte
//!
//! Les fonctions opèrent sur un contexte unique pour tout le processus.
//! Aucune ne panique ni ne termine le processus : les échecs sont journalisés
//! et rendus sous forme de `false` ou de valeur par défaut.

use std::ffi::{c_char, CStr};
use std::path::Path;
use std::sync::OnceLock;

use geoid::GeoidModel;
use glam::DVec3;
use tracing::{error, warn};

use crate::context::Context;
use crate::crs::CrsDescriptor;

static CONTEXT: OnceLock<Context> = OnceLock::new();

/// Contexte du processus, créé au premier accès
pub fn global() -> &'static Context {
    CONTEXT.get_or_init(Context::new)
}

/// Chaîne C → `&str` (`None` si pointeur nul ou UTF-8 invalide)
///
/// # Safety
///
/// `ptr` doit être nul ou pointer sur une chaîne C valide terminée par `\0`.
unsafe fn c_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok()
}

/// Charge le modèle de géoïde `model` (egm84, egm96, egm2008, none).
///
/// # Safety
///
/// `model` et `geoid_path` doivent être nuls ou des chaînes C valides.
#[no_mangle]
pub unsafe extern "C" fn init_geoid(model: *const c_char, geoid_path: *const c_char) -> bool {
    let model = GeoidModel::from_name(c_str(model).unwrap_or_default());
    let path = c_str(geoid_path).filter(|p| !p.is_empty()).map(Path::new);

    match global().init_geoid(model, path) {
        Ok(()) => true,
        Err(e) => {
            error!(error = %format!("{:#}", e), "init_geoid failed");
            false
        }
    }
}

/// Ondulation au point, 0.0 si indisponible
#[no_mangle]
pub extern "C" fn get_geoid_height(lat: f64, lon: f64) -> f64 {
    global().heights.geoid_height(lat, lon).unwrap_or(0.0)
}

#[no_mangle]
pub extern "C" fn orthometric_to_ellipsoidal(lat: f64, lon: f64, orthometric_height: f64) -> f64 {
    global()
        .heights
        .orthometric_to_ellipsoidal(lat, lon, orthometric_height)
        .value()
}

#[no_mangle]
pub extern "C" fn ellipsoidal_to_orthometric(lat: f64, lon: f64, ellipsoidal_height: f64) -> f64 {
    global()
        .heights
        .ellipsoidal_to_orthometric(lat, lon, ellipsoidal_height)
        .value()
}

#[no_mangle]
pub extern "C" fn is_geoid_initialized() -> bool {
    global().heights.is_initialized()
}

/// Hauteur ellipsoïdale de l'origine, 0.0 avant initialisation
#[no_mangle]
pub extern "C" fn get_geo_origin_height() -> f64 {
    global().frame.origin_height()
}

/// Fixe directement l'origine géographique (sans correction de géoïde)
#[no_mangle]
pub extern "C" fn set_geographic_origin(lon: f64, lat: f64, height: f64) {
    global().frame.set_geographic_origin(lon, lat, height);
}

fn init_origin(source: CrsDescriptor, origin: DVec3) -> bool {
    match global().initialize_origin_in(source, origin) {
        Ok(_) => true,
        Err(e) => {
            warn!(error = %format!("{:#}", e), "Origin initialization failed");
            false
        }
    }
}

/// Initialise l'origine exprimée dans le CRS `EPSG:epsg`
#[no_mangle]
pub extern "C" fn init_origin_epsg(epsg: u32, x: f64, y: f64, z: f64) -> bool {
    init_origin(CrsDescriptor::Epsg(epsg), DVec3::new(x, y, z))
}

/// Initialise l'origine exprimée dans le CRS décrit par `wkt`
///
/// # Safety
///
/// `wkt` doit être nul ou une chaîne C valide.
#[no_mangle]
pub unsafe extern "C" fn init_origin_wkt(wkt: *const c_char, x: f64, y: f64, z: f64) -> bool {
    match c_str(wkt) {
        Some(text) if !text.trim().is_empty() => {
            init_origin(CrsDescriptor::Wkt(text.to_string()), DVec3::new(x, y, z))
        }
        _ => false,
    }
}

/// Copie la matrice ECEF → ENU (16 valeurs, colonnes) dans `out`.
///
/// Retourne `false` si le repère n'est pas initialisé.
///
/// # Safety
///
/// `out` doit être nul ou pointer sur 16 `f64` accessibles en écriture.
#[no_mangle]
pub unsafe extern "C" fn get_ecef_to_enu_matrix(out: *mut f64) -> bool {
    if out.is_null() {
        return false;
    }
    let Some(state) = global().frame.state() else {
        return false;
    };
    let values = state.ecef_to_enu.to_cols_array();
    std::ptr::copy_nonoverlapping(values.as_ptr(), out, values.len());
    true
}
