//! Grilles de géoïde au format PGM de GeographicLib
//!
//! Format : en-tête `P5`, commentaires `# Clé valeur` (Offset, Scale,
//! erreurs annoncées...), puis `largeur hauteur` et `65535`, suivis des
//! échantillons u16 big-endian. Les lignes vont de 90°N à 90°S, les colonnes
//! de 0°E vers l'est sur 360°. Ondulation = Offset + Scale * échantillon.

use std::path::{Path, PathBuf};

use memchr::memchr;
use tracing::debug;

use crate::grid::{GridLoader, GridMetadata, Interpolation, LoadOptions, UndulationGrid};
use crate::GeoidError;

/// Loader des fichiers `<nom>.pgm` d'un répertoire
#[derive(Debug, Default, Clone, Copy)]
pub struct PgmLoader;

impl GridLoader for PgmLoader {
    fn load(
        &self,
        name: &str,
        dir: &Path,
        options: LoadOptions,
    ) -> Result<Box<dyn UndulationGrid>, GeoidError> {
        let path = dir.join(format!("{}.pgm", name));
        let grid = PgmGrid::open(&path, options)?;
        Ok(Box::new(grid))
    }
}

/// Grille PGM en mémoire
#[derive(Debug)]
pub struct PgmGrid {
    width: usize,
    height: usize,
    offset: f64,
    scale: f64,
    samples: Vec<u16>,
    options: LoadOptions,
    metadata: GridMetadata,
}

/// Champs d'en-tête lus dans les commentaires
#[derive(Default)]
struct Header {
    description: Option<String>,
    date_time: Option<String>,
    offset: Option<f64>,
    scale: Option<f64>,
    max_bilinear: Option<f64>,
    rms_bilinear: Option<f64>,
    max_cubic: Option<f64>,
    rms_cubic: Option<f64>,
}

impl PgmGrid {
    /// Lit et décode un fichier PGM
    pub fn open(path: &Path, options: LoadOptions) -> Result<Self, GeoidError> {
        let data = std::fs::read(path).map_err(|source| GeoidError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&data, options, path)
    }

    /// Décode un PGM déjà en mémoire (`origin` sert aux messages d'erreur)
    pub fn from_bytes(
        data: &[u8],
        options: LoadOptions,
        origin: impl Into<PathBuf>,
    ) -> Result<Self, GeoidError> {
        let origin = origin.into();
        let invalid = |reason: &str| GeoidError::invalid_grid(origin.clone(), reason);

        let mut pos = 0;
        let magic = next_line(data, &mut pos).ok_or_else(|| invalid("empty file"))?;
        if magic.trim() != "P5" {
            return Err(invalid("missing P5 magic"));
        }

        let mut header = Header::default();
        let mut dims: Vec<usize> = Vec::with_capacity(3);

        while dims.len() < 3 {
            let line = next_line(data, &mut pos).ok_or_else(|| invalid("truncated header"))?;
            if let Some(comment) = line.strip_prefix('#') {
                parse_comment(comment.trim(), &mut header);
                continue;
            }
            for token in line.split_whitespace() {
                let value = token
                    .parse::<usize>()
                    .map_err(|_| invalid("bad dimension in header"))?;
                dims.push(value);
            }
        }

        let (width, height, maxval) = (dims[0], dims[1], dims[2]);
        if maxval != 65535 {
            return Err(invalid("maxval must be 65535"));
        }
        if width == 0 || height < 2 {
            return Err(invalid("grid too small"));
        }

        let offset = header.offset.ok_or_else(|| invalid("missing Offset"))?;
        let scale = header.scale.ok_or_else(|| invalid("missing Scale"))?;

        let expected = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(2))
            .ok_or_else(|| invalid("grid dimensions overflow"))?;
        let body = &data[pos..];
        if body.len() < expected {
            return Err(invalid("truncated sample data"));
        }

        let samples: Vec<u16> = body[..expected]
            .chunks_exact(2)
            .map(|b| u16::from_be_bytes([b[0], b[1]]))
            .collect();

        let (interpolation, max_error, rms_error) = if options.cubic {
            (Interpolation::Cubic, header.max_cubic, header.rms_cubic)
        } else {
            (Interpolation::Bilinear, header.max_bilinear, header.rms_bilinear)
        };

        let metadata = GridMetadata {
            description: header.description.unwrap_or_else(|| "NONE".to_string()),
            date_time: header.date_time.unwrap_or_else(|| "UNKNOWN".to_string()),
            interpolation,
            max_error: max_error.unwrap_or(-1.0),
            rms_error: rms_error.unwrap_or(-1.0),
        };

        debug!(
            path = %origin.display(),
            width,
            height,
            offset,
            scale,
            "PGM geoid grid decoded"
        );

        Ok(Self {
            width,
            height,
            offset,
            scale,
            samples,
            options,
            metadata,
        })
    }

    /// Pas de la grille en longitude (degrés)
    fn lon_step(&self) -> f64 {
        360.0 / self.width as f64
    }

    /// Pas de la grille en latitude (degrés)
    fn lat_step(&self) -> f64 {
        180.0 / (self.height - 1) as f64
    }

    /// Valeur au nœud (ligne, colonne) ; la colonne est périodique
    fn node(&self, row: usize, col: i64) -> f64 {
        let col = col.rem_euclid(self.width as i64) as usize;
        let raw = self.samples[row * self.width + col];
        self.offset + self.scale * f64::from(raw)
    }

    /// Ligne effective pour un index éventuellement hors grille
    fn row(&self, row: i64, lat: f64, lon: f64) -> Result<usize, GeoidError> {
        let last = self.height as i64 - 1;
        if (0..=last).contains(&row) {
            return Ok(row as usize);
        }
        if self.options.extend_boundaries {
            return Ok(row.clamp(0, last) as usize);
        }
        Err(GeoidError::lookup(lat, lon, "query too close to grid edge"))
    }
}

impl UndulationGrid for PgmGrid {
    fn height(&self, lat: f64, lon: f64) -> Result<f64, GeoidError> {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(GeoidError::lookup(lat, lon, "non-finite coordinates"));
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(GeoidError::lookup(lat, lon, "latitude out of range"));
        }

        let y = (90.0 - lat) / self.lat_step();
        let x = lon.rem_euclid(360.0) / self.lon_step();

        // y0 ≤ hauteur-2 : la cellule bilinéaire reste toujours dans la grille
        let y0 = (y.floor() as i64).min(self.height as i64 - 2);
        let x0 = x.floor() as i64;
        let fy = y - y0 as f64;
        let fx = x - x0 as f64;

        if !self.options.cubic {
            let r0 = y0 as usize;
            let r1 = r0 + 1;
            let top = lerp(self.node(r0, x0), self.node(r0, x0 + 1), fx);
            let bottom = lerp(self.node(r1, x0), self.node(r1, x0 + 1), fx);
            return Ok(lerp(top, bottom, fy));
        }

        let mut rows = [0.0; 4];
        for (i, dy) in (-1..=2).enumerate() {
            let r = self.row(y0 + dy, lat, lon)?;
            rows[i] = catmull_rom(
                self.node(r, x0 - 1),
                self.node(r, x0),
                self.node(r, x0 + 1),
                self.node(r, x0 + 2),
                fx,
            );
        }
        Ok(catmull_rom(rows[0], rows[1], rows[2], rows[3], fy))
    }

    fn metadata(&self) -> &GridMetadata {
        &self.metadata
    }
}

/// Ligne suivante de l'en-tête (sans le `\n`)
fn next_line<'a>(data: &'a [u8], pos: &mut usize) -> Option<&'a str> {
    let rest = data.get(*pos..)?;
    let end = memchr(b'\n', rest)?;
    *pos += end + 1;
    std::str::from_utf8(&rest[..end]).ok()
}

fn parse_comment(comment: &str, header: &mut Header) {
    let (key, value) = match comment.split_once(char::is_whitespace) {
        Some((k, v)) => (k, v.trim()),
        None => return,
    };
    let number = || fast_float::parse::<f64, _>(value).ok();

    match key {
        "Description" => header.description = Some(value.to_string()),
        "DateTime" => header.date_time = Some(value.to_string()),
        "Offset" => header.offset = number(),
        "Scale" => header.scale = number(),
        "MaxBilinearError" => header.max_bilinear = number(),
        "RMSBilinearError" => header.rms_bilinear = number(),
        "MaxCubicError" => header.max_cubic = number(),
        "RMSCubicError" => header.rms_cubic = number(),
        _ => {}
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Spline de Catmull-Rom entre p1 et p2
fn catmull_rom(p0: f64, p1: f64, p2: f64, p3: f64, t: f64) -> f64 {
    p1 + 0.5
        * t
        * (p2 - p0 + t * (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3 + t * (3.0 * (p1 - p2) + p3 - p0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Grille 8×5 (pas de 45°), échantillon = 100·ligne + colonne
    fn test_pgm(extra_header: &str) -> Vec<u8> {
        let (w, h) = (8usize, 5usize);
        let mut data = format!(
            "P5\n# Description Test grid\n# DateTime 2024-01-01 00:00:00\n\
             # MaxBilinearError 0.5\n# RMSBilinearError 0.1\n\
             # MaxCubicError 0.2\n# RMSCubicError 0.05\n{}{} {}\n65535\n",
            extra_header, w, h
        )
        .into_bytes();
        for row in 0..h {
            for col in 0..w {
                let v = (100 * row + col) as u16;
                data.extend_from_slice(&v.to_be_bytes());
            }
        }
        data
    }

    fn grid(cubic: bool, extend: bool) -> PgmGrid {
        let data = test_pgm("# Offset -10\n# Scale 0.5\n");
        let options = LoadOptions {
            cubic,
            extend_boundaries: extend,
        };
        PgmGrid::from_bytes(&data, options, "test.pgm").unwrap()
    }

    #[test]
    fn test_metadata() {
        let g = grid(true, true);
        assert_eq!(g.metadata().description, "Test grid");
        assert_eq!(g.metadata().date_time, "2024-01-01 00:00:00");
        assert_eq!(g.metadata().interpolation, Interpolation::Cubic);
        assert_eq!(g.metadata().max_error, 0.2);
        assert_eq!(g.metadata().rms_error, 0.05);

        let g = grid(false, true);
        assert_eq!(g.metadata().interpolation, Interpolation::Bilinear);
        assert_eq!(g.metadata().max_error, 0.5);
    }

    #[test]
    fn test_node_values() {
        // Ligne 1 = 45°N, colonne 2 = 90°E : -10 + 0.5 * 102
        for cubic in [false, true] {
            let g = grid(cubic, true);
            let n = g.height(45.0, 90.0).unwrap();
            assert!((n - 41.0).abs() < 1e-9, "cubic={} n={}", cubic, n);
        }
    }

    #[test]
    fn test_bilinear_midpoint() {
        let g = grid(false, true);
        // Milieu de (ligne 1, col 2) et (ligne 2, col 3) : échantillon moyen 152.5
        let n = g.height(22.5, 112.5).unwrap();
        assert!((n - (-10.0 + 0.5 * 152.5)).abs() < 1e-9, "n={}", n);
    }

    #[test]
    fn test_longitude_wraps() {
        let g = grid(false, true);
        let a = g.height(45.0, -90.0).unwrap();
        let b = g.height(45.0, 270.0).unwrap();
        assert!((a - b).abs() < 1e-12);
        // Entre la dernière colonne (315°) et la première (0°)
        let n = g.height(45.0, 337.5).unwrap();
        assert!((n - (-10.0 + 0.5 * 103.5)).abs() < 1e-9, "n={}", n);
    }

    #[test]
    fn test_south_pole_bilinear() {
        let g = grid(false, false);
        let n = g.height(-90.0, 0.0).unwrap();
        assert!((n - (-10.0 + 0.5 * 400.0)).abs() < 1e-9, "n={}", n);
    }

    #[test]
    fn test_edge_requires_extension_for_cubic() {
        assert!(grid(true, false).height(80.0, 10.0).is_err());
        assert!(grid(true, true).height(80.0, 10.0).is_ok());
    }

    #[test]
    fn test_invalid_coordinates() {
        let g = grid(true, true);
        assert!(g.height(f64::NAN, 0.0).is_err());
        assert!(g.height(0.0, f64::INFINITY).is_err());
        assert!(g.height(91.0, 0.0).is_err());
    }

    #[test]
    fn test_missing_offset_is_invalid() {
        let data = test_pgm("# Scale 0.5\n");
        let result = PgmGrid::from_bytes(&data, LoadOptions::default(), "bad.pgm");
        assert!(matches!(result, Err(GeoidError::InvalidGrid { .. })));
    }

    #[test]
    fn test_truncated_data_is_invalid() {
        let mut data = test_pgm("# Offset 0\n# Scale 1\n");
        data.truncate(data.len() - 4);
        let result = PgmGrid::from_bytes(&data, LoadOptions::default(), "short.pgm");
        assert!(matches!(result, Err(GeoidError::InvalidGrid { .. })));
    }

    #[test]
    fn test_oversized_dimensions_are_invalid() {
        let data = b"P5\n# Offset 0\n# Scale 1\n9223372036854775807 3\n65535\n\x00\x01";
        let result = PgmGrid::from_bytes(data, LoadOptions::default(), "huge.pgm");
        assert!(matches!(result, Err(GeoidError::InvalidGrid { .. })));
    }

    #[test]
    fn test_bad_magic() {
        let data = b"P2\n1 2\n65535\n";
        let result = PgmGrid::from_bytes(data, LoadOptions::default(), "p2.pgm");
        assert!(result.is_err());
    }

    #[test]
    fn test_loader_missing_file() {
        let result = PgmLoader.load(
            "egm96-5",
            Path::new("/nonexistent/geoids"),
            LoadOptions::default(),
        );
        assert!(matches!(result, Err(GeoidError::Io { .. })));
    }
}
