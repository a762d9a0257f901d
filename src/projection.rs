//! Geographic projections.
//!
//! Projection math is consumed through [`Projection`]; the crate ships
//! [`Equirectangular`] as a default that can be fitted to a viewport.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::row::Row;

/// Axis-aligned box in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub west: f64,
    pub east: f64,
    pub south: f64,
    pub north: f64,
}

impl GeoBounds {
    /// NaN never lies inside any box.
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        if !(latitude.is_finite() && longitude.is_finite()) {
            return false;
        }
        longitude >= self.west
            && longitude <= self.east
            && latitude >= self.south
            && latitude <= self.north
    }

    /// Smallest box around every row with a finite position.
    pub fn of_rows(rows: &[Row]) -> Option<Self> {
        rows.iter()
            .filter(|row| row.has_position())
            .fold(None, |acc: Option<GeoBounds>, row| {
                Some(match acc {
                    None => GeoBounds {
                        west: row.longitude,
                        east: row.longitude,
                        south: row.latitude,
                        north: row.latitude,
                    },
                    Some(b) => GeoBounds {
                        west: b.west.min(row.longitude),
                        east: b.east.max(row.longitude),
                        south: b.south.min(row.latitude),
                        north: b.north.max(row.latitude),
                    },
                })
            })
    }
}

pub trait Projection: Send + Sync {
    /// Screen point `[x, y]` of a position, if it is projectable.
    fn project(&self, longitude: f64, latitude: f64) -> Option<[f64; 2]>;

    /// Position `[longitude, latitude]` under a screen point.
    fn invert(&self, point: [f64; 2]) -> Option<[f64; 2]>;
}

/// Plate carrée: `x = k·λ + tx`, `y = -k·φ + ty`, angles in radians.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Equirectangular {
    scale: f64,
    translate: [f64; 2],
}

impl Default for Equirectangular {
    fn default() -> Self {
        Self {
            scale: 152.63,
            translate: [480.0, 250.0],
        }
    }
}

impl Equirectangular {
    pub fn new(scale: f64, translate: [f64; 2]) -> Self {
        Self { scale, translate }
    }

    /// Largest projection that shows `bounds` centred inside `extent`.
    pub fn fit_extent(extent: [[f64; 2]; 2], bounds: GeoBounds) -> Self {
        let [[x0, y0], [x1, y1]] = extent;
        let width = (bounds.east - bounds.west).to_radians();
        let height = (bounds.north - bounds.south).to_radians();
        let kx = if width > 0.0 { (x1 - x0) / width } else { f64::INFINITY };
        let ky = if height > 0.0 { (y1 - y0) / height } else { f64::INFINITY };
        let mut scale = kx.min(ky);
        if !scale.is_finite() {
            // A single point: any scale shows it; keep the world readable.
            scale = ((x1 - x0) / (2.0 * PI)).min((y1 - y0) / PI);
        }
        let center_lon = ((bounds.west + bounds.east) / 2.0).to_radians();
        let center_lat = ((bounds.south + bounds.north) / 2.0).to_radians();
        let translate = [
            (x0 + x1) / 2.0 - scale * center_lon,
            (y0 + y1) / 2.0 + scale * center_lat,
        ];
        Self { scale, translate }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn translate(&self) -> [f64; 2] {
        self.translate
    }
}

impl Projection for Equirectangular {
    fn project(&self, longitude: f64, latitude: f64) -> Option<[f64; 2]> {
        if !(longitude.is_finite() && latitude.is_finite()) {
            return None;
        }
        Some([
            self.scale * longitude.to_radians() + self.translate[0],
            -self.scale * latitude.to_radians() + self.translate[1],
        ])
    }

    fn invert(&self, [x, y]: [f64; 2]) -> Option<[f64; 2]> {
        if !(x.is_finite() && y.is_finite()) || self.scale == 0.0 {
            return None;
        }
        Some([
            ((x - self.translate[0]) / self.scale).to_degrees(),
            ((self.translate[1] - y) / self.scale).to_degrees(),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn invert_undoes_project() {
        let projection = Equirectangular::new(300.0, [400.0, 200.0]);
        let [x, y] = projection.project(12.5, 41.9).unwrap();
        let [lon, lat] = projection.invert([x, y]).unwrap();
        assert_relative_eq!(lon, 12.5, epsilon = 1e-9);
        assert_relative_eq!(lat, 41.9, epsilon = 1e-9);
    }

    #[test]
    fn north_is_up() {
        let projection = Equirectangular::default();
        let north = projection.project(0.0, 10.0).unwrap();
        let south = projection.project(0.0, -10.0).unwrap();
        assert!(north[1] < south[1]);
    }

    #[test]
    fn fitted_bounds_land_inside_extent() {
        let bounds = GeoBounds {
            west: 6.6,
            east: 18.5,
            south: 36.6,
            north: 47.1,
        };
        let extent = [[20.0, 20.0], [620.0, 420.0]];
        let projection = Equirectangular::fit_extent(extent, bounds);
        for (lon, lat) in [(6.6, 47.1), (18.5, 36.6), (12.0, 42.0)] {
            let [x, y] = projection.project(lon, lat).unwrap();
            assert!((20.0 - 1e-6..=620.0 + 1e-6).contains(&x), "x = {x}");
            assert!((20.0 - 1e-6..=420.0 + 1e-6).contains(&y), "y = {y}");
        }
    }

    #[test]
    fn nan_is_outside_every_box() {
        let bounds = GeoBounds {
            west: -180.0,
            east: 180.0,
            south: -90.0,
            north: 90.0,
        };
        assert!(bounds.contains(0.0, 0.0));
        assert!(!bounds.contains(f64::NAN, 0.0));
        assert!(!bounds.contains(0.0, f64::NAN));
        assert!(Equirectangular::default().project(f64::NAN, 0.0).is_none());
    }
}
