// Writes the two downstream products from one cleaned collection
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::BatchConfig;
use crate::error::DatasetError;
use crate::geojson_features::write_feature_collection;
use crate::models::FeatureCollection;
use crate::naming::OutputLayout;
use crate::projection::{reproject_collection, Reprojector};

/// Files written for one subgrid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub geoflow: PathBuf,
    pub modelur: PathBuf,
}

/// Writes `<subgrid>_Geoflow` in `config.geoflow_crs` and `<subgrid>_Modelur`
/// in `config.modelur_crs`. Product directories must already exist.
///
/// Both products are reprojected before anything is written, and a failed
/// write removes whatever this call already put on disk, so an error leaves
/// no output behind.
pub fn export_outputs(
    collection: &FeatureCollection,
    subgrid: &str,
    layout: &OutputLayout,
    config: &BatchConfig,
    projector: &dyn Reprojector,
) -> Result<ExportPaths, DatasetError> {
    let paths = ExportPaths {
        geoflow: layout.geoflow_path(subgrid),
        modelur: layout.modelur_path(subgrid),
    };

    let geoflow = reproject_collection(collection, config.geoflow_crs, projector)?;
    let modelur = reproject_collection(collection, config.modelur_crs, projector)?;

    let products = [
        (&paths.geoflow, &geoflow, format!("{subgrid}_Geoflow")),
        (&paths.modelur, &modelur, format!("{subgrid}_Modelur")),
    ];
    let mut written: Vec<&Path> = Vec::with_capacity(products.len());
    for (path, product, name) in &products {
        if let Err(err) = write_feature_collection(path, product, name) {
            written.push(path);
            discard(&written);
            return Err(err);
        }
        written.push(path);
        tracing::debug!(path = %path.display(), features = product.len(), "wrote {name}");
    }

    Ok(paths)
}

fn discard(paths: &[&Path]) {
    for path in paths {
        match fs::remove_file(path) {
            Ok(()) => tracing::debug!(path = %path.display(), "removed partial output"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => tracing::warn!(path = %path.display(), error = %err, "cannot remove partial output"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProjectionError;
    use crate::geojson_features::read_feature_collection;
    use crate::models::{Feature, Surface};
    use crate::projection::{BuiltinProjector, Crs};
    use approx::assert_relative_eq;
    use geo::polygon;

    fn lot() -> FeatureCollection {
        let mut attributes = serde_json::Map::new();
        attributes.insert("FID".to_string(), serde_json::Value::from(12));
        FeatureCollection::new(
            vec![Feature::new(
                Some(Surface::Polygon(polygon![
                    (x: 700_000.0, y: 9_300_000.0),
                    (x: 700_100.0, y: 9_300_000.0),
                    (x: 700_100.0, y: 9_300_100.0),
                    (x: 700_000.0, y: 9_300_100.0),
                ])),
                attributes,
            )],
            Some(Crs::epsg(32748)),
        )
    }

    #[test]
    fn writes_both_products_in_their_frames() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::at(dir.path().to_path_buf());
        layout.create_dirs().unwrap();

        let paths = export_outputs(&lot(), "JK_01_A", &layout, &BatchConfig::default(), &BuiltinProjector)
            .unwrap();
        assert!(paths.geoflow.ends_with("GEOFLOW/JK_01_A_Geoflow.geojson"));

        let geoflow = read_feature_collection(&paths.geoflow).unwrap();
        assert_eq!(geoflow.crs, Some(Crs::epsg(32748)));
        assert_eq!(geoflow.features[0].attributes["fidSrc"], 12);
        let Some(Surface::Polygon(polygon)) = &geoflow.features[0].geometry else {
            panic!("expected polygon");
        };
        assert_relative_eq!(polygon.exterior().0[0].x, 700_000.0);

        let modelur = read_feature_collection(&paths.modelur).unwrap();
        assert_eq!(modelur.crs, Some(Crs::WGS84));
        let Some(Surface::Polygon(polygon)) = &modelur.features[0].geometry else {
            panic!("expected polygon");
        };
        let corner = polygon.exterior().0[0];
        // zone 48S, a little east of the central meridian at 105°E
        assert!(corner.x > 106.0 && corner.x < 107.0, "lon {}", corner.x);
        assert!(corner.y < -6.0 && corner.y > -7.0, "lat {}", corner.y);
    }

    #[test]
    fn unsupported_product_frame_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::at(dir.path().to_path_buf());
        layout.create_dirs().unwrap();
        let config = BatchConfig {
            modelur_crs: Crs::epsg(2154),
            ..BatchConfig::default()
        };

        let result = export_outputs(&lot(), "JK_01_A", &layout, &config, &BuiltinProjector);
        assert!(matches!(
            result,
            Err(DatasetError::Projection(ProjectionError::Unsupported(crs))) if crs == Crs::epsg(2154)
        ));
        assert!(!layout.geoflow_path("JK_01_A").exists());
        assert!(!layout.modelur_path("JK_01_A").exists());
    }

    #[test]
    fn failed_second_write_removes_first_product() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::at(dir.path().to_path_buf());
        // only the Geoflow directory exists, so the Modelur write fails
        fs::create_dir_all(&layout.geoflow_dir).unwrap();

        let result = export_outputs(&lot(), "JK_01_A", &layout, &BatchConfig::default(), &BuiltinProjector);
        assert!(matches!(result, Err(DatasetError::Io(_))));
        assert!(!layout.geoflow_path("JK_01_A").exists());
    }
}
