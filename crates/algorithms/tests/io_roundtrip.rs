//! Derived layers written to disk and read back

use rillmap_algorithms::{run_pipeline, PipelineConfig, PipelineInputs};
use rillmap_core::io::{read_geojson, read_geotiff, write_geojson, write_geotiff};
use rillmap_core::vector::AttributeValue;
use rillmap_core::{GeoTransform, Raster, CRS};

fn valley_dem() -> Raster<f64> {
    let mut dem = Raster::new(24, 16);
    dem.set_transform(GeoTransform::new(440_000.0, 3_100_240.0, 10.0, -10.0));
    dem.set_crs(Some(CRS::from_epsg(32643)));
    dem.set_nodata(Some(-9999.0));
    for row in 0..24 {
        for col in 0..16 {
            let z = 300.0 - row as f64 * 1.2 + (col as f64 - 8.0).abs() * 1.5;
            dem.set(row, col, z).unwrap();
        }
    }
    dem.set(0, 0, -9999.0).unwrap();
    dem
}

#[test]
fn rasters_keep_values_and_georeferencing() {
    let out = run_pipeline(&valley_dem(), &PipelineInputs::default(), &PipelineConfig::default()).unwrap();
    let dir = tempfile::tempdir().unwrap();

    let dem_path = dir.path().join("dem_resolved.tif");
    write_geotiff(&out.resolved.dem, &dem_path).unwrap();
    let dem: Raster<f64> = read_geotiff(&dem_path).unwrap();
    assert_eq!(dem.shape(), out.resolved.dem.shape());
    assert_eq!(dem.transform(), out.resolved.dem.transform());
    assert_eq!(dem.crs(), Some(&CRS::from_epsg(32643)));
    assert!(dem.is_nodata(dem.get(0, 0).unwrap()));
    // Samples are stored as 32-bit floats
    assert_eq!(dem.get(12, 8).unwrap(), out.resolved.dem.get(12, 8).unwrap() as f32 as f64);

    let fdir_path = dir.path().join("flow_direction.tif");
    write_geotiff(&out.flow_direction, &fdir_path).unwrap();
    let fdir: Raster<u8> = read_geotiff(&fdir_path).unwrap();
    assert_eq!(fdir.data(), out.flow_direction.data());
    assert_eq!(fdir.nodata(), Some(255));
}

#[test]
fn vectors_keep_attributes() {
    let out = run_pipeline(&valley_dem(), &PipelineInputs::default(), &PipelineConfig::default()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let crs = out.flow_direction.crs();

    let streams_path = dir.path().join("streams.geojson");
    write_geojson(&out.network.to_features(crs), &streams_path).unwrap();
    let streams = read_geojson(&streams_path).unwrap();
    assert_eq!(streams.len(), out.network.len());
    for (feature, seg) in streams.iter().zip(&out.network.segments) {
        assert_eq!(feature.get_property("stream_order"), Some(&AttributeValue::Int(i64::from(seg.order))));
    }

    let basins_path = dir.path().join("watersheds.geojson");
    write_geojson(&out.watersheds.to_features(crs), &basins_path).unwrap();
    let basins = read_geojson(&basins_path).unwrap();
    assert_eq!(basins.len(), out.watersheds.basins.len());
    assert!(basins.iter().all(|f| f.geometry.is_some()));

    let report = serde_json::to_value(&out.report).unwrap();
    assert_eq!(report["basins"], out.watersheds.basins.len());
}
