//! Reading and writing rasters (GeoTIFF) and vector layers (GeoJSON)

mod geojson_io;
mod native;

pub use geojson_io::{
    feature_collection_from_str, feature_collection_to_string, read_geojson, write_geojson,
};
pub use native::{read_geotiff, read_geotiff_from_buffer, write_geotiff, write_geotiff_to_buffer};
