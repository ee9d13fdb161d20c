//! I/O for elevation rasters and LIDAR point clouds

mod geotiff;
mod las;

pub use geotiff::{
    read_geotiff, read_geotiff_from_buffer, write_geotiff, write_geotiff_atomic,
    write_geotiff_to_buffer, GeoTiffOptions,
};
pub use las::{write_las, LasReader, PointSource, GROUND_CLASS};
