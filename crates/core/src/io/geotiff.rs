//! GeoTIFF reading/writing with the `tiff` crate.
//!
//! Georeferencing is carried by ModelPixelScale (33550) and ModelTiepoint
//! (33922), the spatial reference by the GeoKeyDirectory (34735) and the
//! no-data value by the GDAL_NODATA ASCII tag (42113).

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use num_traits::{NumCast, ToPrimitive};
use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{Gray32Float, Gray64Float};
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: Tag = Tag::ModelPixelScaleTag;
const MODEL_TIEPOINT: Tag = Tag::ModelTiepointTag;
const GEO_KEY_DIRECTORY: Tag = Tag::GeoKeyDirectoryTag;
const GDAL_NODATA: Tag = Tag::GdalNodata;

const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;

/// Options for writing GeoTIFF files
#[derive(Debug, Clone, Default)]
pub struct GeoTiffOptions {
    /// Store samples as 64-bit floats instead of 32-bit
    pub double_precision: bool,
}

/// Read a GeoTIFF file into a Raster
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(file)
}

/// Read a GeoTIFF from an in-memory buffer into a Raster
pub fn read_geotiff_from_buffer<T: RasterElement>(data: &[u8]) -> Result<Raster<T>> {
    decode_geotiff(Cursor::new(data))
}

fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder =
        Decoder::new(reader).map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;
    let rows = height as usize;
    let cols = width as usize;

    let result = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?;

    let data: Vec<T> = match result {
        DecodingResult::F32(buf) => cast_all(buf),
        DecodingResult::F64(buf) => cast_all(buf),
        DecodingResult::I16(buf) => cast_all(buf),
        DecodingResult::I32(buf) => cast_all(buf),
        DecodingResult::U16(buf) => cast_all(buf),
        DecodingResult::U32(buf) => cast_all(buf),
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF pixel format".to_string(),
            ))
        }
    };

    if data.len() != rows * cols {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let mut raster = Raster::from_vec(data, rows, cols)?;

    if let Some(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }
    raster.set_crs(read_crs(&mut decoder));
    raster.set_nodata(
        decoder
            .get_tag_ascii_string(GDAL_NODATA)
            .ok()
            .and_then(|s| s.trim().trim_end_matches('\0').parse::<f64>().ok())
            .and_then(num_traits::cast),
    );

    Ok(raster)
}

fn cast_all<S: ToPrimitive + NumCast + Copy, T: RasterElement>(buf: Vec<S>) -> Vec<T> {
    buf.into_iter()
        .map(|v| num_traits::cast(v).unwrap_or_else(T::default_nodata))
        .collect()
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(MODEL_PIXEL_SCALE).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(MODEL_TIEPOINT).ok()?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }

    // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder.get_tag_u16_vec(GEO_KEY_DIRECTORY).ok()?;
    if keys.len() < 4 {
        return None;
    }

    // Header [version, revision, minor, count] then 4 shorts per key:
    // [key_id, tiff_tag_location, count, value_or_index]
    let num_keys = keys[3] as usize;
    keys[4..]
        .chunks_exact(4)
        .take(num_keys)
        .find_map(|entry| match (entry[0], entry[1], entry[3]) {
            (PROJECTED_CS_TYPE | GEOGRAPHIC_TYPE, 0, code) if code > 0 && code < 32767 => {
                Some(CRS::from_epsg(code as u32))
            }
            _ => None,
        })
}

/// Write a Raster to a GeoTIFF file
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, options: Option<GeoTiffOptions>) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| raster_write_error(path, e))?;
    encode_geotiff(raster, file, &options.unwrap_or_default())
        .map_err(|e| raster_write_error(path, e))
}

/// Write a Raster to `path` without ever exposing a partial file there.
///
/// The image is encoded into a temporary file next to `path` and renamed
/// over it once complete.
pub fn write_geotiff_atomic<T, P>(
    raster: &Raster<T>,
    path: P,
    options: Option<GeoTiffOptions>,
) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".lidartile-")
        .suffix(".tif.part")
        .tempfile_in(dir)
        .map_err(|e| raster_write_error(path, e))?;
    encode_geotiff(raster, tmp.as_file_mut(), &options.unwrap_or_default())
        .map_err(|e| raster_write_error(path, e))?;
    tmp.as_file_mut()
        .flush()
        .map_err(|e| raster_write_error(path, e))?;
    tmp.persist(path)
        .map_err(|e| raster_write_error(path, e.error))?;
    Ok(())
}

/// Write a Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T: RasterElement>(
    raster: &Raster<T>,
    options: Option<GeoTiffOptions>,
) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf), &options.unwrap_or_default())?;
    Ok(buf)
}

fn raster_write_error(path: &Path, err: impl std::fmt::Display) -> Error {
    Error::RasterWrite {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

fn geo_keys(crs: Option<&CRS>) -> Vec<u16> {
    let epsg = crs
        .and_then(|c| c.epsg().map(|code| (code, c.is_geographic())))
        .and_then(|(code, geographic)| u16::try_from(code).ok().map(|c| (c, geographic)));

    let model_type = match epsg {
        Some((_, true)) => 2,
        _ => 1,
    };

    let mut keys = vec![
        1, 1, 0, 2, // version 1.1.0, key count patched below
        GT_MODEL_TYPE, 0, 1, model_type,
        GT_RASTER_TYPE, 0, 1, 1, // RasterPixelIsArea
    ];
    if let Some((code, geographic)) = epsg {
        let key = if geographic { GEOGRAPHIC_TYPE } else { PROJECTED_CS_TYPE };
        keys.extend_from_slice(&[key, 0, 1, code]);
        keys[3] = 3;
    }
    keys
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W, options: &GeoTiffOptions) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let mut encoder =
        TiffEncoder::new(writer).map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;

    let (rows, cols) = raster.shape();
    if rows == 0 || cols == 0 {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let gt = raster.transform();
    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    let keys = geo_keys(raster.crs());
    let nodata = raster
        .nodata()
        .and_then(|v| v.to_f64())
        .map(|v| format!("{}", v));

    macro_rules! write_image {
        ($color:ty, $sample:ty) => {{
            let data: Vec<$sample> = raster
                .data()
                .iter()
                .map(|&v| num_traits::cast(v).unwrap_or(<$sample>::NAN))
                .collect();

            let mut image = encoder
                .new_image::<$color>(cols as u32, rows as u32)
                .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;

            image
                .encoder()
                .write_tag(MODEL_PIXEL_SCALE, &scale[..])
                .map_err(|e| Error::Other(format!("Cannot write scale tag: {}", e)))?;
            image
                .encoder()
                .write_tag(MODEL_TIEPOINT, &tiepoint[..])
                .map_err(|e| Error::Other(format!("Cannot write tiepoint tag: {}", e)))?;
            image
                .encoder()
                .write_tag(GEO_KEY_DIRECTORY, keys.as_slice())
                .map_err(|e| Error::Other(format!("Cannot write geokey tag: {}", e)))?;
            if let Some(nodata) = &nodata {
                image
                    .encoder()
                    .write_tag(GDAL_NODATA, nodata.as_str())
                    .map_err(|e| Error::Other(format!("Cannot write nodata tag: {}", e)))?;
            }

            image
                .write_data(&data)
                .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;
        }};
    }

    if options.double_precision {
        write_image!(Gray64Float, f64);
    } else {
        write_image!(Gray32Float, f32);
    }

    Ok(())
}
