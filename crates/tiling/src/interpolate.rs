//! Surface interpolation dispatch
//!
//! In-process methods return a raster. The native methods write the
//! buffered cloud to disk and let an external [`RasterBackend`] produce the
//! raster file, so callers branch on [`Surface`].

use crate::config::{InterpolationConfig, NativeParams};
use crate::method::InterpolationMethod;
use lidartile_algorithms::interpolation::{idw_quad, laplace, natural_neighbor, tin_linear, GridSpec};
use lidartile_core::io::write_las;
use lidartile_core::raster::Raster;
use lidartile_core::{Error, PointCloud, Result, CRS};
use serde_json::{json, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;
use tracing::{debug, info};

/// Outcome of interpolation
#[derive(Debug, Clone)]
pub enum Surface {
    InMemory(Raster<f64>),
    /// Raster written by the backend at this path
    FileProduced(PathBuf),
}

/// Everything a backend needs to rasterize a point file
#[derive(Debug, Clone)]
pub struct BackendRequest<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    pub grid: &'a GridSpec,
    pub method: InterpolationMethod,
    pub params: &'a NativeParams,
    pub crs: &'a CRS,
    /// Classes to keep; empty when the input is already filtered
    pub classes: &'a [u8],
}

/// External raster generator for the native methods
pub trait RasterBackend: Send + Sync {
    fn render(&self, request: &BackendRequest<'_>) -> Result<()>;
}

/// Runs `pdal pipeline --stdin` with a JSON pipeline
#[derive(Debug, Clone)]
pub struct PdalBackend {
    pub program: PathBuf,
}

impl PdalBackend {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// JSON pipeline for `request`. The grid is given by its lower-left
    /// corner, which is how the PDAL raster writers expect it.
    pub fn pipeline(request: &BackendRequest<'_>) -> Result<Value> {
        let grid = request.grid;
        let bounds = grid.bounds();
        let mut stages = vec![json!({
            "type": "readers.las",
            "filename": request.input,
            "override_srs": request.crs.identifier(),
            "nosrs": true,
        })];
        if !request.classes.is_empty() {
            let limits: Vec<String> = request
                .classes
                .iter()
                .map(|c| format!("Classification[{c}:{c}]"))
                .collect();
            stages.push(json!({ "type": "filters.range", "limits": limits.join(",") }));
        }

        match request.method {
            InterpolationMethod::NativeGridIdw => {
                let mut writer = json!({
                    "type": "writers.gdal",
                    "output_type": "idw",
                    "resolution": grid.pixel_size,
                    "origin_x": bounds.min_x,
                    "origin_y": bounds.min_y,
                    "width": grid.cols,
                    "height": grid.rows,
                    "power": request.params.power,
                    "window_size": request.params.window_size,
                    "nodata": grid.nodata,
                    "data_type": "float32",
                    "filename": request.output,
                });
                if let Some(radius) = request.params.radius {
                    writer["radius"] = json!(radius);
                }
                stages.push(writer);
            }
            InterpolationMethod::NativeGridTin => {
                stages.push(json!({ "type": "filters.delaunay" }));
                stages.push(json!({
                    "type": "filters.faceraster",
                    "resolution": grid.pixel_size,
                    "origin_x": bounds.min_x,
                    "origin_y": bounds.min_y,
                    "width": grid.cols,
                    "height": grid.rows,
                }));
                stages.push(json!({
                    "type": "writers.raster",
                    "gdaldriver": "GTiff",
                    "nodata": grid.nodata,
                    "data_type": "float32",
                    "filename": request.output,
                }));
            }
            other => return Err(Error::UnsupportedMethod(format!("{other} is not a native method"))),
        }
        Ok(json!({ "pipeline": stages }))
    }
}

impl Default for PdalBackend {
    fn default() -> Self {
        Self::new("pdal")
    }
}

impl RasterBackend for PdalBackend {
    fn render(&self, request: &BackendRequest<'_>) -> Result<()> {
        let pipeline = Self::pipeline(request)?.to_string();
        debug!("PDAL pipeline: {pipeline}");

        let mut child = Command::new(&self.program)
            .args(["pipeline", "--stdin"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Backend(format!("cannot run {}: {e}", self.program.display())))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(pipeline.as_bytes())
                .map_err(|e| Error::Backend(format!("cannot send pipeline: {e}")))?;
        }
        let output = child
            .wait_with_output()
            .map_err(|e| Error::Backend(format!("{} did not finish: {e}", self.program.display())))?;
        if !output.status.success() {
            return Err(Error::Backend(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

/// Run one of the in-process methods
pub fn interpolate_in_memory(
    cloud: &PointCloud,
    grid: &GridSpec,
    method: InterpolationMethod,
    config: &InterpolationConfig,
) -> Result<Raster<f64>> {
    let points = &cloud.points;
    match method {
        InterpolationMethod::TinLinear => tin_linear(points, grid),
        InterpolationMethod::Laplace => laplace(points, grid),
        InterpolationMethod::NaturalNeighbor => natural_neighbor(points, grid),
        InterpolationMethod::QuadrantIdw => idw_quad(points, grid, &config.idw_quad),
        InterpolationMethod::NativeGridIdw | InterpolationMethod::NativeGridTin => Err(
            Error::UnsupportedMethod(format!("{method} needs a raster backend")),
        ),
    }
}

/// Where the native methods put their files
#[derive(Clone, Copy)]
pub struct NativeTarget<'a> {
    pub backend: &'a dyn RasterBackend,
    /// Buffered cloud written for the backend
    pub cloud_path: &'a Path,
    /// Raster the backend must produce
    pub raster_path: &'a Path,
}

/// Interpolate `cloud` onto `grid` with the configured method.
///
/// An empty cloud yields an all-no-data raster for every method, without
/// calling the backend.
pub fn interpolate(
    cloud: &PointCloud,
    grid: &GridSpec,
    config: &InterpolationConfig,
    crs: &CRS,
    native: NativeTarget<'_>,
) -> Result<Surface> {
    let method = config.method;
    let start = Instant::now();

    if cloud.is_empty() {
        info!("{method}: no points, writing an empty raster");
        let mut raster = grid.nodata_raster();
        raster.set_crs(Some(crs.clone()));
        return Ok(Surface::InMemory(raster));
    }

    let surface = if method.is_native() {
        write_las(cloud, native.cloud_path)?;
        native.backend.render(&BackendRequest {
            input: native.cloud_path,
            output: native.raster_path,
            grid,
            method,
            params: &config.native,
            crs,
            // the buffered cloud only holds the classes kept at read time
            classes: &[],
        })?;
        Surface::FileProduced(native.raster_path.to_path_buf())
    } else {
        let mut raster = interpolate_in_memory(cloud, grid, method, config)?;
        raster.set_crs(Some(crs.clone()));
        Surface::InMemory(raster)
    };

    info!(
        "{method}: {} points onto {}x{} grid in {:.2?}",
        cloud.len(),
        grid.cols,
        grid.rows,
        start.elapsed()
    );
    debug!("interpolation done (pid {})", std::process::id());
    Ok(surface)
}
