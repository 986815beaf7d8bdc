use crate::dataset::DatasetSource;
use crate::grid::GridIndex;
use crate::input::JobConfig;
use log::{debug, info};

pub fn show_job_summary(config: &JobConfig) {
    info!("Dataset: {}", config.dataset.path);
    if let Some(bounds) = &config.dataset.bounds {
        info!(
            "  Bounds: lon {}..{}, lat {}..{}",
            bounds.lon_min, bounds.lon_max, bounds.lat_min, bounds.lat_max
        );
    }
    info!("  Variables: {}", config.variables.len());
    for (i, variable) in config.variables.iter().enumerate() {
        match &variable.transform {
            Some(transform) => info!(
                "    Variable {}: {} as '{}' ({:?})",
                i + 1,
                variable.name,
                variable.stored_name(),
                transform
            ),
            None => info!(
                "    Variable {}: {} as '{}'",
                i + 1,
                variable.name,
                variable.stored_name()
            ),
        }
    }
    info!(
        "  Points: {} ({} interpolation)",
        config.points.len(),
        config.interpolation
    );
    if let Some(context) = &config.context {
        info!(
            "  Context raster: {} [{}], fill_missing={}",
            context.raster.path, context.raster.variable, context.fill_missing
        );
    }
}

pub fn show_dataset_info(dataset: &dyn DatasetSource, grid: &GridIndex) {
    let (n_lats, n_lons) = grid.shape();
    info!("Grid window: {} lats x {} lons", n_lats, n_lons);
    if let (Some(first), Some(last)) = (grid.lats().first(), grid.lats().last()) {
        debug!("  lat {} .. {}", first, last);
    }
    if let (Some(first), Some(last)) = (grid.lons().first(), grid.lons().last()) {
        debug!("  lon {} .. {}", first, last);
    }
    debug!("Variables:");
    for name in dataset.variable_names() {
        match dataset.attribute(&name, "units") {
            Ok(Some(units)) => debug!("  {} [{}]", name, units),
            _ => debug!("  {}", name),
        }
    }
}
