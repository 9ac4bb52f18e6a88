mod error;
mod input;
mod logging;
mod settings;

use clap::Parser;
use error::{CliError, Result};
use polygon_qtnodes_lib::{AddressSink, Coverage, Grid, WriteSink};
use settings::Settings;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

fn main() -> Result<()> {
    #[allow(clippy::let_unit_value)]
    let _guard = logging::setup_logging();

    let settings = Settings::parse();
    run(&settings).inspect_err(|e| tracing::error!("{e}"))
}

fn run(settings: &Settings) -> Result<()> {
    #[cfg(feature = "profiling")]
    profiling::scope!("polygon_qtnodes::run");

    let text = read_to_string(&settings.input)?;
    let mut sink = WriteSink::new(open_output(settings.output.as_deref())?);

    if settings.to_mercator {
        let paths = input::parse_paths(&text);
        let nodes = Coverage::mercator_nodes_from_flat(&paths[..])?;
        tracing::info!(flat = paths.len(), mercator = nodes.len(), "converted flat paths");
        write_all(&mut sink, &nodes)?;
    } else {
        let polygons = input::parse_geojson(&text)?;
        tracing::info!(
            polygons = polygons.len(),
            input = %settings.input.display(),
            "loaded polygons"
        );

        let config = settings.config();
        config.validate()?;

        let mut coverage = Coverage::new(config);
        coverage.add_polygons(polygons);

        match settings.west_origin {
            Some(west_origin) => {
                let mut grid = Grid::new(west_origin, -90.0);
                grid.add_polygons(coverage.polygons())?;
                grid.calculate_quadtree_nodes(
                    coverage.config().max_level,
                    coverage.config().projection.is_mercator(),
                    &mut sink,
                )?;
            }
            None if settings.parallel => {
                let nodes = coverage.quadtree_nodes_parallel()?;
                write_all(&mut sink, &nodes)?;
            }
            None => coverage.write_quadtree_nodes(&mut sink)?,
        }
    }

    sink.flush()?;
    tracing::info!(addresses = sink.lines(), "done");
    Ok(())
}

fn read_to_string(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn open_output(path: Option<&Path>) -> Result<BufWriter<Box<dyn Write>>> {
    let writer: Box<dyn Write> = match path {
        Some(path) => Box::new(File::create(path).map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        })?),
        None => Box::new(std::io::stdout().lock()),
    };
    Ok(BufWriter::new(writer))
}

fn write_all(sink: &mut dyn AddressSink, nodes: &[String]) -> Result<()> {
    for node in nodes {
        sink.write_line(node)?;
    }
    Ok(())
}
