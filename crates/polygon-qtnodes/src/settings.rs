use clap::Parser;
use polygon_qtnodes_lib::{Config, Projection};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Polygon QT Nodes - List the quadtree nodes covering the polygons of a GeoJSON file
pub struct Settings {
    /// GeoJSON file with the polygons (with --to-mercator: flat paths, one per line)
    #[clap(value_name = "FILE")]
    pub input: PathBuf,

    /// Deepest quadtree level of the emitted nodes (1-24)
    #[clap(short, long, default_value = "18")]
    pub max_level: u32,

    /// Use Web Mercator rows instead of flat (plate carrée) rows
    #[clap(long, default_value = "false")]
    pub mercator: bool,

    /// Write addresses to this file instead of stdout
    #[clap(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Force the grid's west origin (e.g. -180 or 0) instead of picking the most compact one
    #[clap(long, allow_hyphen_values = true)]
    pub west_origin: Option<f64>,

    /// Convert the flat paths read from the input file into Mercator paths
    #[clap(long, default_value = "false")]
    pub to_mercator: bool,

    /// Compute polygons in parallel (same output, held in memory until done)
    #[clap(long, default_value = "false")]
    pub parallel: bool,
}

impl Settings {
    /// Library configuration matching these settings
    pub fn config(&self) -> Config {
        Config {
            max_level: self.max_level,
            projection: if self.mercator {
                Projection::Mercator
            } else {
                Projection::Flat
            },
        }
    }
}
