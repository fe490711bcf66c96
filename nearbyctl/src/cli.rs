use crate::output::OutputFormat;
use clap::{Args, Parser, Subcommand};
use libnearby::{core::query::SortOrder, location::SortField, plan::DEFAULT_PER_PAGE};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[arg(
        short,
        long,
        global = true,
        help = "Location database to use instead of the configured one"
    )]
    pub database: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct OutputOptions {
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Args, Debug, Clone)]
pub struct PageOptions {
    #[arg(long, default_value_t = 1, help = "Page of results to show, starting at 1")]
    pub page: u32,
    #[arg(long, default_value_t = DEFAULT_PER_PAGE, help = "Number of results per page (at most 100)")]
    pub per_page: u32,
}

#[derive(Args, Debug, Clone)]
pub struct CenterOptions {
    #[arg(long = "lat", allow_negative_numbers = true, help = "Latitude of the center point")]
    pub latitude: f64,
    #[arg(long = "lng", allow_negative_numbers = true, help = "Longitude of the center point")]
    pub longitude: f64,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Save default settings to the configuration file",
        group(
            clap::ArgGroup::new("settings")
                .required(true)
                .multiple(true)
                .args(&["path", "tolerance"]),
        ))]
    Config {
        #[arg(long = "set-database", help = "Default location database")]
        path: Option<PathBuf>,
        #[arg(long, help = "Distance in meters below which two locations are duplicates")]
        tolerance: Option<f64>,
    },
    #[command(about = "Show the current settings and database status")]
    Status,
    #[command(about = "Add a new location unless one already exists at that position")]
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long = "lat", allow_negative_numbers = true)]
        latitude: f64,
        #[arg(long = "lng", allow_negative_numbers = true)]
        longitude: f64,
        #[command(flatten)]
        output: OutputOptions,
    },
    #[command(about = "Add a new location from a GeoJSON point geometry")]
    AddGeojson {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(help = r#"A point such as '{"type": "Point", "coordinates": [-74.006, 40.7128]}'"#)]
        geometry: String,
        #[command(flatten)]
        output: OutputOptions,
    },
    #[command(about = "Show a single location")]
    Show {
        id: i64,
        #[arg(long, help = "Show the position as a GeoJSON geometry")]
        geojson: bool,
        #[command(flatten)]
        output: OutputOptions,
    },
    #[command(about = "Remove a location from the database")]
    Remove { id: i64 },
    #[command(about = "List locations, optionally filtered by name or description")]
    List {
        #[arg(short, long, help = "Only show locations whose name or description contains this text")]
        search: Option<String>,
        #[arg(long, default_value_t = SortField::CreatedAt)]
        sort: SortField,
        #[arg(long, default_value = "desc")]
        order: SortOrder,
        #[command(flatten)]
        page: PageOptions,
        #[command(flatten)]
        output: OutputOptions,
    },
    #[command(about = "Find locations within a radius of a point, nearest first")]
    Nearby {
        #[command(flatten)]
        center: CenterOptions,
        #[arg(long, help = "Search radius in meters (at most 50000)")]
        radius: f64,
        #[command(flatten)]
        page: PageOptions,
        #[command(flatten)]
        output: OutputOptions,
    },
    #[command(about = "Find locations whose distance from a point lies within a range")]
    Range {
        #[command(flatten)]
        center: CenterOptions,
        #[arg(long, default_value_t = 0.0, help = "Minimum distance in meters")]
        min: f64,
        #[arg(long, help = "Maximum distance in meters (at most 50000)")]
        max: f64,
        #[arg(short, long)]
        search: Option<String>,
        #[arg(long, default_value_t = SortField::Distance)]
        sort: SortField,
        #[arg(long, default_value = "asc")]
        order: SortOrder,
        #[command(flatten)]
        page: PageOptions,
        #[command(flatten)]
        output: OutputOptions,
    },
    #[command(about = "Show the number of stored locations")]
    Count,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_negative_coordinates() {
        let cli = Cli::try_parse_from([
            "nearbyctl", "nearby", "--lat", "-33.8688", "--lng", "-151.2093", "--radius", "500",
        ])
        .unwrap();
        match cli.command {
            Commands::Nearby { center, radius, page, .. } => {
                assert_eq!(center.latitude, -33.8688);
                assert_eq!(center.longitude, -151.2093);
                assert_eq!(radius, 500.0);
                assert_eq!(page.page, 1);
                assert_eq!(page.per_page, 10);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parse_list_sort() {
        let cli = Cli::try_parse_from(["nearbyctl", "list", "--sort", "name", "--order", "asc"])
            .unwrap();
        match cli.command {
            Commands::List { sort, order, .. } => {
                assert_eq!(sort, SortField::Name);
                assert_eq!(order, SortOrder::Ascending);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(Cli::try_parse_from(["nearbyctl", "list", "--sort", "rating"]).is_err());
        assert!(Cli::try_parse_from(["nearbyctl", "config"]).is_err());
    }
}
