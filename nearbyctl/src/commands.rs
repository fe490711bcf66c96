//! Handlers for the location commands
use crate::{
    cli::Commands,
    output::{
        self,
        rows::{DistanceRow, GeoJsonRow, LocationRow, LocationRowFull},
    },
};
use anyhow::{Context, Result};
use libnearby::{
    Error::NotFound,
    service::{
        CreateLocation, CreateLocationGeoJson, DistanceRangeQuery, LocationQuery, NearbySearch,
        Service,
    },
    store::LocationStore,
};

fn report_created(id: i64, created: bool) {
    match created {
        true => println!("Added location {id}"),
        false => println!("A location already exists within the duplicate tolerance: {id}"),
    }
}

/// Handle every command that operates on the location store
pub(crate) async fn handle_command<S: LocationStore>(
    command: Commands,
    service: &Service<S>,
) -> Result<()> {
    match command {
        Commands::Add {
            name,
            description,
            latitude,
            longitude,
            output,
        } => {
            let (location, created) = service
                .create(CreateLocation {
                    name,
                    description,
                    latitude,
                    longitude,
                })
                .await?;
            report_created(location.id, created);
            println!(
                "{}",
                output::format_one(LocationRowFull::new(&location), output.format)?
            );
            Ok(())
        }
        Commands::AddGeojson {
            name,
            description,
            geometry,
            output,
        } => {
            let point = serde_json::from_str(&geometry).with_context(|| "Geometry is not JSON")?;
            let (location, created) = service
                .create_geojson(CreateLocationGeoJson {
                    name,
                    description,
                    point,
                })
                .await?;
            report_created(location.id, created);
            println!(
                "{}",
                output::format_one(GeoJsonRow::new(&location), output.format)?
            );
            Ok(())
        }
        Commands::Show {
            id,
            geojson,
            output,
        } => {
            let res = match geojson {
                true => service
                    .get_geojson(id)
                    .await
                    .map(|l| output::format_one(GeoJsonRow::new(&l), output.format)),
                false => service
                    .get(id)
                    .await
                    .map(|l| output::format_one(LocationRowFull::new(&l), output.format)),
            };
            match res {
                Ok(str) => {
                    println!("{}", str?);
                    Ok(())
                }
                Err(NotFound(id)) => {
                    println!("Location {id} not found");
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        }
        Commands::Remove { id } => match service.delete(id).await {
            Ok(()) => {
                println!("Removed location {id}");
                Ok(())
            }
            Err(NotFound(id)) => {
                println!("Location {id} not found");
                Ok(())
            }
            Err(e) => Err(e.into()),
        },
        Commands::List {
            search,
            sort,
            order,
            page,
            output,
        } => {
            let list = service
                .list(&LocationQuery {
                    page: page.page,
                    per_page: page.per_page,
                    search,
                    sort_by: sort,
                    sort_order: order,
                })
                .await?;
            let rows = list.map(|l| LocationRow::new(&l));
            println!("{}", output::format_page(rows, output.format)?);
            Ok(())
        }
        Commands::Nearby {
            center,
            radius,
            page,
            output,
        } => {
            let list = service
                .nearby(&NearbySearch {
                    latitude: center.latitude,
                    longitude: center.longitude,
                    radius_meters: radius,
                    page: page.page,
                    per_page: page.per_page,
                })
                .await?;
            let rows = list.map(|l| DistanceRow::new(&l));
            println!("{}", output::format_page(rows, output.format)?);
            Ok(())
        }
        Commands::Range {
            center,
            min,
            max,
            search,
            sort,
            order,
            page,
            output,
        } => {
            let list = service
                .range(&DistanceRangeQuery {
                    latitude: center.latitude,
                    longitude: center.longitude,
                    min_distance_meters: min,
                    max_distance_meters: max,
                    search,
                    sort_by: sort,
                    sort_order: order,
                    page: page.page,
                    per_page: page.per_page,
                })
                .await?;
            let rows = list.map(|l| DistanceRow::new(&l));
            println!("{}", output::format_page(rows, output.format)?);
            Ok(())
        }
        Commands::Count => {
            println!("{} locations", service.count().await?);
            Ok(())
        }
        // handled before the database is opened
        Commands::Config { .. } | Commands::Status => Ok(()),
    }
}
