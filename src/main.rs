//! Demo bootstrap for the dispatch core.
//! Registers a handful of riders and drivers, then runs two rides end to end:
//! one matched by distance and priced with surge, one carpool matched by
//! rating and priced with a flat discount.

use ride_dispatch::matching::PolicyKind;
use ride_dispatch::models::{Position, RideMode, VehicleCategory};
use ride_dispatch::{DispatchConfig, DispatchError, DispatchResult, DispatchService};

fn main() {
    // Log level can be set via RUST_LOG environment variable
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = DispatchConfig::from_env_or_default();
    log::info!("Starting dispatch demo with configuration: {:?}", config);

    if let Err(e) = run(config) {
        log::error!("Dispatch demo failed: {}", e);
        std::process::exit(1);
    }
}

fn run(config: DispatchConfig) -> DispatchResult<()> {
    let service = DispatchService::new(Some(config))?;

    service.register_rider("R1", "Alice", "111-222", Position::new(0.0, 0.0))?;
    service.register_rider("R2", "Bob", "333-444", Position::new(5.0, 5.0))?;

    service.register_driver("D1", "John", "555-666", VehicleCategory::Sedan, "DL123", Position::new(1.0, 1.0), 4.8)?;
    service.register_driver("D2", "Mike", "777-888", VehicleCategory::Suv, "DL456", Position::new(10.0, 10.0), 4.9)?;
    service.register_driver("D3", "Sarah", "999-000", VehicleCategory::Sedan, "DL789", Position::new(2.0, 2.0), 4.95)?;

    log::info!("===== Nearest driver, surge pricing =====");
    let ride_id = service.create_ride(
        "R1",
        Position::new(0.0, 0.0),
        Position::new(10.0, 10.0),
        VehicleCategory::Sedan,
        RideMode::Normal,
    )?;
    let pipeline = service.pricing_pipeline().surge(1.2)?;
    drive_to_completion(&service, &ride_id, |id| service.complete_ride(id, &pipeline))?;

    log::info!("===== Best rated driver, carpool discount =====");
    service.set_matching_policy(&PolicyKind::BestRating.to_string())?;
    let ride_id = service.create_ride(
        "R2",
        Position::new(5.0, 5.0),
        Position::new(15.0, 15.0),
        VehicleCategory::Sedan,
        RideMode::Carpool,
    )?;
    let pipeline = service.pricing_pipeline().discount(10.0)?;
    drive_to_completion(&service, &ride_id, |id| service.complete_ride(id, &pipeline))?;

    let stats = service.stats();
    match serde_json::to_string_pretty(&stats) {
        Ok(json) => log::info!("Dispatch stats:\n{}", json),
        Err(e) => log::warn!("Could not render stats: {}", e),
    }
    Ok(())
}

/// Assigns, starts and completes a ride. Running out of drivers is reported
/// and is not treated as a failure of the demo.
fn drive_to_completion<F>(service: &DispatchService, ride_id: &str, complete: F) -> DispatchResult<()>
where
    F: FnOnce(&str) -> DispatchResult<f64>,
{
    match service.assign_driver(ride_id) {
        Ok(_) => {}
        Err(DispatchError::NoDriversAvailable { reason, .. }) => {
            log::warn!("No drivers available for ride {}: {}", ride_id, reason);
            return Ok(());
        }
        Err(e) => return Err(e),
    }
    service.start_ride(ride_id)?;
    let fare = complete(ride_id)?;

    let snapshot = service.get_ride(ride_id)?;
    log::info!("Ride {} settled at {:.2} ({})", snapshot.id, fare, snapshot.status);
    Ok(())
}
