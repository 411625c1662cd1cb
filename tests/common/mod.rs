#![allow(dead_code)]

use std::sync::{Arc, Once};

use ride_dispatch::acceptance::{AcceptanceOracle, ScriptedAcceptance};
use ride_dispatch::directory::Directory;
use ride_dispatch::models::{Position, RideMode, VehicleCategory};
use ride_dispatch::{DispatchConfig, DispatchService};

static INIT: Once = Once::new();

/// Initialise logging once per test binary
pub fn init() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// Service with default config and the given acceptance oracle
pub fn service_with_oracle(oracle: Arc<dyn AcceptanceOracle>) -> DispatchService {
    init();
    DispatchService::with_components(DispatchConfig::default(), Arc::new(Directory::new()), oracle)
        .expect("default config is valid")
}

/// Service where every proposed driver accepts
pub fn accepting_service() -> DispatchService {
    service_with_oracle(Arc::new(ScriptedAcceptance::always(true)))
}

/// Registers the reference fleet: riders R1/R2, sedans D1/D3 and SUV D2
pub fn seed_fleet(service: &DispatchService) {
    service
        .register_rider("R1", "Alice", "111-222", Position::new(0.0, 0.0))
        .unwrap();
    service
        .register_rider("R2", "Bob", "333-444", Position::new(5.0, 5.0))
        .unwrap();
    service
        .register_driver("D1", "John", "555-666", VehicleCategory::Sedan, "DL123", Position::new(1.0, 1.0), 4.8)
        .unwrap();
    service
        .register_driver("D2", "Mike", "777-888", VehicleCategory::Suv, "DL456", Position::new(10.0, 10.0), 4.9)
        .unwrap();
    service
        .register_driver("D3", "Sarah", "999-000", VehicleCategory::Sedan, "DL789", Position::new(2.0, 2.0), 4.95)
        .unwrap();
}

/// Books a NORMAL sedan ride from (0,0) to (10,10) for R1
pub fn book_sedan(service: &DispatchService) -> String {
    service
        .create_ride(
            "R1",
            Position::new(0.0, 0.0),
            Position::new(10.0, 10.0),
            VehicleCategory::Sedan,
            RideMode::Normal,
        )
        .unwrap()
}

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-2
}
