pub use single_flight::FlightTable;

pub mod single_flight;
