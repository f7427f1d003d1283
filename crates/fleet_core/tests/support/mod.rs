pub mod geography;
pub mod scenario;
