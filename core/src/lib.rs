pub mod geometry;
pub mod kernel;
pub mod panel;
pub mod topo;
pub mod units;

pub fn version() -> &'static str {
    "0.1.0"
}
