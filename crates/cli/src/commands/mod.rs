pub mod advisor;
pub mod costs;
pub mod recommendations;
pub mod resources;
