pub mod resource_grid;

pub use resource_grid::ResourceGrid;
