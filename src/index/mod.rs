pub mod posting;
pub mod inverted;
pub mod numeric;
pub mod facet;
pub mod document;
pub mod segment;
pub mod table_index;
