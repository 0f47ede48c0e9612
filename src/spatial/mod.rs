/*!
 * Geometry input and output
 *
 * - `shp`: shapefile geometry and `.dbf` attributes
 * - `table`: feature table with filtering, simplification and GeoJSON output
 */

pub mod shp;
pub mod table;

pub use table::GeoTable;
