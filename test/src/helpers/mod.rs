pub mod assertions;
pub mod entity_builder;
pub mod packet_exchange;
pub mod test_schema;

pub use assertions::{assert_blocks_equal, assert_component_equal};
pub use entity_builder::{mirror, mirror_reversed, mirror_spawned, BlockBuilder};
pub use packet_exchange::{Exchange, TickReport};
pub use test_schema::{cargo_schema, movement_schema, registry_of, vitals_schema};
