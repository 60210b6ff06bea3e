use std::sync::Arc;

use wraith_shared::{
    BufferCodec, ComponentDef, GhostTypeId, IntCodec, QuantizedFloatCodec, QuantizedVec3Codec,
    SchemaDescriptor, SchemaRegistry,
};

/// Position plus heading: every field blends, nothing is optional.
pub fn movement_schema(size_prefixed: bool) -> Arc<SchemaDescriptor> {
    Arc::new(SchemaDescriptor::build(
        GhostTypeId(1),
        size_prefixed,
        vec![
            ComponentDef::new("position", Arc::new(QuantizedVec3Codec::new(100.0))),
            ComponentDef::new("heading", Arc::new(QuantizedFloatCodec::new(1000.0))),
        ],
    ))
}

/// Counters plus a toggleable shield, for enable-bit coverage.
pub fn vitals_schema(size_prefixed: bool) -> Arc<SchemaDescriptor> {
    Arc::new(SchemaDescriptor::build(
        GhostTypeId(2),
        size_prefixed,
        vec![
            ComponentDef::new("health", Arc::new(IntCodec)),
            ComponentDef::optional("shield", Arc::new(IntCodec)),
        ],
    ))
}

/// A dynamic payload column next to a plain counter.
pub fn cargo_schema(size_prefixed: bool) -> Arc<SchemaDescriptor> {
    Arc::new(SchemaDescriptor::build(
        GhostTypeId(3),
        size_prefixed,
        vec![
            ComponentDef::new("weight", Arc::new(IntCodec)),
            ComponentDef::new("manifest", Arc::new(BufferCodec)),
        ],
    ))
}

pub fn registry_of(schemas: &[&Arc<SchemaDescriptor>]) -> SchemaRegistry {
    let size_prefixed = schemas
        .first()
        .map_or(true, |schema| schema.size_prefixed());
    let mut registry = SchemaRegistry::new(size_prefixed);
    for schema in schemas {
        registry.add((*schema).clone());
    }
    registry
}
