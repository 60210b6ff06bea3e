use wraith_shared::GhostBlock;

/// Assert that two blocks carry identical live state for every ghost
/// the host block holds: values, buffers, enable flags, matched by
/// ghost id rather than slot index. Disabled components only compare
/// the flag; their payload does not replicate.
pub fn assert_blocks_equal(host: &GhostBlock, remote: &GhostBlock) {
    let schema = host.schema();
    for entity in 0..host.len() {
        let Some(ghost) = host.ghost(entity) else {
            continue;
        };
        let Some(twin) = remote.index_of(ghost.id) else {
            panic!("ghost {} missing on the remote end", ghost.id);
        };
        for (component, descriptor) in schema.components().iter().enumerate() {
            assert_eq!(
                host.enabled(entity, component),
                remote.enabled(twin, component),
                "enable flag of component {component} of ghost {}",
                ghost.id
            );
            if !host.enabled(entity, component) {
                continue;
            }
            if descriptor.layout.buffer {
                assert_eq!(
                    host.buffer(entity, component),
                    remote.buffer(twin, component),
                    "buffer component {component} of ghost {}",
                    ghost.id
                );
            } else {
                assert_eq!(
                    host.value(entity, component),
                    remote.value(twin, component),
                    "value component {component} of ghost {}",
                    ghost.id
                );
            }
        }
    }
}

/// Assert a single component's live bytes match across the pair.
pub fn assert_component_equal(
    host: &GhostBlock,
    remote: &GhostBlock,
    entity: usize,
    component: usize,
) {
    let ghost = host.ghost(entity).expect("host slot is occupied");
    let twin = remote.index_of(ghost.id).expect("ghost exists remotely");
    assert_eq!(
        host.value(entity, component),
        remote.value(twin, component),
        "component {component} of ghost {}",
        ghost.id
    );
}
