use crate::transport::ChannelRegistry;

/// **VALUE**: Verifies `add` accumulates while `replace` keeps a single entry.
///
/// **WHY THIS MATTERS**: Listeners stack (so the dispatcher must remove first), invoke
/// handlers do not. Mixing these up either double-delivers or drops handlers.
#[test]
fn given_registry_when_adding_and_replacing_then_counts_reflect_semantics() {
    // GIVEN: An empty registry
    let registry: ChannelRegistry<u32> = ChannelRegistry::new();

    // WHEN: Adding twice on one channel, replacing on another
    registry.add("a", 1);
    registry.add("a", 2);
    let first_replace = registry.replace("b", 1);
    let second_replace = registry.replace("b", 2);

    // THEN: "a" has both, "b" only the latest
    assert_eq!(registry.get("a"), vec![1, 2]);
    assert_eq!(registry.get("b"), vec![2]);
    assert!(!first_replace);
    assert!(second_replace);
    assert_eq!(registry.first("a"), Some(1));
}

/// **VALUE**: Verifies removal clears one channel only.
#[test]
fn given_registry_when_removing_channel_then_other_channels_remain() {
    let registry: ChannelRegistry<&str> = ChannelRegistry::new();
    registry.add("a", "x");
    registry.add("b", "y");

    assert_eq!(registry.remove_all("a"), 1);
    assert_eq!(registry.remove_all("a"), 0);
    assert_eq!(registry.count("a"), 0);
    assert_eq!(registry.count("b"), 1);
    assert!(registry.get("missing").is_empty());
}
