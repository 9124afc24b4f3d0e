use super::registry::PublicationRegistry;
use crate::config::PublicationConfig;
use crate::types::QosLevel;

#[test]
fn test_insert_and_get() {
    let mut registry = PublicationRegistry::default();
    let id = registry.insert(PublicationConfig::new("a/b", QosLevel::One));

    let config = registry.get(id).unwrap();
    assert_eq!(config.topic, "a/b");
    assert_eq!(config.qos, QosLevel::One);
    assert!(registry.get(id + 1).is_none());
}

#[test]
fn test_ids_keep_creation_order() {
    let mut registry = PublicationRegistry::default();
    let first = registry.insert(PublicationConfig::new("a", QosLevel::Zero));
    let second = registry.insert(PublicationConfig::new("b", QosLevel::Zero));
    let third = registry.insert(PublicationConfig::new("c", QosLevel::Zero));

    assert_eq!(registry.ids(), vec![first, second, third]);
    assert_eq!(registry.remove(second).unwrap().topic, "b");
    assert_eq!(registry.ids(), vec![first, third]);
}

#[test]
fn test_ids_are_not_reused() {
    let mut registry = PublicationRegistry::default();
    let first = registry.insert(PublicationConfig::new("a", QosLevel::Zero));
    registry.remove(first);
    let second = registry.insert(PublicationConfig::new("a", QosLevel::Zero));
    assert_ne!(first, second);
}

#[test]
fn test_clear() {
    let mut registry = PublicationRegistry::default();
    registry.insert(PublicationConfig::new("a", QosLevel::Zero));
    registry.insert(PublicationConfig::new("b", QosLevel::Zero));
    assert_eq!(registry.ids().len(), 2);

    registry.clear();
    assert!(registry.ids().is_empty());
    assert!(registry.remove(1).is_none());
}
