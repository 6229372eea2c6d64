use crate::models::ResourceIdentity;
use std::collections::HashMap;

/// Label naming the alert's namespace
pub const NAMESPACE_LABEL: &str = "namespace";

/// Kinds looked up in alert labels, highest priority first.
///
/// Each kind is matched by its lower-cased name as a label key.
pub const TARGET_KINDS: [&str; 8] = [
    "Pod",
    "Deployment",
    "StatefulSet",
    "DaemonSet",
    "Job",
    "CronJob",
    "PersistentVolumeClaim",
    "PersistentVolume",
];

/// Work out which cluster object an alert is about.
///
/// Alerts without a `namespace` label are not about any object. Alerts
/// naming a namespace but none of [`TARGET_KINDS`] are about the namespace
/// itself.
pub fn resolve(labels: &HashMap<String, String>) -> Option<ResourceIdentity> {
    let namespace = labels.get(NAMESPACE_LABEL)?;

    TARGET_KINDS
        .iter()
        .find_map(|kind| {
            labels
                .get(&kind.to_lowercase())
                .map(|name| ResourceIdentity::new(namespace.as_str(), *kind, name.as_str()))
        })
        .or_else(|| Some(ResourceIdentity::namespace(namespace.as_str())))
}
