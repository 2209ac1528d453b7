//! Identity types for pods and containers.

use std::fmt;

/// Identifies a pod: the unit of work in the queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PodKey {
    pub namespace: String,
    pub name: String,
}

impl PodKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of one of this pod's containers.
    pub fn container(&self, container: impl Into<String>) -> ContainerKey {
        ContainerKey {
            pod: self.clone(),
            container: container.into(),
        }
    }
}

impl fmt::Display for PodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Identifies one container's restart counter stream.
///
/// Used as the map key by both the restart tracker and the mute store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerKey {
    pub pod: PodKey,
    pub container: String,
}

impl ContainerKey {
    pub fn new(
        namespace: impl Into<String>,
        pod: impl Into<String>,
        container: impl Into<String>,
    ) -> Self {
        PodKey::new(namespace, pod).container(container)
    }

    pub fn namespace(&self) -> &str {
        &self.pod.namespace
    }

    pub fn pod_name(&self) -> &str {
        &self.pod.name
    }
}

impl fmt::Display for ContainerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.pod, self.container)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let key = ContainerKey::new("kube-system", "coredns-abc", "coredns");
        assert_eq!(key.to_string(), "kube-system/coredns-abc/coredns");
        assert_eq!(key.pod.to_string(), "kube-system/coredns-abc");
    }

    #[test]
    fn test_container_keys_of_same_pod_share_pod_key() {
        let pod = PodKey::new("default", "web-0");
        let a = pod.container("app");
        let b = pod.container("sidecar");
        assert_ne!(a, b);
        assert_eq!(a.pod, b.pod);
    }
}
