//! Heat vocabulary: resource types, property names and placeholder markers.

/// Placeholder for the availability zone inside a `str_replace`.
pub const AZ_MARKER: &str = "$AZ";

/// Placeholder for the host assignment inside a `str_replace`.
pub const HOST_ASSIGNMENT_MARKER: &str = "$VALET_HOST_ASSIGNMENT";

/// Value produced for an unresolved availability zone.
pub const UNRESOLVED_AZ: &str = "None";

pub const PROPERTIES: &str = "properties";
pub const RESOURCES: &str = "resources";
pub const TYPE: &str = "type";

pub const NETWORKS: &str = "networks";
pub const COUNT: &str = "count";
pub const RESOURCE_DEF: &str = "resource_def";
pub const AVAILABILITY_ZONE: &str = "availability_zone";
pub const SCHEDULER_HINTS: &str = "scheduler_hints";
pub const METADATA: &str = "metadata";
pub const VALET_GROUPS: &str = "valet_groups";

/// Properties kept on each replica emitted by a group expansion.
pub const REPLICA_PROPERTIES: [&str; 6] = [
    "name",
    "flavor",
    "image",
    "metadata",
    "availability_zone",
    "scheduler_hints",
];

/// Suffix marking a `type` as a reference to a nested template file.
pub const NESTED_TEMPLATE_SUFFIX: &str = ".yaml";

/// Resource types the engine interprets; everything else is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Server,
    ServerGroup,
    ResourceGroup,
}

impl ResourceKind {
    pub fn from_type(kind: &str) -> Option<Self> {
        match kind {
            "OS::Nova::Server" => Some(Self::Server),
            "OS::Nova::ServerGroup" => Some(Self::ServerGroup),
            "OS::Heat::ResourceGroup" => Some(Self::ResourceGroup),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Server => "OS::Nova::Server",
            Self::ServerGroup => "OS::Nova::ServerGroup",
            Self::ResourceGroup => "OS::Heat::ResourceGroup",
        }
    }

    /// Kinds that may expand a `resource_def` into replicas.
    pub fn is_group(&self) -> bool {
        matches!(self, Self::ServerGroup | Self::ResourceGroup)
    }
}

/// Whether a `type` names a nested template file rather than a Heat type.
pub fn is_nested_template(kind: &str) -> bool {
    kind.ends_with(NESTED_TEMPLATE_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpreted_kinds() {
        assert_eq!(
            ResourceKind::from_type("OS::Nova::Server"),
            Some(ResourceKind::Server)
        );
        assert!(ResourceKind::from_type("OS::Neutron::Port").is_none());
        assert!(ResourceKind::ResourceGroup.is_group());
        assert!(!ResourceKind::Server.is_group());
    }

    #[test]
    fn nested_template_suffix() {
        assert!(is_nested_template("nested.yaml"));
        assert!(!is_nested_template("OS::Nova::Server"));
    }
}
