//! Filter configuration domain model.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::process::fold_name;

/// Process names selected when nothing else is configured.
pub const DEFAULT_PROCESS_NAMES: &[&str] = &["MSBuild"];

/// Optional restriction on owned TCP ports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRestriction {
    /// Whether the port filter is applied at all.
    pub enabled: bool,
    /// Allowed local ports, compared against the decimal form of each port.
    pub ports: Vec<String>,
}

impl PortRestriction {
    /// An enabled restriction over the given ports.
    pub fn allow<I, S>(ports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enabled: true,
            ports: ports.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether a process owning `owned` ports passes the restriction.
    ///
    /// A process with no observed TCP ports always passes: non-networked
    /// helpers stay killable while the restriction is on.
    pub fn admits(&self, owned: Option<&HashSet<u16>>) -> bool {
        if !self.enabled {
            return true;
        }
        match owned {
            None => true,
            Some(ports) if ports.is_empty() => true,
            Some(ports) => ports
                .iter()
                .any(|port| self.ports.iter().any(|allowed| *allowed == port.to_string())),
        }
    }
}

/// Caller-supplied selection of processes to terminate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfiguration {
    /// Executable names (case-insensitive). Empty selects nothing.
    pub names: Vec<String>,
    /// Only processes owned by the calling account.
    pub restrict_to_current_user: bool,
    /// Only strict descendants of the calling process.
    pub restrict_to_descendants: bool,
    /// Only processes owning an allowed port, or no port at all.
    pub restrict_to_ports: PortRestriction,
}

impl Default for FilterConfiguration {
    fn default() -> Self {
        Self::with_names(DEFAULT_PROCESS_NAMES.iter().copied())
    }
}

impl FilterConfiguration {
    /// A filter selecting the given names with every restriction disabled.
    pub fn with_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            restrict_to_current_user: false,
            restrict_to_descendants: false,
            restrict_to_ports: PortRestriction::default(),
        }
    }

    /// Restrict to processes owned by the calling account.
    pub fn current_user_only(mut self, enabled: bool) -> Self {
        self.restrict_to_current_user = enabled;
        self
    }

    /// Restrict to descendants of the calling process.
    pub fn descendants_only(mut self, enabled: bool) -> Self {
        self.restrict_to_descendants = enabled;
        self
    }

    /// Restrict by owned TCP ports.
    pub fn ports(mut self, restriction: PortRestriction) -> Self {
        self.restrict_to_ports = restriction;
        self
    }

    /// Lower-cased name set used for the case-insensitive join.
    ///
    /// Duplicates collapse here, so a process is selected at most once no
    /// matter how many entries it satisfies.
    pub fn name_set(&self) -> HashSet<String> {
        self.names
            .iter()
            .filter(|n| !n.is_empty())
            .map(|n| fold_name(n))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_selects_msbuild() {
        let filter = FilterConfiguration::default();
        assert_eq!(filter.names, vec!["MSBuild".to_string()]);
        assert!(!filter.restrict_to_current_user);
        assert!(!filter.restrict_to_descendants);
        assert!(!filter.restrict_to_ports.enabled);
    }

    #[test]
    fn test_name_set_collapses_case_duplicates() {
        let filter = FilterConfiguration::with_names(["MSBuild", "msbuild", "", "Node"]);
        let set = filter.name_set();
        assert_eq!(set.len(), 2);
        assert!(set.contains("msbuild"));
        assert!(set.contains("node"));
    }

    #[test]
    fn test_port_restriction_disabled_admits_everything() {
        let restriction = PortRestriction::default();
        let owned = HashSet::from([8080]);
        assert!(restriction.admits(Some(&owned)));
    }

    #[test]
    fn test_port_restriction_admits_portless_process() {
        let restriction = PortRestriction::allow(["3000"]);
        assert!(restriction.admits(None));
        assert!(restriction.admits(Some(&HashSet::new())));
    }

    #[test]
    fn test_port_restriction_matches_string_form() {
        let restriction = PortRestriction::allow(["3000", "not-a-port"]);
        assert!(restriction.admits(Some(&HashSet::from([3000, 9000]))));
        assert!(!restriction.admits(Some(&HashSet::from([8080]))));
    }

    #[test]
    fn test_port_restriction_malformed_entries_never_match() {
        let restriction = PortRestriction::allow([" 3000", "03000"]);
        assert!(!restriction.admits(Some(&HashSet::from([3000]))));
    }
}
