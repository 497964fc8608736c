//! CLI command implementations.

pub mod clean;
pub mod config;
pub mod kill;
pub mod list;

use anyhow::Result;
use clap::Args;
use reallystop_core::{ConfigStore, FilterConfiguration, PortRestriction};
use tracing::warn;

/// Selection flags shared by `kill` and `list`.
///
/// Anything given here overrides the persisted settings. The persisted
/// children restriction belongs to IDE hosts and is ignored here: this
/// command has no children worth killing.
#[derive(Args, Debug, Default, Clone)]
pub struct FilterArgs {
    /// Process name to match, repeatable (replaces the configured list)
    #[arg(short = 'n', long = "name", value_name = "NAME")]
    pub names: Vec<String>,

    /// Only processes owned by the current user
    #[arg(short, long, conflicts_with = "all_users")]
    pub user: bool,

    /// Processes of every user, even if the settings restrict to the current one
    #[arg(long)]
    pub all_users: bool,

    /// Allowed TCP port, repeatable (enables the port restriction)
    #[arg(short, long = "port", value_name = "PORT", conflicts_with = "any_port")]
    pub ports: Vec<String>,

    /// Ignore the configured port restriction
    #[arg(long)]
    pub any_port: bool,
}

impl FilterArgs {
    /// Layer the command-line flags over a base filter.
    pub fn apply(&self, mut filter: FilterConfiguration) -> FilterConfiguration {
        if !self.names.is_empty() {
            filter.names = self.names.clone();
        }
        if self.user {
            filter.restrict_to_current_user = true;
        }
        if self.all_users {
            filter.restrict_to_current_user = false;
        }
        if !self.ports.is_empty() {
            filter.restrict_to_ports = PortRestriction::allow(self.ports.iter().cloned());
        }
        if self.any_port {
            filter.restrict_to_ports.enabled = false;
        }
        if filter.restrict_to_descendants {
            warn!("Ignoring childProcessMatch: it only applies to IDE hosts");
            filter.restrict_to_descendants = false;
        }
        filter
    }
}

/// Filter from the persisted settings with command-line overrides.
pub async fn resolve_filter(store: &ConfigStore, args: &FilterArgs) -> Result<FilterConfiguration> {
    let base = store.load_filter().await?;
    Ok(args.apply(base))
}

/// Shorten `s` to at most `max` characters.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_args_keep_base_filter() {
        let base = FilterConfiguration::with_names(["node"]).current_user_only(true);
        assert_eq!(FilterArgs::default().apply(base.clone()), base);
    }

    #[test]
    fn test_args_override_names_and_enable_ports() {
        let args = FilterArgs {
            names: vec!["VBCSCompiler".into()],
            ports: vec!["5000".into()],
            ..FilterArgs::default()
        };
        let filter = args.apply(FilterConfiguration::default());

        assert_eq!(filter.names, vec!["VBCSCompiler".to_string()]);
        assert!(!filter.restrict_to_descendants);
        assert!(!filter.restrict_to_current_user);
        assert!(filter.restrict_to_ports.enabled);
        assert_eq!(filter.restrict_to_ports.ports, vec!["5000".to_string()]);
    }

    #[test]
    fn test_args_turn_persisted_restrictions_off() {
        let base = FilterConfiguration::with_names(["MSBuild"])
            .current_user_only(true)
            .ports(PortRestriction::allow(["3000"]));
        let args = FilterArgs {
            all_users: true,
            any_port: true,
            ..FilterArgs::default()
        };
        let filter = args.apply(base);

        assert!(!filter.restrict_to_current_user);
        assert!(!filter.restrict_to_ports.enabled);
        assert_eq!(filter.names, vec!["MSBuild".to_string()]);
    }

    #[test]
    fn test_persisted_children_restriction_is_dropped() {
        let base = FilterConfiguration::with_names(["MSBuild"]).descendants_only(true);
        let filter = FilterArgs::default().apply(base);
        assert!(!filter.restrict_to_descendants);
    }

    #[tokio::test]
    async fn test_resolve_filter_reads_given_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::with_path(dir.path().join("config.json"));
        store.set_process_names(&["node".to_string()]).await.unwrap();

        let filter = resolve_filter(&store, &FilterArgs::default()).await.unwrap();
        assert_eq!(filter.names, vec!["node".to_string()]);

        std::fs::write(store.path(), "{bad").unwrap();
        assert!(resolve_filter(&store, &FilterArgs::default()).await.is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("MSBuild", 10), "MSBuild");
        assert_eq!(truncate("VBCSCompiler", 6), "VBCSC…");
        assert_eq!(truncate("ééééé", 3), "éé…");
    }
}
