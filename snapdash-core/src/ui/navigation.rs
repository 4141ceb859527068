//! Navigation state carried in the page's query string.
//!
//! `snapshot1` and `snapshot2` together select the diff view of a pair;
//! `config` scopes it when more than one configuration exists.

use crate::snapshot::SnapperConfig;
use crate::SnapError;
use serde::{Deserialize, Serialize};

/// Configuration assumed when none is named and several exist
pub const DEFAULT_CONFIG: &str = "root";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum Location {
    Dashboard,
    Diff {
        #[serde(skip_serializing_if = "Option::is_none")]
        config: Option<String>,
        pre: u64,
        post: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Crumb {
    pub label: String,
    /// Query of the location the crumb leads back to; `None` for the
    /// current page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<LocationQuery>,
}

fn parse_number(name: &str, value: &str) -> crate::Result<u64> {
    value.trim().parse().map_err(|_| {
        SnapError::InvalidLocation(format!("{} must be a snapshot number, got {:?}", name, value))
    })
}

impl LocationQuery {
    pub fn parse(&self) -> crate::Result<Location> {
        match (&self.snapshot1, &self.snapshot2) {
            (Some(first), Some(second)) => Ok(Location::Diff {
                config: self.config.clone(),
                pre: parse_number("snapshot1", first)?,
                post: parse_number("snapshot2", second)?,
            }),
            _ => Ok(Location::Dashboard),
        }
    }
}

impl Location {
    pub fn diff(config: Option<String>, pre: u64, post: u64) -> Self {
        Location::Diff { config, pre, post }
    }

    pub fn to_query(&self) -> LocationQuery {
        match self {
            Location::Dashboard => LocationQuery::default(),
            Location::Diff { config, pre, post } => LocationQuery {
                snapshot1: Some(pre.to_string()),
                snapshot2: Some(post.to_string()),
                config: config.clone(),
            },
        }
    }

    /// Trail from the dashboard to this location
    pub fn breadcrumb(&self) -> Vec<Crumb> {
        match self {
            Location::Dashboard => vec![Crumb {
                label: "Snapshots".to_string(),
                target: None,
            }],
            Location::Diff { pre, post, .. } => vec![
                Crumb {
                    label: "Snapshots".to_string(),
                    target: Some(LocationQuery::default()),
                },
                Crumb {
                    label: format!("{} - {}", pre, post),
                    target: None,
                },
            ],
        }
    }
}

/// Pick the configuration a location refers to: the named one if it exists,
/// otherwise the only configuration, otherwise `root` when present.
pub fn resolve_config(requested: Option<&str>, configs: &[SnapperConfig]) -> crate::Result<String> {
    if let Some(name) = requested {
        return configs
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.name.clone())
            .ok_or_else(|| SnapError::InvalidLocation(format!("unknown configuration {}", name)));
    }

    if let [only] = configs {
        return Ok(only.name.clone());
    }

    configs
        .iter()
        .find(|c| c.name == DEFAULT_CONFIG)
        .map(|c| c.name.clone())
        .ok_or_else(|| {
            SnapError::InvalidLocation("several configurations exist, name one".to_string())
        })
}
