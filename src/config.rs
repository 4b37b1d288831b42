//! TOML configuration shared by the `mailer` and `serve` binaries.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::projection::Crs;
use crate::proximity::{ProximityFilter, DEFAULT_SEGMENTS};
use crate::service::RadiusPolicy;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub datasets: DatasetConfig,
    pub query: QueryConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatasetConfig {
    /// Schools file (`label` + position columns), `.csv` or `.csv.gz`
    pub schools: PathBuf,
    /// Addresses file (`address` + position columns)
    pub addresses: PathBuf,
    pub schools_crs: Crs,
    pub addresses_crs: Crs,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            schools: PathBuf::from("schools.csv"),
            addresses: PathBuf::from("addresses.csv"),
            schools_crs: Crs::Wgs84,
            addresses_crs: Crs::Wgs84,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Haversine distance threshold on lon/lat
    #[default]
    GreatCircle,
    /// Disk buffer containment in a projected system
    Buffer,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct QueryConfig {
    pub strategy: Strategy,
    /// Projected system for the buffer strategy; defaults to the UTM zone of the schools
    pub projected_crs: Option<Crs>,
    pub buffer_segments: usize,
    pub min_radius: f64,
    pub max_radius: f64,
    pub radius_step: f64,
    pub default_radius: f64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        let policy = RadiusPolicy::default();
        Self {
            strategy: Strategy::GreatCircle,
            projected_crs: None,
            buffer_segments: DEFAULT_SEGMENTS,
            min_radius: policy.min,
            max_radius: policy.max,
            radius_step: policy.step,
            default_radius: policy.default,
        }
    }
}

impl QueryConfig {
    pub fn proximity_filter(&self) -> Result<ProximityFilter> {
        let filter = match self.strategy {
            Strategy::GreatCircle => ProximityFilter::great_circle(),
            Strategy::Buffer => ProximityFilter::buffer(self.buffer_segments)?,
        };
        Ok(filter)
    }

    pub fn radius_policy(&self) -> Result<RadiusPolicy> {
        RadiusPolicy::new(
            self.min_radius,
            self.max_radius,
            self.radius_step,
            self.default_radius,
        )
        .context("Invalid radius settings in [query]")
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Command-line values that take precedence over the config file
#[derive(Debug, Clone, Default, clap::Args)]
pub struct Overrides {
    /// Schools CSV (overrides config)
    #[arg(long)]
    pub schools: Option<PathBuf>,

    /// Addresses CSV (overrides config)
    #[arg(long)]
    pub addresses: Option<PathBuf>,

    /// Proximity strategy (overrides config)
    #[arg(long, value_enum)]
    pub strategy: Option<Strategy>,

    /// Projected system for the buffer strategy, e.g. EPSG:32611
    #[arg(long)]
    pub projected_crs: Option<Crs>,
}

impl Config {
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(path) = overrides.schools {
            self.datasets.schools = path;
        }
        if let Some(path) = overrides.addresses {
            self.datasets.addresses = path;
        }
        if let Some(strategy) = overrides.strategy {
            self.query.strategy = strategy;
        }
        if let Some(crs) = overrides.projected_crs {
            self.query.projected_crs = Some(crs);
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Load `path` if given, otherwise defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_file(p),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::Hemisphere;

    #[test]
    fn test_defaults_match_slider() {
        let config = Config::default();
        assert_eq!(config.query.strategy, Strategy::GreatCircle);
        assert_eq!(config.query.min_radius, 0.25);
        assert_eq!(config.query.max_radius, 2.0);
        assert_eq!(config.query.radius_step, 0.25);
        assert_eq!(config.query.default_radius, 0.5);
        assert_eq!(config.server.listen, "0.0.0.0:3000");
    }

    #[test]
    fn test_parse_full_file() {
        let config: Config = toml::from_str(
            r#"
            [datasets]
            schools = "data/schools.csv.gz"
            addresses = "data/addresses.csv"
            addresses_crs = "EPSG:32611"

            [query]
            strategy = "buffer"
            projected_crs = "EPSG:32611"
            buffer_segments = 32

            [server]
            listen = "127.0.0.1:8080"
            "#,
        )
        .unwrap();

        let utm11 = Crs::utm(11, Hemisphere::North).unwrap();
        assert_eq!(config.datasets.schools_crs, Crs::Wgs84);
        assert_eq!(config.datasets.addresses_crs, utm11);
        assert_eq!(config.query.strategy, Strategy::Buffer);
        assert_eq!(config.query.projected_crs, Some(utm11));
        assert_eq!(config.query.max_radius, 2.0);

        let filter = config.query.proximity_filter().unwrap();
        assert_eq!(filter.name(), "buffer");
    }

    #[test]
    fn test_rejects_unknown_crs() {
        let result: std::result::Result<Config, _> = toml::from_str(
            r#"
            [datasets]
            schools_crs = "EPSG:2229"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_overrides_replace_only_given_values() {
        let mut config: Config = toml::from_str(
            r#"
            [datasets]
            schools = "data/schools.csv"

            [query]
            projected_crs = "EPSG:32610"
            "#,
        )
        .unwrap();

        let utm11 = Crs::utm(11, Hemisphere::North).unwrap();
        config.apply(Overrides {
            addresses: Some(PathBuf::from("other/addresses.csv.gz")),
            strategy: Some(Strategy::Buffer),
            projected_crs: Some(utm11),
            ..Overrides::default()
        });

        assert_eq!(config.datasets.schools, PathBuf::from("data/schools.csv"));
        assert_eq!(
            config.datasets.addresses,
            PathBuf::from("other/addresses.csv.gz")
        );
        assert_eq!(config.query.strategy, Strategy::Buffer);
        assert_eq!(config.query.projected_crs, Some(utm11));

        config.apply(Overrides::default());
        assert_eq!(config.query.projected_crs, Some(utm11));
    }

    #[test]
    fn test_overrides_parse_from_command_line() {
        use clap::Parser;

        #[derive(Parser)]
        struct Cli {
            #[command(flatten)]
            overrides: Overrides,
        }

        let cli = Cli::try_parse_from([
            "serve",
            "--strategy",
            "buffer",
            "--projected-crs",
            "EPSG:32611",
        ])
        .unwrap();
        assert_eq!(cli.overrides.strategy, Some(Strategy::Buffer));
        assert_eq!(
            cli.overrides.projected_crs,
            Some(Crs::utm(11, Hemisphere::North).unwrap())
        );
        assert!(cli.overrides.schools.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mailer.toml");
        fs::write(&path, "[query]\ndefault_radius = 1.0\n").unwrap();
        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.query.default_radius, 1.0);
        assert!(Config::load_from_file(dir.path().join("missing.toml")).is_err());
    }
}
