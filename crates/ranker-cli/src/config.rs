use anyhow::{bail, Context, Result};
use factor_scoring::ScoringConfig;
use ranking_pipeline::{PipelineOptions, DEFAULT_CONCURRENCY};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Exchange suffix used with the built-in Nifty universe
pub const DEFAULT_UNIVERSE_SUFFIX: &str = ".NS";

pub const USAGE: &str = "\
Usage:
  ranker                              Rank the built-in Nifty 50 universe
  ranker --universe PATH              Rank symbols from a CSV (symbol/ticker column)
  ranker --symbols TCS INFY ...       Rank specific symbols

Options:
  --snapshot PATH    Read raw records from a JSON snapshot instead of Yahoo
  --output PATH      Export path (default: output/ranking.json)
  --concurrency N    Max parallel fetches (default: 8)
  --suffix S         Exchange suffix for provider symbols, e.g. .NS
  --top N            Rows printed to the console (default: 10)
  --config PATH      Scoring config JSON
  --help             Show this message";

#[derive(Debug, Clone, PartialEq)]
pub struct RunnerConfig {
    pub concurrency: usize,
    pub fetch_timeout_secs: u64,
    pub symbol_suffix: Option<String>,
    pub universe_csv: Option<PathBuf>,
    pub symbols: Vec<String>,
    pub snapshot: Option<PathBuf>,
    pub output_path: PathBuf,
    /// Yahoo requests per minute
    pub rate_limit: usize,
    pub scoring_config: Option<PathBuf>,
    /// Added to the bank membership list
    pub bank_symbols: Vec<String>,
    pub display_precision: Option<u32>,
    pub top_n: usize,
}

impl RunnerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let config = Self {
            concurrency: lookup("RANKER_CONCURRENCY")
                .unwrap_or_else(|| DEFAULT_CONCURRENCY.to_string())
                .trim()
                .parse()
                .context("RANKER_CONCURRENCY must be a whole number")?,
            fetch_timeout_secs: lookup("RANKER_FETCH_TIMEOUT_SECS")
                .unwrap_or_else(|| "30".to_string())
                .trim()
                .parse()
                .context("RANKER_FETCH_TIMEOUT_SECS must be a whole number")?,
            symbol_suffix: non_empty("RANKER_SYMBOL_SUFFIX"),
            universe_csv: non_empty("RANKER_UNIVERSE_CSV").map(PathBuf::from),
            symbols: Vec::new(),
            snapshot: non_empty("RANKER_SNAPSHOT").map(PathBuf::from),
            output_path: lookup("RANKER_OUTPUT_PATH")
                .unwrap_or_else(|| "output/ranking.json".to_string())
                .into(),
            rate_limit: lookup("RANKER_RATE_LIMIT")
                .unwrap_or_else(|| "60".to_string())
                .trim()
                .parse()
                .context("RANKER_RATE_LIMIT must be a whole number")?,
            scoring_config: non_empty("RANKER_SCORING_CONFIG").map(PathBuf::from),
            bank_symbols: lookup("RANKER_BANK_SYMBOLS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect(),
            display_precision: non_empty("RANKER_DISPLAY_PRECISION")
                .map(|v| v.parse::<u32>())
                .transpose()
                .context("RANKER_DISPLAY_PRECISION must be a whole number")?,
            top_n: 10,
        };

        Ok(config)
    }

    /// Apply command-line flags on top of the environment.
    pub fn apply_args(&mut self, args: &[String]) -> Result<()> {
        let value_of = |flag: &str| flag_value(args, flag);

        if let Some(path) = value_of("--universe")? {
            self.universe_csv = Some(PathBuf::from(path));
        }
        if let Some(path) = value_of("--snapshot")? {
            self.snapshot = Some(PathBuf::from(path));
        }
        if let Some(path) = value_of("--output")? {
            self.output_path = PathBuf::from(path);
        }
        if let Some(path) = value_of("--config")? {
            self.scoring_config = Some(PathBuf::from(path));
        }
        if let Some(suffix) = value_of("--suffix")? {
            self.symbol_suffix = Some(suffix.trim().to_string()).filter(|s| !s.is_empty());
        }
        if let Some(n) = value_of("--concurrency")? {
            self.concurrency = n.parse().context("--concurrency must be a whole number")?;
        }
        if let Some(n) = value_of("--top")? {
            self.top_n = n.parse().context("--top must be a whole number")?;
        }
        if let Some(idx) = args.iter().position(|a| a == "--symbols") {
            self.symbols = args[idx + 1..]
                .iter()
                .take_while(|a| !a.starts_with("--"))
                .cloned()
                .collect();
            if self.symbols.is_empty() {
                bail!("--symbols needs at least one symbol");
            }
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            bail!("concurrency must be at least 1");
        }
        if self.fetch_timeout_secs == 0 {
            bail!("fetch timeout must be at least 1 second");
        }
        if self.rate_limit == 0 {
            bail!("rate limit must be at least 1 request per minute");
        }
        Ok(())
    }

    /// True when neither a file nor explicit symbols were given.
    pub fn uses_default_universe(&self) -> bool {
        self.symbols.is_empty() && self.universe_csv.is_none()
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        let symbol_suffix = match &self.symbol_suffix {
            Some(suffix) => Some(suffix.clone()),
            None if self.uses_default_universe() && self.snapshot.is_none() => {
                Some(DEFAULT_UNIVERSE_SUFFIX.to_string())
            }
            None => None,
        };
        PipelineOptions {
            concurrency: self.concurrency,
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            symbol_suffix,
        }
    }

    /// Scoring config from file (or defaults) with env overrides applied.
    pub fn scoring_config(&self) -> Result<ScoringConfig> {
        let mut config = match &self.scoring_config {
            Some(path) => ScoringConfig::load(path)
                .with_context(|| format!("Failed to load scoring config {}", path.display()))?,
            None => ScoringConfig::default(),
        };

        for symbol in &self.bank_symbols {
            if !config.bank_rules.contains_symbol(symbol) {
                config.bank_rules.symbols.push(symbol.clone());
            }
        }
        if let Some(precision) = self.display_precision {
            config.display_precision = precision;
        }

        Ok(config)
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Result<Option<&'a String>> {
    match args.iter().position(|a| a == flag) {
        Some(i) => match args.get(i + 1).filter(|v| !v.starts_with("--")) {
            Some(v) => Ok(Some(v)),
            None => bail!("{} needs a value", flag),
        },
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<RunnerConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RunnerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.fetch_timeout_secs, 30);
        assert_eq!(config.output_path, PathBuf::from("output/ranking.json"));
        assert_eq!(config.top_n, 10);
        assert!(config.bank_symbols.is_empty());
        assert!(config.uses_default_universe());
        assert_eq!(config.pipeline_options().symbol_suffix.as_deref(), Some(".NS"));
        config.validate().unwrap();
    }

    #[test]
    fn test_env_values() {
        let config = config_from(&[
            ("RANKER_CONCURRENCY", "4"),
            ("RANKER_SYMBOL_SUFFIX", ".BO"),
            ("RANKER_BANK_SYMBOLS", "federalbnk, idfcfirstb,"),
            ("RANKER_DISPLAY_PRECISION", "1"),
        ])
        .unwrap();
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.symbol_suffix.as_deref(), Some(".BO"));
        assert_eq!(config.bank_symbols, vec!["FEDERALBNK", "IDFCFIRSTB"]);

        let scoring = config.scoring_config().unwrap();
        assert_eq!(scoring.display_precision, 1);
        assert!(scoring.bank_rules.contains_symbol("FEDERALBNK.NS"));
    }

    #[test]
    fn test_bad_number_is_an_error() {
        assert!(config_from(&[("RANKER_CONCURRENCY", "many")]).is_err());
        assert!(config_from(&[("RANKER_DISPLAY_PRECISION", "x")]).is_err());
    }

    #[test]
    fn test_args_override_env() {
        let mut config = config_from(&[("RANKER_CONCURRENCY", "4")]).unwrap();
        config
            .apply_args(&args(&[
                "ranker", "--concurrency", "2", "--symbols", "TCS", "infy", "--top", "3",
            ]))
            .unwrap();
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.symbols, vec!["TCS", "infy"]);
        assert_eq!(config.top_n, 3);
        assert!(!config.uses_default_universe());
        assert_eq!(config.pipeline_options().symbol_suffix, None);
    }

    #[test]
    fn test_blank_suffix_flag_clears_env_suffix() {
        let mut config = config_from(&[("RANKER_SYMBOL_SUFFIX", ".NS")]).unwrap();
        config.apply_args(&args(&["ranker", "--suffix", " "])).unwrap();
        assert_eq!(config.symbol_suffix, None);
    }

    #[test]
    fn test_flag_without_value_is_an_error() {
        let mut config = config_from(&[]).unwrap();
        assert!(config.apply_args(&args(&["ranker", "--output"])).is_err());
        assert!(config.apply_args(&args(&["ranker", "--symbols", "--top", "3"])).is_err());
    }

    #[test]
    fn test_zero_concurrency_fails_validation() {
        let mut config = config_from(&[]).unwrap();
        config.apply_args(&args(&["ranker", "--concurrency", "0"])).unwrap();
        assert!(config.validate().is_err());
    }
}
