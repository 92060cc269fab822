use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub rule: ConfigRule,
    pub table_generator: ConfigTableGenerator,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigRule {
    pub number_of_decks: u8,
    pub payout_blackjack: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigTableGenerator {
    /// 0 lets the generator pick the available parallelism.
    pub number_of_threads: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            rule: ConfigRule {
                number_of_decks: 1,
                payout_blackjack: 1.5,
            },
            table_generator: ConfigTableGenerator {
                number_of_threads: 0,
            },
        }
    }
}

impl TryFrom<ConfigRule> for bjtables::Rule {
    type Error = anyhow::Error;

    fn try_from(config_rule: ConfigRule) -> Result<Self, Self::Error> {
        if config_rule.number_of_decks == 0 {
            anyhow::bail!("number_of_decks must be a positive number of decks");
        }
        Ok(bjtables::Rule {
            number_of_decks: config_rule.number_of_decks,
            payout_blackjack: config_rule.payout_blackjack,
        })
    }
}

/// Reads the content of a given config file and parses it to a Config.
pub fn parse_config_from_file(filename: &str) -> anyhow::Result<Config> {
    let file_content = fs::read_to_string(filename)
        .with_context(|| format!("cannot read config file {}", filename))?;
    let config = serde_yaml::from_str(&file_content)
        .with_context(|| format!("cannot parse config file {}", filename))?;
    Ok(config)
}
