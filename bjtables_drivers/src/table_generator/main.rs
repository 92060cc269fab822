use anyhow::Context;
use bjtables::{generate_tables, Decision, Expectation, Rule, SplitExpectation, StrategyTables};
use bjtables_drivers::{parse_config_from_file, Config};
use clap::Parser;
use serde::Serialize;
use std::fs;

const DEFAULT_CONFIG_PATH: &str = "~/.bjtables.yml";

#[derive(Debug, Parser)]
#[command(author, about, long_about = None)]
struct CommandLineArgs {
    /// The path of the config file
    #[arg(short, long, default_value_t = String::from(DEFAULT_CONFIG_PATH))]
    config: String,

    /// Overrides the number of decks from the config file
    #[arg(short, long)]
    decks: Option<u8>,

    /// The path of the generated JSON tables
    #[arg(short, long, default_value_t = String::from("tables.json"))]
    output: String,

    /// Prints best-action charts after generating
    #[arg(long)]
    print_charts: bool,
}

/// The file layout the strategy trainer consumes.
#[derive(Serialize)]
struct TableFile<'a> {
    hard_hands: &'a [[Expectation; 10]],
    soft_hands: &'a [[Expectation; 10]],
    pair_hands: &'a [[SplitExpectation; 10]],
    best_profit_per_hand: &'a [[f64; 10]],
    average_profit: f64,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = CommandLineArgs::parse();

    let config = load_config(&args)?;
    let mut config_rule = config.rule.clone();
    if let Some(decks) = args.decks {
        config_rule.number_of_decks = decks;
    }
    let rule: Rule = config_rule.try_into()?;

    let tables = generate_tables(&rule, config.table_generator.number_of_threads);

    let file = TableFile {
        hard_hands: &tables.hard_hands,
        soft_hands: &tables.soft_hands,
        pair_hands: &tables.pair_hands,
        best_profit_per_hand: &tables.best_profit_per_hand,
        average_profit: tables.average_profit,
    };
    let contents = serde_json::to_string(&file).context("cannot serialize tables")?;
    fs::write(&args.output, contents)
        .with_context(|| format!("cannot write tables to {}", args.output))?;
    log::info!("Wrote tables to {}", args.output);

    if args.print_charts {
        print_charts(&tables);
    }
    println!("Average profit: {:.5}", tables.average_profit);

    Ok(())
}

fn load_config(args: &CommandLineArgs) -> anyhow::Result<Config> {
    if args.config != DEFAULT_CONFIG_PATH {
        return parse_config_from_file(&args.config);
    }

    let home_dir = home::home_dir().context("cannot find home directory")?;
    let config_file_path = home_dir.join(".bjtables.yml");
    if !config_file_path.exists() {
        return Ok(Config::default());
    }
    let config_file_path = config_file_path
        .to_str()
        .context("config path is not valid UTF-8")?;
    parse_config_from_file(config_file_path)
}

fn print_charts(tables: &StrategyTables) {
    let header = "    A  2  3  4  5  6  7  8  9 10";

    println!("Hard totals:");
    println!("{}", header);
    for (row, cells) in tables.hard_hands.iter().enumerate() {
        print!("{:2} ", row + 4);
        for evs in cells {
            let (_, decision) = evs.get_max_expectation();
            print!(" {} ", decision_to_char(decision));
        }
        println!();
    }

    println!();
    println!("Soft totals:");
    println!("{}", header);
    for (row, cells) in tables.soft_hands.iter().enumerate() {
        print!("{:2} ", row + 12);
        for evs in cells {
            let (_, decision) = evs.get_max_expectation();
            print!(" {} ", decision_to_char(decision));
        }
        println!();
    }

    println!();
    println!("Pairs (P = split is worth more than playing the hand):");
    println!("{}", header);
    for (rank, cells) in tables.pair_hands.iter().enumerate() {
        let label = {
            if rank == 0 {
                String::from("A")
            } else {
                (rank + 1).to_string()
            }
        };
        print!("{:>2} ", label);
        for cell in cells {
            let mark = {
                if cell.split > cell.no_split {
                    'P'
                } else {
                    '.'
                }
            };
            print!(" {} ", mark);
        }
        println!();
    }
    println!();
}

fn decision_to_char(decision: Decision) -> char {
    match decision {
        Decision::Stand => 'S',
        Decision::Hit => 'H',
        Decision::Double => 'D',
    }
}
