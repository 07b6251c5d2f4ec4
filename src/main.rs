use clap::{arg, crate_version, value_parser, ArgMatches, Command};
use regex::Regex;
use std::fmt::Display;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;

use fhq_treap::{
    DuplicatePolicy, OrderedSet, Persist, Sequence, TreapBuilder, TreapError, VersionId,
    Versioned,
};

// An optional `@<version>` pin, a verb, then integer arguments
const GRAMMAR: &str = r"^(?:@v?(\d+)\s+)?([a-z]+)((?:\s+-?\d+)*)$";

const NOT_FOUND: &str = "not found";

#[derive(Debug, Error)]
enum ScriptError {
    #[error("cannot read script: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Grammar(#[from] regex::Error),
    #[error("invalid configuration: {0}")]
    Config(#[from] TreapError),
}

// A problem with a single script line; the rest of the script still runs
#[derive(Debug, Error)]
enum Fault {
    #[error("cannot parse {0:?}")]
    Syntax(String),
    #[error("unknown command {0:?}")]
    Unknown(String),
    #[error("{verb} takes {expected} arguments, got {got}")]
    Arity {
        verb: String,
        expected: usize,
        got: usize,
    },
    #[error("{0} is not a valid index")]
    Negative(i64),
    #[error("{0} cannot be pinned to a version")]
    Pinned(String),
    #[error(transparent)]
    Treap(#[from] TreapError),
}

pub fn open_file<P>(filename: P) -> std::io::Result<BufReader<File>>
where
    P: AsRef<Path>,
{
    let f = File::open(filename)?;
    Ok(BufReader::new(f))
}

/// A collection the script driver can run commands against
trait Script: Persist {
    fn exec(&mut self, verb: &str, args: &[i64]) -> Result<Option<String>, Fault>;
}

fn arity<const N: usize>(verb: &str, args: &[i64]) -> Result<[i64; N], Fault> {
    <[i64; N]>::try_from(args).map_err(|_| Fault::Arity {
        verb: verb.to_string(),
        expected: N,
        got: args.len(),
    })
}

fn index(value: i64) -> Result<usize, Fault> {
    usize::try_from(value).map_err(|_| Fault::Negative(value))
}

fn found<T: Display>(value: Option<T>) -> String {
    value.map_or_else(|| NOT_FOUND.to_string(), |v| v.to_string())
}

fn join(values: impl Iterator<Item = i64>) -> String {
    values.map(|v| v.to_string()).collect::<Vec<_>>().join(" ")
}

impl Script for OrderedSet<i64> {
    fn exec(&mut self, verb: &str, args: &[i64]) -> Result<Option<String>, Fault> {
        let out = match verb {
            "insert" => {
                let [x] = arity::<1>(verb, args)?;
                self.insert(x)?;
                None
            }
            "delete" => {
                let [x] = arity::<1>(verb, args)?;
                (!self.delete(&x)?).then(|| NOT_FOUND.to_string())
            }
            "rank" => {
                let [x] = arity::<1>(verb, args)?;
                Some(found(self.rank(&x)))
            }
            "select" => {
                let [k] = arity::<1>(verb, args)?;
                Some(found(self.select(index(k)?)))
            }
            "pred" => {
                let [x] = arity::<1>(verb, args)?;
                Some(found(self.predecessor(&x)))
            }
            "succ" => {
                let [x] = arity::<1>(verb, args)?;
                Some(found(self.successor(&x)))
            }
            "count" => {
                let [x] = arity::<1>(verb, args)?;
                Some(self.count(&x).to_string())
            }
            "contains" => {
                let [x] = arity::<1>(verb, args)?;
                Some(self.contains(&x).to_string())
            }
            "len" => {
                let [] = arity::<0>(verb, args)?;
                Some(self.len().to_string())
            }
            "print" => {
                let [] = arity::<0>(verb, args)?;
                Some(join(self.iter()))
            }
            _ => return Err(Fault::Unknown(verb.to_string())),
        };
        Ok(out)
    }
}

impl Script for Sequence<i64> {
    fn exec(&mut self, verb: &str, args: &[i64]) -> Result<Option<String>, Fault> {
        let out = match verb {
            "insert" => {
                let [i, x] = arity::<2>(verb, args)?;
                self.insert_at(index(i)?, x)?;
                None
            }
            "push" => {
                let [x] = arity::<1>(verb, args)?;
                self.push_back(x)?;
                None
            }
            "delete" => {
                let [i] = arity::<1>(verb, args)?;
                Some(self.delete_at(index(i)?)?.to_string())
            }
            "get" => {
                let [i] = arity::<1>(verb, args)?;
                Some(self.get(index(i)?)?.to_string())
            }
            "set" => {
                let [i, x] = arity::<2>(verb, args)?;
                self.set(index(i)?, x)?;
                None
            }
            "add" => {
                let [l, r, x] = arity::<3>(verb, args)?;
                self.range_add(index(l)?..index(r)?, x)?;
                None
            }
            "assign" => {
                let [l, r, x] = arity::<3>(verb, args)?;
                self.range_assign(index(l)?..index(r)?, x)?;
                None
            }
            "reverse" => {
                let [l, r] = arity::<2>(verb, args)?;
                self.range_reverse(index(l)?..index(r)?)?;
                None
            }
            "front" => {
                let [l, r] = arity::<2>(verb, args)?;
                self.move_to_front(index(l)?..index(r)?)?;
                None
            }
            "back" => {
                let [l, r] = arity::<2>(verb, args)?;
                self.move_to_back(index(l)?..index(r)?)?;
                None
            }
            "sum" | "min" | "max" | "query" => {
                let [l, r] = arity::<2>(verb, args)?;
                let s = self.range_query(index(l)?..index(r)?)?;
                Some(match verb {
                    "sum" => s.sum.to_string(),
                    "min" => s.min.to_string(),
                    "max" => s.max.to_string(),
                    _ => format!("len={} sum={} min={} max={}", s.len, s.sum, s.min, s.max),
                })
            }
            "len" => {
                let [] = arity::<0>(verb, args)?;
                Some(self.len().to_string())
            }
            "print" => {
                let [] = arity::<0>(verb, args)?;
                Some(join(self.iter()))
            }
            _ => return Err(Fault::Unknown(verb.to_string())),
        };
        Ok(out)
    }
}

// Parse and run one line, returning what it prints
fn step<C: Script>(
    history: &mut Versioned<C>,
    grammar: &Regex,
    text: &str,
) -> Result<Option<String>, Fault> {
    let syntax = || Fault::Syntax(text.to_string());
    let caps = grammar.captures(text).ok_or_else(syntax)?;
    let at = match caps.get(1) {
        Some(m) => Some(VersionId::new(m.as_str().parse().map_err(|_| syntax())?)),
        None => None,
    };
    let verb = &caps[2];
    let args = caps[3]
        .split_whitespace()
        .map(str::parse::<i64>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| syntax())?;

    match (verb, at) {
        ("seal", None) => {
            let [] = arity::<0>(verb, &args)?;
            Ok(Some(history.seal().to_string()))
        }
        ("checkout", None) => {
            let [v] = arity::<1>(verb, &args)?;
            history.checkout(VersionId::new(index(v)?))?;
            Ok(None)
        }
        ("compact", None) => {
            let [] = arity::<0>(verb, &args)?;
            Ok(Some(format!("{} nodes freed", history.compact())))
        }
        ("seal" | "checkout" | "compact", Some(_)) => Err(Fault::Pinned(verb.to_string())),
        // changes made while pinned are discarded
        (_, Some(version)) => history.query_at(version, |c| c.exec(verb, &args))?,
        (_, None) => history.current_mut().exec(verb, &args),
    }
}

// Returns the number of lines that failed
fn run<C: Script>(
    mut history: Versioned<C>,
    reader: impl BufRead,
    grammar: &Regex,
) -> Result<usize, ScriptError> {
    let mut faults = 0;
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        let text = line
            .split_once('#')
            .map_or(line.as_str(), |(code, _)| code)
            .trim();
        if text.is_empty() {
            continue;
        }
        match step(&mut history, grammar, text) {
            Ok(Some(out)) => println!("{out}"),
            Ok(None) => {}
            Err(fault) => {
                faults += 1;
                eprintln!("line {}: {fault}", n + 1);
            }
        }
    }
    log::debug!(
        "script finished: {} versions, {} arena nodes",
        history.version_count(),
        history.node_count()
    );
    Ok(faults)
}

fn execute(params: &ArgMatches) -> Result<usize, ScriptError> {
    let script = params
        .get_one::<PathBuf>("script")
        .expect("script is a required argument");
    let mode = params
        .get_one::<String>("mode")
        .expect("mode has a default value");

    let mut builder = TreapBuilder::new();
    if let Some(seed) = params.get_one::<u64>("seed") {
        builder = builder.seed(*seed);
    }
    if let Some(nodes) = params.get_one::<usize>("capacity") {
        builder = builder.capacity(*nodes);
    }
    let policy = match params.get_one::<String>("duplicates").map(String::as_str) {
        Some("separate") => DuplicatePolicy::Separate,
        Some("ignore") => DuplicatePolicy::Ignore,
        _ => DuplicatePolicy::Count,
    };
    builder = builder.duplicates(policy);

    let grammar = Regex::new(GRAMMAR)?;
    let reader = open_file(script)?;
    match mode.as_str() {
        "sequence" => run(Versioned::new(builder.sequence::<i64>()?), reader, &grammar),
        _ => run(Versioned::new(builder.ordered_set::<i64>()?), reader, &grammar),
    }
}

fn main() -> ExitCode {
    // Generate a CLI, and get the script to run
    let params = Command::new("fhq-treap")
        .version(crate_version!())
        .about("Run a script of commands against a versioned split/merge treap")
        .arg(arg!(-s --script <FILE> "A text file with one command per line. Anything after # is a comment. Prefix a query with @<version> to run it against a sealed version; anything it changes is discarded").index(1).required(true).value_parser(value_parser!(PathBuf)))
        .arg(arg!(-m --mode <MODE> "ordered: a sorted multiset with rank/select queries. sequence: an array with 0-based half-open range updates").value_parser(["ordered", "sequence"]).default_value("ordered"))
        .arg(arg!(--seed <SEED> "Seed for node priorities. The same seed and script always build the same trees").value_parser(value_parser!(u64)))
        .arg(arg!(-c --capacity <NODES> "Maximum number of arena nodes, history and garbage included. Unbounded by default").value_parser(value_parser!(usize)))
        .arg(arg!(-d --duplicates <POLICY> "How the ordered mode stores repeated keys").value_parser(["count", "separate", "ignore"]).default_value("count"))
        .arg(arg!(-v --verbose "Log version bookkeeping to stderr"))
        .get_matches();

    let level = if params.get_flag("verbose") {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match execute(&params) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(faults) => {
            log::warn!("{faults} script lines failed");
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
