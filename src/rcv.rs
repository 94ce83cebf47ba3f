use log::{debug, info, warn};

use snafu::{prelude::*, ErrorCompat, Snafu};
use stv_voting::*;

use std::collections::HashMap;
use std::fs;

use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::CountArgs;
use crate::rcv::config_reader::*;

mod config_reader;
mod io_blt;
mod io_common;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RcvError {
    #[snafu(display("The file does not exist: {path}"))]
    MissingFile { path: String },
    #[snafu(display("The file is a directory: {path}"))]
    IsDirectory { path: String },
    #[snafu(display("Cannot read file: {path}"))]
    ReadingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Invalid file type, expected a text file: {path}"))]
    NotText { path: String },

    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },

    #[snafu(display("Syntax error at line {line}: {message}"))]
    BltSyntax { line: usize, message: String },
    #[snafu(display("Invalid ballot at line {line}"))]
    InvalidBallotLine { source: VotingErrors, line: usize },

    #[snafu(display("Invalid value for option {name}: {value:?}"))]
    InvalidOption { name: String, value: String },

    #[snafu(display("The count failed"))]
    Counting { source: VotingErrors },

    #[snafu(display("Error writing the output to {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Difference detected between the summary and the reference summary {path}"))]
    ReferenceMismatch { path: String },
}

pub type RcvResult<T> = Result<T, RcvError>;

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(format: &Option<String>) -> RcvResult<OutputFormat> {
        match format.as_deref() {
            None | Some("text") => Ok(OutputFormat::Text),
            Some("json") => Ok(OutputFormat::Json),
            Some(x) => InvalidOptionSnafu {
                name: "format",
                value: x,
            }
            .fail(),
        }
    }
}

// The options passed on the command line. Only the flags that are set are returned.
fn options_from_args(args: &CountArgs) -> RcvOptions {
    let flag = |b: bool| if b { Some(true) } else { None };
    let mut options = RcvOptions {
        allow_invalid: flag(args.allow_invalid),
        max_stages: args.max_stages,
        precision: args.precision,
        method: args.method.clone(),
        ..RcvOptions::default()
    };
    // With --allow-invalid, the specific flags are not considered.
    if !args.allow_invalid {
        options.allow_equal = flag(args.allow_equal);
        options.allow_repeat = flag(args.allow_repeat);
        options.allow_skipped = flag(args.allow_skipped);
    }
    options
}

fn validate_options(options: &RcvOptions) -> RcvResult<CountOptions> {
    let defaults = CountOptions::DEFAULT_OPTIONS;
    let res = CountOptions {
        allow_equal: options.allow_equal.unwrap_or(defaults.allow_equal),
        allow_repeat: options.allow_repeat.unwrap_or(defaults.allow_repeat),
        allow_skipped: options.allow_skipped.unwrap_or(defaults.allow_skipped),
        // The command line is strict unless told otherwise.
        allow_invalid: options.allow_invalid.unwrap_or(false),
        max_stages: match options.max_stages {
            None => defaults.max_stages,
            Some(x) if x > 0 => x,
            Some(x) => {
                return InvalidOptionSnafu {
                    name: "maxStages",
                    value: x.to_string(),
                }
                .fail();
            }
        },
        precision: match options.precision {
            None => defaults.precision,
            Some(x) if x <= 12 => x,
            Some(x) => {
                return InvalidOptionSnafu {
                    name: "precision",
                    value: x.to_string(),
                }
                .fail();
            }
        },
        method: match options.method.as_deref() {
            None | Some("stv") => MethodKind::Stv,
            Some("stv-reducing") => MethodKind::StvReducingQuota,
            Some(x) => {
                return InvalidOptionSnafu {
                    name: "method",
                    value: x,
                }
                .fail();
            }
        },
        tiebreak_mode: match options.tiebreak_mode.as_deref() {
            None | Some("useCandidateOrder") => TieBreakMode::UseCandidateOrder,
            Some("random") => {
                let seed = match options.random_seed.as_ref().map(|s| s.parse::<u32>()) {
                    Some(Ok(x)) => x,
                    _ => {
                        return InvalidOptionSnafu {
                            name: "randomSeed",
                            value: format!("{:?}", options.random_seed),
                        }
                        .fail();
                    }
                };
                TieBreakMode::Random(seed)
            }
            Some("permutation") => match &options.tiebreak_order {
                Some(names) if !names.is_empty() => TieBreakMode::Permutation(names.clone()),
                _ => {
                    return InvalidOptionSnafu {
                        name: "tiebreakOrder",
                        value: format!("{:?}", options.tiebreak_order),
                    }
                    .fail();
                }
            },
            Some(x) => {
                return InvalidOptionSnafu {
                    name: "tiebreakMode",
                    value: x,
                }
                .fail();
            }
        },
    };
    Ok(res)
}

// What is known about the election before the count consumes it.
struct ElectionInfo {
    title: String,
    num_seats: u32,
    num_valid_ballots: u64,
    num_invalid_ballots: u64,
    method: &'static str,
}

fn result_stats_to_json(res: &CountResult) -> Vec<JSValue> {
    let names: HashMap<CandidateId, String> = res
        .candidates
        .iter()
        .map(|c| (c.id, c.name.clone()))
        .collect();
    let mut l: Vec<JSValue> = Vec::new();
    for stage in res.stages.iter() {
        let mut tally: JSMap<String, JSValue> = JSMap::new();
        for (cid, count) in stage.votes.iter() {
            if let Some(name) = names.get(cid) {
                tally.insert(name.clone(), json!(count.to_string()));
            }
        }

        let mut changes: JSMap<String, JSValue> = JSMap::new();
        for (cid, messages) in stage.changes.iter() {
            if messages.is_empty() {
                continue;
            }
            if let Some(name) = names.get(cid) {
                changes.insert(name.clone(), json!(messages));
            }
        }

        let js = json!({
            "round": stage.round,
            "quota": stage.quota.to_string(),
            "tally": tally,
            "changes": changes,
            "total": stage.total.to_string(),
            "exhausted": stage.exhausted.to_string(),
        });
        l.push(js);
    }
    l
}

fn elected_names(res: &CountResult) -> Vec<String> {
    res.elected
        .iter()
        .filter_map(|cid| res.candidates.iter().find(|c| c.id == *cid))
        .map(|c| c.name.clone())
        .collect()
}

fn build_summary_js(info: &ElectionInfo, res: &CountResult) -> JSValue {
    let c = OutputConfig {
        title: info.title.clone(),
        seats: info.num_seats,
        method: info.method.to_string(),
        valid_ballots: info.num_valid_ballots,
        invalid_ballots: info.num_invalid_ballots,
    };
    json!({
        "config": c,
        "quota": res.quota.to_string(),
        "results": result_stats_to_json(res),
        "elected": elected_names(res),
    })
}

fn build_summary_text(info: &ElectionInfo, res: &CountResult) -> String {
    let width = res
        .candidates
        .iter()
        .map(|c| c.name.chars().count())
        .max()
        .unwrap_or(0)
        .max(9);
    let mut lines: Vec<String> = vec![
        info.title.clone(),
        format!("Method: {}", info.method),
        format!("Seats: {}", info.num_seats),
        format!("Valid ballots: {}", info.num_valid_ballots),
        format!("Invalid ballots: {}", info.num_invalid_ballots),
        format!("Quota: {}", res.quota.display(2)),
    ];
    for stage in res.stages.iter() {
        lines.push(String::new());
        lines.push(format!(
            "Stage {} (quota: {})",
            stage.round,
            stage.quota.display(2)
        ));
        for c in res.candidates.iter() {
            let votes = stage.votes_of(c.id).unwrap_or_default();
            let changes = stage.changes_of(c.id).join(", ");
            lines.push(
                format!("  {:<width$} {:>10}  {}", c.name, votes.display(2), changes)
                    .trim_end()
                    .to_string(),
            );
        }
        lines.push(format!("  {:<width$} {:>10}", "Exhausted", stage.exhausted.display(2)));
        lines.push(format!("  {:<width$} {:>10}", "Total", stage.total.display(2)));
    }
    lines.push(String::new());
    lines.push("Result:".to_string());
    for c in res.candidates.iter() {
        lines.push(format!(
            "  {:<width$} {:>10}  {}",
            c.name,
            c.votes.display(2),
            c.state
        ));
    }
    lines.push(format!("Elected: {}", elected_names(res).join(", ")));
    lines.join("\n")
}

fn write_output(contents: &str, out: Option<String>) -> RcvResult<()> {
    match out.as_deref() {
        None | Some("stdout") => {
            println!("{}", contents);
            Ok(())
        }
        Some(path) => {
            info!("Writing the result to {}", path);
            fs::write(path, contents).context(WritingOutputSnafu { path })
        }
    }
}

/// Counts the election of a ballot file, writes the result and compares it with a
/// reference summary if one is given.
pub fn run_election(
    path: &str,
    options: &CountOptions,
    format: OutputFormat,
    out: Option<String>,
    check_summary_path: Option<String>,
) -> RcvResult<()> {
    let contents = io_common::read_text_file(path)?;
    let election = io_blt::read_blt(&contents, options)?;

    let info = ElectionInfo {
        title: election
            .title()
            .map(|t| t.to_string())
            .unwrap_or_else(|| io_common::simplify_file_name(path)),
        num_seats: election.num_seats(),
        num_valid_ballots: election.num_valid_ballots(),
        num_invalid_ballots: election.num_invalid_ballots(),
        method: counting_method(options).name(),
    };
    info!("Counting {:?} ({})", info.title, info.method);

    let result = run_count(election, options).context(CountingSnafu {})?;
    debug!("run_election: result: {:?}", result);

    let result_js = build_summary_js(&info, &result);
    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;
    let rendered = match format {
        OutputFormat::Json => pretty_js_stats.clone(),
        OutputFormat::Text => build_summary_text(&info, &result),
    };
    write_output(&rendered, out)?;

    // The reference summary, if provided for comparison
    if let Some(summary_p) = check_summary_path {
        let summary_ref = read_summary(&summary_p)?;
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference summary");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            return ReferenceMismatchSnafu { path: summary_p }.fail();
        }
        info!("The summary matches the reference {}", summary_p);
    }

    Ok(())
}

/// Entry point of the `count` command.
pub fn run_count_command(args: &CountArgs) -> RcvResult<()> {
    let file_options = match &args.config {
        Some(p) => read_options(p)?,
        None => RcvOptions::default(),
    };
    let options = validate_options(&file_options.merge(options_from_args(args)))?;
    debug!("run_count_command: options: {:?}", options);
    let format = OutputFormat::parse(&args.format)?;
    run_election(
        &args.filename,
        &options,
        format,
        args.out.clone(),
        args.reference.clone(),
    )
}

#[cfg(test)]
fn run_election_test(test_name: &str, blt_lpath: &str, config_lpath: &str, summary_lpath: &str) {
    let test_dir = option_env!("STV_TEST_DIR")
        .unwrap_or(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data"));
    info!("Running test {}", test_name);
    let config_p = format!("{}/{}/{}", test_dir, test_name, config_lpath);
    let res = (if std::path::Path::new(&config_p).exists() {
        read_options(&config_p)
    } else {
        Ok(RcvOptions::default())
    })
    .and_then(|o| validate_options(&o))
    .and_then(|options| {
        run_election(
            &format!("{}/{}/{}", test_dir, test_name, blt_lpath),
            &options,
            OutputFormat::Json,
            None,
            Some(format!("{}/{}/{}", test_dir, test_name, summary_lpath)),
        )
    });
    if let Err(e) = res {
        warn!("Error occured {:?}", e);
        eprintln!("An error occured {}", e);
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        panic!("test {} failed: {}", test_name, e);
    }
}

#[cfg(test)]
pub fn test_wrapper(test_name: &str) {
    run_election_test(
        test_name,
        format!("{}.blt", test_name).as_str(),
        format!("{}_config.json", test_name).as_str(),
        format!("{}_expected_summary.json", test_name).as_str(),
    )
}
