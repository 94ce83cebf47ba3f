use crate::rcv::*;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

/// The counting options, as written in a JSON options file.
///
/// Every field is optional. Missing fields fall back to the defaults of the count.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct RcvOptions {
    #[serde(rename = "allowEqual")]
    pub allow_equal: Option<bool>,
    #[serde(rename = "allowRepeat")]
    pub allow_repeat: Option<bool>,
    #[serde(rename = "allowSkipped")]
    pub allow_skipped: Option<bool>,
    #[serde(rename = "allowInvalid")]
    pub allow_invalid: Option<bool>,
    #[serde(rename = "maxStages")]
    pub max_stages: Option<u32>,
    pub precision: Option<u32>,
    pub method: Option<String>,
    #[serde(rename = "tiebreakMode")]
    pub tiebreak_mode: Option<String>,
    #[serde(rename = "randomSeed")]
    pub random_seed: Option<String>,
    #[serde(rename = "tiebreakOrder")]
    pub tiebreak_order: Option<Vec<String>>,
}

impl RcvOptions {
    /// Combines two sets of options. The options set in `other` win.
    pub fn merge(self, other: RcvOptions) -> RcvOptions {
        RcvOptions {
            allow_equal: other.allow_equal.or(self.allow_equal),
            allow_repeat: other.allow_repeat.or(self.allow_repeat),
            allow_skipped: other.allow_skipped.or(self.allow_skipped),
            allow_invalid: other.allow_invalid.or(self.allow_invalid),
            max_stages: other.max_stages.or(self.max_stages),
            precision: other.precision.or(self.precision),
            method: other.method.or(self.method),
            tiebreak_mode: other.tiebreak_mode.or(self.tiebreak_mode),
            random_seed: other.random_seed.or(self.random_seed),
            tiebreak_order: other.tiebreak_order.or(self.tiebreak_order),
        }
    }
}

/// The description of the election written at the top of the JSON summary.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub title: String,
    pub seats: u32,
    pub method: String,
    #[serde(rename = "validBallots")]
    pub valid_ballots: u64,
    #[serde(rename = "invalidBallots")]
    pub invalid_ballots: u64,
}

pub fn read_options(path: &str) -> RcvResult<RcvOptions> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    debug!("read_options: {:?}", contents);
    let options: RcvOptions = serde_json::from_str(&contents).context(ParsingJsonSnafu {})?;
    Ok(options)
}

pub fn read_summary(path: &str) -> RcvResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    debug!("read_summary: {:?}", contents);
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_options() {
        let js = r#"{
            "allowEqual": true,
            "maxStages": 20,
            "tiebreakMode": "permutation",
            "tiebreakOrder": ["Bob", "Alice"]
        }"#;
        let options: RcvOptions = serde_json::from_str(js).unwrap();
        assert_eq!(options.allow_equal, Some(true));
        assert_eq!(options.allow_repeat, None);
        assert_eq!(options.max_stages, Some(20));
        assert_eq!(
            options.tiebreak_order,
            Some(vec!["Bob".to_string(), "Alice".to_string()])
        );
    }

    #[test]
    fn later_options_win() {
        let file = RcvOptions {
            allow_equal: Some(false),
            precision: Some(3),
            ..RcvOptions::default()
        };
        let flags = RcvOptions {
            allow_equal: Some(true),
            ..RcvOptions::default()
        };
        let merged = file.merge(flags);
        assert_eq!(merged.allow_equal, Some(true));
        assert_eq!(merged.precision, Some(3));
    }
}
