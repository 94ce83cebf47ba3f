use crate::rcv::*;

use stv_voting::builder::Builder;

// A ballot line, kept until the candidate names are known.
#[derive(Eq, PartialEq, Debug, Clone)]
struct ParsedBallot {
    line: usize,
    weight: u64,
    ranking: Vec<Vec<CandidateId>>,
}

fn syntax_error<T>(line: usize, message: &str) -> RcvResult<T> {
    BltSyntaxSnafu { line, message }.fail()
}

// Removes a trailing `#` comment, leaving the quoted text alone.
fn strip_comment(line: &str) -> &str {
    let mut in_quotes = false;
    for (idx, c) in line.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '#' if !in_quotes => return &line[..idx],
            _ => {}
        }
    }
    line
}

fn parse_quoted(line: usize, s: &str) -> RcvResult<String> {
    match s.strip_prefix('"').and_then(|x| x.strip_suffix('"')) {
        Some(name) => Ok(name.to_string()),
        None => syntax_error(line, &format!("expected a quoted name, found {:?}", s)),
    }
}

fn parse_number<T: std::str::FromStr>(line: usize, token: &str) -> RcvResult<T> {
    match token.parse::<T>() {
        Ok(x) => Ok(x),
        Err(_) => syntax_error(line, &format!("expected a number, found {:?}", token)),
    }
}

fn parse_header(line: usize, content: &str) -> RcvResult<(u32, u32)> {
    let tokens: Vec<&str> = content.split_whitespace().collect();
    if tokens.len() != 2 {
        return syntax_error(line, "expected '<number of candidates> <number of seats>'");
    }
    Ok((
        parse_number(line, tokens[0])?,
        parse_number(line, tokens[1])?,
    ))
}

fn parse_ballot(line: usize, content: &str) -> RcvResult<ParsedBallot> {
    let mut tokens = content.split_whitespace().peekable();
    // Some files start the ballot lines with an identifier in parentheses.
    if let Some(t) = tokens.peek() {
        if t.starts_with('(') && t.ends_with(')') {
            tokens.next();
        }
    }
    let weight: u64 = match tokens.next() {
        Some(t) => parse_number(line, t)?,
        None => return syntax_error(line, "empty ballot line"),
    };
    let mut ranking: Vec<Vec<CandidateId>> = Vec::new();
    let mut terminated = false;
    for token in tokens.by_ref() {
        if token == "0" {
            terminated = true;
            break;
        }
        if token == "-" {
            ranking.push(Vec::new());
            continue;
        }
        let mut level: Vec<CandidateId> = Vec::new();
        for part in token.split('=') {
            level.push(CandidateId(parse_number(line, part)?));
        }
        ranking.push(level);
    }
    if !terminated {
        return syntax_error(line, "the ballot does not end with 0");
    }
    if tokens.next().is_some() {
        return syntax_error(line, "unexpected content after the end of the ballot");
    }
    Ok(ParsedBallot {
        line,
        weight,
        ranking,
    })
}

/// Reads an election in the BLT format.
///
/// Ballots are checked against the options as they are added to the election.
pub fn read_blt(contents: &str, options: &CountOptions) -> RcvResult<Election> {
    let mut lines = contents
        .lines()
        .enumerate()
        .map(|(idx, l)| (idx + 1, strip_comment(l).trim()))
        .filter(|(_, l)| !l.is_empty())
        .peekable();

    let (num_candidates, num_seats) = match lines.next() {
        Some((line, content)) => parse_header(line, content)?,
        None => return syntax_error(0, "the file is empty"),
    };
    debug!(
        "read_blt: {} candidates, {} seats",
        num_candidates, num_seats
    );

    let mut withdrawn: Vec<u32> = Vec::new();
    if let Some((line, content)) = lines.peek() {
        if content.starts_with('-') {
            for token in content.split_whitespace() {
                let id: i64 = parse_number(*line, token)?;
                if id >= 0 {
                    return syntax_error(*line, "withdrawn candidates must be negative numbers");
                }
                withdrawn.push((-id) as u32);
            }
            lines.next();
        }
    }

    let mut ballots: Vec<ParsedBallot> = Vec::new();
    let mut last_line = 1;
    let mut ended = false;
    for (line, content) in lines.by_ref() {
        last_line = line;
        if content == "0" {
            ended = true;
            break;
        }
        ballots.push(parse_ballot(line, content)?);
    }
    if !ended {
        return syntax_error(last_line, "missing the 0 line that ends the ballots");
    }

    let mut names: Vec<String> = Vec::new();
    while names.len() < num_candidates as usize {
        match lines.next() {
            Some((line, content)) => {
                last_line = line;
                names.push(parse_quoted(line, content)?);
            }
            None => {
                return syntax_error(
                    last_line,
                    &format!(
                        "expected {} candidate names, found {}",
                        num_candidates,
                        names.len()
                    ),
                );
            }
        }
    }
    let title = match lines.next() {
        Some((line, content)) => Some(parse_quoted(line, content)?),
        None => None,
    };
    for (line, content) in lines {
        warn!("read_blt: line {}: ignoring {:?}", line, content);
    }

    let mut builder = Builder::new(num_seats, options).context(CountingSnafu {})?;
    if let Some(t) = title {
        builder = builder.title(&t);
    }
    for (idx, name) in names.iter().enumerate() {
        builder
            .add_candidate(name, Some(idx as u32 + 1))
            .context(CountingSnafu {})?;
    }
    for id in withdrawn {
        info!("read_blt: candidate {} is withdrawn", id);
        builder
            .withdraw(CandidateId(id))
            .context(CountingSnafu {})?;
    }
    for ballot in ballots {
        let accepted = builder
            .add_ballot(ballot.ranking, ballot.weight)
            .context(InvalidBallotLineSnafu { line: ballot.line })?;
        if !accepted {
            debug!("read_blt: line {}: ballot dropped", ballot.line);
        }
    }
    builder.build().context(CountingSnafu {})
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"4 2
-4
3 1 2 0   # three identical ballots
4 1=2 3 0
2 3 - 1 0
1 2 0
0
"Alice"
"Bob"
"Charlie # the third"
"Dave"
"City council"
"#;

    fn permissive() -> CountOptions {
        CountOptions {
            allow_equal: true,
            allow_skipped: true,
            ..CountOptions::DEFAULT_OPTIONS
        }
    }

    #[test]
    fn read_sample() {
        let e = read_blt(SAMPLE, &permissive()).unwrap();
        assert_eq!(e.title(), Some("City council"));
        assert_eq!(e.num_seats(), 2);
        assert_eq!(e.num_valid_ballots(), 10);
        assert_eq!(e.num_invalid_ballots(), 0);
        let names: Vec<&str> = e.candidates(None).iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["Alice", "Bob", "Charlie # the third", "Dave"]);
        assert_eq!(
            e.candidate(CandidateId(4)).unwrap().state(),
            CandidateState::Withdrawn
        );
        assert_eq!(
            e.ballots()[1].ranking(),
            &[
                vec![CandidateId(1), CandidateId(2)],
                vec![CandidateId(3)]
            ]
        );
        assert_eq!(
            e.ballots()[2].ranking(),
            &[vec![CandidateId(3)], vec![], vec![CandidateId(1)]]
        );
    }

    #[test]
    fn strict_options_drop_ballots() {
        let e = read_blt(SAMPLE, &CountOptions::DEFAULT_OPTIONS).unwrap();
        assert_eq!(e.num_valid_ballots(), 4);
        assert_eq!(e.num_invalid_ballots(), 6);

        let strict = CountOptions {
            allow_invalid: false,
            ..CountOptions::DEFAULT_OPTIONS
        };
        let err = read_blt(SAMPLE, &strict).unwrap_err();
        assert!(matches!(err, RcvError::InvalidBallotLine { line: 4, .. }));
    }

    #[test]
    fn ballot_identifiers() {
        let b = parse_ballot(3, "(b12) 2 1 3 0").unwrap();
        assert_eq!(b.weight, 2);
        assert_eq!(b.ranking, vec![vec![CandidateId(1)], vec![CandidateId(3)]]);
    }

    #[test]
    fn syntax_errors() {
        let check = |contents: &str, expected_line: usize| match read_blt(
            contents,
            &CountOptions::DEFAULT_OPTIONS,
        ) {
            Err(RcvError::BltSyntax { line, .. }) => assert_eq!(line, expected_line),
            x => panic!("unexpected result {:?}", x),
        };
        check("", 0);
        check("2\n", 1);
        check("2 1\n1 1 2\n0\n\"A\"\n\"B\"\n", 2);
        check("2 1\n1 1 x 0\n0\n\"A\"\n\"B\"\n", 2);
        check("2 1\n1 1 0\n", 2);
        check("2 1\n1 1 0\n0\n\"A\"\n", 4);
        check("2 1\n1 1 0\n0\nA\n\"B\"\n", 4);
    }

    #[test]
    fn missing_title() {
        let e = read_blt("2 1\n1 1 0\n0\n\"A\"\n\"B\"\n", &CountOptions::DEFAULT_OPTIONS).unwrap();
        assert_eq!(e.title(), None);
    }
}
