/*!

This is the long-form manual for `stv_voting` and `stvcount`.

## The count

`stv_voting` implements the Single Transferable Vote. Voters rank the candidates.
A candidate is elected as soon as the weight of the ballots counted for them reaches
the quota. The Droop quota is used:

```text
quota = floor(valid ballots / (seats + 1)) + 1
```

The count proceeds in rounds. Each round produces a stage, which records the votes of
every candidate at the end of the round and what happened to them.

1. In the first round, every ballot is given to its first preference.
2. The hopeful candidates that reached the quota are elected, the strongest first.
3. The surplus of each newly elected candidate (the votes above the quota) is passed on.
   Every ballot held by the candidate passes on the same fraction of its value,
   `surplus / votes`, to its next preference that is still hopeful.
4. If nobody was elected in the round, the hopeful candidate with the fewest votes is
   defeated and all its ballots go, at their current value, to their next hopeful
   preference.
5. The count stops when all the seats are filled. When the hopeful candidates are no
   more numerous than the remaining seats, they are all elected.

A ballot with no hopeful candidate left is exhausted. Its value is not counted for
any candidate anymore, and it is reported separately in each stage, so that the total
of the votes plus the exhausted value always equals the number of valid ballots.

The count fails if it has not finished after `max_stages` rounds (100 by default).

### Methods

- `stv` (default): the quota is computed once from the valid ballots.
- `stv-reducing`: the quota is computed again at every round from the ballots that are
  not exhausted. It decreases as ballots exhaust.

### Ties

Each tie-break mode defines an order of the candidates. When candidates with the same
number of votes reach the quota together, the earliest in that order is elected first.
When several candidates share the lowest count, the latest in that order is defeated.

- `useCandidateOrder` (default): the order of the candidates in the ballot file.
- `permutation`: an explicit list of candidate names. Unlisted candidates come after.
- `random`: an order that changes with every round and cannot be guessed in advance. It
  is derived from a SHA-256 hash of the seed, the round number and the candidate name.

### Equal rankings, skipped and repeated preferences

By default, a ballot is invalid if it ranks several candidates at the same level, if it
skips a level or if it ranks a candidate twice. Each of these can be allowed:

- with equal rankings, the value of the ballot is shared evenly between the hopeful
  candidates of the level.
- skipped levels are passed over.
- a repeated candidate is ignored after its first appearance, since the ballot has
  already left that candidate.

Invalid ballots are dropped and reported, unless `allow_invalid` is turned off, in which
case the whole input is rejected. `stvcount` turns it off unless `--allow-invalid` is
passed. With `--allow-invalid`, the `--allow-equal`, `--allow-repeat` and
`--allow-skipped` flags are ignored and only the options file applies.

## Input format

`stvcount` reads ballot files in the BLT format:

```text
4 2
-4
3 1 2 0
4 1=2 3 0
2 3 - 1 0
1 2 0
0
"Alice"
"Bob"
"Charlie"
"Dave"
"City council"
```

- the first line holds the number of candidates and the number of seats.
- an optional line of negative numbers lists the withdrawn candidates.
- each ballot line starts with its weight and ends with `0`. Candidates are designated by
  their position in the list of names, starting at 1. `1=2` ranks two candidates at the
  same level, `-` skips a level.
- a line with a single `0` ends the ballots.
- the candidate names follow, one per line, in double quotes, then the title.

Text after `#` on a line is a comment.

## Configuration

Options can be given on the command line, or in a JSON file passed with `--config`.
Command line flags take precedence over the file.

```json
{
  "allowEqual": true,
  "allowRepeat": false,
  "allowSkipped": true,
  "allowInvalid": true,
  "maxStages": 100,
  "precision": 5,
  "method": "stv",
  "tiebreakMode": "random",
  "randomSeed": "12"
}
```

With `"tiebreakMode": "permutation"`, the order is given in `"tiebreakOrder"` as a list of
candidate names.

`precision` is the number of decimals kept when votes are compared and reported. It
defaults to 5. Older counting programs for the same format round to whole votes by
default. Pass `--precision 0` to reproduce their results.

 */
