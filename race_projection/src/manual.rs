/*!

This is the long-form manual for `race_projection` and `racecall`.

## The model

The projection is a heuristic, not a statistical model. It combines four signals:
* the current margin, measured as the distance of side A's share from an even split
* how much of the race has reported
* how consistently one side runs ahead of its historical benchmarks, weighted by turnout
* optionally, a forward projection of the subdivisions that have not reported yet

A race is called in three ways, checked in this order:
1. the expected remaining vote (historical turnout not yet counted, discounted by the
   historical confidence) cannot cover the current lead: certainty 99.9%
2. more than 90% of the race has reported and the margin is above 10%: certainty 99.5%,
   or the composite score when it is higher
3. the composite score reaches the certainty threshold (97% by default)

No call is made before 15% of the race has reported.

### Reporting

By default, reporting is the fraction of subdivisions that recorded any vote. With
`useVoteBasedReporting`, it is the fraction of the expected turnout already counted.
Races without turnout data always count subdivisions.

A subdivision that reported zero votes on both sides looks exactly like a subdivision
that has not reported. Tally files may set the `reported` column to mark it explicitly.

## The race file

The race is described in a JSON file:

```json
{
  "name": "Senate 2026",
  "sideA": "Democrat",
  "sideB": "Republican",
  "subdivisions": [
    { "name": "Adams", "expectedShare": 0.5421, "expectedTurnout": 120345 },
    { "name": "Baker", "expectedShare": 0.3812, "expectedTurnout": 40210 },
    { "name": "Clark" }
  ],
  "thresholds": {
    "certaintyThresholdForCall": 97.0,
    "minReportingForCall": 0.15,
    "impossibilityBuffer": 0.01,
    "historicalConfidence": 0.85,
    "blowoutMargin": 0.10,
    "blowoutReportingThreshold": 0.90,
    "useVoteBasedReporting": false,
    "includeForwardProjection": false,
    "weights": {
      "marginMultiplier": 300.0,
      "marginCap": 0.60,
      "reportingWeight": 0.30,
      "consistencyScale": 100000.0,
      "consistencyCap": 0.10
    },
    "categories": {
      "tooCloseMargin": 0.015,
      "minReporting": 0.15,
      "leanMargin": 0.04,
      "likelyMargin": 0.08
    }
  },
  "trend": {
    "conservativeFactor": 0.75,
    "history": [
      { "year": 2020, "votesA": 2474507, "votesB": 2461837 },
      { "year": 2024, "votesA": 2548017, "votesB": 2663117 }
    ]
  }
}
```

All the thresholds are optional. Missing `weights` come from the default weights, or from
the enhanced weights (margin cap 0.45, reporting weight 0.25, projected margin cap 0.15,
agreement bonus 0.05) when `includeForwardProjection` or `--enhanced` is set. The
consistency term only counts when the leading side runs ahead of its benchmarks more than
the trailing side does. Subdivisions without `expectedShare` are treated as an
even split, and as having a weight of 10,000 votes.

When a `trend` is present, a fraction (`conservativeFactor`, 0.75 by default) of the change
of side A's share between the first and the last year is added to every benchmark.

## Tally formats

* `csv` one row per subdivision, with a header: `subdivision,votes_a,votes_b[,reported]`
* `xlsx` the same columns in the first worksheet of an Excel file (or the worksheet
  given with `--excel-worksheet-name`)
* `json` an object keyed by subdivision: `{"Adams": {"votesA": 1200, "votesB": 800}}`

Counts that are not whole numbers between 0 and 10,000,000 are read as 0.

## Persistence

With `--cache-dir`, the counts are saved after every update into a file named after the
set of subdivisions, and restored on the next run. `--reset` clears them.

*/
