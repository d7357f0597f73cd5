/*!

This is the long-form manual for `rescore_stats` and `rescore`.

## The input sheet

The input is a single spreadsheet (`.xlsx`) or a CSV file. Each row is one
scored item. Columns are not found through their header: their positions are
fixed by the column layout. The default layout is:

| Column | Position (0-based) | Content |
|--------|--------------------|---------|
| `L`    | 11 | part (`A` or `B`) |
| `U`..  | 20 | final scores |
| `AJ`.. | 35 | scores of the first scorer |
| `AT`   | 45 | id of the first scorer |
| `AY`.. | 50 | scores of the second scorer |
| `BI`   | 60 | id of the second scorer |
| `BY`   | 76 | rescore flag (`12` = rescored) |
| `CR`.. | 95 | scores of the automated scorer |

Part `A` evaluates `TA1`, `TA2`, `Style` and `Accuracy`. Part `B` evaluates
`GA1`, `GA2`, `V`, `G` and `O`, and the last three form a tolerance group.

## Comparison rules

For each record, the score of a scorer is compared to the final score:

- an independent dimension disagrees when the score is recorded and different
  from the final score. Blank scores are not compared.
- a tolerance group disagrees when all its scores are recorded and the sum of
  the scores differs from the sum of the final scores by more than the
  tolerance (1 by default). All the dimensions of the group disagree together.

When the second scorer did not record a score, the score of the automated
scorer is used instead.

### The output columns

`Total Scored` counts the records in which the scorer appears, in either role.

`Total <dimension>` only counts the records in which that dimension was
actually compared. Blank scores, partial groups and skipped final scores are
not counted. A scorer who appears in both roles of a record is counted once
for that record, and the dimension is incorrect if either role disagrees. As
a result, `Incorrect <dimension>` is never larger than `Total <dimension>`,
which is never larger than `Total Scored`.

`Rescoring %` is rounded to 2 decimals, with ties going to the even digit
(1 rescored out of 32 gives `3.12`).

### Missing final scores

The policy is set with `missingFinalValue` in the configuration or
`--missing-final`:
* `skip` (default): the dimension cannot disagree.
* `disagree`: any recorded score disagrees.

### The automated scorer

The table of the automated scorer covers the records selected by `aiScope` or
`--ai-scope`:
* `missing-second-score` (default): the records without any second score. In
  these records, the automated scorer stood in for the second scorer.
* `all-records`: all the records of the part.

## Configuration file

All the column indexes accept either a number (starting at 1, as in Excel) or
the letters of the column.

```json
{
  "outputSettings": { "analysisName": "June rescoring" },
  "source": { "provider": "excel", "filePath": "scores.xlsx", "firstDataRowIndex": 2 },
  "layout": {
    "version": "2024-06",
    "partColumnIndex": "L",
    "scorer1IdColumnIndex": "AT",
    "scorer2IdColumnIndex": "BI",
    "rescoreColumnIndex": "BY",
    "parts": [
      {
        "name": "A",
        "dimensions": [
          { "name": "TA1", "final": "U", "scorer1": "AJ", "scorer2": "AY", "ai": "CR" }
        ]
      }
    ]
  },
  "rules": { "rescoreSentinel": 12, "aiScope": "missingSecondScore", "missingFinalValue": "skip" }
}
```

## Access

When the environment variable `RESCORE_ADMIN_SECRET` (or the one named by
`admin.secretEnv`) is set, the sheet is only loaded if `--password` matches.

*/
