/*!

This is the long-form manual for `survey_indicators` and `pmfeval`.

## Overview

A survey is loaded as a table: one row per response, one column per
question. Columns are named after the short instrument identifiers of the
questionnaire (`"4"`, `"83-1"`, `"141"`, ...), after the cleaning stage has
renamed them.

The indicators of a Performance Management Framework (PMF) are evaluated in
two steps:
1. the calculation step derives, for every calculated indicator, a new column
named after the indicator (`Pass` / `Not Pass`, or a bucket label)
2. the aggregation step counts the categories of each indicator, overall and
for every breakdown (country, gender, age group, ...)

## Configuration file

`pmfeval` reads a single JSON file. Paths are relative to the directory of
the configuration file.

```json
{
  "outputSettings": {
    "projectName": "ASRD",
    "outputDirectory": "output",
    "stage": "Evaluation",
    "period": "endline"
  },
  "dataSources": [
    { "provider": "xlsx", "filePath": "data.xlsx", "worksheetName": "Sheet1" }
  ],
  "frameworks": [
    {
      "name": "WASH",
      "rowFilter": { "column": "survey_type", "equals": "WASH" },
      "indicators": [
        {
          "name": "overall satisfaction",
          "columns": ["141"],
          "breakdown": [{ "column": "4", "label": "Country" }],
          "categoryOrder": ["Very low", "Low", "Moderate", "High", "Very high"]
        }
      ]
    }
  ]
}
```

### Data sources

- `provider`: `csv` or `xlsx`
- `filePath`: the path of the file
- `worksheetName` (xlsx only): the worksheet to read. The first worksheet is
used by default.
- `idColumn`: the column holding a stable response identifier. When absent,
the responses are named `<file name>-<line number>`, the line number padded
to 8 digits.

The first row of the file holds the column names. Empty cells are missing
values, cells that parse as numbers are numbers, everything else is text.
Dates found in Excel files are turned into `YYYY-MM-DD` strings.

### Indicators

| key | meaning |
|-----|---------|
| `name` | The name of the indicator. Calculated indicators write a column of that name. |
| `number` | The number of the indicator in the logframe (e.g. `"121"`). |
| `columns` | The source columns. |
| `method` | The calculation method, see below. Default `none`. |
| `scoreMap` | A list of `{"value": ..., "score": ...}` pairs. |
| `validPoint` | The threshold of the scoring methods. |
| `buckets` | The buckets of `divide`. |
| `points` | The recipe of `score_select_manual`. |
| `categoryOrder` | The ordered list of categories of the tables. |
| `breakdown` | An ordered list of `{"column": ..., "label": ...}`. |
| `variableType` | `single` or `multi`. |
| `relabel` | An ordered list of `{"from": ..., "to": ...}` recodings. |
| `labels` | The column labels of the overall table of a `multi` indicator. |
| `condition` | A row filter, see below. |
| `unmatchedRows` | `clear` (default) or `preserve`. |
| `description`, `outputType`, `target`, `baseline`, `midline` | Display information. |

A descriptive indicator (method `none`) with more than one source column is
read as a `multi` indicator unless `variableType` says otherwise.

An indicator that cannot be built from its configuration is reported and
skipped. The other indicators still run.

## Calculation methods

### `none`

The indicator is descriptive: its source columns are tabulated as they are.

### `score`

Each answer is mapped to a score with `scoreMap`. Answers missing from the map
score 0. Without a map, the answer itself must be a number. The response is
`Pass` when the score is at least `validPoint`.

### `divide`

The numeric answer is assigned a bucket label. Two forms of buckets are
accepted:
- `{"upTo": 3, "label": "1 - 3"}`. These keys are sorted. The first one matches
the values up to the key (included), the last one the values strictly above
its key, and the others the values above the previous key and up to their own.
- `{"above": 3, "upTo": 6, "label": "4 - 6"}`: the values strictly above
`above` and up to `upTo`. Intervals are tested before the `upTo` keys.

Values matching no bucket get the label `" "`. Responses with a missing answer
are left out of the indicator entirely, and their number is reported.

Note that with the `upTo` form, the values between the second-to-last key
and the last key match no bucket.

### `score_average`, `score_sum`

All the source columns are scored with `scoreMap`. The average (resp. the
sum) of the scores is compared with `validPoint`.

### `score_select_allyes`, `score_select_allno`, `score_select_anyyes`, `score_select_anyno`

`Pass` when all (resp. any) of the source columns are exactly `"Yes"` (resp.
`"No"`).

### `score_select_manual`

The score is computed by a recipe: a list of
`{"columns": [...], "equals": ..., "points": ...}` rules. Every source column
of a rule whose answer equals `equals` adds `points`. The response is `Pass`
when the score reaches `validPoint`.

From the library, any function of the row can be used with
`ManualScorer::new`.

## Conditions

A condition restricts the rows an indicator is computed on:
- `{"column": "4", "equals": "Sudan"}`
- `{"column": "4", "notEquals": "Sudan"}`
- `{"column": "3", "oneOf": ["Male", "Female"]}`
- `{"column": "84", "notMissing": true}`
- `{"all": [ ... ]}` and `{"any": [ ... ]}` to combine conditions.

With `unmatchedRows: clear`, the rows outside the condition have a missing
value in the derived column. With `preserve`, they keep the value the column
already had. In both cases the tables only count the rows matching the
condition.

## Outputs

For every framework, `pmfeval` writes in the output directory:
- one CSV file per indicator (one per source column for `multi` indicators,
suffixed `-0`, `-1`, ...). It holds the description, the breakdown tables
and the overall table.
- a JSON summary with every table, the display information of the
indicators and the list of the indicators that failed. This summary can be
checked against a reference with `--reference`.
- one CSV file per requested group mean.

Overall tables of `single` indicators have the columns `Count` and
`Percentage` (rounded to one decimal). Breakdown tables have one row per
group with the counts, followed by one `<group>(%)` row per group with the
percentages of the group (rounded to two decimals).

## Cleaning

The `preprocessing` section of the configuration runs before the frameworks:
column renaming, duplicates, anonymisation, pilot dates, column deletion,
missing values, open-ended answers, value unification, regions, the derived
columns of the livelihood and WASH outcomes, age groups and the Washington
Group disability classification. It can be skipped with
`--skip-preprocessing`.

*/
