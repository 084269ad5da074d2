/*!

This is the long-form manual for `survey_processing` and `foodsurvey`.

`foodsurvey` reads the export of the food system stakeholder survey and produces two documents:
* `charts`: the data behind the dashboard charts (network, goals, activity matrix, challenges,
  capacity needs, district flows and a summary)
* `geocode`: the list of organizations placed on the map, with their coordinates

## Input formats

The following formats are supported:
* `xlsx` Excel workbook, as downloaded from the survey spreadsheet
* `csv` Comma Separated Values (or any other single-character delimiter)

When no input type is given, it is inferred from the extension of the file: `.csv` files are read
as `csv`, everything else as `xlsx`.

### `xlsx`

The responses are read from the worksheet `Copy of Survey Responses`. Another name can be given
with `worksheetName` in the configuration or `--worksheet-name` on the command line. If the
worksheet does not exist, the first worksheet of the workbook is used instead and a warning is
printed.

### `csv`

The first line is the header. Lines may have fewer cells than the header: the missing cells are
read as empty.

### Headers and rows

The first row of the table is the header. Each label is turned into an identifier: the label is
trimmed, runs of spaces become one `_` and every character that is not a letter, a digit or `_`
becomes `_`. For example `Your Name (First/Last)` becomes `Your_Name__First_Last_`. An empty
label becomes `Unknown_Column`.

Rows without an organization name are ignored, as are blank rows. If the header has no
`Organization Name` column at all, no organization is read and an error is printed.

Multi-select answers (goals, activities, challenges, ...) are comma-separated lists.

## Configuration file

All the settings are optional. Paths are relative to the directory of the configuration file.

```json
{
  "input": {
    "filePath": "survey.xlsx",
    "inputType": "xlsx",
    "worksheetName": "Copy of Survey Responses"
  },
  "columns": {
    "organizationName": "Organization Name",
    "zipCode": "Main Org Zip Code"
  },
  "geocode": {
    "cachePath": "data/geocode-cache.json",
    "overridesPath": "data/geocode-overrides.json",
    "outputPath": "public/data/organizations.json",
    "endpoint": "https://nominatim.openstreetmap.org/search",
    "userAgent": "FoodSystemsStakeholderSurvey/1.0 (contact@example.com)",
    "city": "Los Angeles",
    "stateCode": "CA",
    "acceptedState": "California"
  },
  "charts": {
    "outputPath": "public/data/charts.json",
    "referencePath": "tests/charts_reference.json"
  }
}
```

The `columns` section replaces the survey question labels, when the survey changes. The labels
are given as they appear in the sheet.

The command line flags take precedence over the configuration file.

## Geocoding

Each address is resolved in this order:
1. the cache file. It also remembers the addresses that could not be resolved: they are not
   looked up again. Delete the entry (or the file) to retry.
2. the override file, a list of addresses with known coordinates:

```json
[
  { "address": "123 Main St, Los Angeles, CA", "coordinates": [34.05, -118.25] }
]
```

   The address must match exactly, with or without the zip code.
3. the geocoding service, with the full address and then without the zip code.

Only results located in the configured state are accepted. The service is queried at most
once every two seconds.

The suite, unit (`#`) and floor parts of the street are removed before the lookup. A unit is
only removed when the `#` follows a word directly, as in `Ave#205`: `Ave # 205` is kept.
Organizations without a street or a zip code are not placed on the map.

*/
