/*!

This is the long-form manual for `manager_matching` and `matchrun`.

## The game

Every participant of a session plays the role of an employee and is matched with
one manager, taken from a dataset of managers recorded in an earlier session.
Each manager picked one of two paintings: `Left` (Klee) or `Right` (Kandinsky).
The employee then picks a painting too. The pair is a *same* pair if both picked
the same painting, and a *different* pair otherwise.

A manager is never given to two participants of the same session.

## Assignment modes

### `preAllocate` (default)

All the assignments are computed when the session starts. The Left managers and
the Right managers are shuffled separately, then participant 1 takes a Left
manager, participant 2 a Right manager, participant 3 a Left manager, and so on.
When one side runs out, the other side is used. Once both sides are empty, the
remaining participants are not matched.

The result only depends on the random seed and the order of the dataset, not on
the order in which participants show up.

### `reactive`

A participant is matched when they reach the first page. The engine looks at the
pairs recorded so far (`gap = same - different`):

- `gap > 2`: with probability `min(0.8, 0.5 + 0.1 * gap)`, the manager is taken
  from the smaller of the Left/Right groups still available;
- `gap < -2`: with probability `min(0.8, 0.5 + 0.1 * |gap|)`, the manager is taken
  from the larger group;
- otherwise, and in the remaining cases, any available manager can be picked.

Pairs are only counted when the employee picks their painting, so participants
that are matched at the same time do not see each other's pairs.

## Manager datasets

### `csv`

A CSV file with a header row. A leading byte order mark is accepted.

```text
participantid_in_session,main1playerprefer,main1playerstated_amount,main1playerbriefing_correct_amou,main1playerthreshold_integer
1,Left,12,10,8
2,Right,7,7,
```

Only the id and the preference columns are mandatory. Rows with a preference
other than `Left` or `Right` are skipped. Ids must be unique across all the
datasets of a session.

### `xlsx`

The same columns, in the first worksheet of an Excel file (or the one named by
`excelWorksheetName`).

## Configuration

`matchrun` runs with sensible defaults, but a JSON configuration file can be
provided with `--config`:

```text
{
  "sessionSettings": { "sessionName": "pilot", "numParticipants": 10 },
  "managerSources": [
    { "provider": "csv", "filePath": "managers.csv" }
  ],
  "responses": { "filePath": "responses.csv" },
  "rules": { "assignmentMode": "reactive", "randomSeed": 42 }
}
```

Paths are relative to the configuration file. All the `rules` are optional:
`balanceThreshold`, `biasBase`, `biasStep`, `biasCap` control the reactive mode;
`basePayment`, `bonusThreshold`, `bonusRate`, `bonusCap` and `participationPayoff`
control the payments. The column names of a source can be changed with `idColumn`,
`preferenceColumn`, `statedAmountColumn`, `correctAmountColumn` and
`thresholdColumn`.

Command line flags override the values of the configuration file.

## Responses

A responses file replays the pages of the participants, one row per participant:

```text
participant,prefer,charity_1,charity_2,choiceE,choiceM,choiceT,choiceO,report_probability,dictator_keep
1,Left,NRA,Red Cross,Klee,Kandinsky,Kandinsky,NRA,40,6
```

The charity columns and `dictator_keep` (kept out of 10) are optional. Each
answer is submitted on its own page, and a page only accepts its own answer.
Participants without a row only go through the first page. Leaving the first page
matches the participant, or records why no manager was available.

## Payments

A manager who is not reported receives `0.67 + min(max(stated - 8, 0) * 0.5, 2)`.
A reported manager receives `0.67`. The report goes through when the probability
given by the employee is strictly higher than a random number between 0 and 100,
drawn once per employee.

 */
