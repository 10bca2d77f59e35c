use crate::types::{EngineResult, Field, FieldRecord, NOT_FOUND};

/// Lowercased values that mean "nothing here". The second is a common OCR
/// misreading of the first.
const NOT_FOUND_MARKERS: [&str; 2] = ["not found", "net found"];

fn is_vote(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && !NOT_FOUND_MARKERS.contains(&value.to_lowercase().as_str())
}

/// Plurality vote over candidate values, compared by exact (trimmed) string.
///
/// Ties go to the value that was seen first, so callers control the tie-break
/// through iteration order.
pub fn plurality<'a>(values: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    let mut tally: Vec<(&str, usize)> = Vec::new();
    for value in values.into_iter().filter(|v| is_vote(v)).map(str::trim) {
        match tally.iter_mut().find(|(seen, _)| *seen == value) {
            Some((_, count)) => *count += 1,
            None => tally.push((value, 1)),
        }
    }
    tally
        .into_iter()
        .fold(None, |best: Option<(&str, usize)>, (value, count)| match best {
            Some((_, top)) if top >= count => best,
            _ => Some((value, count)),
        })
        .map(|(value, _)| value)
}

/// Per-field consensus across engine results. Results are walked in the order
/// given (registry order), which decides ties. Fields with no surviving value
/// become [`NOT_FOUND`].
pub fn best_guess(results: &[EngineResult]) -> FieldRecord {
    let mut record = FieldRecord::default();
    for field in Field::ALL {
        let winner = plurality(results.iter().map(|r| r.fields().get(field)));
        record.set(field, winner.unwrap_or(NOT_FOUND));
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with(engine: &str, field: Field, value: &str) -> EngineResult {
        let mut fields = FieldRecord::default();
        fields.set(field, value);
        EngineResult::recognized(engine, "", fields, 0.5)
    }

    #[test]
    fn plurality_majority_wins() {
        assert_eq!(plurality(["X", "X", "Y"]), Some("X"));
        assert_eq!(plurality(["Y", "X", "X"]), Some("X"));
    }

    #[test]
    fn plurality_tie_goes_to_first_seen() {
        assert_eq!(plurality(["Y", "X"]), Some("Y"));
        assert_eq!(plurality(["X", "Y", "Y", "X"]), Some("X"));
    }

    #[test]
    fn plurality_filters_blank_and_markers() {
        assert_eq!(plurality(["", "  ", "Not Found", "NET FOUND", "not found"]), None);
        assert_eq!(plurality(["not found", "B+", "  "]), Some("B+"));
    }

    #[test]
    fn plurality_is_exact_and_case_sensitive() {
        assert_eq!(plurality(["cse", "CSE", "CSE"]), Some("CSE"));
        assert_eq!(plurality([" CSE ", "CSE", "EEE"]), Some("CSE"));
    }

    #[test]
    fn best_guess_majority_across_engines() {
        let results = vec![
            result_with("A", Field::Department, "X"),
            result_with("B", Field::Department, "X"),
            result_with("C", Field::Department, "Y"),
        ];
        assert_eq!(best_guess(&results).get(Field::Department), "X");
    }

    #[test]
    fn best_guess_ignores_empty_engine() {
        let results = vec![
            result_with("e1", Field::Id, "A1234567"),
            result_with("e2", Field::Id, "A1234567"),
            result_with("e3", Field::Id, ""),
        ];
        assert_eq!(best_guess(&results).get(Field::Id), "A1234567");
    }

    #[test]
    fn best_guess_sentinel_when_nothing_survives() {
        let results = vec![
            result_with("e1", Field::Validity, "not found"),
            result_with("e2", Field::Validity, "Net Found"),
            EngineResult::failed("e3", "crashed"),
        ];
        let guess = best_guess(&results);
        assert!(guess.iter().all(|(_, v)| v == NOT_FOUND));
    }

    #[test]
    fn best_guess_with_no_engines_is_all_not_found() {
        assert_eq!(best_guess(&[]), FieldRecord::not_found());
    }
}
