use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::types::{Field, FieldRecord};

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

// Label separators may run across a line break, captured values may not.
// Enrollment and validity keep the label with the value.
re!(re_id_code,
    r"(?i)[a-z]\d{7}");
re!(re_id_label,
    r"(?i)\bID\b[:\s]*([a-z0-9]{6,10})");
re!(re_id_no_label,
    r"(?i)\bID\s*No[:\s]*([a-z0-9]{6,10})");

re!(re_name_label,
    r"(?i)Name[:\s]*([a-z]+[ \t]+[a-z]+[ \t]+[a-z]+)");
re!(re_full_name_label,
    r"(?i)Full[ \t]+Name[:\s]*([a-z]+[ \t]+[a-z]+[ \t]+[a-z]+)");

re!(re_department_label,
    r"(?i)Department[:\s]*([a-z \t&(),.\-]+)");
re!(re_dept_label,
    r"(?i)Dept[:\s]*([a-z \t&(),.\-]+)");

re!(re_enrollment_label,
    r"(?i)Enrollment[:\s]*([a-z]+[ \t]+\d{4})");
re!(re_session_label,
    r"(?i)Session[:\s]*([a-z]+[ \t]+\d{4})");
re!(re_season_year,
    r"(?i)\b(?:spring|fall|autumn|summer|winter)[ \t]+\d{4}");

re!(re_blood_label,
    r"(?i)Blood[:\s]*((?:AB|A|B|O)[+-])");
re!(re_blood_group_label,
    r"(?i)Blood\s*Group[:\s]*((?:AB|A|B|O)[+-])");

re!(re_valid_label,
    r"(?i)Valid[:\s]*([a-z]+[ \t]+\d{4})");
re!(re_validity_label,
    r"(?i)Validity[:\s]*([a-z]+[ \t]+\d{4})");

// ── Rule tables ──────────────────────────────────────────────────────────────

/// Which part of a match becomes the field value.
#[derive(Clone, Copy)]
enum Take {
    Whole,
    Group,
}

struct Rule {
    regex: fn() -> &'static Regex,
    take: Take,
    accept: fn(&str) -> bool,
}

const fn rule(regex: fn() -> &'static Regex, take: Take) -> Rule {
    Rule { regex, take, accept: not_blank }
}

fn not_blank(value: &str) -> bool {
    !value.is_empty()
}

fn at_least_two_tokens(value: &str) -> bool {
    value.split_whitespace().count() >= 2
}

// Bare code before labels: a labeled rule would also capture "ID No" prefixes.
const ID_RULES: &[Rule] = &[
    rule(re_id_code, Take::Whole),
    rule(re_id_label, Take::Group),
    rule(re_id_no_label, Take::Group),
];

const NAME_RULES: &[Rule] = &[
    Rule { regex: re_name_label, take: Take::Group, accept: at_least_two_tokens },
    Rule { regex: re_full_name_label, take: Take::Group, accept: at_least_two_tokens },
];

const DEPARTMENT_RULES: &[Rule] = &[
    rule(re_department_label, Take::Group),
    rule(re_dept_label, Take::Group),
];

const ENROLLMENT_RULES: &[Rule] = &[
    rule(re_enrollment_label, Take::Whole),
    rule(re_session_label, Take::Whole),
    rule(re_season_year, Take::Whole),
];

const BLOOD_GROUP_RULES: &[Rule] = &[
    rule(re_blood_label, Take::Group),
    rule(re_blood_group_label, Take::Group),
];

const VALIDITY_RULES: &[Rule] = &[
    rule(re_valid_label, Take::Whole),
    rule(re_validity_label, Take::Whole),
];

const UNIVERSITY_KEYWORDS: [&str; 3] = ["university", "institute", "college"];
/// Qualifying lines must be longer than this after trimming.
const UNIVERSITY_MIN_CHARS: usize = 10;

// ── Public extraction API ─────────────────────────────────────────────────────

pub struct FieldExtractor;

impl FieldExtractor {
    /// Extract the identity-card fields from raw OCR text.
    ///
    /// Pure: the same text always yields the same record. Each field tries its
    /// rules in order and the first acceptable match wins. Fields without a
    /// match stay empty.
    pub fn parse(text: &str) -> FieldRecord {
        let mut record = FieldRecord::default();

        let ruled = [
            (Field::Id, ID_RULES),
            (Field::FullName, NAME_RULES),
            (Field::Department, DEPARTMENT_RULES),
            (Field::Enrollment, ENROLLMENT_RULES),
            (Field::BloodGroup, BLOOD_GROUP_RULES),
            (Field::Validity, VALIDITY_RULES),
        ];
        for (field, rules) in ruled {
            if let Some(value) = first_match(text, rules) {
                record.set(field, value);
            }
        }

        if let Some(line) = Self::extract_university(text) {
            record.set(Field::University, line);
        }

        let blood = record.get(Field::BloodGroup).to_uppercase();
        record.set(Field::BloodGroup, blood);

        debug!(populated = record.populated_count(), "Fields extracted");
        record
    }

    /// First line naming an institution that is long enough not to be noise.
    fn extract_university(text: &str) -> Option<&str> {
        text.lines().map(str::trim).find(|line| {
            let lower = line.to_lowercase();
            UNIVERSITY_KEYWORDS.iter().any(|k| lower.contains(k))
                && line.chars().count() > UNIVERSITY_MIN_CHARS
        })
    }
}

fn first_match(text: &str, rules: &[Rule]) -> Option<String> {
    rules.iter().find_map(|rule| {
        let caps = (rule.regex)().captures(text)?;
        let m = match rule.take {
            Take::Whole => caps.get(0)?,
            Take::Group => caps.get(1)?,
        };
        let value = m.as_str().trim();
        (rule.accept)(value).then(|| value.to_string())
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
