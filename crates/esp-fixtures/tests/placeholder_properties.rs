//! Property-based tests for placeholder resolution and response masking.

use chrono::{Datelike, NaiveDate};
use esp_fixtures::{
    DateFormat, MASK_SENTINEL, PlaceholderResolver, ResolutionContext, format_date, mask,
    mask_default,
};
use proptest::prelude::*;
use serde_json::Value;

// ─────────────────────────────────────────────────────────────────────────────
// Strategies
// ─────────────────────────────────────────────────────────────────────────────

fn anchor_date() -> impl Strategy<Value = NaiveDate> {
    (1950i32..2100, 1u32..=12, 1u32..=28)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

fn date_token() -> impl Strategy<Value = String> {
    let plain = (
        prop_oneof![Just("DATE"), Just("RDATE")],
        prop_oneof![Just("DAY"), Just("WEEK"), Just("MONTH"), Just("YEAR"), Just("AGE")],
        -500i64..500,
    )
        .prop_map(|(fmt, mode, n)| format!("{fmt}_{mode}_{n}"));
    let shifted = (
        prop_oneof![Just("DATE"), Just("RDATE")],
        0i64..120,
        prop_oneof![Just("TOMORROW"), Just("YESTERDAY")],
    )
        .prop_map(|(fmt, n, shift)| format!("{fmt}_AGE_{n}-{shift}"));
    prop_oneof![plain, shifted]
}

fn json_document() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(Value::from),
        "[a-z<>]{0,8}".prop_map(Value::String),
    ];
    leaf.prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map(
                prop_oneof![
                    Just("id".to_string()),
                    Just("responseId".to_string()),
                    Just("lastUpdated".to_string()),
                    "[a-z]{1,6}",
                ],
                inner,
                0..4
            )
            .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

fn contains_unmasked_key(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.iter().any(|(k, v)| {
            (matches!(k.as_str(), "id" | "responseId" | "lastUpdated")
                && v.as_str() != Some(MASK_SENTINEL))
                || contains_unmasked_key(v)
        }),
        Value::Array(items) => items.iter().any(contains_unmasked_key),
        _ => false,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Resolution
// ─────────────────────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Same token, same resolver: same answer.
    #[test]
    fn prop_resolution_is_deterministic(today in anchor_date(), token in date_token()) {
        let resolver = PlaceholderResolver::for_date(today);
        let text = format!("<<{token}>>");
        prop_assert_eq!(
            resolver.resolve_str(&text, None, None),
            resolver.resolve_str(&text, None, None)
        );
    }

    /// DATE and RDATE forms of a token name the same day.
    #[test]
    fn prop_formats_agree(
        today in anchor_date(),
        mode in prop_oneof![Just("DAY"), Just("WEEK"), Just("MONTH"), Just("YEAR"), Just("AGE")],
        n in -200i64..200,
    ) {
        let resolver = PlaceholderResolver::for_date(today);
        let compact = resolver.resolve_token(&format!("DATE_{mode}_{n}")).unwrap();
        let long = resolver.resolve_token(&format!("RDATE_{mode}_{n}")).unwrap();

        prop_assert_eq!(compact.len(), 8);
        let parsed = NaiveDate::parse_from_str(&compact, "%Y%m%d").unwrap();
        prop_assert_eq!(format_date(parsed, DateFormat::Long), long);
    }

    /// Text without placeholders is returned unchanged.
    #[test]
    fn prop_plain_text_passes_through(today in anchor_date(), text in "[A-Za-z0-9 _<-]{0,40}") {
        let resolver = PlaceholderResolver::for_date(today);
        prop_assume!(!text.contains(">>"));
        prop_assert_eq!(resolver.resolve_str(&text, None, None), text);
    }

    /// Tokens outside the grammar come back verbatim. The context maps them
    /// to their own text and never lists them as failures.
    #[test]
    fn prop_unrecognized_tokens_are_kept(
        today in anchor_date(),
        name in "[A-Z]{1,6}(_[A-Z]{1,6}){0,3}",
    ) {
        prop_assume!(!name.starts_with("DATE_") && !name.starts_with("RDATE_"));
        prop_assume!(!name.starts_with("IGNORE_"));
        let resolver = PlaceholderResolver::for_date(today);
        let mut ctx = ResolutionContext::new();
        let text = format!("a <<{name}>> b");
        prop_assert_eq!(resolver.resolve_str(&text, Some(&mut ctx), Some("f.json")), text);
        prop_assert!(ctx.failures().is_empty());
        let wrapped = format!("<<{name}>>");
        prop_assert_eq!(
            ctx.for_scope("f.json").and_then(|values| values.get(&name)),
            Some(&wrapped)
        );
    }

    /// Offsets that leave years 1 to 9999 are failures; the token stays put.
    #[test]
    fn prop_out_of_range_years_fail(
        today in anchor_date(),
        fmt in prop_oneof![Just("DATE"), Just("RDATE")],
        years in prop_oneof![8100i64..20_000, -20_000i64..-2100],
    ) {
        let resolver = PlaceholderResolver::for_date(today);
        let mut ctx = ResolutionContext::new();
        let token = format!("{fmt}_YEAR_{years}");
        let text = format!("<<{token}>>");
        prop_assert!(resolver.resolve_token(&token).is_err());
        prop_assert_eq!(resolver.resolve_str(&text, Some(&mut ctx), None), text);
        prop_assert_eq!(ctx.failures().len(), 1);
        prop_assert_eq!(&ctx.failures()[0].token, &token);
    }

    /// AGE n anchored mid-year keeps the month and day and subtracts n years.
    #[test]
    fn prop_age_subtracts_whole_years(today in anchor_date(), age in 0i32..120) {
        let resolver = PlaceholderResolver::for_date(today);
        let out = resolver.resolve_token(&format!("DATE_AGE_{age}")).unwrap();
        let date = NaiveDate::parse_from_str(&out, "%Y%m%d").unwrap();
        prop_assert_eq!(date.year(), today.year() - age);
        prop_assert_eq!((date.month(), date.day()), (today.month(), today.day()));
    }

    /// Born on Feb 29: non-leap target years land on Feb 28.
    #[test]
    fn prop_leap_day_age(age in 0i32..200) {
        let today = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let out = PlaceholderResolver::for_date(today)
            .resolve_token(&format!("DATE_AGE_{age}"))
            .unwrap();
        let target = 2024 - age;
        let leap = NaiveDate::from_ymd_opt(target, 2, 29).is_some();
        let expected_day = if leap { "0229" } else { "0228" };
        prop_assert_eq!(out, format!("{target}{expected_day}"));
    }
}

#[test]
fn multi_part_unknown_token_is_left_alone() {
    let resolver = PlaceholderResolver::for_date(NaiveDate::from_ymd_opt(2025, 6, 15).unwrap());
    let mut ctx = ResolutionContext::new();
    assert_eq!(
        resolver.resolve_str("value <<FOO_BAR_BAZ>> end", Some(&mut ctx), None),
        "value <<FOO_BAR_BAZ>> end"
    );
    assert!(ctx.failures().is_empty());
}

#[test]
fn years_beyond_four_digits_are_failures() {
    let resolver = PlaceholderResolver::for_date(NaiveDate::from_ymd_opt(2025, 6, 15).unwrap());
    let mut ctx = ResolutionContext::new();
    for token in ["DATE_YEAR_8000", "DATE_AGE_2025", "RDATE_AGE_2025", "DATE_AGE_3000"] {
        let text = format!("<<{token}>>");
        assert_eq!(resolver.resolve_str(&text, Some(&mut ctx), None), text);
    }
    assert_eq!(ctx.failures().len(), 4);
    assert_eq!(resolver.resolve_token("DATE_AGE_2024").unwrap(), "00010615");
}

// ─────────────────────────────────────────────────────────────────────────────
// Masking
// ─────────────────────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Masking twice equals masking once.
    #[test]
    fn prop_mask_is_idempotent(doc in json_document()) {
        let once = mask_default(doc);
        prop_assert_eq!(mask_default(once.clone()), once);
    }

    /// No masked key survives with its original value.
    #[test]
    fn prop_mask_covers_every_depth(doc in json_document()) {
        prop_assert!(!contains_unmasked_key(&mask_default(doc)));
    }

    /// An empty key list leaves the document alone.
    #[test]
    fn prop_empty_mask_is_identity(doc in json_document()) {
        let keys: [&str; 0] = [];
        prop_assert_eq!(mask(doc.clone(), &keys), doc);
    }
}
