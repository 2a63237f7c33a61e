use proptest::prelude::*;
use feedline_engine::config::parser;
use feedline_engine::config::validator;

fn yaml_with(retry: &str, cohorts: &str, parallelism: u32) -> String {
    format!(
        r#"
version: "1.0"
retry:
{retry}
warehouse:
  backend: sqlite
  project: team-god
trends:
  cohorts:
{cohorts}
parallelism: {parallelism}
"#
    )
}

proptest! {
    #[test]
    fn max_attempts_must_be_positive(max_attempts in 0_u32..20) {
        let yaml = yaml_with(
            &format!("  max_attempts: {max_attempts}"),
            "    - keywords: [glass]",
            1,
        );
        let config = parser::parse_config_str(&yaml).expect("generated yaml must parse");
        let result = validator::validate_config(&config);

        if max_attempts == 0 {
            prop_assert!(result.is_err());
        } else {
            prop_assert!(result.is_ok());
            prop_assert_eq!(config.retry_policy().max_attempts, max_attempts);
        }
    }

    #[test]
    fn retry_delays_grow_linearly(base in 1_u32..600, quarter_steps in 1_u32..8, attempt in 1_u32..10) {
        let scale = f64::from(quarter_steps) * 0.25;
        let yaml = yaml_with(
            &format!("  base_delay_secs: {base}\n  scale_factor: {scale}"),
            "    - keywords: [glass]",
            1,
        );
        let config = parser::parse_config_str(&yaml).expect("generated yaml must parse");
        let policy = config.retry_policy();

        let expected = f64::from(base) * scale * f64::from(attempt);
        prop_assert!((policy.delay_for(attempt).as_secs_f64() - expected).abs() < 1e-6);
        prop_assert!(policy.delay_for(attempt + 1) > policy.delay_for(attempt));
    }

    #[test]
    fn keyword_count_is_bounded(count in 0_usize..9) {
        let keywords: Vec<String> = (0..count).map(|i| format!("kw{i}")).collect();
        let yaml = yaml_with(
            "  max_attempts: 3",
            &format!("    - keywords: [{}]", keywords.join(", ")),
            1,
        );
        let config = parser::parse_config_str(&yaml).expect("generated yaml must parse");
        let result = validator::validate_config(&config);

        if (1..=5).contains(&count) {
            prop_assert!(result.is_ok());
        } else {
            prop_assert!(result.is_err());
        }
    }

    #[test]
    fn parallelism_must_be_positive(parallelism in 0_u32..16) {
        let yaml = yaml_with("  max_attempts: 3", "    - keywords: [glass]", parallelism);
        let config = parser::parse_config_str(&yaml).expect("generated yaml must parse");
        prop_assert_eq!(validator::validate_config(&config).is_ok(), parallelism > 0);
    }

    #[test]
    fn cohorts_get_distinct_numbered_tables(n in 1_usize..8) {
        let cohorts: String = (0..n)
            .map(|i| format!("    - keywords: [kw{i}]"))
            .collect::<Vec<_>>()
            .join("\n");
        let yaml = yaml_with("  max_attempts: 3", &cohorts, 1);
        let config = parser::parse_config_str(&yaml).expect("generated yaml must parse");
        prop_assert!(validator::validate_config(&config).is_ok());

        let suffixes: Vec<String> = config
            .trends_cohorts()
            .into_iter()
            .filter_map(|c| c.table_suffix)
            .collect();
        let expected: Vec<String> = (1..=n).map(|i| i.to_string()).collect();
        prop_assert_eq!(suffixes, expected);
    }
}
