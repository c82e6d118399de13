use synod_core::Severity;

#[test]
fn fail_on_exits_zero_when_no_matching_severity() {
    // Simulate: only low-severity findings, threshold is high
    let findings = vec![Severity::Low, Severity::Medium];
    let threshold = Severity::High;

    let has_findings = findings.iter().any(|s| s.meets_threshold(threshold));
    assert!(!has_findings, "should not fail when nothing reaches high");
}

#[test]
fn fail_on_exits_one_when_matching_severity_found() {
    // Simulate: critical finding present, threshold is medium
    let findings = vec![Severity::Critical, Severity::Low];
    let threshold = Severity::Medium;

    let has_findings = findings.iter().any(|s| s.meets_threshold(threshold));
    assert!(has_findings, "critical meets the medium threshold");
}

#[test]
fn fail_on_high_catches_high_and_critical() {
    let threshold = Severity::High;

    assert!(Severity::Critical.meets_threshold(threshold));
    assert!(Severity::High.meets_threshold(threshold));
    assert!(!Severity::Medium.meets_threshold(threshold));
    assert!(!Severity::Low.meets_threshold(threshold));
}

#[test]
fn fail_on_threshold_parses_from_cli_strings() {
    assert_eq!("high".parse::<Severity>().unwrap(), Severity::High);
    assert_eq!("CRITICAL".parse::<Severity>().unwrap(), Severity::Critical);
    assert!("blocker".parse::<Severity>().is_err());
}
