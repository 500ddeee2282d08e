use super::*;
use crate::constants::GROUP_ALL;
use crate::models::PropertyValue;

#[test]
fn test_global_flags_build_config() {
    let cli = Cli::try_parse_from(["topo-sync", "--verbose", "--store", "/tmp/store", "sync", "prod"])
        .unwrap();
    let config = cli.build_config();
    assert_eq!(config.log_level.as_deref(), Some("debug"));
    assert_eq!(config.store_path, Some(PathBuf::from("/tmp/store")));
    assert_eq!(config.format, OutputFormat::Text);

    let cli = Cli::try_parse_from(["topo-sync", "sync", "prod", "--quiet", "--format", "json"]).unwrap();
    let config = cli.build_config();
    assert_eq!(config.log_level, None);
    assert_eq!(config.format, OutputFormat::Json);
}

#[test]
fn test_verbose_and_quiet_conflict() {
    assert!(Cli::try_parse_from(["topo-sync", "-v", "-q", "sync", "prod"]).is_err());
}

#[test]
fn test_set_property_arguments() {
    let cli = Cli::try_parse_from([
        "topo-sync",
        "set-property",
        "prod",
        "server",
        "num_cpus",
        "4",
        "--capability",
        "host",
    ])
    .unwrap();
    assert!(matches!(cli.command, Commands::SetProperty(_)));

    // the value is optional: omitting it resets the property
    assert!(Cli::try_parse_from(["topo-sync", "set-property", "prod", "server", "size"]).is_ok());
}

#[test]
fn test_placements() {
    let parsed = location::parse_placements(&["aws".to_string()]).unwrap();
    assert_eq!(parsed.get(GROUP_ALL).map(String::as_str), Some("aws"));

    let parsed =
        location::parse_placements(&["web=aws".to_string(), "db=gcp".to_string()]).unwrap();
    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed["db"], "gcp");

    assert!(location::parse_placements(&["=aws".to_string()]).is_err());
}

#[test]
fn test_parse_value() {
    assert_eq!(common::parse_value(Some("L"), false).unwrap(), Some(PropertyValue::scalar("L")));
    assert_eq!(common::parse_value(None, false).unwrap(), None);
    assert_eq!(common::parse_value(Some("null"), true).unwrap(), None);
    assert!(matches!(
        common::parse_value(Some(r#"{"a": "b"}"#), true).unwrap(),
        Some(PropertyValue::Complex(_))
    ));
    // numbers must be passed as strings
    assert!(common::parse_value(Some("4"), true).is_err());
    assert!(common::parse_value(Some("{"), true).is_err());
}

#[test]
fn test_unknown_suggests_closest_id() {
    let err = common::unknown(crate::core::EntityKind::Input, "flavour", ["flavor", "replicas"]);
    let ctx = crate::core::user_friendly_error(err);
    assert_eq!(ctx.suggestion.as_deref(), Some("Did you mean 'flavor'?"));
}
