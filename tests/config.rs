use core::convert::TryFrom;

use briny_saliency::backend::{Framework, Frameworks};
use briny_saliency::explain::{ExplainConfig, Mode};
use briny_saliency::Error;

#[test]
fn test_default_config() {
    let config = ExplainConfig::default();
    assert_eq!(config.mode, Mode::Classification);
    assert_eq!(config.num_samples, 50);
    assert_eq!(config.sigma, 0.1);
    assert_eq!(config.seed, None);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_json_roundtrip() {
    let config = ExplainConfig::default()
        .with_mode(Mode::Regression)
        .with_num_samples(8)
        .with_sigma(0.25)
        .with_seed(17);

    let json = serde_json::to_string(&config).unwrap();
    assert!(json.contains("\"regression\""));
    let back: ExplainConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
}

#[test]
fn test_partial_json_uses_defaults() {
    let config: ExplainConfig = serde_json::from_str(r#"{ "mode": "regression" }"#).unwrap();
    assert_eq!(config.mode, Mode::Regression);
    assert_eq!(config.num_samples, 50);
    assert_eq!(config.sigma, 0.1);
}

#[test]
fn test_mode_from_str() {
    assert_eq!(Mode::from("classification"), Mode::Classification);
    assert_eq!(Mode::from("regression"), Mode::Regression);
    assert_eq!(Mode::from("anything else"), Mode::Regression);
    assert_eq!(Mode::Classification.to_string(), "classification");
}

#[test]
fn test_validate_rejects_bad_values() {
    let zero = ExplainConfig::default().with_num_samples(0);
    assert!(matches!(zero.validate(), Err(Error::InvalidArgument(_))));

    let negative = ExplainConfig::default().with_sigma(-0.1);
    assert!(matches!(negative.validate(), Err(Error::InvalidArgument(_))));

    let nan = ExplainConfig::default().with_sigma(f32::NAN);
    assert!(nan.validate().is_err());

    assert!(ExplainConfig::default().with_sigma(0.0).validate().is_ok());
}

#[test]
fn test_framework_codes_and_names() {
    assert_eq!(Framework::try_from(0u8), Ok(Framework::ChannelsFirst));
    assert_eq!(Framework::try_from(1u8), Ok(Framework::ChannelsLast));
    assert!(Framework::try_from(2u8).is_err());

    assert_eq!(
        serde_json::to_string(&Framework::ChannelsFirst).unwrap(),
        "\"channels-first\""
    );
}

#[test]
fn test_registry_order() {
    let all = Frameworks::available();
    assert_eq!(
        all.iter().collect::<Vec<_>>(),
        vec![Framework::ChannelsFirst, Framework::ChannelsLast]
    );

    let reversed = Frameworks::with_order([Framework::ChannelsLast, Framework::ChannelsFirst]).unwrap();
    assert_eq!(reversed.iter().next(), Some(Framework::ChannelsLast));
    assert!(reversed.contains(Framework::ChannelsFirst));

    let twice = Frameworks::with_order([Framework::ChannelsLast, Framework::ChannelsLast]);
    assert!(matches!(twice, Err(Error::InvalidArgument(_))));
}

#[test]
fn test_global_registry_resolves_once() {
    let explicit = Frameworks::with_order([Framework::ChannelsLast]).unwrap();
    explicit.clone().install().unwrap();

    assert_eq!(Frameworks::global(), &explicit);
    assert!(Frameworks::available().install().is_err());
}

#[test]
fn test_registry_json_goes_through_validation() {
    let json = serde_json::to_string(&Frameworks::available()).unwrap();
    assert_eq!(json, r#"["channels-first","channels-last"]"#);
    let back: Frameworks = serde_json::from_str(&json).unwrap();
    assert_eq!(back, Frameworks::available());

    let reversed: Frameworks = serde_json::from_str(r#"["channels-last","channels-first"]"#).unwrap();
    assert_eq!(reversed.iter().next(), Some(Framework::ChannelsLast));

    let twice = serde_json::from_str::<Frameworks>(r#"["channels-last","channels-last"]"#);
    assert!(twice.unwrap_err().to_string().contains("listed twice"));
}
