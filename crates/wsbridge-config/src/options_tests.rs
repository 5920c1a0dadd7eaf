use super::*;

#[test]
fn test_options_default_handling() {
    let o = Options::resolve(&[OptionsOverride {
        log_level: Some(LogLevel::Debug),
        write_wait: Some(Duration::from_secs(15)),
        ping_period: Some(Duration::from_secs(10)),
        ..Default::default()
    }]);

    assert_eq!(o.log_level, LogLevel::Debug);
    assert_eq!(o.ping_period, Duration::from_secs(10));
    assert_eq!(o.write_wait, Duration::from_secs(15));
    assert_eq!(o.pong_wait, Duration::from_millis(12_500));
    assert_eq!(o.max_message_size, DEFAULT_MAX_MESSAGE_SIZE);
    assert_eq!(o.send_channel_buffer, DEFAULT_SEND_CHANNEL_BUFFER);
    assert_eq!(o.recv_channel_buffer, DEFAULT_RECV_CHANNEL_BUFFER);
    assert!(matches!(o.allowed_origins, OriginPolicy::Pattern(ref p) if p.as_str() == crate::DEFAULT_ORIGIN_PATTERN));
}

#[test]
fn test_no_overrides_yields_defaults() {
    let o = Options::default();
    assert_eq!(o.log_level, DEFAULT_LOG_LEVEL);
    assert_eq!(o.write_wait, DEFAULT_WRITE_WAIT);
    assert_eq!(o.pong_wait, DEFAULT_PONG_WAIT);
    assert_eq!(o.ping_period, DEFAULT_PING_PERIOD);
    assert_eq!(o.max_message_size, DEFAULT_MAX_MESSAGE_SIZE);
    assert!(o.validate().is_ok());
}

#[test]
fn test_later_overrides_win() {
    let first = OptionsOverride::default()
        .with_max_message_size(1024)
        .with_send_channel_buffer(4);
    let second = OptionsOverride::default().with_max_message_size(2048);

    let o = Options::resolve(&[first, second]);
    assert_eq!(o.max_message_size, 2048);
    assert_eq!(o.send_channel_buffer, 4);
    assert_eq!(o.recv_channel_buffer, DEFAULT_RECV_CHANNEL_BUFFER);
}

#[test]
fn test_zero_values_inherit() {
    let first = OptionsOverride::default().with_write_wait(Duration::from_secs(5));
    let second = OptionsOverride {
        write_wait: Some(Duration::ZERO),
        max_message_size: Some(0),
        recv_channel_buffer: Some(0),
        ..Default::default()
    };

    let o = Options::resolve(&[first, second]);
    assert_eq!(o.write_wait, Duration::from_secs(5));
    assert_eq!(o.max_message_size, DEFAULT_MAX_MESSAGE_SIZE);
    assert_eq!(o.recv_channel_buffer, DEFAULT_RECV_CHANNEL_BUFFER);
}

#[test]
fn test_ping_period_derived_from_pong_wait() {
    let o = Options::resolve(&[OptionsOverride::default().with_pong_wait(Duration::from_secs(10))]);
    assert_eq!(o.pong_wait, Duration::from_secs(10));
    assert_eq!(o.ping_period, Duration::from_secs(8));
}

#[test]
fn test_huge_lone_durations_resolve_then_fail_validation() {
    let o = Options::resolve(&[
        OptionsOverride::default().with_ping_period(Duration::from_secs(u64::MAX / 2))
    ]);
    assert!(o.ping_period < o.pong_wait);
    assert!(o.validate().unwrap_err().to_string().contains("pong_wait"));

    let o = Options::resolve(&[OptionsOverride::default().with_ping_period(Duration::MAX)]);
    assert_eq!(o.pong_wait, Duration::MAX);
    assert!(o.validate().is_err());

    let o = Options::resolve(&[OptionsOverride::default().with_pong_wait(Duration::MAX)]);
    assert!(o.ping_period < o.pong_wait);
    assert!(o.validate().is_err());
}

#[test]
fn test_waits_up_to_the_ceiling_are_valid() {
    let o = Options::resolve(&[OptionsOverride::default()
        .with_write_wait(MAX_WAIT)
        .with_pong_wait(MAX_WAIT)]);
    assert!(o.validate().is_ok());

    let o = Options::resolve(&[
        OptionsOverride::default().with_write_wait(MAX_WAIT + Duration::from_secs(1))
    ]);
    assert!(o.validate().unwrap_err().to_string().contains("write_wait"));
}

#[test]
fn test_ping_not_shorter_than_pong_is_invalid() {
    let o = Options::resolve(&[OptionsOverride::default()
        .with_ping_period(Duration::from_secs(30))
        .with_pong_wait(Duration::from_secs(30))]);
    let err = o.validate().unwrap_err();
    assert!(err.to_string().contains("ping_period"));
}

#[test]
fn test_zero_capacity_is_invalid() {
    let mut o = Options::default();
    o.send_channel_buffer = 0;
    assert!(o.validate().is_err());
}

#[test]
fn test_bad_origin_pattern_is_invalid() {
    let o = Options::resolve(&[OptionsOverride::default()
        .with_allowed_origins(OriginPolicy::pattern("["))]);
    assert!(matches!(
        o.validate(),
        Err(ConfigError::InvalidOriginPattern { .. })
    ));
}

#[test]
fn test_log_level_ordering() {
    assert!(LogLevel::Debug.allows(LogLevel::Info));
    assert!(LogLevel::Info.allows(LogLevel::Error));
    assert!(!LogLevel::Warning.allows(LogLevel::Info));
    assert_eq!(LogLevel::Warning.as_filter(), "warn");
}

#[test]
fn test_log_level_serde() {
    let level: LogLevel = serde_json::from_str("\"debug\"").unwrap();
    assert_eq!(level, LogLevel::Debug);
    assert_eq!(serde_json::to_string(&LogLevel::Warning).unwrap(), "\"warning\"");
}
