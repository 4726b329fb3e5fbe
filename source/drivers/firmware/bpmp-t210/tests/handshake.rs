//! CONTEXT: Channel-area handshake against the simulated SoC
//! OWNERS: @runtime
//! STATUS: Functional
//! TEST_COVERAGE: 8 integration tests
//!
//! TEST_SCENARIOS:
//!   - connect_maps_every_channel(): one discovery and one window per channel
//!   - not_ready_issues_no_discovery(): zero status aborts before any discovery
//!   - retry_after_firmware_boot(): NotReady is retryable
//!   - zero_address_maps_nothing(): a missing area aborts before mapping
//!   - map_failure_rolls_back(): windows mapped before the failure are released
//!   - missing_register_block(): absent resources report NoDevice
//!   - window_smaller_than_message(): config is validated before mapping
//!   - areas_alias_firmware_memory(): area writes land in the firmware's buffer
use bpmp_t210::sim::{Faults, SimRegion, SimSoc};
use bpmp_t210::{MailConfig, MailError, T210Mailbox, NR_CHANNELS};

type Mailbox = T210Mailbox<SimRegion, SimSoc, SimSoc>;

fn connect(soc: &SimSoc, config: MailConfig) -> Result<Mailbox, MailError> {
    T210Mailbox::connect(soc, soc.clone(), soc.clone(), config)
}

#[test]
fn connect_maps_every_channel() {
    let soc = SimSoc::booted();
    let mailbox = connect(&soc, MailConfig::default()).expect("connect");

    assert_eq!(soc.discoveries(), NR_CHANNELS);
    assert_eq!(soc.map_phys_calls(), NR_CHANNELS);
    // Channel windows plus the semaphore block; the atomics block is released.
    assert_eq!(soc.live_regions(), NR_CHANNELS + 1);
    for ch in 0..NR_CHANNELS {
        assert!(mailbox.area(ch).is_ok());
    }
    assert_eq!(mailbox.area(NR_CHANNELS).err(), Some(MailError::InvalidChannel(NR_CHANNELS)));

    mailbox.disconnect(&soc);
    assert_eq!(soc.live_regions(), 0);
}

#[test]
fn not_ready_issues_no_discovery() {
    let soc = SimSoc::new();
    for ch in 0..NR_CHANNELS {
        soc.set_channel_address(ch, 0x8000_0000 + (ch as u32) * 0x80);
    }

    let err = connect(&soc, MailConfig::default()).err();
    assert_eq!(err, Some(MailError::NotReady));
    assert_eq!(soc.discoveries(), 0);
    assert_eq!(soc.map_phys_calls(), 0);
    assert_eq!(soc.live_regions(), 0);
}

#[test]
fn retry_after_firmware_boot() {
    let soc = SimSoc::new();
    assert_eq!(connect(&soc, MailConfig::default()).err(), Some(MailError::NotReady));

    soc.boot_firmware();
    let mailbox = connect(&soc, MailConfig::default()).expect("second attempt connects");
    assert!(mailbox.semaphore().status() != 0);
}

#[test]
fn zero_address_maps_nothing() {
    let soc = SimSoc::booted();
    soc.set_channel_address(5, 0);

    let err = connect(&soc, MailConfig::default()).err();
    assert_eq!(err, Some(MailError::BadChannelAddress { channel: 5 }));
    // Discovery stops at the faulty channel and nothing gets mapped.
    assert_eq!(soc.discoveries(), 6);
    assert_eq!(soc.map_phys_calls(), 0);
    assert_eq!(soc.live_regions(), 0);
}

#[test]
fn map_failure_rolls_back() {
    let soc = SimSoc::booted();
    soc.inject(Faults { fail_map_phys_at: Some(7), ..Faults::default() });

    let err = connect(&soc, MailConfig::default()).err();
    assert_eq!(err, Some(MailError::MapFailed { channel: 7 }));
    assert_eq!(soc.map_phys_calls(), 8);
    assert_eq!(soc.live_regions(), 0);

    soc.inject(Faults::default());
    assert!(connect(&soc, MailConfig::default()).is_ok());
}

#[test]
fn missing_register_block() {
    let soc = SimSoc::booted();

    soc.inject(Faults { missing_resource: Some(0), ..Faults::default() });
    assert_eq!(connect(&soc, MailConfig::default()).err(), Some(MailError::NoDevice { resource: 0 }));

    soc.inject(Faults { missing_resource: Some(1), ..Faults::default() });
    assert_eq!(connect(&soc, MailConfig::default()).err(), Some(MailError::NoDevice { resource: 1 }));

    assert_eq!(soc.discoveries(), 0);
    assert_eq!(soc.live_regions(), 0);
}

#[test]
fn window_smaller_than_message() {
    let soc = SimSoc::booted();
    let config = MailConfig { area_window: 0x40, ..MailConfig::default() };

    assert_eq!(
        connect(&soc, config).err(),
        Some(MailError::WindowTooSmall { window: 0x40, min: 0x80 })
    );
    assert_eq!(soc.live_regions(), 0);
}

#[test]
fn areas_alias_firmware_memory() {
    let soc = SimSoc::booted();
    let mailbox = connect(&soc, MailConfig::default()).expect("connect");

    let area = mailbox.area(10).expect("inbound area");
    area.set_code(-5);
    area.write_payload(b"shared").expect("payload fits");

    let seen = soc.remote().message(10);
    assert_eq!(seen.code, -5);
    assert_eq!(&seen.data[..6], b"shared");
}
