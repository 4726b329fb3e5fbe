//! CONTEXT: Tests for HAL seams: MmioBus window access, Bus by reference
//! OWNERS: @runtime
//! STATUS: Functional
//! TEST_COVERAGE: 4 integration tests
//!
//! TEST_SCENARIOS:
//!   - mmio_roundtrip(): volatile writes are observed by volatile reads
//!   - mmio_bytes_use_default_helpers(): byte helpers go through 32-bit lanes
//!   - mmio_rejects_out_of_window(): accesses past the window panic
//!   - bus_by_reference(): &B forwards to B
use std::ptr::NonNull;

use tegra_hal::{Bus, MmioBus};

fn window(words: &mut Vec<u32>) -> MmioBus {
    let base = NonNull::new(words.as_mut_ptr()).expect("vec buffer is non-null");
    // SAFETY: the backing vector outlives every use of the window in these tests.
    unsafe { MmioBus::new(base, words.len() * 4) }
}

#[test]
fn mmio_roundtrip() {
    let mut backing = vec![0u32; 8];
    let bus = window(&mut backing);
    bus.write(0x1c, 0xdead_beef);
    assert_eq!(bus.read(0x1c), 0xdead_beef);
    assert_eq!(bus.read(0x18), 0);
    assert_eq!(bus.len(), 32);
}

#[test]
fn mmio_bytes_use_default_helpers() {
    let mut backing = vec![0u32; 4];
    let bus = window(&mut backing);
    bus.write_bytes(2, b"mail");
    assert_eq!(bus.read(0), u32::from_le_bytes([0, 0, b'm', b'a']));
    let mut out = [0u8; 4];
    bus.read_bytes(2, &mut out);
    assert_eq!(&out, b"mail");
}

#[test]
#[should_panic(expected = "outside window")]
fn mmio_rejects_out_of_window() {
    let mut backing = vec![0u32; 2];
    let bus = window(&mut backing);
    let _ = bus.read(8);
}

#[test]
fn bus_by_reference() {
    fn poke<B: Bus>(bus: B) {
        bus.write(4, 7);
    }

    let mut backing = vec![0u32; 2];
    let bus = window(&mut backing);
    poke(&bus);
    assert_eq!(bus.read(4), 7);
}
