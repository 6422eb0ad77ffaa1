//! CRC-16/XMODEM (poly 0x1021, init 0), the checksum networked key/value
//! stores use to assign keys to hash slots.

use std::sync::OnceLock;

static TABLE: OnceLock<[u16; 256]> = OnceLock::new();

fn table() -> &'static [u16; 256] {
    TABLE.get_or_init(|| {
        let mut t = [0u16; 256];
        for (i, v) in t.iter_mut().enumerate() {
            let mut crc = (i as u16) << 8;
            for _ in 0..8 {
                crc = if crc & 0x8000 != 0 { (crc << 1) ^ 0x1021 } else { crc << 1 };
            }
            *v = crc;
        }
        t
    })
}

pub fn crc16(bytes: &[u8]) -> u16 {
    let t = table();
    let mut crc = 0u16;
    for &b in bytes {
        crc = (crc << 8) ^ t[((crc >> 8) as u8 ^ b) as usize];
    }
    crc
}

/// Partition owning `key` among `partitions` slots.
pub fn partition_of(key: &str, partitions: usize) -> usize {
    crc16(key.as_bytes()) as usize % partitions.max(1)
}
