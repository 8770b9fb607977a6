//! Persistent storage for bonded keyboards.
//!
//! Uses the nRF52840's internal flash via the `sequential-storage`
//! crate to remember which keyboards have bonded, so a known peer
//! passes the scan filter by address alone and, because its key
//! material is stored alongside, re-encrypts on power-up without
//! pairing again.
//!
//! Storage layout:
//!   - The whole bond list is one map entry under `KEY_BONDED_PEERS`.
//!   - `sequential-storage` appends new versions and handles wear
//!     levelling and GC across the reserved pages.
//!
//! The key material travels through here as an opaque blob; only the
//! security handler knows its layout. The in-memory `BondStore` and
//! its record codec are pure and host-tested; only the flash load/save
//! lives behind `embedded`.

use heapless::Vec;

use crate::ble::address::PeerAddress;
use crate::config::MAX_BONDED_PEERS;

#[cfg(feature = "embedded")]
use crate::config::{STORAGE_FLASH_PAGE_COUNT, STORAGE_FLASH_PAGE_START};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;

/// Flash page size for nRF52840 (4 KB).
#[cfg(feature = "embedded")]
const FLASH_PAGE_SIZE: u32 = 4096;

/// Start address of the bond storage region.
#[cfg(feature = "embedded")]
const STORAGE_START: u32 = STORAGE_FLASH_PAGE_START * FLASH_PAGE_SIZE;

/// End address (exclusive) of the bond storage region.
#[cfg(feature = "embedded")]
const STORAGE_END: u32 = (STORAGE_FLASH_PAGE_START + STORAGE_FLASH_PAGE_COUNT) * FLASH_PAGE_SIZE;

/// Map key for the bonded peer list.
#[cfg(feature = "embedded")]
const KEY_BONDED_PEERS: u8 = 0x01;

/// Upper bound on one peer's serialized key material.
pub const MAX_BOND_BLOB: usize = 64;

/// Serialized bond list upper bound:
/// 1 count + 4 peers x (6 addr + 1 name_len + 32 name + 1 blob_len +
/// 64 key blob).
pub const MAX_RECORD_SIZE: usize = 512;

/// One bonded keyboard.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BondedPeer {
    /// BLE address the peer scanned with when it bonded.
    pub address: PeerAddress,
    /// Advertised name at bond time (for logs and UI display).
    pub name: heapless::String<32>,
    /// Serialized key material, if the bond produced any.
    pub bond: Option<Vec<u8, MAX_BOND_BLOB>>,
}

impl BondedPeer {
    pub fn new(address: PeerAddress, name: &str) -> Self {
        let mut n: heapless::String<32> = heapless::String::new();
        for c in name.chars().take(32) {
            let _ = n.push(c);
        }
        Self { address, name: n, bond: None }
    }

    /// Serialize as `[6 addr][1 name_len][name][1 blob_len][blob]`;
    /// returns the bytes written, 0 if the buffer is too small.
    fn serialize(&self, buf: &mut [u8]) -> usize {
        let name_bytes = self.name.as_bytes();
        let blob: &[u8] = self.bond.as_deref().unwrap_or(&[]);
        let total = 6 + 1 + name_bytes.len() + 1 + blob.len();
        if buf.len() < total {
            return 0;
        }
        buf[0..6].copy_from_slice(&self.address.bytes());
        buf[6] = name_bytes.len() as u8;
        let mut at = 7;
        buf[at..at + name_bytes.len()].copy_from_slice(name_bytes);
        at += name_bytes.len();
        buf[at] = blob.len() as u8;
        at += 1;
        buf[at..at + blob.len()].copy_from_slice(blob);
        total
    }

    /// Parse one record, returning it and the bytes it consumed.
    fn deserialize(data: &[u8]) -> Option<(Self, usize)> {
        if data.len() < 7 {
            return None;
        }
        let mut addr = [0u8; 6];
        addr.copy_from_slice(&data[0..6]);
        let name_len = data[6] as usize;
        let blob_at = 7 + name_len;
        if data.len() < blob_at + 1 {
            return None;
        }

        let mut name: heapless::String<32> = heapless::String::new();
        if let Ok(s) = core::str::from_utf8(&data[7..blob_at]) {
            for c in s.chars().take(32) {
                let _ = name.push(c);
            }
        }

        let blob_len = data[blob_at] as usize;
        let end = blob_at + 1 + blob_len;
        if blob_len > MAX_BOND_BLOB || data.len() < end {
            return None;
        }
        let bond = if blob_len == 0 {
            None
        } else {
            Vec::from_slice(&data[blob_at + 1..end]).ok()
        };

        Some((Self { address: PeerAddress::new(addr), name, bond }, end))
    }
}

/// In-memory cache of bonded peers, synced with flash.
pub struct BondStore {
    peers: Vec<BondedPeer, MAX_BONDED_PEERS>,
    /// True when the cache differs from flash.
    dirty: bool,
}

impl BondStore {
    pub const fn new() -> Self {
        Self { peers: Vec::new(), dirty: false }
    }

    /// Record a bond. A peer already stored gets its name and keys
    /// refreshed; a record without keys never wipes stored ones. A
    /// full store evicts its oldest entry.
    pub fn add(&mut self, peer: BondedPeer) {
        if let Some(existing) = self.peers.iter_mut().find(|p| p.address == peer.address) {
            if existing.name != peer.name {
                existing.name = peer.name;
                self.dirty = true;
            }
            if peer.bond.is_some() && existing.bond != peer.bond {
                existing.bond = peer.bond;
                self.dirty = true;
            }
            return;
        }

        if self.peers.is_full() {
            self.peers.remove(0);
        }
        let _ = self.peers.push(peer);
        self.dirty = true;
    }

    pub fn iter(&self) -> impl Iterator<Item = &BondedPeer> {
        self.peers.iter()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// True when the cache holds changes not yet written to flash.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Serialize the whole list: `[count][record]...`.
    pub fn serialize_all(&self, buf: &mut [u8]) -> usize {
        buf[0] = self.peers.len() as u8;
        let mut offset = 1;
        for peer in &self.peers {
            offset += peer.serialize(&mut buf[offset..]);
        }
        offset
    }

    /// Rebuild the list from a serialized blob. Truncated trailing
    /// records are dropped rather than failing the whole load.
    pub fn deserialize_all(&mut self, data: &[u8]) {
        self.peers.clear();
        let Some(&count) = data.first() else {
            return;
        };

        let mut offset = 1;
        for _ in 0..count {
            let Some((peer, used)) = BondedPeer::deserialize(&data[offset..]) else {
                break;
            };
            if self.peers.is_full() {
                break;
            }
            let _ = self.peers.push(peer);
            offset += used;
        }
    }
}

#[cfg(feature = "embedded")]
impl BondStore {
    /// Load the bond list from flash, replacing the cache.
    pub async fn load_from_flash(
        &mut self,
        flash: &mut impl embedded_storage_async::nor_flash::NorFlash,
    ) {
        use defmt::{error, info};

        let mut buf = [0u8; MAX_RECORD_SIZE];
        match sequential_storage::map::fetch_item::<u8, &[u8], _>(
            flash,
            STORAGE_START..STORAGE_END,
            &mut sequential_storage::cache::NoCache::new(),
            &mut buf,
            &KEY_BONDED_PEERS,
        )
        .await
        {
            Ok(Some(data)) => {
                self.deserialize_all(data);
                info!("loaded {} bonded peers from flash", self.peers.len());
            }
            Ok(None) => {
                info!("no bonded peers in flash");
                self.peers.clear();
            }
            Err(e) => {
                error!("flash read error: {:?}", defmt::Debug2Format(&e));
                self.peers.clear();
            }
        }
        self.dirty = false;
    }

    /// Persist the bond list if it changed since the last save.
    pub async fn save_to_flash(
        &mut self,
        flash: &mut impl embedded_storage_async::nor_flash::NorFlash,
    ) {
        use defmt::{debug, error, info};

        if !self.dirty {
            debug!("bond store unchanged, skipping save");
            return;
        }

        let mut buf = [0u8; MAX_RECORD_SIZE];
        let mut data_buf = [0u8; MAX_RECORD_SIZE];
        let len = self.serialize_all(&mut data_buf);
        let item = &data_buf[..len];

        match sequential_storage::map::store_item::<u8, &[u8], _>(
            flash,
            STORAGE_START..STORAGE_END,
            &mut sequential_storage::cache::NoCache::new(),
            &mut buf,
            &KEY_BONDED_PEERS,
            &item,
        )
        .await
        {
            Ok(_) => {
                info!("saved {} bonded peers to flash", self.peers.len());
                self.dirty = false;
            }
            Err(e) => {
                error!("flash write error: {:?}", defmt::Debug2Format(&e));
            }
        }
    }
}

/// Bond store shared between the host task (writes after bonding) and
/// whoever builds the scan allowlist.
pub static BOND_STORE: Mutex<CriticalSectionRawMutex, BondStore> = Mutex::new(BondStore::new());

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> PeerAddress {
        PeerAddress::new([n; 6])
    }

    fn keys(fill: u8) -> Vec<u8, MAX_BOND_BLOB> {
        Vec::from_slice(&[fill; 50]).unwrap()
    }

    #[test]
    fn add_then_iterate() {
        let mut store = BondStore::new();
        assert!(store.is_empty());

        store.add(BondedPeer::new(addr(1), "Surface Keyboard"));
        store.add(BondedPeer::new(addr(2), "K380"));
        assert_eq!(store.len(), 2);

        let names: std::vec::Vec<&str> = store.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Surface Keyboard", "K380"]);
    }

    #[test]
    fn re_adding_a_peer_updates_instead_of_duplicating() {
        let mut store = BondStore::new();
        store.add(BondedPeer::new(addr(1), "old name"));
        store.add(BondedPeer::new(addr(1), "new name"));

        assert_eq!(store.len(), 1);
        assert_eq!(store.iter().next().unwrap().name.as_str(), "new name");
    }

    #[test]
    fn full_store_evicts_the_oldest_bond() {
        let mut store = BondStore::new();
        for n in 0..(MAX_BONDED_PEERS as u8 + 1) {
            store.add(BondedPeer::new(addr(n), "kbd"));
        }

        assert_eq!(store.len(), MAX_BONDED_PEERS);
        // Peer 0 is gone, the newest is present.
        assert!(store.iter().all(|p| p.address != addr(0)));
        assert!(store.iter().any(|p| p.address == addr(MAX_BONDED_PEERS as u8)));
    }

    #[test]
    fn bond_list_survives_a_serialize_cycle() {
        let mut store = BondStore::new();
        let mut with_keys = BondedPeer::new(addr(1), "Surface Keyboard");
        with_keys.bond = Some(keys(0xAB));
        store.add(with_keys);
        store.add(BondedPeer::new(addr(2), ""));

        let mut buf = [0u8; MAX_RECORD_SIZE];
        let len = store.serialize_all(&mut buf);

        let mut restored = BondStore::new();
        restored.deserialize_all(&buf[..len]);
        assert_eq!(restored.len(), 2);

        let first = restored.iter().next().unwrap();
        assert_eq!(first.name.as_str(), "Surface Keyboard");
        assert_eq!(first.bond, Some(keys(0xAB)));

        let second = restored.iter().nth(1).unwrap();
        assert_eq!(second.address, addr(2));
        assert_eq!(second.bond, None);
    }

    #[test]
    fn keys_survive_a_power_cycle_and_a_keyless_refresh() {
        let mut store = BondStore::new();
        let mut peer = BondedPeer::new(addr(1), "K380");
        peer.bond = Some(keys(0x42));
        store.add(peer);

        let mut buf = [0u8; MAX_RECORD_SIZE];
        let len = store.serialize_all(&mut buf);

        // Reboot: a fresh store rebuilt from flash still knows the keys.
        let mut rebooted = BondStore::new();
        rebooted.deserialize_all(&buf[..len]);
        assert_eq!(rebooted.iter().next().unwrap().bond, Some(keys(0x42)));

        // A later session that produced no fresh keys keeps the old ones.
        rebooted.add(BondedPeer::new(addr(1), "K380"));
        assert_eq!(rebooted.iter().next().unwrap().bond, Some(keys(0x42)));
    }

    #[test]
    fn rebonding_replaces_the_stored_keys() {
        let mut store = BondStore::new();
        let mut peer = BondedPeer::new(addr(1), "K380");
        peer.bond = Some(keys(0x11));
        store.add(peer);

        let mut rebonded = BondedPeer::new(addr(1), "K380");
        rebonded.bond = Some(keys(0x22));
        store.add(rebonded);

        assert_eq!(store.len(), 1);
        assert_eq!(store.iter().next().unwrap().bond, Some(keys(0x22)));
    }

    #[test]
    fn truncated_blob_keeps_the_complete_records() {
        let mut store = BondStore::new();
        store.add(BondedPeer::new(addr(1), "first"));
        store.add(BondedPeer::new(addr(2), "second"));

        let mut buf = [0u8; MAX_RECORD_SIZE];
        let len = store.serialize_all(&mut buf);

        // Cut into the middle of the second record.
        let mut restored = BondStore::new();
        restored.deserialize_all(&buf[..len - 3]);
        assert_eq!(restored.len(), 1);
        assert_eq!(restored.iter().next().unwrap().address, addr(1));
    }

    #[test]
    fn deserialize_tolerates_garbage() {
        let mut store = BondStore::new();
        store.deserialize_all(&[]);
        assert!(store.is_empty());
        store.deserialize_all(&[42]);
        assert!(store.is_empty());
        store.deserialize_all(&[1, 0xFF, 0xFF]);
        assert!(store.is_empty());
    }

    #[test]
    fn names_fill_the_whole_field_before_truncating() {
        let exact = BondedPeer::new(addr(1), "exactly thirty-two chars long !!");
        assert_eq!(exact.name.as_str(), "exactly thirty-two chars long !!");
        assert_eq!(exact.name.len(), 32);

        let long = BondedPeer::new(addr(2), "a very long keyboard name that exceeds the field");
        assert_eq!(long.name.len(), 32);

        // A max-length name still round-trips through the codec.
        let mut buf = [0u8; MAX_RECORD_SIZE];
        let len = exact.serialize(&mut buf);
        let (restored, used) = BondedPeer::deserialize(&buf[..len]).unwrap();
        assert_eq!(used, len);
        assert_eq!(restored.name.len(), 32);
    }
}
